//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::richtext;
use crate::cms::types::{ContentGroup, Document};
use crate::cms::CmsError;

/// Reading speed used when the configured one is zero
pub const DEFAULT_WORDS_PER_MINUTE: usize = 200;

/// A blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// URL-friendly identifier, unique per post
    pub uid: String,

    /// CMS document id
    pub id: String,

    /// When the post first went live
    pub first_publication_date: Option<DateTime<Utc>>,

    /// When the post was last republished
    pub last_publication_date: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,

    /// Banner image URL
    pub banner_url: Option<String>,

    /// Rich-text sections
    pub content: Vec<ContentGroup>,
}

impl Post {
    /// Create a new post with minimal required fields
    pub fn new(uid: &str, title: &str) -> Self {
        Self {
            uid: uid.to_string(),
            id: uid.to_string(),
            first_publication_date: None,
            last_publication_date: None,
            title: title.to_string(),
            subtitle: String::new(),
            author: String::new(),
            banner_url: None,
            content: Vec::new(),
        }
    }

    /// Build a post from a CMS document; documents without a uid are unroutable
    pub fn from_document(doc: Document) -> Result<Self, CmsError> {
        let uid = doc
            .uid
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| CmsError::InvalidDocument {
                id: doc.id.clone(),
                reason: "missing uid".to_string(),
            })?;

        let data = doc.data;
        Ok(Self {
            uid,
            id: doc.id,
            first_publication_date: doc.first_publication_date,
            last_publication_date: doc.last_publication_date,
            title: data.title.unwrap_or_default(),
            subtitle: data.subtitle.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            banner_url: data.banner.url.filter(|u| !u.is_empty()),
            content: data.content,
        })
    }

    /// Words in every heading and body
    pub fn word_count(&self) -> usize {
        self.content
            .iter()
            .map(|group| {
                let heading = group
                    .heading
                    .as_deref()
                    .map(richtext::word_count)
                    .unwrap_or(0);
                heading + richtext::word_count(&richtext::as_text(&group.body))
            })
            .sum()
    }

    /// Estimated reading time in whole minutes, rounded up
    pub fn reading_time(&self, words_per_minute: usize) -> usize {
        let wpm = if words_per_minute == 0 {
            DEFAULT_WORDS_PER_MINUTE
        } else {
            words_per_minute
        };
        self.word_count().div_ceil(wpm)
    }

    /// Render every section; headings get an anchor id
    pub fn content_html(&self) -> String {
        let mut html = String::new();
        for group in &self.content {
            if let Some(heading) = group.heading.as_deref().filter(|h| !h.trim().is_empty()) {
                html.push_str(&format!(
                    r#"<h2 id="{}">{}</h2>"#,
                    slug::slugify(heading),
                    richtext::html_escape(heading)
                ));
            }
            html.push_str(&richtext::as_html(&group.body));
        }
        html
    }

    /// Whether the post was republished after its first publication
    pub fn was_edited(&self) -> bool {
        match (self.first_publication_date, self.last_publication_date) {
            (Some(first), Some(last)) => last > first,
            _ => false,
        }
    }

    /// Listing card data
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            uid: self.uid.clone(),
            first_publication_date: self.first_publication_date,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            author: self.author.clone(),
        }
    }
}

/// What the home listing shows for a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::types::{PostDocumentData, RichTextBlock};
    use chrono::TimeZone;

    fn group(heading: Option<&str>, body: &[&str]) -> ContentGroup {
        ContentGroup {
            heading: heading.map(str::to_string),
            body: body.iter().map(|t| RichTextBlock::paragraph(t)).collect(),
        }
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_word_count_includes_headings() {
        let mut post = Post::new("p", "P");
        post.content = vec![
            group(Some("Two words"), &["one two three", "four"]),
            group(None, &["five six"]),
        ];
        assert_eq!(post.word_count(), 2 + 4 + 2);
    }

    #[test]
    fn test_reading_time_rounds_up() {
        let mut post = Post::new("p", "P");
        assert_eq!(post.reading_time(200), 0);

        let body = words(199);
        post.content = vec![group(Some("Heading"), &[body.as_str()])];
        assert_eq!(post.reading_time(200), 1);

        let body = words(200);
        post.content = vec![group(Some("Heading"), &[body.as_str()])];
        assert_eq!(post.reading_time(200), 2);

        // A zero rate falls back to the default
        assert_eq!(post.reading_time(0), 2);
    }

    #[test]
    fn test_from_document() {
        let doc = Document {
            id: "D1".to_string(),
            uid: Some("hello".to_string()),
            doc_type: "post".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
            last_publication_date: Some(Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap()),
            data: PostDocumentData {
                title: Some("Hello".to_string()),
                ..PostDocumentData::default()
            },
        };
        let post = Post::from_document(doc).unwrap();
        assert_eq!(post.uid, "hello");
        assert_eq!(post.title, "Hello");
        assert_eq!(post.author, "");
        assert!(post.banner_url.is_none());
        assert!(post.was_edited());
    }

    #[test]
    fn test_from_document_requires_uid() {
        let doc = Document {
            id: "D9".to_string(),
            uid: Some("  ".to_string()),
            doc_type: "post".to_string(),
            first_publication_date: None,
            last_publication_date: None,
            data: PostDocumentData::default(),
        };
        let err = Post::from_document(doc).unwrap_err();
        assert_eq!(err.to_string(), "invalid document D9: missing uid");
    }

    #[test]
    fn test_was_edited() {
        let mut post = Post::new("p", "P");
        assert!(!post.was_edited());
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        post.first_publication_date = Some(date);
        post.last_publication_date = Some(date);
        assert!(!post.was_edited());
    }

    #[test]
    fn test_content_html() {
        let mut post = Post::new("p", "P");
        post.content = vec![
            group(Some("Primeira Seção"), &["Texto"]),
            group(Some(""), &["Sem título"]),
        ];
        assert_eq!(
            post.content_html(),
            r#"<h2 id="primeira-secao">Primeira Seção</h2><p>Texto</p><p>Sem título</p>"#
        );
    }
}
