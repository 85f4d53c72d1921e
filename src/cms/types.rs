//! Wire types of the CMS REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Response of the API root
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub refs: Vec<ApiRef>,
}

impl ApiInfo {
    /// The ref pointing at published content
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

/// A content release pointer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRef {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_master_ref: bool,
}

/// One page of search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub results_per_page: usize,
    #[serde(default)]
    pub results_size: usize,
    #[serde(default)]
    pub total_results_size: usize,
    #[serde(default)]
    pub total_pages: usize,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// A post document as stored in the CMS
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: String,
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub first_publication_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub last_publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: PostDocumentData,
}

/// Custom fields of a post document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostDocumentData {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub banner: Image,
    pub content: Vec<ContentGroup>,
}

/// Image field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub url: Option<String>,
    pub alt: Option<String>,
}

/// One repeatable section of a post: an optional heading and its body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentGroup {
    pub heading: Option<String>,
    pub body: Vec<RichTextBlock>,
}

/// Block types of the rich-text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "heading1")]
    Heading1,
    #[serde(rename = "heading2")]
    Heading2,
    #[serde(rename = "heading3")]
    Heading3,
    #[serde(rename = "heading4")]
    Heading4,
    #[serde(rename = "heading5")]
    Heading5,
    #[serde(rename = "heading6")]
    Heading6,
    #[serde(rename = "preformatted")]
    Preformatted,
    #[serde(rename = "list-item")]
    ListItem,
    #[serde(rename = "o-list-item")]
    OrderedListItem,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "embed")]
    Embed,
    #[serde(other)]
    Unknown,
}

/// A rich-text block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichTextBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Image blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Embed blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Oembed>,
}

impl RichTextBlock {
    /// Plain block without formatting
    pub fn new(kind: BlockKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }
    }

    /// Paragraph shorthand
    pub fn paragraph(text: &str) -> Self {
        Self::new(BlockKind::Paragraph, text)
    }
}

/// oEmbed payload of an embed block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Oembed {
    pub html: Option<String>,
    pub embed_url: Option<String>,
    #[serde(rename = "type")]
    pub oembed_type: Option<String>,
}

/// Inline formatting span kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    #[serde(rename = "strong")]
    Strong,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "hyperlink")]
    Hyperlink,
    #[serde(rename = "label")]
    Label,
    #[serde(other)]
    Unknown,
}

/// Inline formatting over `[start, end)` in UTF-16 code units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

/// Extra span payload (link target or label name)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanData {
    pub url: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
}

/// Accepts RFC 3339 as well as the API's `+0000` offset form; null means absent
fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
    }
}

/// Parse a CMS timestamp
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_master_ref() {
        let json = r#"{
            "refs": [
                {"id": "preview", "ref": "P1", "label": "Preview"},
                {"id": "master", "ref": "YF1x", "label": "Master", "isMasterRef": true}
            ],
            "types": {"post": "Post"}
        }"#;
        let info: ApiInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.master_ref(), Some("YF1x"));
    }

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "id": "YFZ0",
            "uid": "como-utilizar-hooks",
            "type": "post",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "last_publication_date": null,
            "data": {
                "title": "Como utilizar Hooks",
                "subtitle": "Pensando em sincronizacao",
                "author": "Joseph Oliveira",
                "banner": {"url": "https://images.example/banner.png", "dimensions": {"width": 1}},
                "content": [
                    {
                        "heading": "Proin et varius",
                        "body": [
                            {"type": "paragraph", "text": "Lorem ipsum", "spans": [
                                {"start": 0, "end": 5, "type": "strong"}
                            ]},
                            {"type": "list-item", "text": "one", "spans": []},
                            {"type": "fancy-new-block", "text": "?", "spans": []}
                        ]
                    }
                ]
            }
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.uid.as_deref(), Some("como-utilizar-hooks"));
        assert_eq!(
            doc.first_publication_date,
            Some(Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap())
        );
        assert_eq!(doc.last_publication_date, None);
        assert_eq!(doc.data.title.as_deref(), Some("Como utilizar Hooks"));
        assert_eq!(
            doc.data.banner.url.as_deref(),
            Some("https://images.example/banner.png")
        );
        let body = &doc.data.content[0].body;
        assert_eq!(body[0].kind, BlockKind::Paragraph);
        assert_eq!(body[0].spans[0].kind, SpanKind::Strong);
        assert_eq!(body[1].kind, BlockKind::ListItem);
        assert_eq!(body[2].kind, BlockKind::Unknown);
    }

    #[test]
    fn test_document_with_sparse_data() {
        let json = r#"{"id": "X", "uid": null, "type": "post", "data": {}}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(doc.uid.is_none());
        assert!(doc.data.content.is_empty());
        assert!(doc.first_publication_date.is_none());
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = Utc.with_ymd_and_hms(2020, 5, 6, 12, 0, 0).unwrap();
        assert_eq!(parse_date("2020-05-06T12:00:00+0000"), Some(expected));
        assert_eq!(parse_date("2020-05-06T12:00:00Z"), Some(expected));
        assert_eq!(parse_date("2020-05-06T09:00:00-03:00"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_search_response() {
        let json = r#"{
            "page": 1, "results_per_page": 2, "results_size": 2,
            "total_results_size": 3, "total_pages": 2,
            "next_page": "https://x.example/api/v2/documents/search?page=2",
            "prev_page": null,
            "results": []
        }"#;
        let resp: SearchResponse<Document> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.total_pages, 2);
        assert!(resp.next_page.is_some());
        assert!(resp.prev_page.is_none());
    }
}
