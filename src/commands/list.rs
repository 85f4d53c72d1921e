//! List published posts

use anyhow::Result;

use crate::cms::PrismicClient;
use crate::content::PostSummary;
use crate::SpaceTraveling;

/// Print published posts, newest first
///
/// With `limit` only the first page of the listing is fetched, the way the
/// home page asks for it.
pub async fn run(site: &SpaceTraveling, limit: Option<usize>) -> Result<()> {
    let client = PrismicClient::new(&site.config.cms)?;

    let (posts, more) = match limit {
        Some(limit) => {
            let mut page = client.fetch_page(limit.max(1)).await?;
            page.results.truncate(limit);
            (page.results, page.next_page.is_some())
        }
        None => {
            let posts = client.fetch_all().await?;
            (posts.iter().map(|p| p.summary()).collect(), false)
        }
    };

    println!("Posts ({}):", posts.len());
    for line in format_listing(&posts) {
        println!("  {}", line);
    }
    if more {
        println!("  ... more posts available; run without --limit to list all");
    }

    Ok(())
}

fn format_listing(posts: &[PostSummary]) -> Vec<String> {
    posts
        .iter()
        .map(|post| {
            let date = post
                .first_publication_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "----------".to_string());
            format!("{} - {} [{}]", date, post.title, post.uid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Post;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_listing() {
        let mut dated = Post::new("como-utilizar-hooks", "Como utilizar Hooks");
        dated.first_publication_date = Some(Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 28).unwrap());
        let undated = Post::new("draft", "Rascunho");

        assert_eq!(
            format_listing(&[dated.summary(), undated.summary()]),
            vec![
                "2021-03-15 - Como utilizar Hooks [como-utilizar-hooks]".to_string(),
                "---------- - Rascunho [draft]".to_string(),
            ]
        );
    }
}
