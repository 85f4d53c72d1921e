//! Listing pagination
//!
//! The home page lists `per_page` posts; every further page exists both as
//! HTML (`/page/N/`) and as a JSON payload (`/page/N.json`) that the
//! "load more" button appends from.

use serde::{Deserialize, Serialize};

use super::PostSummary;

/// Listing payload: one page of posts plus the cursor to the next one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostsPagination {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct PageSlice<T> {
    /// 1-based page number
    pub number: usize,
    pub total: usize,
    pub items: Vec<T>,
    /// Site-relative URL of this page
    pub url: String,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
    /// JSON payload URL of the next page
    pub next_json: Option<String>,
}

/// Splits listings into pages and names their URLs
#[derive(Debug, Clone)]
pub struct Paginator {
    per_page: usize,
    root: String,
    dir: String,
}

impl Paginator {
    pub fn new(per_page: usize, root: &str, dir: &str) -> Self {
        Self {
            per_page: per_page.max(1),
            root: format!("{}/", root.trim_end_matches('/')),
            dir: dir.trim_matches('/').to_string(),
        }
    }

    /// Total number of pages; an empty listing still has one
    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.per_page).max(1)
    }

    /// Split `items` into pages
    pub fn paginate<T: Clone>(&self, items: &[T]) -> Vec<PageSlice<T>> {
        let total = self.page_count(items.len());
        (1..=total)
            .map(|number| {
                let start = ((number - 1) * self.per_page).min(items.len());
                let end = (start + self.per_page).min(items.len());
                PageSlice {
                    number,
                    total,
                    items: items[start..end].to_vec(),
                    url: self.page_url(number),
                    prev_link: (number > 1).then(|| self.page_url(number - 1)),
                    next_link: (number < total).then(|| self.page_url(number + 1)),
                    next_json: (number < total).then(|| self.json_url(number + 1)),
                }
            })
            .collect()
    }

    /// Site-relative URL of page `number`
    pub fn page_url(&self, number: usize) -> String {
        if number <= 1 {
            self.root.clone()
        } else {
            format!("{}{}/{}/", self.root, self.dir, number)
        }
    }

    /// Site-relative URL of the JSON payload of page `number`
    pub fn json_url(&self, number: usize) -> String {
        format!("{}{}/{}.json", self.root, self.dir, number)
    }

    /// Output path of page `number`, relative to the public dir
    pub fn html_path(&self, number: usize) -> String {
        if number <= 1 {
            "index.html".to_string()
        } else {
            format!("{}/{}/index.html", self.dir, number)
        }
    }

    /// Output path of the JSON payload, relative to the public dir
    pub fn json_path(&self, number: usize) -> String {
        format!("{}/{}.json", self.dir, number)
    }
}

impl PageSlice<PostSummary> {
    /// Payload served to the "load more" button
    pub fn to_pagination(&self) -> PostsPagination {
        PostsPagination {
            next_page: self.next_json.clone(),
            results: self.items.clone(),
        }
    }
}
