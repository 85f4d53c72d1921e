//! Previous/next post lookup

use serde::{Deserialize, Serialize};

use super::Post;

/// Link target for a neighbouring post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavPost {
    pub uid: String,
    pub title: String,
}

impl From<&Post> for NavPost {
    fn from(post: &Post) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
        }
    }
}

/// Neighbours of a post in publication order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    /// Nearest older post
    pub previous: Option<NavPost>,
    /// Nearest newer post
    pub next: Option<NavPost>,
}

impl Navigation {
    /// Find the neighbours of `uid` among `posts`, whatever their order.
    ///
    /// Undated posts count as the oldest; ties keep the input order.
    pub fn resolve(posts: &[Post], uid: &str) -> Self {
        let mut ordered: Vec<&Post> = posts.iter().collect();
        ordered.sort_by_key(|p| p.first_publication_date);

        let Some(pos) = ordered.iter().position(|p| p.uid == uid) else {
            return Self::default();
        };

        Self {
            previous: pos
                .checked_sub(1)
                .map(|i| NavPost::from(ordered[i])),
            next: ordered.get(pos + 1).map(|p| NavPost::from(*p)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_none() && self.next.is_none()
    }
}
