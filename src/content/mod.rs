//! Content module - posts, rich text and derived listing data

mod navigation;
mod pagination;
mod post;
pub mod richtext;

pub use navigation::{NavPost, Navigation};
pub use pagination::{PageSlice, Paginator, PostsPagination};
pub use post::{Post, PostSummary, DEFAULT_WORDS_PER_MINUTE};
