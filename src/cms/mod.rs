//! Headless CMS access - wire types and the REST client
//!
//! The content repository speaks the Prismic v2 REST API: an API root that
//! advertises refs, and a `documents/search` endpoint that takes predicate
//! queries and returns cursor-paginated results.

mod client;
mod error;
pub mod predicate;
pub mod types;

pub use client::{Direction, PrismicClient, Query};
pub use error::CmsError;
