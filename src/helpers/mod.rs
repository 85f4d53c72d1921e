//! Helper functions shared by the generator and templates

mod date;
mod url;

pub use date::*;
pub use url::*;
