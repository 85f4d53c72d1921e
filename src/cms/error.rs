//! CMS client errors

use reqwest::StatusCode;

/// Errors returned by [`super::PrismicClient`]
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// The configured endpoint is not an absolute http(s) URL.
    #[error("invalid CMS endpoint {0:?}")]
    InvalidEndpoint(String),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("CMS responded with {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// The body was not the JSON shape we expect.
    #[error("failed to decode CMS response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API root did not list a master ref.
    #[error("CMS did not advertise a master ref")]
    NoMasterRef,

    /// No document matched the lookup.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document lacks a field the site cannot do without.
    #[error("invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },
}

impl CmsError {
    /// True when the CMS positively reported the document as absent
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}
