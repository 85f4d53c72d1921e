//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable overriding `cms.endpoint`
pub const ENV_API_ENDPOINT: &str = "PRISMIC_API_ENDPOINT";
/// Environment variable overriding `cms.access_token`
pub const ENV_ACCESS_TOKEN: &str = "PRISMIC_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,
    pub languages_dir: String,

    // Listing
    pub per_page: usize,
    pub pagination_dir: String,

    // Date format (date-fns tokens)
    pub date_format: String,

    // Reading time
    pub words_per_minute: usize,

    // Serving
    pub revalidate: u64,
    pub prerender_limit: Option<usize>,

    // Content source
    #[serde(default)]
    pub cms: CmsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            author: String::new(),
            language: "pt-BR".to_string(),
            timezone: String::new(),

            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            languages_dir: "languages".to_string(),

            per_page: 3,
            pagination_dir: "page".to_string(),

            date_format: "dd MMM yyyy".to_string(),

            words_per_minute: 200,

            revalidate: 60 * 60,
            prerender_limit: None,

            cms: CmsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {:?}", path.as_ref()))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Apply `PRISMIC_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_ENDPOINT).ok(),
            std::env::var(ENV_ACCESS_TOKEN).ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("CMS endpoint overridden from {}", ENV_API_ENDPOINT);
            self.cms.endpoint = endpoint;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.cms.access_token = Some(token);
        }
    }

    /// Resolve the configured timezone, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        if self.timezone.is_empty() {
            return chrono_tz::UTC;
        }
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Unknown timezone {:?}, using UTC", self.timezone);
                chrono_tz::UTC
            }
        }
    }
}

/// Headless CMS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// API root, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "post".to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}
