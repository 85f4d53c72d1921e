//! Initialize a new site

use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

use crate::CONFIG_FILE;

const CONFIG_TEMPLATE: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
description: ''
author: ''
language: pt-BR
timezone: ''

# URL
url: http://localhost:3000
root: /

# Directory
public_dir: public
static_dir: static
languages_dir: languages

# Listing
per_page: 3
pagination_dir: page
date_format: dd MMM yyyy
words_per_minute: 200

# Rebuild interval for `server`, in seconds (0 disables it)
revalidate: 3600

# Prerender only the newest N posts; the rest render on first request
# prerender_limit: 10

# Content API
# PRISMIC_API_ENDPOINT and PRISMIC_ACCESS_TOKEN override these
cms:
  endpoint: https://your-repo.cdn.prismic.io/api/v2
  # access_token: ''
  document_type: post
  page_size: 100
  timeout_secs: 30
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("static/images"))?;
    fs::create_dir_all(target_dir.join("languages"))?;
    fs::write(&config_path, CONFIG_TEMPLATE)?;
    tracing::debug!("Created: {:?}", config_path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_init_site_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();

        assert!(dir.path().join("static/images").is_dir());
        let config = SiteConfig::load(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.per_page, 3);
        assert_eq!(config.language, "pt-BR");
        assert_eq!(config.cms.document_type, "post");
        assert_eq!(config.prerender_limit, None);
    }

    #[test]
    fn test_init_site_refuses_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();
        assert!(init_site(dir.path()).is_err());
    }
}
