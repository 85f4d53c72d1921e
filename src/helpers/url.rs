//! URL helper functions

use crate::config::SiteConfig;

/// Directory post pages live under
pub const POST_DIR: &str = "post";

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/post/hello/") // -> "https://example.com/blog/post/hello/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Site-relative URL of a post page
pub fn post_url(config: &SiteConfig, uid: &str) -> String {
    url_for(config, &format!("{}/{}/", POST_DIR, uid))
}

/// Output path of a post page, relative to the public dir
pub fn post_output_path(uid: &str) -> String {
    format!("{}/{}/index.html", POST_DIR, uid)
}

/// Whether a uid is safe to use as a path segment
pub fn is_valid_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= 200
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the uid from a request path like `/blog/post/<uid>/`
pub fn uid_from_path(config: &SiteConfig, path: &str) -> Option<String> {
    let prefix = url_for(config, &format!("{}/", POST_DIR));
    let rest = path.strip_prefix(&prefix)?;
    let uid = rest.trim_end_matches("index.html").trim_end_matches('/');
    is_valid_uid(uid).then(|| uid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.url = "https://example.com".to_string();
        config.root = "/blog/".to_string();
        config
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/blog/css/style.css");
        assert_eq!(url_for(&config, ""), "/blog/");
        assert_eq!(url_for(&SiteConfig::default(), "/"), "/");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(
            full_url_for(&config, "/post/hello/"),
            "https://example.com/blog/post/hello/"
        );
    }

    #[test]
    fn test_post_url() {
        assert_eq!(post_url(&test_config(), "hello"), "/blog/post/hello/");
        assert_eq!(post_output_path("hello"), "post/hello/index.html");
    }

    #[test]
    fn test_uid_from_path() {
        let config = test_config();
        assert_eq!(
            uid_from_path(&config, "/blog/post/como-usar-hooks/"),
            Some("como-usar-hooks".to_string())
        );
        assert_eq!(
            uid_from_path(&config, "/blog/post/abc/index.html"),
            Some("abc".to_string())
        );
        assert_eq!(uid_from_path(&config, "/blog/post/abc"), Some("abc".to_string()));
        assert_eq!(uid_from_path(&config, "/blog/post/../etc/"), None);
        assert_eq!(uid_from_path(&config, "/blog/page/2/"), None);
        assert_eq!(uid_from_path(&config, "/blog/post/a/b/"), None);
    }
}
