//! Built-in templates using the Tera template engine
//!
//! Templates and the stylesheet are embedded in the binary, so a site
//! needs nothing but a `_config.yml` and a CMS to render.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::helpers::format_date;

/// Stylesheet written to `css/style.css`
pub const STYLESHEET: &str = include_str!("default/style.css");

/// Template renderer with the embedded default theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer; `date_format` dates are shown in `language` and `tz`
    pub fn new(language: &str, tz: chrono_tz::Tz) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("default/layout.html")),
            ("index.html", include_str!("default/index.html")),
            ("post.html", include_str!("default/post.html")),
            ("404.html", include_str!("default/404.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("default/partials/header.html"),
            ),
            (
                "partials/post_meta.html",
                include_str!("default/partials/post_meta.html"),
            ),
            (
                "partials/post_nav.html",
                include_str!("default/partials/post_nav.html"),
            ),
        ])?;

        let language = language.to_string();
        tera.register_filter(
            "date_format",
            move |value: &tera::Value, args: &HashMap<String, tera::Value>| {
                date_format_filter(value, args, &language, tz)
            },
        );

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: format an RFC 3339 timestamp with a date-fns pattern
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
    language: &str,
    tz: chrono_tz::Tz,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "dd MMM yyyy".to_string(),
    };

    match crate::cms::types::parse_date(&s) {
        Some(date) => Ok(tera::Value::String(format_date(&date, &format, language, tz))),
        // Leave unparseable input as-is
        None => Ok(tera::Value::String(s)),
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
}

/// A post in a listing
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub uid: String,
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Display date, already formatted
    pub date: String,
}

/// A full post page
#[derive(Debug, Clone, Serialize)]
pub struct PostPageData {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub permalink: String,
    pub banner_url: Option<String>,
    pub reading_time: usize,
    /// RFC 3339 timestamp of the last edit, when the post was edited
    pub edited_at: Option<String>,
    /// Rendered rich text
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NavigationData {
    pub previous: Option<NavLink>,
    pub next: Option<NavLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub number: usize,
    pub total: usize,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
    pub next_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteData {
        SiteData {
            title: "spacetraveling".to_string(),
            description: String::new(),
            author: String::new(),
            language: "pt-BR".to_string(),
            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),
        }
    }

    fn translations() -> HashMap<String, String> {
        crate::i18n::I18n::new("pt-BR").get_all_translations()
    }

    #[test]
    fn test_date_format_filter() {
        let args = HashMap::from([(
            "format".to_string(),
            tera::Value::String("dd/MM/yyyy".to_string()),
        )]);
        let value = tera::Value::String("2021-03-25T19:25:28+0000".to_string());
        let out = date_format_filter(&value, &args, "pt-BR", chrono_tz::UTC).unwrap();
        assert_eq!(out, tera::Value::String("25/03/2021".to_string()));

        let value = tera::Value::String("not a date".to_string());
        let out = date_format_filter(&value, &args, "pt-BR", chrono_tz::UTC).unwrap();
        assert_eq!(out, tera::Value::String("not a date".to_string()));
    }

    #[test]
    fn test_render_index_escapes_titles() {
        let renderer = TemplateRenderer::new("pt-BR", chrono_tz::UTC).unwrap();
        let mut context = Context::new();
        context.insert("site", &site());
        context.insert("t", &translations());
        context.insert(
            "page_posts",
            &vec![PostCard {
                uid: "a".to_string(),
                url: "/post/a/".to_string(),
                title: "<script>x</script>".to_string(),
                subtitle: "Sub".to_string(),
                author: "Ana".to_string(),
                date: "06 mai 2020".to_string(),
            }],
        );
        context.insert(
            "pagination",
            &PaginationData {
                number: 1,
                total: 2,
                prev_link: None,
                next_link: Some("/page/2/".to_string()),
                next_json: Some("/page/2.json".to_string()),
            },
        );

        let html = renderer.render("index.html", &context).unwrap();
        assert!(html.contains("&lt;script&gt;x&lt;&#x2F;script&gt;"));
        assert!(html.contains("06 mai 2020"));
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains(r#"data-next="&#x2F;page&#x2F;2.json""#));
    }

    #[test]
    fn test_render_post_without_neighbours() {
        let renderer = TemplateRenderer::new("pt-BR", chrono_tz::UTC).unwrap();
        let mut context = Context::new();
        context.insert("site", &site());
        context.insert("t", &translations());
        context.insert(
            "post",
            &PostPageData {
                uid: "a".to_string(),
                title: "Hello".to_string(),
                subtitle: String::new(),
                author: "Ana".to_string(),
                date: "06 mai 2020".to_string(),
                permalink: "http://localhost:3000/post/a/".to_string(),
                banner_url: None,
                reading_time: 4,
                edited_at: Some("2020-05-07T10:30:00+00:00".to_string()),
                content: "<p>Body</p>".to_string(),
            },
        );
        context.insert("navigation", &NavigationData::default());

        let html = renderer.render("post.html", &context).unwrap();
        assert!(html.contains("<p>Body</p>"));
        assert!(html.contains("4 min"));
        assert!(html.contains("* editado em 07 mai 2020, às 10:30"));
        assert!(!html.contains("post-nav"));
        assert!(!html.contains("banner"));
    }
}
