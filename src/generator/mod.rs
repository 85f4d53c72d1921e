//! Generator module - writes the static site using the built-in Tera templates

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tera::Context;
use walkdir::WalkDir;

use crate::content::{Navigation, Paginator, Post, PostSummary};
use crate::helpers::{self, date_xml, format_date, POST_DIR};
use crate::i18n::I18n;
use crate::templates::{
    NavLink, NavigationData, PaginationData, PostCard, PostPageData, SiteData, TemplateRenderer,
    STYLESHEET,
};
use crate::SpaceTraveling;

/// Number of entries in the Atom feed
const FEED_SIZE: usize = 20;

/// Suffix source for temporary files, unique within the process
static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// What a generation run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Posts known to the listing
    pub posts: usize,
    /// Post pages written ahead of time
    pub prerendered: usize,
    /// Listing pages written
    pub index_pages: usize,
}

/// Static site generator using Tera templates
pub struct Generator {
    site: SpaceTraveling,
    renderer: TemplateRenderer,
    i18n: I18n,
    tz: chrono_tz::Tz,
    paginator: Paginator,
    pagination_dir: String,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &SpaceTraveling) -> Result<Self> {
        let tz = site.config.tz();
        let renderer = TemplateRenderer::new(&site.config.language, tz)?;

        let mut i18n = I18n::new(&site.config.language);
        i18n.load_languages(&site.languages_dir)?;

        let pagination_dir = output_subdir(&site.config.pagination_dir)?;
        let paginator = Paginator::new(site.config.per_page, &site.config.root, &pagination_dir);

        Ok(Self {
            site: site.clone(),
            renderer,
            i18n,
            tz,
            paginator,
            pagination_dir,
        })
    }

    /// Generate the entire site
    ///
    /// Everything is rendered before the output directory is touched, files
    /// are replaced atomically, and pages of posts that are gone are pruned
    /// last. A failed run leaves the previous output in place.
    pub fn generate(&self, posts: &[Post]) -> Result<GenerateReport> {
        // Sort posts by first publication (newest first, undated last)
        let mut sorted_posts: Vec<Post> = posts.to_vec();
        sorted_posts.sort_by(|a, b| b.first_publication_date.cmp(&a.first_publication_date));

        let mut outputs = vec![("css/style.css".to_string(), STYLESHEET.to_string())];
        let index_pages = self.render_index_pages(&sorted_posts, &mut outputs)?;
        let prerendered = self.render_post_pages(&sorted_posts, &mut outputs);
        outputs.push(("404.html".to_string(), self.render_not_found()?));
        outputs.push(("atom.xml".to_string(), self.render_atom_feed(&sorted_posts)));

        fs::create_dir_all(&self.site.public_dir)?;
        self.copy_static_assets()?;
        for (relative, contents) in &outputs {
            self.write_output(relative, contents)?;
        }
        self.prune_stale_pages(&prerendered, index_pages)?;

        let report = GenerateReport {
            posts: sorted_posts.len(),
            prerendered: prerendered.len(),
            index_pages,
        };
        tracing::info!(
            "Generated {} index pages and {} of {} post pages",
            report.index_pages,
            report.prerendered,
            report.posts
        );
        Ok(report)
    }

    /// Build site data for templates
    fn build_site_data(&self) -> SiteData {
        let config = &self.site.config;
        SiteData {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: helpers::url_for(config, ""),
        }
    }

    /// Create a base context with common variables
    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.build_site_data());
        context.insert("t", &self.i18n.get_all_translations());
        context
    }

    fn display_date(&self, date: Option<DateTime<Utc>>) -> String {
        let config = &self.site.config;
        date.map(|d| format_date(&d, &config.date_format, &config.language, self.tz))
            .unwrap_or_default()
    }

    fn post_card(&self, summary: &PostSummary) -> PostCard {
        PostCard {
            uid: summary.uid.clone(),
            url: helpers::post_url(&self.site.config, &summary.uid),
            title: summary.title.clone(),
            subtitle: summary.subtitle.clone(),
            author: summary.author.clone(),
            date: self.display_date(summary.first_publication_date),
        }
    }

    /// Render index pages with pagination and their load-more payloads
    fn render_index_pages(
        &self,
        posts: &[Post],
        outputs: &mut Vec<(String, String)>,
    ) -> Result<usize> {
        let summaries: Vec<PostSummary> = posts.iter().map(Post::summary).collect();
        let pages = self.paginator.paginate(&summaries);

        for page in &pages {
            let page_posts: Vec<PostCard> = page.items.iter().map(|s| self.post_card(s)).collect();

            let pagination = PaginationData {
                number: page.number,
                total: page.total,
                prev_link: page.prev_link.clone(),
                next_link: page.next_link.clone(),
                next_json: page.next_json.clone(),
            };

            let mut context = self.create_base_context();
            context.insert("page_posts", &page_posts);
            context.insert("pagination", &pagination);

            let html = self.renderer.render("index.html", &context)?;
            outputs.push((self.paginator.html_path(page.number), html));

            if page.number > 1 {
                let json = serde_json::to_string(&page.to_pagination())?;
                outputs.push((self.paginator.json_path(page.number), json));
            }
        }

        Ok(pages.len())
    }

    /// Render a post page
    pub fn render_post(&self, post: &Post, navigation: &Navigation) -> Result<String> {
        let config = &self.site.config;

        let data = PostPageData {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: self.display_date(post.first_publication_date),
            permalink: helpers::full_url_for(config, &format!("{}/{}/", POST_DIR, post.uid)),
            banner_url: post.banner_url.clone(),
            reading_time: post.reading_time(config.words_per_minute),
            edited_at: post
                .last_publication_date
                .filter(|_| post.was_edited())
                .map(|d| d.to_rfc3339()),
            content: post.content_html(),
        };

        let link = |nav: &crate::content::NavPost| NavLink {
            title: nav.title.clone(),
            url: helpers::post_url(config, &nav.uid),
        };
        let navigation = NavigationData {
            previous: navigation.previous.as_ref().map(link),
            next: navigation.next.as_ref().map(link),
        };

        let mut context = self.create_base_context();
        context.insert("post", &data);
        context.insert("navigation", &navigation);

        self.renderer.render("post.html", &context)
    }

    /// Render and write a post page, returning its path
    pub fn write_post(&self, post: &Post, navigation: &Navigation) -> Result<PathBuf> {
        if !helpers::is_valid_uid(&post.uid) {
            anyhow::bail!("Refusing to write post with unsafe uid {:?}", post.uid);
        }
        let html = self.render_post(post, navigation)?;
        self.write_output(&helpers::post_output_path(&post.uid), &html)
    }

    /// Render individual post pages; returns the uids that were rendered
    fn render_post_pages(
        &self,
        posts: &[Post],
        outputs: &mut Vec<(String, String)>,
    ) -> HashSet<String> {
        let limit = self.site.config.prerender_limit.unwrap_or(posts.len());
        let mut rendered = HashSet::new();

        for post in posts.iter().take(limit) {
            if !helpers::is_valid_uid(&post.uid) {
                tracing::warn!("Skipping post with unsafe uid {:?}", post.uid);
                continue;
            }
            let navigation = Navigation::resolve(posts, &post.uid);
            match self.render_post(post, &navigation) {
                Ok(html) => {
                    outputs.push((helpers::post_output_path(&post.uid), html));
                    rendered.insert(post.uid.clone());
                }
                Err(e) => tracing::warn!("Skipping post {}: {}", post.uid, e),
            }
        }

        if rendered.len() < posts.len() {
            tracing::info!(
                "{} posts left for on-demand rendering",
                posts.len() - rendered.len()
            );
        }
        rendered
    }

    /// Render the not-found page
    pub fn render_not_found(&self) -> Result<String> {
        self.renderer.render("404.html", &self.create_base_context())
    }

    /// Render the Atom feed
    fn render_atom_feed(&self, posts: &[Post]) -> String {
        let config = &self.site.config;
        let home = helpers::full_url_for(config, "");

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            helpers::full_url_for(config, "atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", home));
        let updated = posts
            .iter()
            .filter_map(|p| p.last_publication_date.or(p.first_publication_date))
            .max()
            .unwrap_or_else(Utc::now);
        feed.push_str(&format!("  <updated>{}</updated>\n", date_xml(&updated)));
        feed.push_str(&format!("  <id>{}</id>\n", home));
        if !config.author.is_empty() {
            feed.push_str(&format!(
                "  <author><name>{}</name></author>\n",
                escape_xml(&config.author)
            ));
        }

        for post in posts.iter().take(FEED_SIZE) {
            let link = helpers::full_url_for(config, &format!("{}/{}/", POST_DIR, post.uid));
            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", link));
            feed.push_str(&format!("    <id>{}</id>\n", link));
            if let Some(published) = post.first_publication_date {
                feed.push_str(&format!(
                    "    <published>{}</published>\n",
                    date_xml(&published)
                ));
            }
            if let Some(updated) = post.last_publication_date.or(post.first_publication_date) {
                feed.push_str(&format!("    <updated>{}</updated>\n", date_xml(&updated)));
            }
            if !post.author.is_empty() {
                feed.push_str(&format!(
                    "    <author><name>{}</name></author>\n",
                    escape_xml(&post.author)
                ));
            }
            if !post.subtitle.is_empty() {
                feed.push_str(&format!(
                    "    <summary>{}</summary>\n",
                    escape_xml(&post.subtitle)
                ));
            }
            let base_url = config.url.trim_end_matches('/');
            let content = convert_relative_urls_to_absolute(&post.content_html(), base_url);
            let clean_content =
                strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>");
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                clean_content
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");
        feed
    }

    /// Copy static assets (images, favicons, etc.) to public directory
    fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.site.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            // Skip hidden files and directories
            let hidden = relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            });
            if hidden {
                continue;
            }

            let dest = self.site.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
            tracing::debug!("Copied: {:?} -> {:?}", path, dest);
        }

        Ok(())
    }

    /// Remove pages of posts that were not rendered this run and listing
    /// pages past the last one
    ///
    /// Posts left to on-demand rendering lose their page too, so the next
    /// request renders them fresh.
    fn prune_stale_pages(&self, rendered: &HashSet<String>, page_count: usize) -> Result<()> {
        let post_dir = self.site.public_dir.join(POST_DIR);
        if post_dir.is_dir() {
            for entry in fs::read_dir(&post_dir)? {
                let path = entry?.path();
                let uid = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if path.is_dir() && !rendered.contains(uid) {
                    fs::remove_dir_all(&path)
                        .with_context(|| format!("Failed to remove {:?}", path))?;
                    tracing::debug!("Removed stale post page: {:?}", path);
                }
            }
        }

        let page_dir = self.site.public_dir.join(&self.pagination_dir);
        if page_dir.is_dir() {
            for entry in fs::read_dir(&page_dir)? {
                let path = entry?.path();
                let name = if path.is_dir() {
                    path.file_name()
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem()
                } else {
                    None
                };
                let number = name
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.parse::<usize>().ok());

                match number {
                    Some(n) if n < 2 || n > page_count => {
                        if path.is_dir() {
                            fs::remove_dir_all(&path)?;
                        } else {
                            fs::remove_file(&path)?;
                        }
                        tracing::debug!("Removed stale listing page: {:?}", path);
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn write_output(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let output_path = self.site.public_dir.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }

        // Write beside the target and rename, so readers never see a partial page
        let file_name = output_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output");
        let tmp_path = output_path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, &output_path)
            .with_context(|| format!("Failed to write {:?}", output_path))?;

        tracing::debug!("Generated: {:?}", output_path);
        Ok(output_path)
    }
}

/// Validate a configured output subdirectory: a single plain name that does
/// not collide with the post pages
fn output_subdir(dir: &str) -> Result<String> {
    let trimmed = dir.trim_matches('/');
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name != POST_DIR => Ok(trimmed.to_string()),
        _ => bail!(
            "pagination_dir must be a single directory name other than {:?}, got {:?}",
            POST_DIR,
            dir
        ),
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Convert root-relative URLs in HTML content to absolute URLs
fn convert_relative_urls_to_absolute(content: &str, base_url: &str) -> String {
    content
        .replace("href=\"/", &format!("href=\"{}/", base_url))
        .replace("src=\"/", &format!("src=\"{}/", base_url))
}

/// Strip invalid XML control characters (except tab, newline, carriage return)
fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}
