//! Rich-text rendering
//!
//! Turns the CMS block format into HTML or plain text. Span offsets count
//! UTF-16 code units, as produced by the editor.

use crate::cms::types::{BlockKind, RichTextBlock, Span, SpanKind};

/// Plain text of a block list, blocks joined by a single space
pub fn as_text(blocks: &[RichTextBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Render a block list to HTML
pub fn as_html(blocks: &[RichTextBlock]) -> String {
    let mut html = String::new();
    let mut open_list: Option<BlockKind> = None;

    for block in blocks {
        let is_list = matches!(block.kind, BlockKind::ListItem | BlockKind::OrderedListItem);

        if open_list.is_some() && open_list != Some(block.kind) {
            html.push_str(list_close(open_list));
            open_list = None;
        }
        if is_list && open_list.is_none() {
            html.push_str(if block.kind == BlockKind::ListItem {
                "<ul>"
            } else {
                "<ol>"
            });
            open_list = Some(block.kind);
        }

        match block.kind {
            BlockKind::Paragraph => wrap(&mut html, "p", block),
            BlockKind::Heading1 => wrap(&mut html, "h1", block),
            BlockKind::Heading2 => wrap(&mut html, "h2", block),
            BlockKind::Heading3 => wrap(&mut html, "h3", block),
            BlockKind::Heading4 => wrap(&mut html, "h4", block),
            BlockKind::Heading5 => wrap(&mut html, "h5", block),
            BlockKind::Heading6 => wrap(&mut html, "h6", block),
            BlockKind::Preformatted => {
                html.push_str("<pre>");
                html.push_str(&html_escape(&block.text));
                html.push_str("</pre>");
            }
            BlockKind::ListItem | BlockKind::OrderedListItem => wrap(&mut html, "li", block),
            BlockKind::Image => {
                if let Some(url) = block.url.as_deref().filter(|u| is_safe_url(u)) {
                    html.push_str(&format!(
                        r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                        html_escape(url),
                        html_escape(block.alt.as_deref().unwrap_or(""))
                    ));
                }
            }
            BlockKind::Embed => {
                if let Some(oembed) = &block.oembed {
                    let kind = oembed.oembed_type.as_deref().unwrap_or("embed");
                    let url = oembed.embed_url.as_deref().unwrap_or("");
                    html.push_str(&format!(
                        r#"<div data-oembed="{}" data-oembed-type="{}">{}</div>"#,
                        html_escape(url),
                        html_escape(kind),
                        oembed.html.as_deref().unwrap_or("")
                    ));
                }
            }
            BlockKind::Unknown => {
                tracing::debug!("Skipping unknown rich-text block");
            }
        }
    }

    html.push_str(list_close(open_list));
    html
}

fn list_close(kind: Option<BlockKind>) -> &'static str {
    match kind {
        Some(BlockKind::ListItem) => "</ul>",
        Some(BlockKind::OrderedListItem) => "</ol>",
        _ => "",
    }
}

fn wrap(html: &mut String, tag: &str, block: &RichTextBlock) {
    html.push('<');
    html.push_str(tag);
    html.push('>');
    html.push_str(&render_spans(&block.text, &block.spans));
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
}

/// Apply inline spans to a text, escaping it and keeping tags nested
pub fn render_spans(text: &str, spans: &[Span]) -> String {
    let total: usize = text.chars().map(char::len_utf16).sum();

    let mut spans: Vec<&Span> = spans
        .iter()
        .filter(|s| s.start < s.end && s.start < total)
        .filter(|s| s.kind != SpanKind::Unknown)
        .filter(|s| s.kind != SpanKind::Hyperlink || link_url(s).is_some())
        .collect();
    // Longer spans open first so they enclose shorter ones
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<&Span> = Vec::new();
    let mut next_span = 0;
    let mut pos = 0;

    let mut chars = text.chars().peekable();
    loop {
        close_ended(&mut out, &mut stack, pos);

        while next_span < spans.len() && spans[next_span].start <= pos {
            let span = spans[next_span];
            if span.start == pos {
                out.push_str(&open_tag(span));
                stack.push(span);
            }
            next_span += 1;
        }

        let Some(c) = chars.next() else {
            break;
        };
        match c {
            '\n' => out.push_str("<br />"),
            _ => push_escaped(&mut out, c),
        }
        pos += c.len_utf16();
    }

    while let Some(span) = stack.pop() {
        out.push_str(close_tag(span));
    }
    out
}

/// Close every span ending at `pos`, re-opening the ones interleaved above them
fn close_ended<'a>(out: &mut String, stack: &mut Vec<&'a Span>, pos: usize) {
    if !stack.iter().any(|s| s.end <= pos) {
        return;
    }
    let mut reopen = Vec::new();
    while let Some(span) = stack.pop() {
        out.push_str(close_tag(span));
        if span.end > pos {
            reopen.push(span);
        }
        if !stack.iter().any(|s| s.end <= pos) {
            break;
        }
    }
    for span in reopen.into_iter().rev() {
        out.push_str(&open_tag(span));
        stack.push(span);
    }
}

fn open_tag(span: &Span) -> String {
    match span.kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Em => "<em>".to_string(),
        SpanKind::Label => {
            let label = span
                .data
                .as_ref()
                .and_then(|d| d.label.as_deref())
                .unwrap_or("");
            format!(r#"<span class="{}">"#, html_escape(label))
        }
        SpanKind::Hyperlink => {
            let url = link_url(span).unwrap_or("#");
            let blank = span
                .data
                .as_ref()
                .and_then(|d| d.target.as_deref())
                .map(|t| t == "_blank")
                .unwrap_or(false);
            if blank {
                format!(
                    r#"<a href="{}" target="_blank" rel="noopener">"#,
                    html_escape(url)
                )
            } else {
                format!(r#"<a href="{}">"#, html_escape(url))
            }
        }
        SpanKind::Unknown => String::new(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Em => "</em>",
        SpanKind::Label => "</span>",
        SpanKind::Hyperlink => "</a>",
        SpanKind::Unknown => "",
    }
}

fn link_url(span: &Span) -> Option<&str> {
    span.data
        .as_ref()
        .and_then(|d| d.url.as_deref())
        .filter(|u| is_safe_url(u))
}

/// Only web, mail and site-relative links are emitted
pub fn is_safe_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("https://")
        || lower.starts_with("http://")
        || lower.starts_with("mailto:")
        || (lower.starts_with('/') && !lower.starts_with("//"))
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        push_escaped(&mut out, c);
    }
    out
}
