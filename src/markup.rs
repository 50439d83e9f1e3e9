//! Rendering of free-text fields (reviews, comments, messages) to HTML.
//!
//! Rendering is a pure function of the input, so re-rendering a stored raw
//! field always reproduces its stored HTML.

use std::str::FromStr;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkupRenderer {
    /// CommonMark with tables and strikethrough. Raw HTML is escaped and
    /// links may only point at http, https, mailto or relative targets.
    Markdown,
    /// Escaped text with line breaks preserved.
    Plain,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown markup renderer: {0} (expected \"markdown\" or \"plain\")")]
pub struct UnknownRenderer(String);

impl FromStr for MarkupRenderer {
    type Err = UnknownRenderer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "plain" | "text" => Ok(Self::Plain),
            other => Err(UnknownRenderer(other.to_string())),
        }
    }
}

impl MarkupRenderer {
    pub fn render(self, raw: &str) -> String {
        match self {
            Self::Markdown => render_markdown(raw),
            Self::Plain => render_plain(raw),
        }
    }

    pub fn render_text(self, raw: impl Into<String>) -> RenderedText {
        RenderedText::new(raw, |s| self.render(s))
    }
}

/// A free-text field together with the HTML derived from it. Only
/// constructible by rendering, so stored HTML never diverges from its source.
#[derive(Debug, Clone)]
pub struct RenderedText {
    raw: String,
    html: String,
}

impl RenderedText {
    pub(crate) fn new(raw: impl Into<String>, render: impl FnOnce(&str) -> String) -> Self {
        let raw = raw.into();
        let html = render(&raw);
        Self { raw, html }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

pub fn render_markdown(raw: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // Authors must not be able to inject markup or script URLs into reviewer pages.
    let parser = Parser::new_ext(raw, options).map(|event| match event {
        Event::Html(s) | Event::InlineHtml(s) => Event::Text(s),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(raw.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_plain(raw: &str) -> String {
    let escaped = tera::escape_html(raw.trim_end());
    let paragraphs: Vec<String> = escaped
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", p.trim().replace('\n', "<br>\n")))
        .collect();
    paragraphs.join("\n")
}

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

fn safe_destination(url: CowStr<'_>) -> CowStr<'_> {
    if has_safe_scheme(&url) {
        url
    } else {
        CowStr::Borrowed("#")
    }
}

/// Relative URLs have no scheme and are always fine. Browsers ignore
/// whitespace and control characters inside a scheme, so those are dropped
/// before looking at it.
fn has_safe_scheme(url: &str) -> bool {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    match cleaned.find([':', '/', '?', '#']) {
        Some(i) if cleaned[i..].starts_with(':') => SAFE_SCHEMES
            .iter()
            .any(|scheme| cleaned[..i].eq_ignore_ascii_case(scheme)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_renders_emphasis_and_lists() {
        let html = render_markdown("Some *great* ideas:\n\n- one\n- two\n");
        assert!(html.contains("<em>great</em>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn markdown_escapes_raw_html() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn markdown_drops_script_link_targets() {
        let html = render_markdown("[click me](javascript:alert(document.cookie))");
        assert_eq!(html, "<p><a href=\"#\">click me</a></p>\n");

        for raw in [
            "[x](JavaScript:alert(1))",
            "[x](<java script:alert(1)>)",
            "[x](javascript&#58;alert(1))",
            "[x](data:text/html;base64,PHNjcmlwdD4=)",
            "<javascript:alert(1)>",
            "![img](vbscript:msgbox)",
        ] {
            let html = render_markdown(raw);
            assert!(html.contains(r##"="#""##), "{raw:?} rendered {html:?}");
        }
    }

    #[test]
    fn markdown_keeps_ordinary_link_targets() {
        let html = render_markdown(
            "[site](https://example.com/a?b=c) [mail](mailto:pc@example.com) [doc](/document/4/a.pdf) [top](#intro)",
        );
        assert!(html.contains(r#"href="https://example.com/a?b=c""#));
        assert!(html.contains(r#"href="mailto:pc@example.com""#));
        assert!(html.contains(r#"href="/document/4/a.pdf""#));
        assert!(html.contains(r##"href="#intro""##));
    }

    #[test]
    fn rendered_text_keeps_raw_and_html_together() {
        let text = MarkupRenderer::Markdown.render_text("**bold** move");
        assert_eq!(text.raw(), "**bold** move");
        assert_eq!(text.html(), render_markdown("**bold** move"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = "# Title\n\nA | B\n--|--\n1 | 2\n\n~~gone~~";
        assert_eq!(render_markdown(raw), render_markdown(raw));
        assert_eq!(render_plain(raw), render_plain(raw));
    }

    #[test]
    fn plain_keeps_line_breaks_and_escapes() {
        let html = render_plain("a < b\nc\n\nnext");
        assert_eq!(html, "<p>a &lt; b<br>\nc</p>\n<p>next</p>");
    }

    #[test]
    fn renderer_names_parse() {
        assert_eq!("markdown".parse::<MarkupRenderer>().unwrap(), MarkupRenderer::Markdown);
        assert_eq!("Plain".parse::<MarkupRenderer>().unwrap(), MarkupRenderer::Plain);
        assert!("rst".parse::<MarkupRenderer>().is_err());
    }
}
