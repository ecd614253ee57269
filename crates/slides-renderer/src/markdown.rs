//! Sanitizing markdown renderer for a single slide.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

/// URL schemes that can execute script when followed or loaded.
const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Image sources may use `data:` URLs, they cannot run script from `<img>`.
const UNSAFE_IMAGE_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// Output of rendering one slide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedSlide {
    /// Sanitized HTML.
    pub html: String,
    /// Plain text of the first heading, if the slide has one.
    pub title: Option<String>,
}

/// Markdown renderer producing sanitized HTML.
#[derive(Clone, Debug)]
pub struct SlideRenderer {
    gfm: bool,
}

impl Default for SlideRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideRenderer {
    /// Create a renderer with GitHub Flavored Markdown extensions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self { gfm: true }
    }

    /// Enable or disable tables, strikethrough, task lists and footnotes.
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_FOOTNOTES
        } else {
            Options::empty()
        }
    }

    /// Render one slide segment.
    pub fn render(&self, markdown: &str) -> RenderedSlide {
        let mut title = TitleCapture::default();

        let events: Vec<Event<'_>> = Parser::new_ext(markdown, self.parser_options())
            .inspect(|event| title.observe(event))
            .map(sanitize)
            .collect();

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());

        RenderedSlide {
            html: out,
            title: title.finish(),
        }
    }
}

/// Neutralize events that would inject markup or script.
fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url, UNSAFE_SCHEMES),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url, UNSAFE_IMAGE_SCHEMES),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_url<'a>(url: CowStr<'a>, blocked: &[&str]) -> CowStr<'a> {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if blocked.iter().any(|scheme| normalized.starts_with(scheme)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Collects the text of the first heading in a stream of events.
#[derive(Default)]
enum TitleCapture {
    #[default]
    Waiting,
    Capturing(String),
    Done(String),
}

impl TitleCapture {
    fn observe(&mut self, event: &Event<'_>) {
        *self = match (std::mem::take(self), event) {
            (Self::Waiting, Event::Start(Tag::Heading { .. })) => Self::Capturing(String::new()),
            (Self::Capturing(mut text), Event::Text(t) | Event::Code(t)) => {
                text.push_str(t);
                Self::Capturing(text)
            }
            (Self::Capturing(text), Event::End(TagEnd::Heading(_))) => {
                Self::Done(text.trim().to_owned())
            }
            (state, _) => state,
        };
    }

    fn finish(self) -> Option<String> {
        match self {
            Self::Done(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(markdown: &str) -> RenderedSlide {
        SlideRenderer::new().render(markdown)
    }

    #[test]
    fn test_heading_and_paragraph() {
        let slide = render("# Hello\n\n**Bold** text");
        assert_eq!(
            slide.html,
            "<h1>Hello</h1>\n<p><strong>Bold</strong> text</p>\n"
        );
        assert_eq!(slide.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_title_from_first_heading_any_level() {
        let slide = render("intro\n\n## The `core` loop\n\n# Later");
        assert_eq!(slide.title.as_deref(), Some("The core loop"));
    }

    #[test]
    fn test_no_heading_no_title() {
        assert_eq!(render("just text").title, None);
        assert_eq!(render("").title, None);
    }

    #[test]
    fn test_raw_html_block_is_escaped() {
        let slide = render("<script>alert(1)</script>");
        assert!(!slide.html.contains("<script>"));
        assert!(slide.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_inline_html_is_escaped() {
        let slide = render("click <img src=x onerror=alert(1)> here");
        assert!(!slide.html.contains("<img"));
        assert!(slide.html.contains("&lt;img"));
    }

    #[test]
    fn test_javascript_link_is_neutralized() {
        let slide = render("[x](javascript:alert(1))");
        assert_eq!(slide.html, "<p><a href=\"#\">x</a></p>\n");
    }

    #[test]
    fn test_obfuscated_scheme_is_neutralized() {
        let slide = render("[x](JaVaScRiPt:alert(1))");
        assert!(slide.html.contains("href=\"#\""));
    }

    #[test]
    fn test_data_link_is_neutralized_but_data_image_kept() {
        let link = render("[x](data:text/html;base64,PHNjcmlwdD4=)");
        assert!(link.html.contains("href=\"#\""));

        let image = render("![dot](data:image/png;base64,iVBORw0KGgo=)");
        assert!(image.html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
    }

    #[test]
    fn test_regular_links_unchanged() {
        let slide = render("[docs](https://example.com/a?b=c)");
        assert!(slide.html.contains("href=\"https://example.com/a?b=c\""));
    }

    #[test]
    fn test_gfm_table() {
        let slide = render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(slide.html.contains("<table>"));

        let plain = SlideRenderer::new().with_gfm(false).render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(!plain.html.contains("<table>"));
    }

    #[test]
    fn test_gfm_disabled_leaves_strikethrough_as_text() {
        let slide = render("~~gone~~");
        assert_eq!(slide.html, "<p><del>gone</del></p>\n");

        let plain = SlideRenderer::new().with_gfm(false).render("~~gone~~");
        assert_eq!(plain.html, "<p>~~gone~~</p>\n");
    }

    #[test]
    fn test_code_block_content_escaped() {
        let slide = render("```html\n<b>hi</b>\n```");
        assert!(slide.html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(slide.html.contains("language-html"));
    }
}
