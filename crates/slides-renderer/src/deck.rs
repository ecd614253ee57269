//! Whole-deck rendering.

use crate::markdown::SlideRenderer;
use crate::split::split_slides;

/// A rendered slide deck.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    /// Deck title: the first heading of the first slide, or the fallback.
    pub title: String,
    /// Sanitized HTML for each slide, in source order.
    pub slides: Vec<String>,
}

impl Deck {
    /// Split `source` into slides and render each one independently.
    pub fn parse(source: &str, fallback_title: &str) -> Self {
        Self::parse_with(&SlideRenderer::new(), source, fallback_title)
    }

    /// Like [`parse`](Self::parse) with a caller-configured renderer.
    pub fn parse_with(renderer: &SlideRenderer, source: &str, fallback_title: &str) -> Self {
        let mut title = None;
        let slides = split_slides(source)
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                let rendered = renderer.render(segment);
                if index == 0 {
                    title = rendered.title;
                }
                rendered.html
            })
            .collect();

        Self {
            title: title.unwrap_or_else(|| fallback_title.to_owned()),
            slides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_each_segment_rendered_independently() {
        let deck = Deck::parse("# A\n---\n# B", "talk");
        assert_eq!(
            deck,
            Deck {
                title: "A".to_owned(),
                slides: vec!["<h1>A</h1>\n".to_owned(), "<h1>B</h1>\n".to_owned()],
            }
        );
    }

    #[test]
    fn test_title_falls_back_when_first_slide_has_no_heading() {
        let deck = Deck::parse("welcome\n---\n# Second", "keynote");
        assert_eq!(deck.title, "keynote");
        assert_eq!(deck.slides.len(), 2);
    }

    #[test]
    fn test_unclosed_emphasis_does_not_leak_across_slides() {
        let deck = Deck::parse("*open\n---\nclosed*", "t");
        assert_eq!(deck.slides[0], "<p>*open</p>\n");
        assert_eq!(deck.slides[1], "<p>closed*</p>\n");
    }
}
