//! Slide splitting and sanitizing markdown rendering.
//!
//! A slide source is a markdown document cut into slides by lines that
//! consist of the literal delimiter `---`. Each segment is rendered on its
//! own with [`SlideRenderer`], and [`Deck`] ties the two together for the
//! HTTP layer.
//!
//! # Example
//!
//! ```
//! use slides_renderer::Deck;
//!
//! let deck = Deck::parse("# Intro\n---\n# Outro", "talk");
//! assert_eq!(deck.title, "Intro");
//! assert_eq!(deck.slides.len(), 2);
//! ```
//!
//! # Sanitization
//!
//! Rendered HTML is embedded into pages as trusted markup, so the renderer
//! never passes raw HTML through: HTML blocks and inline HTML are emitted
//! as escaped text, and script-capable URL schemes in links and images are
//! replaced by `#`.

mod deck;
mod markdown;
mod split;

pub use deck::Deck;
pub use markdown::{RenderedSlide, SlideRenderer};
pub use split::{SLIDE_DELIMITER, split_slides};
