//! Page templates.
//!
//! Every `*.tpl` file in the deck root is loaded once at startup. The
//! resulting environment is never mutated afterwards, so request handlers
//! share it behind an `Arc` without locking.

use std::path::Path;

use minijinja::{AutoEscape, Environment, Value, context};
use serde::Serialize;
use slides_renderer::Deck;

use crate::error::ServerError;

/// Template rendered for `GET /`.
pub(crate) const INDEX_TEMPLATE: &str = "index.tpl";

/// Template rendered for `GET /{path}.slide`.
pub(crate) const SLIDES_TEMPLATE: &str = "slides.tpl";

/// Link to one deck on the index page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct DeckLink {
    /// File name, e.g. `intro.slide`.
    pub(crate) name: String,
    /// URL path, e.g. `/intro.slide`.
    pub(crate) path: String,
}

/// Load every `*.tpl` file in `root`.
pub(crate) fn load_templates(root: &Path) -> Result<Environment<'static>, ServerError> {
    let mut env = Environment::new();
    // `.tpl` is not a known HTML extension, so escaping is opted into explicitly
    env.set_auto_escape_callback(|_| AutoEscape::Html);

    let pattern = root.canonicalize()?.join("*.tpl");
    let pattern = glob::Pattern::escape(&pattern.to_string_lossy());
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(glob::GlobError::into_error)?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let name = name.to_owned();
        let source = std::fs::read_to_string(&path)?;
        env.add_template_owned(name.clone(), source)
            .map_err(|source| ServerError::TemplateLoad { path, source })?;
        tracing::debug!(template = %name, "Loaded template");
    }

    for required in [INDEX_TEMPLATE, SLIDES_TEMPLATE] {
        if env.get_template(required).is_err() {
            return Err(ServerError::MissingTemplate(required));
        }
    }

    Ok(env)
}

/// Render the index page listing `decks`.
pub(crate) fn render_index(
    env: &Environment<'_>,
    decks: &[DeckLink],
    live_reload: bool,
) -> Result<String, ServerError> {
    let template = env.get_template(INDEX_TEMPLATE)?;
    Ok(template.render(context! { slides => decks, live_reload })?)
}

/// Render a deck page.
///
/// Slide bodies are already sanitized HTML and are marked safe so
/// auto-escaping leaves them intact; the title is escaped as usual.
pub(crate) fn render_deck(
    env: &Environment<'_>,
    deck: Deck,
    live_reload: bool,
) -> Result<String, ServerError> {
    let slides: Vec<Value> = deck
        .slides
        .into_iter()
        .map(Value::from_safe_string)
        .collect();
    let template = env.get_template(SLIDES_TEMPLATE)?;
    Ok(template.render(context! { title => deck.title, slides, live_reload })?)
}
