//! HTTP request handlers.

pub(crate) mod assets;
pub(crate) mod index;
pub(crate) mod slides;
