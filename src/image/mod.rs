//! Image selection for article cards.
//!
//! [`ImageResolver`] always produces something renderable. Resolution order:
//!
//! 1. enhanced URL cached earlier in the session
//! 2. enhancement lookup through an [`ImageEnhancer`](crate::api::ImageEnhancer)
//! 3. raw `urlToImage` / `image` fields
//! 4. a placeholder seeded by the article identity
//!
//! When the renderer reports a failed load, [`ImageResolver::report_failure`]
//! walks a bounded fallback chain: one retry through the CORS relay for
//! hosts known to block cross-origin embedding, then the placeholder, then
//! nothing.

mod cors;
mod placeholder;
mod resolver;

pub use cors::CorsPolicy;
pub use placeholder::placeholder_url;
pub use resolver::ImageResolver;

use crate::filter::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Cached,
    Enhanced,
    Raw,
    Proxied,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// URL to attempt first.
    pub url: String,
    /// Placeholder to show if `url` fails and no retry is offered.
    pub fallback: String,
    pub source: ImageSource,
    /// Topic caption for the placeholder.
    pub label: Category,
}

/// Next action after a failed image load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackStep {
    /// Load this URL instead (the CORS relay).
    Retry(String),
    /// Show the placeholder; no further retries.
    Placeholder(String),
    /// Everything failed; render without an image.
    GiveUp,
}
