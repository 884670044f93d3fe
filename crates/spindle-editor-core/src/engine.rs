//! External collaborator traits.
//!
//! The Markdown engine, satellite preview renderers, and the change sink are
//! all outside this crate. Each trait has a `()` implementation so callers
//! can opt out of a collaborator, and reference implementations so borrowed
//! collaborators work without cloning.

/// Opaque failure reported by the external Markdown engine.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The Markdown⇄markup engine consumed by the core.
///
/// `spin_incremental` is the hot-path contact point: it receives a
/// structurally plausible markup fragment (possibly containing the cursor
/// sentinel) and returns canonical markup with the sentinel preserved in
/// place. The two full-document conversions serve mode switches and
/// serialization, not the edit path.
pub trait MarkupEngine {
    fn spin_incremental(&self, markup: &str) -> Result<String, EngineError>;

    fn markup_to_markdown(&self, markup: &str) -> Result<String, EngineError>;

    fn markdown_to_markup(&self, markdown: &str) -> Result<String, EngineError>;
}

/// Unit type implementation - echoes its input. Useful when the input is
/// already canonical, and in tests.
impl MarkupEngine for () {
    fn spin_incremental(&self, markup: &str) -> Result<String, EngineError> {
        Ok(markup.to_owned())
    }

    fn markup_to_markdown(&self, markup: &str) -> Result<String, EngineError> {
        Ok(markup.to_owned())
    }

    fn markdown_to_markup(&self, markdown: &str) -> Result<String, EngineError> {
        Ok(markdown.to_owned())
    }
}

impl<T: MarkupEngine + ?Sized> MarkupEngine for &T {
    fn spin_incremental(&self, markup: &str) -> Result<String, EngineError> {
        (**self).spin_incremental(markup)
    }

    fn markup_to_markdown(&self, markup: &str) -> Result<String, EngineError> {
        (**self).markup_to_markdown(markup)
    }

    fn markdown_to_markup(&self, markdown: &str) -> Result<String, EngineError> {
        (**self).markdown_to_markup(markdown)
    }
}

/// Fire-and-forget renderer for freshly materialized preview regions
/// (fenced-code highlighting, math, diagrams).
pub trait SatelliteRenderer {
    /// Render `source` (the region's editable text) for display.
    ///
    /// Returns `None` to leave the preview empty.
    fn render_preview(&self, language: Option<&str>, source: &str) -> Option<String>;
}

/// Unit type implementation - no preview content.
impl SatelliteRenderer for () {
    fn render_preview(&self, _language: Option<&str>, _source: &str) -> Option<String> {
        None
    }
}

impl<T: SatelliteRenderer + ?Sized> SatelliteRenderer for &T {
    fn render_preview(&self, language: Option<&str>, source: &str) -> Option<String> {
        (**self).render_preview(language, source)
    }
}

/// Receiver for the debounced side-effect batch: the on-change callback and
/// the optional local cache. Pass-through calls, never consulted for results.
pub trait ChangeSink {
    fn on_change(&mut self, markdown: &str);

    fn persist(&mut self, cache_id: &str, markdown: &str);
}

/// Unit type implementation - changes go nowhere.
impl ChangeSink for () {
    fn on_change(&mut self, _markdown: &str) {}

    fn persist(&mut self, _cache_id: &str, _markdown: &str) {}
}

impl<T: ChangeSink + ?Sized> ChangeSink for &mut T {
    fn on_change(&mut self, markdown: &str) {
        (**self).on_change(markdown);
    }

    fn persist(&mut self, cache_id: &str, markdown: &str) {
        (**self).persist(cache_id, markdown);
    }
}
