//! Style element the preview writes into.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Id of the single style element owned by the live preview.
pub const PREVIEW_ELEMENT_ID: &str = "las-live-preview";

/// Destination for generated stylesheets. Every write replaces the whole
/// content; nothing is ever appended.
pub trait StyleSink: Send + Sync {
    fn replace(&self, css: &str);
    fn clear(&self);
}

/// In-memory stand-in for the page's preview `<style>` element.
#[derive(Debug)]
pub struct StyleElement {
    id: String,
    content: RwLock<String>,
    writes: AtomicU64,
}

impl Default for StyleElement {
    fn default() -> Self {
        Self::new(PREVIEW_ELEMENT_ID)
    }
}

impl StyleElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), content: RwLock::new(String::new()), writes: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn content(&self) -> String {
        self.content.read().clone()
    }

    /// Number of replace/clear operations applied.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl StyleSink for StyleElement {
    fn replace(&self, css: &str) {
        *self.content.write() = css.to_string();
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.content.write().clear();
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}
