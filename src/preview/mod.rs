//! Live preview: debounced stylesheet generation into a single style element.

pub mod debouncer;
pub mod fallback;
pub mod generator;
pub mod sink;

pub use debouncer::{PreviewDebouncer, PreviewOutcome};
pub use fallback::{fallback_stylesheet, FALLBACK_HEADER};
pub use generator::{CssGenerator, CustomPropertyGenerator, GeneratorSource, OrchestratedSource, PreviewSource};
pub use sink::{StyleElement, StyleSink, PREVIEW_ELEMENT_ID};
