//! Stylesheet generation ports.
//!
//! - [`CssGenerator`]: the pure `generate(settings) -> css` function
//! - [`PreviewSource`]: where the debouncer gets stylesheets from, either a
//!   local generator ([`GeneratorSource`]) or the server through the
//!   orchestrator ([`OrchestratedSource`])

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::SyncError;
use crate::orchestrator::{ExecuteOptions, RequestOrchestrator};
use crate::settings::Settings;
use crate::transport::routes::ops;

pub trait CssGenerator: Send + Sync {
    fn generate(&self, settings: &Settings) -> Result<String, SyncError>;
}

/// Renders every scalar setting as a `:root` custom property.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomPropertyGenerator;

impl CssGenerator for CustomPropertyGenerator {
    fn generate(&self, settings: &Settings) -> Result<String, SyncError> {
        let mut css = String::from(":root {\n");
        for (key, value) in settings.iter() {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            if rendered.contains([';', '{', '}']) {
                return Err(SyncError::Generation(format!("{key}: value cannot be rendered as CSS")));
            }
            let _ = writeln!(css, "  --las-{}: {};", key.replace('_', "-"), rendered);
        }
        css.push_str("}\n");
        Ok(css)
    }
}

#[async_trait]
pub trait PreviewSource: Send + Sync {
    async fn generate(&self, settings: &Settings) -> Result<String, SyncError>;
}

/// Generates locally, without any network round-trip.
pub struct GeneratorSource {
    generator: Arc<dyn CssGenerator>,
}

impl GeneratorSource {
    pub fn new(generator: Arc<dyn CssGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl PreviewSource for GeneratorSource {
    async fn generate(&self, settings: &Settings) -> Result<String, SyncError> {
        self.generator.generate(settings)
    }
}

/// Asks the server through the orchestrator (`generatePreview`).
pub struct OrchestratedSource {
    orchestrator: Arc<RequestOrchestrator>,
    options: ExecuteOptions,
}

impl OrchestratedSource {
    pub fn new(orchestrator: Arc<RequestOrchestrator>) -> Self {
        Self { orchestrator, options: ExecuteOptions::preview() }
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl PreviewSource for OrchestratedSource {
    async fn generate(&self, settings: &Settings) -> Result<String, SyncError> {
        let body = self
            .orchestrator
            .execute(ops::GENERATE_PREVIEW, json!({ "settings": settings }), &self.options)
            .await?;
        match body {
            Value::String(css) => Ok(css),
            other => other
                .get("css")
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| SyncError::Generation("preview response carries no css".into())),
        }
    }
}
