// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live-preview debouncer.
//!
//! Every [`PreviewDebouncer::submit`] bumps a generation counter, merges the
//! delta into the accumulated settings and restarts the quiet-period timer.
//! When the timer fires without another submit, exactly one preview request
//! carries the accumulated settings.
//!
//! ```text
//! submit(a) @0ms   ──→ gen 1, timer → 500ms
//! submit(b) @100ms ──→ gen 2, timer restarted → 600ms  (gen 1 task aborted)
//! submit(c) @200ms ──→ gen 3, timer restarted → 700ms  (gen 2 task aborted)
//!                                          @700ms ──→ one request {a, b, c}
//! ```
//!
//! The fallback stylesheet only sees the current burst: deltas submitted
//! since the last stylesheet write.
//!
//! Only the current generation may write the stylesheet. A newer submit
//! aborts the older task (dropping its network future); a result that still
//! arrives for an older generation is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::fallback::fallback_stylesheet;
use super::generator::PreviewSource;
use super::sink::StyleSink;
use crate::error::{ErrorKind, SyncError};
use crate::events::{Event, EventBus};
use crate::settings::Settings;

#[derive(Default)]
struct State {
    accumulated: Settings,
    /// Deltas since the last applied stylesheet
    burst: Settings,
    task: Option<JoinHandle<()>>,
    /// Generation whose request is awaiting a response
    in_flight: Option<u64>,
}

struct Inner {
    source: Arc<dyn PreviewSource>,
    sink: Arc<dyn StyleSink>,
    events: EventBus,
    debounce: Duration,
    generation: AtomicU64,
    state: Mutex<State>,
}

/// What happened to one preview result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    Updated,
    /// Generation failed; color-only fallback written
    Fallback,
    /// Rate limited; silently dropped
    Dropped,
    Failed,
    /// Superseded by a newer generation
    Stale,
}

impl PreviewOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Fallback => "fallback",
            Self::Dropped => "rate_limited",
            Self::Failed => "error",
            Self::Stale => "stale",
        }
    }
}

pub struct PreviewDebouncer {
    inner: Arc<Inner>,
}

impl PreviewDebouncer {
    pub fn new(source: Arc<dyn PreviewSource>, sink: Arc<dyn StyleSink>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                sink,
                events: EventBus::default(),
                debounce,
                generation: AtomicU64::new(0),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Publish preview notifications on `events`. Call before the first submit.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.events = events;
        }
        self
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Queue a settings change. Must be called from within a tokio runtime.
    pub fn submit(&self, delta: &Settings) -> u64 {
        let mut state = self.inner.state.lock();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.accumulated.merge(delta);
        state.burst.merge(delta);

        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.in_flight = None;

        let inner = Arc::clone(&self.inner);
        state.task = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.dispatch(generation).await;
        }));
        debug!(generation, "Preview change queued");
        generation
    }

    /// Abort the pending timer and any in-flight request.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.in_flight = None;
    }

    /// Cancel, empty the style element and forget accumulated changes.
    pub fn clear(&self) {
        self.cancel();
        {
            let mut state = self.inner.state.lock();
            state.accumulated = Settings::new();
            state.burst = Settings::new();
            self.inner.sink.clear();
        }
        crate::metrics::record_preview("cleared");
        self.inner.events.emit(Event::PreviewCleared);
    }

    /// Whether a preview request is awaiting a response.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Settings the next request would carry.
    #[must_use]
    pub fn accumulated(&self) -> Settings {
        self.inner.state.lock().accumulated.clone()
    }
}

impl Drop for PreviewDebouncer {
    fn drop(&mut self) {
        if let Some(task) = self.inner.state.lock().task.take() {
            task.abort();
        }
    }
}

impl Inner {
    async fn dispatch(&self, generation: u64) {
        let (settings, burst) = {
            let mut state = self.state.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            state.in_flight = Some(generation);
            (state.accumulated.clone(), state.burst.clone())
        };

        let started = Instant::now();
        let result = self.source.generate(&settings).await;
        let elapsed = started.elapsed();
        self.apply_result(generation, result, &burst, elapsed);
    }

    /// Write a result if `generation` is still current. `burst` feeds the
    /// fallback stylesheet.
    fn apply_result(
        &self,
        generation: u64,
        result: Result<String, SyncError>,
        burst: &Settings,
        elapsed: Duration,
    ) -> PreviewOutcome {
        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Stale preview result discarded");
            crate::metrics::record_preview(PreviewOutcome::Stale.as_str());
            return PreviewOutcome::Stale;
        }
        state.in_flight = None;
        state.task = None;

        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let outcome = match result {
            Ok(css) => {
                self.write(generation, &css, elapsed_ms, false);
                PreviewOutcome::Updated
            }
            Err(err) if err.root_kind() == ErrorKind::RateLimited => {
                debug!(generation, "Preview rate limited, dropped");
                PreviewOutcome::Dropped
            }
            Err(err) if err.root_kind() == ErrorKind::Generation => {
                warn!(generation, error = %err, "Preview generation failed, using fallback stylesheet");
                let css = fallback_stylesheet(burst);
                self.write(generation, &css, elapsed_ms, true);
                PreviewOutcome::Fallback
            }
            Err(err) => {
                warn!(generation, error = %err, "Preview request failed");
                self.events.emit(Event::PreviewError {
                    generation,
                    kind: err.root_kind(),
                    message: err.to_string(),
                });
                PreviewOutcome::Failed
            }
        };
        crate::metrics::record_preview(outcome.as_str());
        if matches!(outcome, PreviewOutcome::Updated | PreviewOutcome::Fallback) {
            state.burst = Settings::new();
            crate::metrics::record_preview_latency(elapsed);
        }
        outcome
    }

    fn write(&self, generation: u64, css: &str, elapsed_ms: u64, fallback: bool) {
        self.sink.replace(css);
        self.events.emit(Event::PreviewUpdated { generation, css_length: css.len(), elapsed_ms, fallback });
    }
}
