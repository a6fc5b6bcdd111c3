// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Scripted transport for tests and offline runs.
//!
//! Queued outcomes are consumed in order; once the queue is empty the
//! default responder (if any) answers. Every request is recorded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Transport, TransportError, TransportRequest, TransportResponse};

pub type Outcome = Result<TransportResponse, TransportError>;
pub type Responder = Arc<dyn Fn(&TransportRequest) -> Outcome + Send + Sync>;

pub struct ScriptedTransport {
    name: String,
    script: Mutex<VecDeque<Outcome>>,
    responder: Mutex<Option<Responder>>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            responder: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every request with `f` once the script runs out.
    #[must_use]
    pub fn with_responder(self, f: impl Fn(&TransportRequest) -> Outcome + Send + Sync + 'static) -> Self {
        *self.responder.lock() = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn push(&self, outcome: Outcome) -> &Self {
        self.script.lock().push_back(outcome);
        self
    }

    pub fn push_response(&self, response: TransportResponse) -> &Self {
        self.push(Ok(response))
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().last().cloned()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("name", &self.name)
            .field("calls", &self.calls())
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }
        let responder = self.responder.lock().clone();
        match responder {
            Some(f) => f(&request),
            None => Err(TransportError::Unavailable(format!("{}: no scripted response", self.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_then_responder() {
        let t = ScriptedTransport::new("primary").with_responder(|_| Ok(TransportResponse::ok(json!("default"))));
        t.push_error(TransportError::Reset("x".into()));
        t.push_response(TransportResponse::ok(json!(1)));

        let req = TransportRequest::new(Method::Get, "/settings");
        assert!(t.send(req.clone()).await.is_err());
        assert_eq!(t.send(req.clone()).await.unwrap().body, json!(1));
        assert_eq!(t.send(req).await.unwrap().body, json!("default"));
        assert_eq!(t.calls(), 3);
        assert_eq!(t.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_unavailable() {
        let t = ScriptedTransport::new("fallback");
        let err = t.send(TransportRequest::new(Method::Get, "/x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let t = ScriptedTransport::new("slow")
            .with_latency(Duration::from_millis(200))
            .with_responder(|_| Ok(TransportResponse::ok(json!(null))));
        let start = tokio::time::Instant::now();
        t.send(TransportRequest::new(Method::Get, "/x")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
