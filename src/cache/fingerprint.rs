// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache keys and dedup fingerprints.
//!
//! Both are SHA-256 digests over a canonical rendering of the payload
//! (object keys sorted at every depth), so `{"a":1,"b":2}` and
//! `{"b":2,"a":1}` produce the same key.
//!
//! - **cache key** = `H(operation, payload)`: stable forever, used for the
//!   response cache and ETag validators.
//! - **fingerprint** = `H(cache key, time bucket)`: the cache key folded
//!   with `floor(now / bucket)`. Identical calls inside one bucket are the
//!   same logical request; the same call in a later bucket is a new one.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::clock::Clock;

/// Render `value` as JSON with object keys sorted at every depth.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a str cannot fail
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push(':');
                write_canonical(&map[k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Stable cache key for an operation and payload.
#[must_use]
pub fn cache_key(operation: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(payload).as_bytes());
    format!("{operation}:{}", hex::encode(hasher.finalize()))
}

/// Derives dedup fingerprints from cache keys and a coarse time bucket.
#[derive(Debug, Clone)]
pub struct FingerprintGenerator {
    bucket_ms: u64,
    clock: Arc<dyn Clock>,
}

impl FingerprintGenerator {
    pub fn new(bucket_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self { bucket_ms: bucket_ms.max(1), clock }
    }

    #[must_use]
    pub fn bucket_ms(&self) -> u64 {
        self.bucket_ms
    }

    /// Current time bucket index.
    #[must_use]
    pub fn current_bucket(&self) -> u64 {
        self.clock.now_ms() / self.bucket_ms
    }

    #[must_use]
    pub fn fingerprint(&self, cache_key: &str) -> String {
        self.fingerprint_in_bucket(cache_key, self.current_bucket())
    }

    #[must_use]
    pub fn fingerprint_in_bucket(&self, cache_key: &str, bucket: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(cache_key.as_bytes());
        hasher.update(b"@");
        hasher.update(bucket.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}
