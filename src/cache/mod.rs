//! Response cache and request fingerprinting.
//!
//! - [`store`]: TTL + size-bounded response cache with ETag validators
//! - [`fingerprint`]: canonical cache keys and time-bucketed dedup fingerprints

pub mod fingerprint;
pub mod store;

pub use fingerprint::{cache_key, canonical_json, FingerprintGenerator};
pub use store::{CacheEntry, CacheStats, CacheStore};
