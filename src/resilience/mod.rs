//! Backoff and transport preference.

pub mod preference;
pub mod retry;

pub use preference::TransportPreference;
pub use retry::RetryPolicy;
