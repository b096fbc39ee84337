//! Caching subsystem.
//!
//! [`response::ResponseCache`] keeps assistant results keyed on a
//! [`fingerprint`] of the call's semantic inputs. A live entry short-circuits
//! the admission queue and the executor entirely: no network call is made.
//! Entries expire after the configured TTL and are dropped lazily on lookup.

pub mod response;

pub use response::{CacheConfig, CachedResponse, ResponseCache, fingerprint};
