//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `footprint_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: adapter invoked ("chat", "suggestions", "pattern", "bill")
//! - `status`: "ok" or "error"
//! - `reason`: retry cause: "rate_limited", "server", "network"

/// Total calls that went through the admission queue to the service.
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "footprint_requests_total";

/// Wall time of a gateway call including retries, in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "footprint_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `reason`.
pub const RETRIES_TOTAL: &str = "footprint_retries_total";

/// Total calls stopped early because the quota is spent.
pub const QUOTA_EXHAUSTED_TOTAL: &str = "footprint_quota_exhausted_total";

/// Time a task spent waiting for admission (capacity + spacing), in seconds.
pub const QUEUE_WAIT_SECONDS: &str = "footprint_queue_wait_seconds";

/// Total response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "footprint_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "footprint_cache_misses_total";

/// Total adapter results replaced by fallback content.
///
/// Labels: `operation` ("suggestions", "pattern" when no confident pattern
/// came back, "bill" when the call failed).
pub const FALLBACKS_TOTAL: &str = "footprint_fallbacks_total";
