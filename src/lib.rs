//! Footprint - carbon-footprint tracking with a resilient gateway to a
//! generative model API
//!
//! Every call to the model goes through one [`Gateway`]: a TTL response
//! cache, a FIFO admission queue with a minimum gap between call starts,
//! and a retrying executor that honours server retry hints and stops
//! early when the account quota is spent. [`CarbonAssistant`] builds the
//! four call sites (chat, suggestions, pattern detection, bill reading) on
//! top of it; [`CarbonService`] wires them to an [`ActivityStore`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use footprint::{CarbonAssistant, Gateway, HistoryTurn};
//!
//! #[tokio::main]
//! async fn main() -> footprint::Result<()> {
//!     let gateway = Arc::new(Gateway::builder().api_key_env("GEMINI_API_KEY").build()?);
//!     let assistant = CarbonAssistant::new(gateway);
//!
//!     let history = [HistoryTurn::user("I drove 40 km today")];
//!     let reply = assistant
//!         .reply("user-1", "How can I cut that down?", &history)
//!         .await;
//!
//!     println!("{}", reply.text().unwrap_or("service unavailable"));
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod assistant;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod jobs;
pub mod rewards;
pub mod sanitize;
pub mod service;
pub mod telemetry;
pub mod types;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use activity::{ActivityCategory, ActivityRecord, ActivityStore, MemoryActivityStore};
pub use assistant::CarbonAssistant;
pub use cache::{CacheConfig, ResponseCache};
pub use config::{ApiKeySource, Config, Secrets};
pub use error::{FootprintError, Result};
pub use gateway::{
    AdmissionQueue, Executor, Gateway, GatewayBuilder, QueueConfig, RetryConfig, Transport,
};
pub use rewards::{Reward, RewardTier, WeeklySummary};
pub use sanitize::HistoryLimits;
pub use service::CarbonService;
pub use types::{BillExtraction, ChatReply, HistoryPart, HistoryTurn, PatternInsight, Role};
