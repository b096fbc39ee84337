//! Public types for the Footprint API.

mod insight;
mod message;

pub use insight::{BillExtraction, ChatReply, PatternInsight};
pub use message::{HistoryPart, HistoryTurn, Role};
