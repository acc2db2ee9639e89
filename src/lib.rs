// etfscout - ETF metric lookup and question answering
// Normalizes provider quotes into display metrics and keeps an append-only
// log of answered questions and user feedback.

#![deny(clippy::unwrap_used)]

pub mod config;
pub mod data;
pub mod db;
pub mod interactions;
pub mod llm;
pub mod orchestrator;

// Re-export commonly used items
pub use config::Config;
pub use data::{normalize, DisplayMetrics, MetricValue, QuoteRecord};
pub use db::Database;
pub use interactions::{Feedback, InteractionLogEntry, InteractionLogger};
