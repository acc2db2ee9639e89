//! Orchestrator module for the per-action call chains the front end drives
//! Combines quote lookup, metric normalization, LLM answers and interaction logging

pub mod assistant;

// Re-export main orchestrator
pub use assistant::{EtfAssistant, LookupOutcome, TickerReport, INVALID_TICKER_MESSAGE};
