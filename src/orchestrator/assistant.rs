//! ETF assistant orchestrator
//! One call chain per user action: ticker lookup, question answering, feedback logging

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::Config,
    data::{
        normalize,
        validation::{normalize_symbol, validate_symbol},
        DisplayMetrics, QuoteClient, QuoteProvider,
    },
    db::Database,
    interactions::{Feedback, InteractionLogger},
    llm::{failure_text, CompletionProvider, LLMClient},
};

/// Message shown when the ticker input is empty or malformed
pub const INVALID_TICKER_MESSAGE: &str = "Please enter a valid ETF ticker symbol";

/// Normalized metrics for one looked-up ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub metrics: DisplayMetrics,
}

/// Result of a ticker lookup; every variant is displayable
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(TickerReport),
    InvalidTicker(String),
    Failed(String),
}

/// Front-end facing assistant over a quote provider, an LLM and the interaction log
pub struct EtfAssistant<Q, C> {
    quotes: Q,
    llm: C,
    logger: InteractionLogger,
}

impl EtfAssistant<QuoteClient, LLMClient> {
    /// Build the assistant with the real providers
    pub fn from_config(config: &Config, db: &Database) -> Result<Self> {
        let quotes = QuoteClient::from_config(config)?;
        let llm = LLMClient::from_config(config);
        let logger = InteractionLogger::new(db.pool.clone());

        info!(model = llm.model(), "ETF assistant initialized");
        Ok(Self::new(quotes, llm, logger))
    }
}

impl<Q, C> EtfAssistant<Q, C>
where
    Q: QuoteProvider,
    C: CompletionProvider,
{
    pub fn new(quotes: Q, llm: C, logger: InteractionLogger) -> Self {
        Self {
            quotes,
            llm,
            logger,
        }
    }

    pub fn logger(&self) -> &InteractionLogger {
        &self.logger
    }

    /// Look up and normalize the metrics for a ticker
    pub async fn lookup(&self, ticker: &str) -> LookupOutcome {
        let symbol = normalize_symbol(ticker);
        if let Err(e) = validate_symbol(&symbol) {
            info!("Rejected ticker input {:?}: {}", ticker, e);
            return LookupOutcome::InvalidTicker(INVALID_TICKER_MESSAGE.to_string());
        }

        match self.quotes.fetch_quote(&symbol).await {
            Ok(quote) => {
                if quote.is_empty() {
                    info!("No quote data for {}", symbol);
                }
                LookupOutcome::Found(TickerReport {
                    metrics: normalize(&quote),
                    ticker: symbol,
                })
            }
            Err(e) => {
                warn!("Quote lookup for {} failed: {}", symbol, e);
                LookupOutcome::Failed(format!("Error fetching data for {}: {}", symbol, e))
            }
        }
    }

    /// Answer a free-text question. Provider failures become the answer text.
    pub async fn ask(&self, query: &str) -> String {
        match self.llm.complete(query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("LLM provider failed: {}", e);
                failure_text(&e)
            }
        }
    }

    /// Log one answered interaction with the user's feedback, if any
    pub async fn record_feedback(
        &self,
        query: &str,
        response: &str,
        feedback: Option<Feedback>,
    ) -> Result<i64> {
        self.logger.record(query, response, feedback).await
    }
}
