//! Quote data module: provider records, metric normalization and the quote client
//! Absent or malformed provider fields are data, never errors

pub mod errors;
pub mod market;
pub mod normalize;

// Re-export commonly used types
pub use errors::{DataError, DataResult};
pub use market::{QuoteClient, QuoteProvider};
pub use normalize::{normalize, DisplayMetrics, MetricValue, NOT_AVAILABLE};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider field names consumed by the normalizer
pub mod fields {
    pub const TRAILING_PE: &str = "trailingPE";
    pub const PRICE_TO_BOOK: &str = "priceToBook";
    pub const DIVIDEND_YIELD: &str = "dividendYield";
}

/// Raw quote fields for one ticker as reported by the provider.
///
/// Values are kept untyped: a field may be missing, `null`, a number, or
/// something else entirely (e.g. the text `"N/A"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteRecord {
    fields: Map<String, Value>,
}

impl QuoteRecord {
    /// Record with no fields, as returned for unknown tickers
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style insert, mostly useful in tests and fixtures
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric value of a field, if it is present, non-null, numeric and finite
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields
            .get(name)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Validation helpers
pub mod validation {
    use super::*;

    /// Canonical form of a user-entered ticker: trimmed and uppercased
    pub fn normalize_symbol(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Validate an ETF ticker symbol (already normalized)
    pub fn validate_symbol(symbol: &str) -> DataResult<()> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Symbol cannot be empty".to_string()));
        }

        if symbol.len() > 12 {
            return Err(DataError::InvalidSymbol(format!(
                "{}: symbol too long (max 12 chars)",
                symbol
            )));
        }

        // Allow share-class and exchange suffixes such as BRK-B or VUSA.L
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        {
            return Err(DataError::InvalidSymbol(format!(
                "{}: unexpected characters",
                symbol
            )));
        }

        Ok(())
    }
}
