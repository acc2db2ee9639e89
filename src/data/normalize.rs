//! Maps a raw provider quote into the fixed three-metric display record

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{fields, QuoteRecord};

/// Marker shown for a metric the provider did not report
pub const NOT_AVAILABLE: &str = "N/A";

/// A display metric: either a finite number or explicitly unavailable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Available(f64),
    Unavailable,
}

impl MetricValue {
    /// Wrap a raw number, treating NaN and infinities as unavailable
    pub fn from_number(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => MetricValue::Available(v),
            _ => MetricValue::Unavailable,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Available(v) => Some(*v),
            MetricValue::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Available(_))
    }

    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Self {
        match self {
            MetricValue::Available(v) => MetricValue::from_number(Some(f(v))),
            MetricValue::Unavailable => MetricValue::Unavailable,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Honour an explicit precision ({:.2}) but print the raw value otherwise
            MetricValue::Available(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            MetricValue::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Available(v) => serializer.serialize_f64(*v),
            MetricValue::Unavailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(MetricValue::from_number(value.as_f64()))
    }
}

/// Normalized metrics for one ETF
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    /// Trailing P/E ratio
    pub growth: MetricValue,
    /// Price to book
    pub value: MetricValue,
    /// Dividend yield in percent
    pub dividend_yield: MetricValue,
}

impl DisplayMetrics {
    pub fn unavailable() -> Self {
        Self {
            growth: MetricValue::Unavailable,
            value: MetricValue::Unavailable,
            dividend_yield: MetricValue::Unavailable,
        }
    }

    /// Labelled rows in display order
    pub fn rows(&self) -> [(&'static str, MetricValue); 3] {
        [
            ("Growth (PE Ratio)", self.growth),
            ("Value (Price to Book)", self.value),
            ("Dividend Yield (%)", self.dividend_yield),
        ]
    }
}

/// Normalize a provider quote. Never fails: missing, null, non-numeric and
/// non-finite fields all become `Unavailable`.
pub fn normalize(quote: &QuoteRecord) -> DisplayMetrics {
    DisplayMetrics {
        growth: MetricValue::from_number(quote.number(fields::TRAILING_PE)),
        value: MetricValue::from_number(quote.number(fields::PRICE_TO_BOOK)),
        // Provider reports a fraction
        dividend_yield: MetricValue::from_number(quote.number(fields::DIVIDEND_YIELD))
            .map(|fraction| fraction * 100.0),
    }
}
