//! Yahoo Finance quote client
//! Fetches valuation fields from the quoteSummary endpoint and flattens them into a `QuoteRecord`

use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::validation::{normalize_symbol, validate_symbol};
use super::{DataError, DataResult, QuoteRecord};
use crate::config::QuoteConfig;

/// quoteSummary modules carrying P/E, price-to-book and dividend yield
const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; etfscout/0.1)";

/// Source of raw quote records for a ticker
pub trait QuoteProvider {
    /// Fetch the raw quote for `ticker`. Unknown tickers yield an empty record.
    fn fetch_quote(&self, ticker: &str) -> impl Future<Output = DataResult<QuoteRecord>>;
}

/// quoteSummary API response structures
#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<QuoteSummaryError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryError {
    code: String,
    description: Option<String>,
}

pub struct QuoteClient {
    client: reqwest::Client,
    config: QuoteConfig,
    crumb: Mutex<Option<String>>,
}

impl QuoteClient {
    pub fn new(config: QuoteConfig) -> DataResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config,
            crumb: Mutex::new(None),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> DataResult<Self> {
        Self::new(config.quotes.clone())
    }

    /// Fetch the raw quote record for a ticker
    pub async fn fetch(&self, ticker: &str) -> DataResult<QuoteRecord> {
        let symbol = normalize_symbol(ticker);
        validate_symbol(&symbol)?;

        info!("Fetching quote summary for {}", symbol);

        let crumb = self.crumb().await?;
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.config.base_url, symbol
        );

        debug!("quoteSummary request: GET {}", url);

        let response = timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client
                .get(&url)
                .query(&[("modules", SUMMARY_MODULES), ("crumb", crumb.as_str())])
                .send(),
        )
        .await
        .map_err(|_| DataError::Timeout {
            timeout_seconds: self.config.timeout_seconds,
        })??;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            info!("No quote found for {}", symbol);
            return Ok(QuoteRecord::empty());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Crumb expired; drop it so the next lookup fetches a fresh one
            *self.crumb.lock().await = None;
            return Err(DataError::Authentication(
                "Yahoo Finance rejected the session crumb".to_string(),
            ));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("quoteSummary failed ({}): {}", status, error_text);
            return Err(DataError::api_error(status.as_u16(), error_text));
        }

        let body: Value = response.json().await?;
        let record = flatten_quote_summary(&body)?;

        info!("Fetched {} quote fields for {}", record.len(), symbol);
        Ok(record)
    }

    /// Session crumb, fetched once and reused
    async fn crumb(&self) -> DataResult<String> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie page answers 404 but still sets the session cookie
        if let Some(cookie_url) = &self.config.cookie_url {
            if let Err(e) = self.client.get(cookie_url).send().await {
                warn!("Cookie request failed, continuing without it: {}", e);
            }
        }

        let url = format!("{}/v1/test/getcrumb", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let crumb = response.text().await?.trim().to_string();

        if !status.is_success() || crumb.is_empty() || crumb.contains('<') {
            return Err(DataError::Authentication(format!(
                "Could not obtain Yahoo Finance crumb (status {})",
                status
            )));
        }

        debug!("Obtained Yahoo Finance crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }
}

impl QuoteProvider for QuoteClient {
    async fn fetch_quote(&self, ticker: &str) -> DataResult<QuoteRecord> {
        self.fetch(ticker).await
    }
}

/// Flatten a quoteSummary response body into a single field map.
///
/// Each module's fields are merged; `{raw, fmt}` objects contribute `raw`,
/// empty objects contribute `null`, and the first module to define a field wins.
/// A `Not Found` error or an empty result is an unknown ticker, not a failure.
pub fn flatten_quote_summary(body: &Value) -> DataResult<QuoteRecord> {
    let response: QuoteSummaryResponse = serde_json::from_value(body.clone())
        .map_err(|e| DataError::parse_error(format!("Invalid quoteSummary response: {}", e)))?;

    if let Some(err) = response.quote_summary.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(QuoteRecord::empty());
        }
        return Err(DataError::api_error(
            400,
            format!(
                "{}: {}",
                err.code,
                err.description.unwrap_or_default()
            ),
        ));
    }

    let Some(mut modules) = response
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(QuoteRecord::empty());
    };

    // Requested modules first, in request order, then anything else
    let mut ordered: Vec<Value> = SUMMARY_MODULES
        .split(',')
        .filter_map(|name| modules.remove(name))
        .collect();
    ordered.extend(modules.into_iter().map(|(_, content)| content));

    let mut fields = Map::new();
    for content in ordered {
        let Value::Object(module_fields) = content else {
            continue;
        };

        for (name, value) in module_fields {
            if name == "maxAge" || fields.contains_key(&name) {
                continue;
            }
            fields.insert(name, unwrap_raw(value));
        }
    }

    Ok(QuoteRecord::from_map(fields))
}

fn unwrap_raw(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => match obj.remove("raw") {
            Some(raw) => raw,
            None if obj.is_empty() => Value::Null,
            None => Value::Object(obj),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fields;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_flatten_merges_modules_and_unwraps_raw() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {
                        "maxAge": 1,
                        "trailingPE": {"raw": 26.84, "fmt": "26.84"},
                        "dividendYield": {},
                        "yield": {"raw": 0.0121, "fmt": "1.21%"}
                    },
                    "defaultKeyStatistics": {
                        "priceToBook": {"raw": 1.58, "fmt": "1.58"},
                        "trailingPE": {"raw": 99.0, "fmt": "99.00"},
                        "fundFamily": "SPDR State Street Global Advisors"
                    }
                }],
                "error": null
            }
        });

        let record = flatten_quote_summary(&body).unwrap();

        assert_eq!(record.number(fields::TRAILING_PE), Some(26.84));
        assert_eq!(record.number(fields::PRICE_TO_BOOK), Some(1.58));
        assert_eq!(record.get(fields::DIVIDEND_YIELD), Some(&Value::Null));
        assert_eq!(record.number("yield"), Some(0.0121));
        assert_eq!(record.get("fundFamily"), Some(&json!("SPDR State Street Global Advisors")));
        assert!(record.get("maxAge").is_none());
    }

    #[test]
    fn test_not_found_is_empty_record() {
        let body = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}
            }
        });

        let record = flatten_quote_summary(&body).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_empty_result_is_empty_record() {
        let body = json!({"quoteSummary": {"result": [], "error": null}});
        assert!(flatten_quote_summary(&body).unwrap().is_empty());
    }

    #[test]
    fn test_other_provider_error_is_reported() {
        let body = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Bad Request", "description": "Invalid Crumb"}
            }
        });

        let err = flatten_quote_summary(&body).unwrap_err();
        assert!(err.to_string().contains("Invalid Crumb"));
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let err = flatten_quote_summary(&json!({"chart": {}})).unwrap_err();
        assert!(matches!(err, DataError::Parse { .. }));
    }

    /// Minimal HTTP/1.1 responder standing in for Yahoo: one request per connection
    async fn spawn_quote_server(crumb_requests: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let crumb_requests = crumb_requests.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    let (status, body) = if path.starts_with("/cookie") {
                        ("404 Not Found", String::new())
                    } else if path.starts_with("/v1/test/getcrumb") {
                        crumb_requests.fetch_add(1, Ordering::SeqCst);
                        ("200 OK", "abc123".to_string())
                    } else if path.starts_with("/v10/finance/quoteSummary/ZZZZ") {
                        ("404 Not Found", String::new())
                    } else if path.starts_with("/v10/finance/quoteSummary/AUTH") {
                        ("401 Unauthorized", "Invalid Crumb".to_string())
                    } else if path.starts_with("/v10/finance/quoteSummary/DOWN") {
                        ("503 Service Unavailable", "upstream down".to_string())
                    } else if path.starts_with("/v10/finance/quoteSummary/SPY") {
                        let body = json!({
                            "quoteSummary": {
                                "result": [{
                                    "summaryDetail": {"trailingPE": {"raw": 26.84, "fmt": "26.84"}}
                                }],
                                "error": null
                            }
                        });
                        ("200 OK", body.to_string())
                    } else {
                        ("500 Internal Server Error", "unexpected path".to_string())
                    };

                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_status_handling_against_local_server() {
        let crumb_requests = Arc::new(AtomicUsize::new(0));
        let base_url = spawn_quote_server(crumb_requests.clone()).await;

        let client = QuoteClient::new(QuoteConfig {
            base_url: base_url.clone(),
            cookie_url: Some(format!("{}/cookie", base_url)),
            timeout_seconds: 5,
        })
        .unwrap();

        // 404 is an unknown ticker, not a failure
        let record = client.fetch("zzzz").await.unwrap();
        assert!(record.is_empty());
        assert_eq!(crumb_requests.load(Ordering::SeqCst), 1);

        // 401 drops the cached crumb
        let err = client.fetch("AUTH").await.unwrap_err();
        assert!(matches!(err, DataError::Authentication(_)));

        let record = client.fetch("SPY").await.unwrap();
        assert_eq!(record.number(fields::TRAILING_PE), Some(26.84));
        assert_eq!(crumb_requests.load(Ordering::SeqCst), 2);

        // Any other status surfaces as an API error carrying the code
        let err = client.fetch("DOWN").await.unwrap_err();
        match err {
            DataError::Api { status_code, message } => {
                assert_eq!(status_code, 503);
                assert!(message.contains("upstream down"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
        assert_eq!(crumb_requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[ignore] // Requires network access to Yahoo Finance
    async fn test_yahoo_integration() {
        let client = QuoteClient::new(crate::config::Config::default().quotes).unwrap();

        match client.fetch("spy").await {
            Ok(record) => {
                println!("SPY fields: {}", record.len());
                assert!(!record.is_empty());
            }
            Err(e) => {
                println!("Quote fetch failed: {}", e);
            }
        }
    }
}
