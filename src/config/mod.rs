use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub quotes: QuoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub base_url: String,
    pub primary_model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    pub base_url: String,
    /// Page that sets the session cookie before the crumb request; `None` skips it
    pub cookie_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file - this sets env vars that aren't already set
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str, default: String| lookup(key).unwrap_or(default);

        let llm_base_url = var("OPENAI_BASE_URL", defaults.llm.base_url);
        Url::parse(&llm_base_url).context("Invalid OPENAI_BASE_URL value")?;

        let quote_base_url = var("QUOTE_BASE_URL", defaults.quotes.base_url.clone());
        Url::parse(&quote_base_url).context("Invalid QUOTE_BASE_URL value")?;

        // The Yahoo cookie page only makes sense for the Yahoo endpoint; a custom
        // base URL gets no cookie request unless one is configured explicitly
        let cookie_url = match lookup("QUOTE_COOKIE_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => {
                Url::parse(&url).context("Invalid QUOTE_COOKIE_URL value")?;
                Some(url)
            }
            None if quote_base_url == defaults.quotes.base_url => defaults.quotes.cookie_url,
            None => None,
        };

        let config = Config {
            database: DatabaseConfig {
                path: var("DATABASE_PATH", defaults.database.path),
            },
            llm: LlmConfig {
                openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()),
                base_url: llm_base_url.trim_end_matches('/').to_string(),
                primary_model: var("PRIMARY_MODEL", defaults.llm.primary_model),
                max_tokens: var("LLM_MAX_TOKENS", defaults.llm.max_tokens.to_string())
                    .parse()
                    .context("Invalid LLM_MAX_TOKENS value")?,
                timeout_seconds: var("LLM_TIMEOUT_SECONDS", defaults.llm.timeout_seconds.to_string())
                    .parse()
                    .context("Invalid LLM_TIMEOUT_SECONDS value")?,
            },
            quotes: QuoteConfig {
                base_url: quote_base_url.trim_end_matches('/').to_string(),
                cookie_url,
                timeout_seconds: var("QUOTE_TIMEOUT_SECONDS", defaults.quotes.timeout_seconds.to_string())
                    .parse()
                    .context("Invalid QUOTE_TIMEOUT_SECONDS value")?,
            },
        };

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "user_logs.db".to_string(),
            },
            llm: LlmConfig {
                openai_api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                primary_model: "gpt-4o-mini".to_string(),
                max_tokens: 150,
                timeout_seconds: 30,
            },
            quotes: QuoteConfig {
                base_url: "https://query2.finance.yahoo.com".to_string(),
                cookie_url: Some("https://fc.yahoo.com".to_string()),
                timeout_seconds: 30,
            },
        }
    }
}
