//! LLM integration module for OpenAI-compatible chat completions
//! Answers free-text ETF questions with explicit, typed provider errors

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info};

/// Fixed instruction sent with every question
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant for analyzing ETFs.";

/// Prefix for answers that stand in for a failed provider call
pub const PROVIDER_FAILURE_PREFIX: &str = "Error fetching data from OpenAI";

/// Failures at the LLM provider boundary
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("{0}")]
    Request(#[from] OpenAIError),

    #[error("request timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("completion contained no text")]
    EmptyResponse,
}

/// Text shown (and logged) in place of an answer when the provider fails
pub fn failure_text(err: &ProviderError) -> String {
    format!("{}: {}", PROVIDER_FAILURE_PREFIX, err)
}

/// Answers a free-text question
pub trait CompletionProvider {
    fn complete(&self, query: &str) -> impl Future<Output = Result<String, ProviderError>>;
}

/// LLM response with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// LLM client configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub primary_model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            primary_model: "gpt-4o-mini".to_string(),
            max_tokens: 150,
            timeout_seconds: 30,
        }
    }
}

/// Chat-completion client
#[derive(Debug, Clone)]
pub struct LLMClient {
    client: Option<OpenAIClient<OpenAIConfig>>,
    config: LLMConfig,
}

impl LLMClient {
    /// Create new LLM client. A missing API key is not fatal: every call then
    /// fails with `ProviderError::MissingApiKey`.
    pub fn new(config: LLMConfig) -> Self {
        let client = config.api_key.as_ref().map(|key| {
            let openai_config = OpenAIConfig::new()
                .with_api_key(key)
                .with_api_base(&config.base_url);
            OpenAIClient::with_config(openai_config)
        });

        if client.is_none() {
            info!("OPENAI_API_KEY not configured - questions will return an error message");
        }

        Self { client, config }
    }

    /// Create client from config::Config
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(LLMConfig {
            api_key: config.llm.openai_api_key.clone(),
            base_url: config.llm.base_url.clone(),
            primary_model: config.llm.primary_model.clone(),
            max_tokens: config.llm.max_tokens,
            timeout_seconds: config.llm.timeout_seconds,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.primary_model
    }

    /// Ask the model one question under the fixed ETF-analyst instruction
    pub async fn generate(&self, query: &str) -> Result<LLMResponse, ProviderError> {
        let client = self.client.as_ref().ok_or(ProviderError::MissingApiKey)?;

        info!(
            "Generating answer with model '{}' (query length: {} chars)",
            self.config.primary_model,
            query.len()
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.primary_model)
            .max_completion_tokens(self.config.max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTION)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(query)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = timeout(
            Duration::from_secs(self.config.timeout_seconds),
            client.chat().create(request),
        )
        .await
        .map_err(|_| {
            error!("Timeout after {} seconds", self.config.timeout_seconds);
            ProviderError::Timeout {
                timeout_seconds: self.config.timeout_seconds,
            }
        })?
        .map_err(|e| {
            error!("OpenAI API error: {}", e);
            ProviderError::Request(e)
        })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        let usage = response.usage;
        info!(
            model = %response.model,
            total_tokens = usage.as_ref().map(|u| u.total_tokens),
            "Generated answer"
        );

        Ok(LLMResponse {
            content,
            model: response.model,
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: usage.as_ref().map(|u| u.total_tokens),
        })
    }
}

impl CompletionProvider for LLMClient {
    async fn complete(&self, query: &str) -> Result<String, ProviderError> {
        self.generate(query).await.map(|response| response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_text_format() {
        assert_eq!(
            failure_text(&ProviderError::MissingApiKey),
            "Error fetching data from OpenAI: OPENAI_API_KEY is not set"
        );
        assert_eq!(
            failure_text(&ProviderError::Timeout { timeout_seconds: 30 }),
            "Error fetching data from OpenAI: request timed out after 30s"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = LLMClient::new(LLMConfig::default());
        let err = client.complete("What is SPY?").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY and network access
    async fn test_openai_integration() {
        let config = LLMConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            ..LLMConfig::default()
        };
        let client = LLMClient::new(config);

        match client.generate("In one sentence, what is an ETF?").await {
            Ok(resp) => {
                println!("Response: {}", resp.content);
                assert!(!resp.content.is_empty());
            }
            Err(e) => {
                println!("Generation failed: {}", e);
            }
        }
    }
}
