//! Anthropic messages API.

use super::{
    AiProvider, ProviderType, credential_or_env, error_from_response, http_client,
    language_or_default,
};
use crate::config::types::ProviderConfig;
use crate::error::{AiError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicProvider {
    client: Option<reqwest::Client>,
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self {
            client: None,
            api_key: String::new(),
            model: ProviderType::Anthropic.default_model().to_string(),
            language: String::new(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn configure(&mut self, config: &ProviderConfig) -> Result<(), ConfigError> {
        self.api_key = credential_or_env(config, "ANTHROPIC_API_KEY")?;
        if !config.model.is_empty() {
            self.model = config.model.clone();
        }
        if let Some(base_url) = config.base_url.as_deref().filter(|u| !u.is_empty()) {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self.language = language_or_default(config);
        self.client = Some(http_client()?);
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AiError::NotConfigured("anthropic".to_string()))?;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AiError::EmptyCompletion);
        }
        Ok(text)
    }
}
