//! OpenAI chat completions, also used for OpenAI-compatible LocalAI servers.

use super::{
    AiProvider, ProviderType, credential_or_env, error_from_response, http_client,
    language_or_default,
};
use crate::config::types::ProviderConfig;
use crate::error::{AiError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const TEMPERATURE: f32 = 0.7;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiProvider {
    kind: ProviderType,
    name: String,
    client: Option<reqwest::Client>,
    api_key: Option<String>,
    model: String,
    language: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn openai() -> Self {
        Self::unconfigured(ProviderType::OpenAI)
    }

    pub fn localai() -> Self {
        Self::unconfigured(ProviderType::LocalAI)
    }

    fn unconfigured(kind: ProviderType) -> Self {
        Self {
            kind,
            name: kind.to_string(),
            client: None,
            api_key: None,
            model: kind.default_model().to_string(),
            language: String::new(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn configure(&mut self, config: &ProviderConfig) -> Result<(), ConfigError> {
        match self.kind {
            ProviderType::LocalAI => {
                let base_url = config
                    .base_url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| ConfigError::MissingBaseUrl(config.name.clone()))?;
                self.base_url = base_url.to_string();
                self.api_key = Some(config.credential.clone()).filter(|c| !c.is_empty());
            }
            _ => {
                let env_var = self.kind.credential_env_var().unwrap_or("OPENAI_API_KEY");
                self.api_key = Some(credential_or_env(config, env_var)?);
                if let Some(base_url) = config.base_url.as_deref().filter(|u| !u.is_empty()) {
                    self.base_url = base_url.to_string();
                }
            }
        }

        if !config.model.is_empty() {
            self.model = config.model.clone();
        }
        self.name = config.name.to_lowercase();
        self.language = language_or_default(config);
        self.client = Some(http_client()?);
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AiError::NotConfigured(self.name.clone()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        };

        let mut request = client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::EmptyCompletion)
    }
}
