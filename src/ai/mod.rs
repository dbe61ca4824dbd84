//! AI providers.
//!
//! Every vendor implements [`AiProvider`]: `configure` once from a
//! [`ProviderConfig`], then `complete` any number of prompts. The active
//! provider is chosen by name from the configured set with
//! [`resolve_provider`]; an unknown name is a configuration error.

pub mod anthropic;
pub mod noop;
pub mod openai;
pub mod prompts;

use crate::config::types::{AiConfig, ProviderConfig};
use crate::error::{AiError, ConfigError};
use async_trait::async_trait;
use std::time::Duration;

/// Provider used when neither `--backend` nor a configured default is set.
pub const DEFAULT_PROVIDER: &str = "openai";

const USER_AGENT: &str = concat!("kubesage/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A text-completion backend.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Configured provider name.
    fn name(&self) -> &str;

    /// Language explanations are written in.
    fn language(&self) -> &str;

    /// Validate and store credentials and settings. Must precede `complete`.
    fn configure(&mut self, config: &ProviderConfig) -> Result<(), ConfigError>;

    /// Send one prompt and return the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
}

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    LocalAI,
    Anthropic,
    Noop,
}

impl ProviderType {
    pub const ALL: [ProviderType; 4] = [
        ProviderType::OpenAI,
        ProviderType::LocalAI,
        ProviderType::Anthropic,
        ProviderType::Noop,
    ];

    /// Environment variable consulted when no credential is configured.
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::LocalAI | ProviderType::Noop => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "gpt-4o-mini",
            ProviderType::LocalAI => "ggml-gpt4all-j",
            ProviderType::Anthropic => "claude-3-5-haiku-latest",
            ProviderType::Noop => "noop",
        }
    }

    /// A fresh, unconfigured provider of this type.
    pub fn create(&self) -> Box<dyn AiProvider> {
        match self {
            ProviderType::OpenAI => Box::new(openai::OpenAiProvider::openai()),
            ProviderType::LocalAI => Box::new(openai::OpenAiProvider::localai()),
            ProviderType::Anthropic => Box::new(anthropic::AnthropicProvider::default()),
            ProviderType::Noop => Box::new(noop::NoopProvider::default()),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::LocalAI => write!(f, "localai"),
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::Noop => write!(f, "noop"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "localai" | "local" => Ok(ProviderType::LocalAI),
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "noop" => Ok(ProviderType::Noop),
            _ => Err(ConfigError::UnknownProviderType(s.to_string())),
        }
    }
}

/// Select and configure the active provider.
///
/// `requested` overrides the configured default; `language` overrides the
/// provider's target language.
pub fn resolve_provider(
    ai: &AiConfig,
    requested: Option<&str>,
    language: Option<&str>,
) -> Result<Box<dyn AiProvider>, ConfigError> {
    let name = requested
        .or(ai.default_provider.as_deref())
        .unwrap_or(DEFAULT_PROVIDER);

    let config = ai
        .provider(name)
        .ok_or_else(|| ConfigError::ProviderNotConfigured(name.to_string()))?;
    let provider_type: ProviderType = config.name.parse()?;

    let mut effective = config.clone();
    if let Some(language) = language.filter(|l| !l.is_empty()) {
        effective.target_language = language.to_string();
    }

    let mut provider = provider_type.create();
    provider.configure(&effective)?;
    log::debug!("Using AI provider {} ({})", provider.name(), provider_type);
    Ok(provider)
}

/// Configured credential, or the provider's environment variable.
fn credential_or_env(config: &ProviderConfig, env_var: &str) -> Result<String, ConfigError> {
    if !config.credential.is_empty() {
        return Ok(config.credential.clone());
    }
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingCredential {
            provider: config.name.clone(),
            env_var: env_var.to_string(),
        })
}

fn language_or_default(config: &ProviderConfig) -> String {
    if config.target_language.is_empty() {
        "english".to_string()
    } else {
        config.target_language.clone()
    }
}

fn http_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConfigError::InvalidValue {
            field: "http client".to_string(),
            reason: e.to_string(),
        })
}

/// Map a non-success response to [`AiError::Api`].
async fn error_from_response(response: reqwest::Response) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    AiError::Api { status, message }
}
