//! Offline provider that echoes the prompt.

use super::{AiProvider, language_or_default};
use crate::config::types::ProviderConfig;
use crate::error::{AiError, ConfigError};
use async_trait::async_trait;

#[derive(Default)]
pub struct NoopProvider {
    language: String,
}

#[async_trait]
impl AiProvider for NoopProvider {
    fn name(&self) -> &str {
        "noop"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn configure(&mut self, config: &ProviderConfig) -> Result<(), ConfigError> {
        self.language = language_or_default(config);
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        Ok(format!("I am a noop response to the prompt {}", prompt))
    }
}
