use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub analysis: AnalysisDefaults,
}

/// AI provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    /// Provider used when `--backend` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    /// Every configured provider; exactly one is active per run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,
}

impl AiConfig {
    /// Look up a provider configuration by name (case-insensitive).
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Insert or replace a provider configuration.
    pub fn upsert(&mut self, provider: ProviderConfig) {
        match self
            .providers
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&provider.name))
        {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
    }

    /// Remove a provider; returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| !p.name.eq_ignore_ascii_case(name));
        if self
            .default_provider
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(name))
        {
            self.default_provider = None;
        }
        self.providers.len() != before
    }
}

/// One named AI provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Provider name, also its type (openai, localai, anthropic, noop)
    pub name: String,
    /// API key; falls back to the provider's environment variable when empty
    #[serde(default)]
    pub credential: String,
    /// Model identifier
    #[serde(default)]
    pub model: String,
    /// Language the explanation is written in
    #[serde(default = "default_language")]
    pub target_language: String,
    /// Endpoint override (required for localai)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Explanation cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendConfig,
}

/// Backing store for the explanation cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// Local JSON file (default)
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// S3-compatible bucket, one object per cache key
    S3 {
        bucket: String,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        CacheBackendConfig::File { path: None }
    }
}

/// Defaults for `analyze`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisDefaults {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_language")]
    pub language: String,
    /// Active analyzer filters used when `--filter` is not given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            language: default_language(),
            filters: Vec::new(),
        }
    }
}

fn default_max_concurrency() -> usize {
    10
}

fn default_language() -> String {
    "english".to_string()
}
