//! Error types for kubesage.
//!
//! Each concern has its own error enum; [`KubesageError`] aggregates them for the
//! command handlers and the binary. Only configuration problems and "no analyzer
//! could run" conditions are fatal; the rest are absorbed into the report.

use thiserror::Error;

/// Top-level error returned by command handlers.
#[derive(Debug, Error)]
pub enum KubesageError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster access error: {0}")]
    Cluster(#[from] ClusterAccessError),

    #[error("AI provider error: {0}")]
    Ai(#[from] AiError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Masking error: {0}")]
    Masking(#[from] MaskingError),

    #[error("No analyzers to run: the active filter set matched nothing")]
    NoAnalyzers,

    #[error("All {count} analyzers failed; first failure: {first}")]
    AllAnalyzersFailed { count: usize, first: String },

    #[error("Failed to render output: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing or invalid configuration. Always fatal, raised before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AI provider '{0}' is not configured. Run `kubesage auth add --backend {0}` first")]
    ProviderNotConfigured(String),

    #[error("Unknown AI provider type: {0}. Use: openai, localai, anthropic, or noop")]
    UnknownProviderType(String),

    #[error("Missing credential for provider '{provider}'. Set it in the config or export {env_var}")]
    MissingCredential { provider: String, env_var: String },

    #[error("Provider '{0}' requires a base URL")]
    MissingBaseUrl(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    ParsingFailed(String),

    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to the cluster API.
#[derive(Debug, Error)]
pub enum ClusterAccessError {
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Failed to infer Kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("Kubernetes API unavailable: {0}")]
    Unavailable(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

/// Failure obtaining a completion from an AI provider.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned an error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    #[error("Provider '{0}' has not been configured")]
    NotConfigured(String),

    #[error("Completion cancelled")]
    Cancelled,
}

/// Failure of an explanation cache backend. Never fatal: degraded to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache data: {0}")]
    Corrupt(String),

    #[error("Remote cache error: {0}")]
    Remote(String),
}

/// The masking codec could not produce an unambiguous substitution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskingError {
    #[error("Could not derive unambiguous mask tokens after {0} attempts")]
    Ambiguous(u32),

    #[error("Masked text still contains a sensitive value")]
    Incomplete,
}

/// Result alias used by command handlers.
pub type Result<T> = std::result::Result<T, KubesageError>;
