use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::analysis::formatter;

#[derive(Parser, Debug)]
#[command(name = "kubesage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find broken Kubernetes workloads and explain them")]
#[command(long_about = "Scans a Kubernetes cluster with a set of analyzers, reports every problem found, and optionally asks an AI backend for a short explanation and fix. Sensitive names can be masked before anything leaves the machine.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to configuration file (default: ~/.kubesage.toml)
    #[arg(long, global = true, value_name = "FILE", env = "KUBESAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a kubeconfig file
    #[arg(long, global = true, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true, value_name = "NAME")]
    pub kube_context: Option<String>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the cluster for problems
    #[command(alias = "analyse")]
    Analyze(AnalyzeArgs),

    /// Manage the active analyzers
    Filters {
        #[command(subcommand)]
        command: FiltersCommand,
    },

    /// Manage the explanation cache backend
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Manage AI provider configurations
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Namespace to scan (default: all namespaces)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Always ask the provider, even when an explanation is cached
    #[arg(short = 'c', long)]
    pub no_cache: bool,

    /// Mask sensitive values before sending them to the provider
    #[arg(short, long)]
    pub anonymize: bool,

    /// Analyzers to run (comma-separated); overrides the configured set
    #[arg(short, long, value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Restrict the scan to objects, as [Kind/][namespace/]name
    #[arg(long, value_name = "REF")]
    pub object: Vec<String>,

    /// Ask the AI provider to explain each problem
    #[arg(short, long)]
    pub explain: bool,

    /// AI provider to use (default: configured default, or openai)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Language explanations are written in
    #[arg(short, long)]
    pub language: Option<String>,

    /// Maximum number of analyzers running at once
    #[arg(short, long)]
    pub max_concurrency: Option<usize>,

    /// Add the official Kubernetes documentation of the fields at fault
    #[arg(short = 'd', long)]
    pub with_doc: bool,

    /// Ask follow-up questions about the report (requires --explain)
    #[arg(short, long, requires = "explain")]
    pub interactive: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FiltersCommand {
    /// Show every analyzer and whether it is active
    List,

    /// Add analyzers to the default active set
    Add {
        /// Analyzer kinds, comma-separated
        #[arg(value_delimiter = ',', required = true)]
        names: Vec<String>,
    },

    /// Remove analyzers from the default active set
    Remove {
        /// Analyzer kinds, comma-separated
        #[arg(value_delimiter = ',', required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommand {
    /// Show the active cache backend
    List,

    /// Configure a cache backend
    Add {
        #[command(subcommand)]
        backend: CacheBackendArgs,
    },

    /// Reset to the default local file cache
    Remove,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheBackendArgs {
    /// Local JSON file
    File {
        /// Cache file location
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// S3-compatible bucket
    S3 {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        region: String,

        /// Custom endpoint, e.g. a MinIO server
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Show configured providers
    List,

    /// Add or replace a provider configuration
    Add {
        /// Provider name: openai, localai, anthropic, noop
        #[arg(short, long)]
        backend: String,

        /// API key (falls back to the provider's environment variable)
        #[arg(short, long)]
        password: Option<String>,

        /// Model identifier
        #[arg(short, long)]
        model: Option<String>,

        /// Endpoint override, required for localai
        #[arg(short = 'u', long)]
        base_url: Option<String>,

        /// Language explanations are written in
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Remove a provider configuration
    Remove {
        backend: String,
    },

    /// Set the provider used when --backend is not given
    Default {
        backend: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for formatter::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => formatter::OutputFormat::Text,
            OutputFormat::Json => formatter::OutputFormat::Json,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.global.quiet {
            return;
        }

        let level = match self.global.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
