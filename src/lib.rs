//! # kubesage
//!
//! Scans a Kubernetes cluster with a set of analyzers, each inspecting one
//! resource kind, and reports every concrete problem found. Problems can be
//! sent to an AI backend for a short explanation; sensitive names are masked
//! on the way out and restored on the way back, and answers are cached.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubesage::analysis::{Analysis, AnalysisOptions};
//! use kubesage::analysis::formatter::{OutputFormat, format_run};
//! use kubesage::analyzer::AnalyzerRegistry;
//! use kubesage::kubernetes::KubeCluster;
//! use std::sync::Arc;
//!
//! # async fn run() -> kubesage::Result<()> {
//! let cluster = KubeCluster::connect(None, None).await?;
//! let options = AnalysisOptions {
//!     namespace: Some("default".to_string()),
//!     ..Default::default()
//! };
//! let analysis = Analysis::new(Arc::new(cluster), &AnalyzerRegistry::builtin(), &options)?;
//! let run = analysis.run().await?;
//! println!("{}", format_run(&run, OutputFormat::Text)?);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod analysis;
pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod kubernetes;
pub mod masking;

// Re-export commonly used types and functions
pub use analysis::{Analysis, AnalysisOptions, AnalysisRun, Status};
pub use analyzer::{AnalysisResult, Failure, Sensitive};
pub use error::{KubesageError, Result};
use cli::{Commands, GlobalArgs};
use tokio_util::sync::CancellationToken;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run_command(
    command: Commands,
    global: &GlobalArgs,
    cancel: CancellationToken,
) -> Result<()> {
    match command {
        Commands::Analyze(args) => handlers::handle_analyze(args, global, cancel).await,
        Commands::Filters { command } => {
            let path = config::resolve_config_path(global.config.as_deref())?;
            handlers::handle_filters(command, &path)
        }
        Commands::Cache { command } => {
            let path = config::resolve_config_path(global.config.as_deref())?;
            handlers::handle_cache(command, &path)
        }
        Commands::Auth { command } => {
            let path = config::resolve_config_path(global.config.as_deref())?;
            handlers::handle_auth(command, &path)
        }
    }
}
