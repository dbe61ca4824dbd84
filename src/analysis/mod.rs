//! Analysis orchestration.
//!
//! ```text
//! AnalyzerRegistry::select ──► scheduler::run_analyzers ──► retain_referenced
//!                                                               │
//!                                  (--with-doc) attach_docs ◄───┤
//!                                                               │
//!                                     (--explain) Explainer ◄───┘
//!                                                               │
//!                                                               ▼
//!                                                        AnalysisRun ──► formatter
//! ```
//!
//! Everything a run needs (provider, cache, limits) is resolved when the
//! [`Analysis`] is built, so configuration errors surface before any
//! analyzer starts.

pub mod explain;
pub mod formatter;
pub mod interactive;
pub mod scheduler;

use crate::ai;
use crate::analyzer::{
    AnalysisResult, Analyzer, AnalyzerContext, AnalyzerRegistry, ObjectRef, retain_referenced,
};
use crate::cache::{self, ExplanationCache};
use crate::config::types::Config;
use crate::error::{ClusterAccessError, ConfigError, KubesageError, Result};
use crate::kubernetes::ClusterAccess;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use explain::Explainer;
pub use scheduler::{AnalyzerFailure, ScheduleOutcome};

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ProblemDetected")]
    ProblemDetected,
}

/// The aggregate of one invocation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRun {
    pub results: Vec<AnalysisResult>,
    /// Analyzer and explanation failures, in occurrence order
    pub errors: Vec<String>,
    /// Active provider, when explanations were requested
    pub provider: Option<String>,
    /// Whether failures were masked before leaving the process
    pub anonymized: bool,
    pub cancelled: bool,
}

impl AnalysisRun {
    pub fn status(&self) -> Status {
        if self.results.is_empty() {
            Status::Ok
        } else {
            Status::ProblemDetected
        }
    }

    /// Total failure count across all results.
    pub fn problem_count(&self) -> usize {
        self.results.iter().map(|r| r.failures.len()).sum()
    }
}

/// Per-invocation settings, usually built from CLI flags over config defaults.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub namespace: Option<String>,
    pub filters: Vec<String>,
    pub objects: Vec<ObjectRef>,
    pub max_concurrency: usize,
    pub explain: bool,
    pub backend: Option<String>,
    pub language: Option<String>,
    pub no_cache: bool,
    pub anonymize: bool,
    /// Attach schema documentation of the fields at fault
    pub with_doc: bool,
    pub show_progress: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            filters: Vec::new(),
            objects: Vec::new(),
            max_concurrency: 10,
            explain: false,
            backend: None,
            language: None,
            no_cache: false,
            anonymize: false,
            with_doc: false,
            show_progress: false,
        }
    }
}

/// The explanation stage for `options`, or `None` when explanations were
/// not requested. Fails on an unknown or misconfigured provider.
pub async fn build_explainer(config: &Config, options: &AnalysisOptions) -> Result<Option<Explainer>> {
    if !options.explain {
        return Ok(None);
    }

    let provider = ai::resolve_provider(
        &config.ai,
        options.backend.as_deref(),
        options.language.as_deref(),
    )?;
    let store = cache::store_from_config(&config.cache.backend).await;
    let cache = ExplanationCache::new(store, options.no_cache);
    log::debug!("Explanation cache backend: {}", cache.backend());

    Ok(Some(
        Explainer::new(provider, cache, options.anonymize).with_progress(options.show_progress),
    ))
}

/// A configured run, ready to execute.
pub struct Analysis {
    context: AnalyzerContext,
    analyzers: Vec<Arc<dyn Analyzer>>,
    objects: Vec<ObjectRef>,
    max_concurrency: usize,
    anonymize: bool,
    with_doc: bool,
    explainer: Option<Explainer>,
    cancel: CancellationToken,
}

/// The analyzers `options` selects. Fails when the selection is empty or
/// the concurrency limit is zero; needs no cluster, so callers can check a
/// run before connecting.
pub fn select_analyzers(
    registry: &AnalyzerRegistry,
    options: &AnalysisOptions,
) -> Result<Vec<Arc<dyn Analyzer>>> {
    if options.max_concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "max-concurrency".to_string(),
            reason: "must be at least 1".to_string(),
        }
        .into());
    }

    let analyzers = registry.select(&options.filters, &options.objects);
    if analyzers.is_empty() {
        return Err(KubesageError::NoAnalyzers);
    }
    Ok(analyzers)
}

impl Analysis {
    /// Select the active analyzers and bind them to `cluster`.
    pub fn new(
        cluster: Arc<dyn ClusterAccess>,
        registry: &AnalyzerRegistry,
        options: &AnalysisOptions,
    ) -> Result<Self> {
        let analyzers = select_analyzers(registry, options)?;
        Ok(Self::from_selection(cluster, analyzers, options))
    }

    /// Bind an already selected, non-empty analyzer set to `cluster`.
    pub fn from_selection(
        cluster: Arc<dyn ClusterAccess>,
        analyzers: Vec<Arc<dyn Analyzer>>,
        options: &AnalysisOptions,
    ) -> Self {
        log::info!(
            "Active analyzers: {}",
            analyzers.iter().map(|a| a.kind()).collect::<Vec<_>>().join(", ")
        );

        Self {
            context: AnalyzerContext::new(cluster, options.namespace.clone()),
            analyzers,
            objects: options.objects.clone(),
            max_concurrency: options.max_concurrency.max(1),
            anonymize: options.anonymize,
            with_doc: options.with_doc,
            explainer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a run from configuration: the provider and cache are resolved
    /// first, then the analyzers are selected.
    pub async fn from_config(
        cluster: Arc<dyn ClusterAccess>,
        registry: &AnalyzerRegistry,
        config: &Config,
        options: &AnalysisOptions,
    ) -> Result<Self> {
        let explainer = build_explainer(config, options).await?;
        let analysis = Self::new(cluster, registry, options)?;
        Ok(match explainer {
            Some(explainer) => analysis.with_explainer(explainer),
            None => analysis,
        })
    }

    pub fn with_explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn explainer(&self) -> Option<&Explainer> {
        self.explainer.as_ref()
    }

    /// Share a cancellation signal with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn active_kinds(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    /// Run analyzers, narrow to referenced objects, then explain.
    pub async fn run(&self) -> Result<AnalysisRun> {
        let outcome = scheduler::run_analyzers(
            &self.analyzers,
            &self.context,
            self.max_concurrency,
            &self.cancel,
        )
        .await?;

        let mut results = outcome.results;
        retain_referenced(&mut results, &self.objects);

        let mut run = AnalysisRun {
            errors: outcome.failures.iter().map(|f| f.to_string()).collect(),
            cancelled: outcome.cancelled,
            anonymized: self.anonymize,
            ..Default::default()
        };

        if self.with_doc && !run.cancelled {
            if let Err(e) = attach_docs(self.context.cluster.as_ref(), &mut results, &self.cancel).await {
                log::warn!("Kubernetes documentation unavailable: {}", e);
                run.errors.push(format!("Kubernetes documentation unavailable: {}", e));
            }
        }

        if let Some(explainer) = &self.explainer {
            run.provider = Some(explainer.provider_name().to_string());
            if !run.cancelled && !results.is_empty() {
                let errors = explainer.explain_all(&mut results, &self.cancel).await;
                run.errors.extend(errors);
                run.cancelled = self.cancel.is_cancelled();
            }
        }

        run.results = results;
        log::info!(
            "Analysis finished: {} result(s), {} problem(s)",
            run.results.len(),
            run.problem_count()
        );
        Ok(run)
    }
}

/// Attach schema documentation to every failure: the named field, or the
/// kind itself when no field is named. Each (kind, field) is looked up once;
/// the first cluster error stops the stage and keeps what was attached.
async fn attach_docs(
    cluster: &dyn ClusterAccess,
    results: &mut [AnalysisResult],
    cancel: &CancellationToken,
) -> std::result::Result<(), ClusterAccessError> {
    let mut seen: HashMap<(String, String), Option<String>> = HashMap::new();

    for result in results.iter_mut() {
        for failure in result.failures.iter_mut() {
            let key = (result.kind.clone(), failure.field.clone().unwrap_or_default());
            let doc = match seen.get(&key) {
                Some(doc) => doc.clone(),
                None => {
                    let doc = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(()),
                        doc = cluster.field_doc(&key.0, &key.1) => doc?,
                    };
                    seen.insert(key, doc.clone());
                    doc
                }
            };
            failure.kubernetes_doc = doc;
        }
    }
    Ok(())
}
