//! Bounded fan-out over the active analyzers.

use crate::analyzer::{Analyzer, AnalyzerContext, AnalysisResult};
use crate::error::{ClusterAccessError, KubesageError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A failed analyzer invocation, attributed to its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerFailure {
    pub kind: String,
    pub error: String,
}

impl std::fmt::Display for AnalyzerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

/// Merged output of one scheduler pass.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Each analyzer's results stay contiguous and in emission order;
    /// analyzers appear in completion order.
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<AnalyzerFailure>,
    pub cancelled: bool,
}

/// Run every analyzer once with at most `max_concurrency` in flight.
///
/// Fails with [`KubesageError::NoAnalyzers`] on an empty set, and with
/// [`KubesageError::AllAnalyzersFailed`] when nothing succeeded. On
/// cancellation the results of analyzers that already finished are kept.
pub async fn run_analyzers(
    analyzers: &[Arc<dyn Analyzer>],
    ctx: &AnalyzerContext,
    max_concurrency: usize,
    cancel: &CancellationToken,
) -> Result<ScheduleOutcome, KubesageError> {
    if analyzers.is_empty() {
        return Err(KubesageError::NoAnalyzers);
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut kinds = HashMap::new();
    let mut outcome = ScheduleOutcome::default();

    for (index, analyzer) in analyzers.iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            outcome.cancelled = true;
            for skipped in &analyzers[index..] {
                outcome.failures.push(AnalyzerFailure {
                    kind: skipped.kind().to_string(),
                    error: "cancelled before start".to_string(),
                });
            }
            break;
        };

        let analyzer = Arc::clone(analyzer);
        let ctx = ctx.clone();
        let cancel = cancel.clone();
        let kind = analyzer.kind();
        log::debug!("Starting {} analyzer", kind);

        let handle = tasks.spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => Err(ClusterAccessError::Cancelled),
                results = analyzer.analyze(&ctx) => results,
            }
        });
        kinds.insert(handle.id(), kind);
    }

    // Single collector: one merge per completed analyzer
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, Ok(results))) => {
                log::debug!(
                    "{} analyzer finished with {} result(s)",
                    kinds.get(&id).copied().unwrap_or("unknown"),
                    results.len()
                );
                outcome.results.extend(results);
            }
            Ok((id, Err(e))) => {
                let kind = kinds.get(&id).copied().unwrap_or("unknown");
                if matches!(e, ClusterAccessError::Cancelled) {
                    outcome.cancelled = true;
                } else {
                    log::warn!("{} analyzer failed: {}", kind, e);
                }
                outcome.failures.push(AnalyzerFailure {
                    kind: kind.to_string(),
                    error: e.to_string(),
                });
            }
            Err(join_error) => {
                let kind = kinds.get(&join_error.id()).copied().unwrap_or("unknown");
                log::warn!("{} analyzer aborted: {}", kind, join_error);
                outcome.failures.push(AnalyzerFailure {
                    kind: kind.to_string(),
                    error: join_error.to_string(),
                });
            }
        }
    }

    if !outcome.cancelled && outcome.failures.len() == analyzers.len() {
        return Err(KubesageError::AllAnalyzersFailed {
            count: analyzers.len(),
            first: outcome.failures[0].to_string(),
        });
    }

    Ok(outcome)
}
