//! PodDisruptionBudget analyzer: budgets whose selector matches no pods.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

pub struct PdbAnalyzer;

#[async_trait]
impl Analyzer for PdbAnalyzer {
    fn kind(&self) -> &'static str {
        "PodDisruptionBudget"
    }

    fn description(&self) -> &'static str {
        "Budgets whose selector matches no pods"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let budgets = ctx.cluster.list_pod_disruption_budgets(ctx.namespace()).await?;
        let mut results = Vec::new();

        for pdb in &budgets {
            let namespace = pdb.metadata.namespace.as_deref().unwrap_or_default();
            let name = pdb.metadata.name.as_deref().unwrap_or_default();

            let Some((reason, message)) = ctx.latest_event_reason(namespace, name).await else {
                continue;
            };
            if reason != "NoPods" || message.is_empty() {
                continue;
            }

            let selector = pdb.spec.as_ref().and_then(|s| s.selector.as_ref());
            let failures = selector_failures(&message, selector);

            if let Some(result) =
                AnalysisResult::new(self.kind(), object_key(Some(namespace), Some(name)), failures)
            {
                results.push(result);
            }
        }

        Ok(results)
    }
}

fn selector_failures(message: &str, selector: Option<&LabelSelector>) -> Vec<Failure> {
    let Some(selector) = selector else {
        return vec![Failure::new(format!("{}, selector is nil", message)).on_field("spec.selector")];
    };

    let labels = selector.match_labels.iter().flatten().map(|(key, value)| {
        Failure::with_sensitive(
            format!("{}, expected label {}={}", message, key, value),
            &[key, value],
        )
        .on_field("spec.selector.matchLabels")
    });

    let expressions = selector
        .match_expressions
        .iter()
        .flatten()
        .map(|expr| {
            Failure::new(format!("{}, expected expression {}", message, describe(expr)))
                .on_field("spec.selector.matchExpressions")
        });

    labels.chain(expressions).collect()
}

fn describe(expr: &LabelSelectorRequirement) -> String {
    match expr.values.as_deref() {
        Some(values) if !values.is_empty() => {
            format!("{} {} ({})", expr.key, expr.operator, values.join(", "))
        }
        _ => format!("{} {}", expr.key, expr.operator),
    }
}
