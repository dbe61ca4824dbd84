//! Service analyzer: selectors that match no endpoints, and endpoints that
//! are not ready.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Endpoints;
use std::collections::BTreeMap;

pub struct ServiceAnalyzer;

#[async_trait]
impl Analyzer for ServiceAnalyzer {
    fn kind(&self) -> &'static str {
        "Service"
    }

    fn description(&self) -> &'static str {
        "Services without ready endpoints"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let services = ctx.cluster.list_services(ctx.namespace()).await?;
        let mut results = Vec::new();

        for svc in &services {
            let Some(selector) = svc
                .spec
                .as_ref()
                .and_then(|s| s.selector.as_ref())
                .filter(|s| !s.is_empty())
            else {
                // No selector: endpoints are managed by hand
                continue;
            };

            let namespace = svc.metadata.namespace.as_deref().unwrap_or_default();
            let name = svc.metadata.name.as_deref().unwrap_or_default();
            let endpoints = ctx.cluster.get_endpoints(namespace, name).await?;

            let failures = endpoint_failures(endpoints.as_ref(), selector);
            if let Some(result) = AnalysisResult::new(self.kind(), object_key(Some(namespace), Some(name)), failures) {
                results.push(result);
            }
        }

        Ok(results)
    }
}

fn endpoint_failures(endpoints: Option<&Endpoints>, selector: &BTreeMap<String, String>) -> Vec<Failure> {
    let subsets = endpoints
        .and_then(|e| e.subsets.as_deref())
        .unwrap_or_default();

    if subsets.is_empty() {
        return selector
            .iter()
            .map(|(key, value)| {
                Failure::with_sensitive(
                    format!("Service has no endpoints, expected label {}={}", key, value),
                    &[key, value],
                )
                .on_field("spec.selector")
            })
            .collect();
    }

    let not_ready: Vec<&str> = subsets
        .iter()
        .flat_map(|s| s.not_ready_addresses.iter().flatten())
        .filter_map(|a| a.target_ref.as_ref().and_then(|r| r.name.as_deref()))
        .collect();

    if not_ready.is_empty() {
        return Vec::new();
    }

    let pods: Vec<String> = not_ready.iter().map(|p| format!("Pod/{}", p)).collect();
    vec![Failure::with_sensitive(
        format!(
            "Service has not ready endpoints, pods: [{}], expected {}",
            pods.join(", "),
            not_ready.len()
        ),
        &not_ready,
    )
    .on_field("spec.selector")]
}
