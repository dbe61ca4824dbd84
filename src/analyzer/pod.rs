//! Pod analyzer: unschedulable pods, crash loops, image pull failures and
//! stuck sandbox creation.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

const WAITING_FAILURES: &[&str] = &["CrashLoopBackOff", "ImagePullBackOff", "ErrImagePull"];
const WAITING_FIELD: &str = "status.containerStatuses.state.waiting";

pub struct PodAnalyzer;

#[async_trait]
impl Analyzer for PodAnalyzer {
    fn kind(&self) -> &'static str {
        "Pod"
    }

    fn description(&self) -> &'static str {
        "Unschedulable, crash-looping and image-pull failures"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let pods = ctx.cluster.list_pods(ctx.namespace()).await?;
        let mut results = Vec::new();

        for pod in &pods {
            let failures = pod_failures(ctx, pod).await;
            let name = object_key(pod.metadata.namespace.as_deref(), pod.metadata.name.as_deref());
            if let Some(result) = AnalysisResult::new(self.kind(), name, failures) {
                let parent = ctx.parent_of(&pod.metadata).await;
                results.push(result.with_parent(parent));
            }
        }

        Ok(results)
    }
}

async fn pod_failures(ctx: &AnalyzerContext, pod: &Pod) -> Vec<Failure> {
    let mut failures = Vec::new();
    let Some(status) = &pod.status else {
        return failures;
    };
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    let mask = [namespace, name];
    let pending = status.phase.as_deref() == Some("Pending");

    if pending {
        for condition in status.conditions.iter().flatten() {
            if condition.type_ == "PodScheduled"
                && condition.reason.as_deref() == Some("Unschedulable")
            {
                if let Some(message) = condition.message.as_deref().filter(|m| !m.is_empty()) {
                    failures.push(Failure::with_sensitive(message, &mask).on_field("status.conditions"));
                }
            }
        }
    }

    for container in status.container_statuses.iter().flatten() {
        let Some(waiting) = container.state.as_ref().and_then(|s| s.waiting.as_ref()) else {
            continue;
        };
        let reason = waiting.reason.as_deref().unwrap_or_default();

        if WAITING_FAILURES.contains(&reason) {
            if let Some(message) = waiting.message.as_deref().filter(|m| !m.is_empty()) {
                failures.push(Failure::with_sensitive(message, &mask).on_field(WAITING_FIELD));
            }
        } else if reason == "ContainerCreating" && pending {
            if let Some((event_reason, message)) = ctx.latest_event_reason(namespace, name).await {
                if event_reason == "FailedCreatePodSandBox" && !message.is_empty() {
                    failures.push(Failure::with_sensitive(message, &mask).on_field(WAITING_FIELD));
                }
            }
        }
    }

    failures
}
