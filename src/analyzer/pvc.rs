//! PersistentVolumeClaim analyzer: pending claims whose provisioning failed.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;

pub struct PvcAnalyzer;

#[async_trait]
impl Analyzer for PvcAnalyzer {
    fn kind(&self) -> &'static str {
        "PersistentVolumeClaim"
    }

    fn description(&self) -> &'static str {
        "Pending claims with failed provisioning"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let claims = ctx.cluster.list_persistent_volume_claims(ctx.namespace()).await?;
        let mut results = Vec::new();

        for pvc in &claims {
            let pending = pvc
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .is_some_and(|p| p == "Pending");
            if !pending {
                continue;
            }

            let namespace = pvc.metadata.namespace.as_deref().unwrap_or_default();
            let name = pvc.metadata.name.as_deref().unwrap_or_default();

            let mut failures = Vec::new();
            if let Some((reason, message)) = ctx.latest_event_reason(namespace, name).await {
                if reason == "ProvisioningFailed" && !message.is_empty() {
                    failures.push(
                        Failure::with_sensitive(message, &[namespace, name])
                            .on_field("spec.storageClassName"),
                    );
                }
            }

            let key = object_key(Some(namespace), Some(name));
            if let Some(result) = AnalysisResult::new(self.kind(), key, failures) {
                results.push(result);
            }
        }

        Ok(results)
    }
}
