//! ReplicaSet analyzer: replica sets that cannot create their pods.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;

pub struct ReplicaSetAnalyzer;

#[async_trait]
impl Analyzer for ReplicaSetAnalyzer {
    fn kind(&self) -> &'static str {
        "ReplicaSet"
    }

    fn description(&self) -> &'static str {
        "Replica sets failing to create pods"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let replica_sets = ctx.cluster.list_replica_sets(ctx.namespace()).await?;
        let mut results = Vec::new();

        for rs in &replica_sets {
            let Some(status) = &rs.status else { continue };
            if status.replicas != 0 {
                continue;
            }

            let failures: Vec<Failure> = status
                .conditions
                .iter()
                .flatten()
                .filter(|c| c.type_ == "ReplicaFailure" && c.reason.as_deref() == Some("FailedCreate"))
                .filter_map(|c| c.message.as_deref())
                .map(|message| {
                    Failure::with_sensitive(
                        message,
                        &[
                            rs.metadata.namespace.as_deref().unwrap_or_default(),
                            rs.metadata.name.as_deref().unwrap_or_default(),
                        ],
                    )
                    .on_field("status.conditions")
                })
                .collect();

            let name = object_key(rs.metadata.namespace.as_deref(), rs.metadata.name.as_deref());
            if let Some(result) = AnalysisResult::new(self.kind(), name, failures) {
                let parent = ctx.parent_of(&rs.metadata).await;
                results.push(result.with_parent(parent));
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::InMemoryCluster;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn reports_failed_create_only_when_no_replicas_exist() {
        let rs = |name: &str, replicas: i32| {
            serde_json::from_value(json!({
                "metadata": {
                    "name": name, "namespace": "payments",
                    "ownerReferences": [{"apiVersion": "apps/v1", "kind": "Deployment", "name": "billing", "uid": "1"}]
                },
                "status": {
                    "replicas": replicas,
                    "conditions": [{
                        "type": "ReplicaFailure", "status": "True", "reason": "FailedCreate",
                        "message": format!("pods \"{}-abc\" is forbidden: exceeded quota: compute-resources", name)
                    }]
                }
            }))
            .unwrap()
        };
        let cluster = InMemoryCluster {
            replica_sets: vec![rs("billing-1", 0), rs("billing-2", 2)],
            ..Default::default()
        };

        let ctx = AnalyzerContext::new(Arc::new(cluster), Some("payments".to_string()));
        let results = ReplicaSetAnalyzer.analyze(&ctx).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "payments/billing-1");
        assert_eq!(results[0].parent_object.as_deref(), Some("Deployment/billing"));
        assert_eq!(results[0].failures[0].sensitive[0].unmasked, "billing-1");
    }
}
