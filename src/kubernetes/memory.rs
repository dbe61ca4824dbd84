//! In-memory cluster used by tests and dry runs.

use super::{ApiDocs, ClusterAccess, most_recent};
use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, PersistentVolumeClaim, Pod, Secret, Service,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::ResourceExt;

/// A fixed set of objects answering [`ClusterAccess`] calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    pub pods: Vec<Pod>,
    pub replica_sets: Vec<ReplicaSet>,
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    pub services: Vec<Service>,
    pub endpoints: Vec<Endpoints>,
    pub ingresses: Vec<Ingress>,
    pub ingress_classes: Vec<IngressClass>,
    pub secrets: Vec<Secret>,
    pub pod_disruption_budgets: Vec<PodDisruptionBudget>,
    pub events: Vec<Event>,
    pub api_docs: ApiDocs,
    /// Every call fails with [`ClusterAccessError::Unavailable`]
    pub offline: bool,
}

impl InMemoryCluster {
    fn reachable(&self) -> Result<(), ClusterAccessError> {
        if self.offline {
            return Err(ClusterAccessError::Unavailable("cluster is offline".to_string()));
        }
        Ok(())
    }
}

fn in_namespace<K: ResourceExt + Clone>(items: &[K], namespace: Option<&str>) -> Vec<K> {
    items
        .iter()
        .filter(|o| namespace.is_none() || o.namespace().as_deref() == namespace)
        .cloned()
        .collect()
}

fn find<K: ResourceExt + Clone>(items: &[K], namespace: &str, name: &str) -> Option<K> {
    items
        .iter()
        .find(|o| o.namespace().as_deref() == Some(namespace) && o.name_any() == name)
        .cloned()
}

#[async_trait]
impl ClusterAccess for InMemoryCluster {
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.pods, namespace))
    }

    async fn list_replica_sets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ReplicaSet>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.replica_sets, namespace))
    }

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaSet>, ClusterAccessError> {
        self.reachable()?;
        Ok(find(&self.replica_sets, namespace, name))
    }

    async fn list_persistent_volume_claims(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PersistentVolumeClaim>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.persistent_volume_claims, namespace))
    }

    async fn list_services(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Service>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.services, namespace))
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterAccessError> {
        self.reachable()?;
        Ok(find(&self.services, namespace, name))
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, ClusterAccessError> {
        self.reachable()?;
        Ok(find(&self.endpoints, namespace, name))
    }

    async fn list_ingresses(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Ingress>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.ingresses, namespace))
    }

    async fn get_ingress_class(
        &self,
        name: &str,
    ) -> Result<Option<IngressClass>, ClusterAccessError> {
        self.reachable()?;
        Ok(self
            .ingress_classes
            .iter()
            .find(|c| c.name_any() == name)
            .cloned())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterAccessError> {
        self.reachable()?;
        Ok(find(&self.secrets, namespace, name))
    }

    async fn list_pod_disruption_budgets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PodDisruptionBudget>, ClusterAccessError> {
        self.reachable()?;
        Ok(in_namespace(&self.pod_disruption_budgets, namespace))
    }

    async fn latest_event(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Event>, ClusterAccessError> {
        self.reachable()?;
        let matching = self
            .events
            .iter()
            .filter(|e| {
                e.namespace().as_deref() == Some(namespace)
                    && e.involved_object.name.as_deref() == Some(name)
            })
            .cloned()
            .collect();
        Ok(most_recent(matching))
    }

    async fn field_doc(
        &self,
        kind: &str,
        field: &str,
    ) -> Result<Option<String>, ClusterAccessError> {
        self.reachable()?;
        Ok(self.api_docs.describe(kind, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use k8s_openapi::api::core::v1::ObjectReference;

    fn at_minute(minute: u32) -> Time {
        serde_json::from_value(serde_json::json!(format!("2024-05-01T10:{:02}:00Z", minute)))
            .unwrap()
    }

    fn event(name: &str, reason: &str, minute: u32) -> Event {
        Event {
            metadata: ObjectMeta {
                name: Some(format!("{}.{}", name, minute)),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                name: Some(name.to_string()),
                ..Default::default()
            },
            reason: Some(reason.to_string()),
            last_timestamp: Some(at_minute(minute)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn latest_event_picks_newest_for_object() {
        let cluster = InMemoryCluster {
            events: vec![
                event("web", "Scheduled", 1),
                event("web", "BackOff", 3),
                event("db", "Killing", 5),
                event("web", "Pulled", 2),
            ],
            ..Default::default()
        };

        let latest = cluster.latest_event("default", "web").await.unwrap().unwrap();
        assert_eq!(latest.reason.as_deref(), Some("BackOff"));
        assert!(cluster.latest_event("other", "web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_cluster_fails_every_call() {
        let cluster = InMemoryCluster {
            offline: true,
            ..Default::default()
        };
        assert!(matches!(
            cluster.list_pods(None).await,
            Err(ClusterAccessError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn lists_are_scoped_to_namespace() {
        let pod = |ns: &str| Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let cluster = InMemoryCluster {
            pods: vec![pod("a"), pod("b")],
            ..Default::default()
        };

        assert_eq!(cluster.list_pods(Some("a")).await.unwrap().len(), 1);
        assert_eq!(cluster.list_pods(None).await.unwrap().len(), 2);
    }
}
