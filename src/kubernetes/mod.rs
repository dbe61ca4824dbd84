//! Cluster access for analyzers.
//!
//! Analyzers depend only on the [`ClusterAccess`] capability, never on a
//! transport. [`KubeCluster`] is the live implementation backed by `kube`;
//! tests provide in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use kubesage::kubernetes::{ClusterAccess, KubeCluster};
//!
//! let cluster = KubeCluster::connect(None, Some("staging")).await?;
//! let pods = cluster.list_pods(Some("default")).await?;
//! ```

pub mod docs;
pub mod memory;

pub use docs::ApiDocs;
pub use memory::InMemoryCluster;

use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, PersistentVolumeClaim, Pod, Secret, Service,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::{
    Client, Config,
    api::{Api, ListParams},
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Read-only list/get operations the analyzers need.
///
/// `namespace = None` means cluster-wide. Lookups return `Ok(None)` when the
/// object does not exist.
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterAccessError>;

    async fn list_replica_sets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ReplicaSet>, ClusterAccessError>;

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaSet>, ClusterAccessError>;

    async fn list_persistent_volume_claims(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PersistentVolumeClaim>, ClusterAccessError>;

    async fn list_services(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Service>, ClusterAccessError>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterAccessError>;

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, ClusterAccessError>;

    async fn list_ingresses(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Ingress>, ClusterAccessError>;

    async fn get_ingress_class(
        &self,
        name: &str,
    ) -> Result<Option<IngressClass>, ClusterAccessError>;

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterAccessError>;

    async fn list_pod_disruption_budgets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PodDisruptionBudget>, ClusterAccessError>;

    /// Most recent event whose involved object is `namespace/name`.
    async fn latest_event(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Event>, ClusterAccessError>;

    /// Schema documentation of `field` (a dotted path such as
    /// `spec.selector`) on `kind`. An empty field describes the kind.
    async fn field_doc(
        &self,
        kind: &str,
        field: &str,
    ) -> Result<Option<String>, ClusterAccessError>;
}

/// Live cluster backed by a `kube` client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    /// Fetched on first use, at most once
    docs: Arc<OnceCell<ApiDocs>>,
}

impl KubeCluster {
    /// Connect using an explicit kubeconfig and/or context, or the inferred
    /// config (in-cluster, `KUBECONFIG`, `~/.kube/config`) when neither is set.
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
    ) -> Result<Self, ClusterAccessError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = match (kubeconfig, context) {
            (None, None) => Config::infer().await?,
            (path, context) => {
                let kubeconfig = match path {
                    Some(p) => kube::config::Kubeconfig::read_from(p)?,
                    None => kube::config::Kubeconfig::read()?,
                };
                Config::from_custom_kubeconfig(
                    kubeconfig,
                    &kube::config::KubeConfigOptions {
                        context: context.map(str::to_string),
                        ..Default::default()
                    },
                )
                .await?
            }
        };

        let client = Client::try_from(config)?;
        log::debug!("Connected to Kubernetes API");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            docs: Arc::new(OnceCell::new()),
        }
    }

    /// The API server's OpenAPI v2 document, indexed.
    async fn api_docs(&self) -> Result<&ApiDocs, ClusterAccessError> {
        self.docs
            .get_or_try_init(|| async {
                let request = http::Request::builder()
                    .method("GET")
                    .uri("/openapi/v2")
                    .body(Vec::new())
                    .map_err(|e| {
                        ClusterAccessError::Unavailable(format!("Failed to build request: {}", e))
                    })?;
                let schema = self.client.request::<serde_json::Value>(request).await?;
                let docs = ApiDocs::from_schema(schema);
                log::debug!("Loaded OpenAPI schema (empty: {})", docs.is_empty());
                Ok::<_, ClusterAccessError>(docs)
            })
            .await
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list<K>(&self, namespace: Option<&str>) -> Result<Vec<K>, ClusterAccessError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let list = self.scoped::<K>(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterAccessError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        Ok(self.scoped::<K>(Some(namespace)).get_opt(name).await?)
    }
}

#[async_trait]
impl ClusterAccess for KubeCluster {
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn list_replica_sets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ReplicaSet>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaSet>, ClusterAccessError> {
        self.get(namespace, name).await
    }

    async fn list_persistent_volume_claims(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PersistentVolumeClaim>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn list_services(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Service>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterAccessError> {
        self.get(namespace, name).await
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, ClusterAccessError> {
        self.get(namespace, name).await
    }

    async fn list_ingresses(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Ingress>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn get_ingress_class(
        &self,
        name: &str,
    ) -> Result<Option<IngressClass>, ClusterAccessError> {
        let classes: Api<IngressClass> = Api::all(self.client.clone());
        Ok(classes.get_opt(name).await?)
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterAccessError> {
        self.get(namespace, name).await
    }

    async fn list_pod_disruption_budgets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PodDisruptionBudget>, ClusterAccessError> {
        self.list(namespace).await
    }

    async fn latest_event(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Event>, ClusterAccessError> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&format!("involvedObject.name={}", name));
        let list = events.list(&params).await?;
        Ok(most_recent(list.items))
    }

    async fn field_doc(
        &self,
        kind: &str,
        field: &str,
    ) -> Result<Option<String>, ClusterAccessError> {
        Ok(self.api_docs().await?.describe(kind, field))
    }
}

/// Pick the event with the latest `lastTimestamp`.
pub fn most_recent(events: Vec<Event>) -> Option<Event> {
    events
        .into_iter()
        .max_by(|a, b| a.last_timestamp.cmp(&b.last_timestamp))
}
