//! Analyzers: one rule set per resource kind.
//!
//! Every analyzer implements [`Analyzer`] and only sees the cluster through
//! [`ClusterAccess`]. The [`AnalyzerRegistry`] enumerates the built-in
//! analyzers and narrows them to the active set for a run.

pub mod ingress;
pub mod pdb;
pub mod pod;
pub mod pvc;
pub mod replicaset;
pub mod service;
pub mod types;

use crate::error::ClusterAccessError;
use crate::kubernetes::ClusterAccess;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use types::{AnalysisResult, Failure, Sensitive};

/// A rule set for one resource kind.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Resource kind this analyzer inspects, e.g. "Pod".
    fn kind(&self) -> &'static str;

    /// One-line description shown by `filters list`.
    fn description(&self) -> &'static str {
        ""
    }

    /// Inspect the cluster and return one result per broken object, in list order.
    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError>;
}

/// Read-only state shared by every analyzer in a run.
#[derive(Clone)]
pub struct AnalyzerContext {
    pub cluster: Arc<dyn ClusterAccess>,
    /// `None` analyzes every namespace
    pub namespace: Option<String>,
}

impl AnalyzerContext {
    pub fn new(cluster: Arc<dyn ClusterAccess>, namespace: Option<String>) -> Self {
        Self { cluster, namespace }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Reason and message of the most recent event for `namespace/name`.
    ///
    /// Event lookups are advisory: errors are logged and treated as "no event".
    pub async fn latest_event_reason(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<(String, String)> {
        match self.cluster.latest_event(namespace, name).await {
            Ok(Some(event)) => Some((
                event.reason.unwrap_or_default(),
                event.message.unwrap_or_default(),
            )),
            Ok(None) => None,
            Err(e) => {
                log::debug!("Event lookup for {}/{} failed: {}", namespace, name, e);
                None
            }
        }
    }

    /// Owning object of `meta` as `Kind/name`.
    ///
    /// A ReplicaSet owner is followed one level up so pods of a Deployment
    /// report the Deployment.
    pub async fn parent_of(&self, meta: &ObjectMeta) -> Option<String> {
        let owner = meta.owner_references.as_ref()?.first()?;

        if owner.kind == "ReplicaSet" {
            if let Some(namespace) = meta.namespace.as_deref() {
                match self.cluster.get_replica_set(namespace, &owner.name).await {
                    Ok(Some(rs)) => {
                        if let Some(rs_owner) =
                            rs.metadata.owner_references.as_ref().and_then(|o| o.first())
                        {
                            return Some(format!("{}/{}", rs_owner.kind, rs_owner.name));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::debug!("Parent lookup for {} failed: {}", owner.name, e),
                }
            }
        }

        Some(format!("{}/{}", owner.kind, owner.name))
    }
}

/// Reference to a specific object: `[Kind/][namespace/]name`.
///
/// With two segments the first is read as a kind when it starts with an
/// uppercase letter (kinds are PascalCase, namespaces are DNS labels).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    /// Whether `result` is the referenced object.
    pub fn matches(&self, result: &AnalysisResult) -> bool {
        if let Some(kind) = &self.kind {
            if !kind.eq_ignore_ascii_case(&result.kind) {
                return false;
            }
        }
        if let Some(namespace) = &self.namespace {
            if result.namespace() != Some(namespace.as_str()) {
                return false;
            }
        }
        result.object_name() == self.name
    }
}

impl FromStr for ObjectRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(format!("invalid object reference '{}'", s));
        }

        match parts.as_slice() {
            [name] => Ok(Self {
                kind: None,
                namespace: None,
                name: name.to_string(),
            }),
            [first, name] if first.starts_with(|c: char| c.is_ascii_uppercase()) => Ok(Self {
                kind: Some(first.to_string()),
                namespace: None,
                name: name.to_string(),
            }),
            [namespace, name] => Ok(Self {
                kind: None,
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            }),
            [kind, namespace, name] => Ok(Self {
                kind: Some(kind.to_string()),
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            }),
            _ => Err(format!(
                "invalid object reference '{}', expected [Kind/][namespace/]name",
                s
            )),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = &self.kind {
            write!(f, "{}/", kind)?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, "{}/", namespace)?;
        }
        write!(f, "{}", self.name)
    }
}

/// Keep only results matching at least one reference. No references keeps everything.
pub fn retain_referenced(results: &mut Vec<AnalysisResult>, objects: &[ObjectRef]) {
    if objects.is_empty() {
        return;
    }
    results.retain(|r| objects.iter().any(|o| o.matches(r)));
}

/// The set of analyzers known to this build.
#[derive(Clone)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// Registry with every built-in analyzer.
    pub fn builtin() -> Self {
        Self::with(vec![
            Arc::new(pod::PodAnalyzer),
            Arc::new(replicaset::ReplicaSetAnalyzer),
            Arc::new(pvc::PvcAnalyzer),
            Arc::new(service::ServiceAnalyzer),
            Arc::new(ingress::IngressAnalyzer),
            Arc::new(pdb::PdbAnalyzer),
        ])
    }

    pub fn with(analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    /// Kinds of all registered analyzers, in registration order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    /// Canonical kind for a filter name, if any analyzer matches it.
    pub fn canonical_kind(&self, name: &str) -> Option<&'static str> {
        self.analyzers
            .iter()
            .map(|a| a.kind())
            .find(|k| k.eq_ignore_ascii_case(name))
    }

    /// Narrow the registry to the active set.
    ///
    /// A non-empty `filters` keeps analyzers whose kind matches a filter name.
    /// Object references that name a kind further keep only those kinds.
    pub fn select(&self, filters: &[String], objects: &[ObjectRef]) -> Vec<Arc<dyn Analyzer>> {
        for name in filters {
            if self.canonical_kind(name).is_none() {
                log::warn!("Unknown analyzer filter '{}' ignored", name);
            }
        }

        let referenced_kinds: Vec<&str> =
            objects.iter().filter_map(|o| o.kind.as_deref()).collect();
        let all_refs_have_kind = !objects.is_empty() && referenced_kinds.len() == objects.len();

        self.analyzers
            .iter()
            .filter(|a| filters.is_empty() || filters.iter().any(|f| f.eq_ignore_ascii_case(a.kind())))
            .filter(|a| {
                !all_refs_have_kind || referenced_kinds.iter().any(|k| k.eq_ignore_ascii_case(a.kind()))
            })
            .cloned()
            .collect()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
