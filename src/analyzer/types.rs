//! Core types produced by analyzers.
//!
//! - `Sensitive` - a literal substring of a failure text and its mask token
//! - `Failure` - one concrete problem found on an object
//! - `AnalysisResult` - all failures found on one object

use crate::masking;
use serde::{Deserialize, Serialize};

/// A literal value that must be tokenized before it leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sensitive {
    pub unmasked: String,
    pub masked: String,
}

impl Sensitive {
    /// Pair a value with its deterministic mask token.
    pub fn new(value: impl Into<String>) -> Self {
        let unmasked = value.into();
        let masked = masking::mask_token(&unmasked);
        Self { unmasked, masked }
    }
}

/// One concrete problem found on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable text; may embed the values listed in `sensitive`
    pub text: String,
    /// Every literal in `text` that must be masked
    #[serde(default)]
    pub sensitive: Vec<Sensitive>,
    /// Dotted path of the field at fault, e.g. `spec.selector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Schema documentation for `field`, attached on request
    #[serde(rename = "kubernetesDoc", default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_doc: Option<String>,
}

impl Failure {
    /// A failure with nothing to mask.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sensitive: Vec::new(),
            field: None,
            kubernetes_doc: None,
        }
    }

    /// A failure whose text embeds the given sensitive values.
    ///
    /// Values that are empty or do not occur in `text` are not recorded.
    pub fn with_sensitive<S: AsRef<str>>(text: impl Into<String>, values: &[S]) -> Self {
        let text = text.into();
        let sensitive = values
            .iter()
            .map(|v| v.as_ref())
            .filter(|v| !v.is_empty() && text.contains(v))
            .map(Sensitive::new)
            .collect();
        Self {
            text,
            sensitive,
            field: None,
            kubernetes_doc: None,
        }
    }

    /// Name the field at fault.
    pub fn on_field(mut self, path: impl Into<String>) -> Self {
        self.field = Some(path.into());
        self
    }
}

/// One object-level finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Resource kind, e.g. "Pod"
    pub kind: String,
    /// `namespace/name`, unique per kind within one run
    pub name: String,
    /// Never empty
    #[serde(rename = "error")]
    pub failures: Vec<Failure>,
    /// Natural-language explanation, set by the explanation stage
    #[serde(rename = "details", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Owning object as `Kind/name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_object: Option<String>,
    /// Why the explanation is missing, when the provider call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_error: Option<String>,
}

impl AnalysisResult {
    /// Build a result; returns `None` when there are no failures.
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        failures: Vec<Failure>,
    ) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        Some(Self {
            kind: kind.into(),
            name: name.into(),
            failures,
            explanation: None,
            parent_object: None,
            explanation_error: None,
        })
    }

    /// Attach the owning object.
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent_object = parent;
        self
    }

    /// Namespace part of `name`, if namespaced.
    pub fn namespace(&self) -> Option<&str> {
        self.name.split_once('/').map(|(ns, _)| ns)
    }

    /// Object name without the namespace.
    pub fn object_name(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.name)
    }

    /// All sensitive pairs across failures, in failure order.
    pub fn sensitive(&self) -> impl Iterator<Item = &Sensitive> {
        self.failures.iter().flat_map(|f| f.sensitive.iter())
    }
}

/// Compose the `namespace/name` key used for result names.
pub fn object_key(namespace: Option<&str>, name: Option<&str>) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name.unwrap_or_default())
}
