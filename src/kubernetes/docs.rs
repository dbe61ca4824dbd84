//! Field documentation from the API server's OpenAPI v2 schema.
//!
//! A field path such as `spec.selector` is resolved against the definition
//! whose `x-kubernetes-group-version-kind` names the kind, following `$ref`
//! and array `items` along the way.

use serde_json::{Map, Value};

const REF_PREFIX: &str = "#/definitions/";
const MAX_INDIRECTIONS: usize = 8;

/// The `definitions` section of an OpenAPI v2 document.
#[derive(Debug, Clone, Default)]
pub struct ApiDocs {
    definitions: Map<String, Value>,
}

impl ApiDocs {
    /// Index a full `/openapi/v2` document. Anything without a
    /// `definitions` object yields an empty index.
    pub fn from_schema(mut schema: Value) -> Self {
        let definitions = match schema.get_mut("definitions").map(Value::take) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self { definitions }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Description of `path` on `kind`; an empty path describes the kind.
    pub fn describe(&self, kind: &str, path: &str) -> Option<String> {
        let mut node = self.definition(kind)?;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = self.resolve(node)?.get("properties")?.get(segment)?;
        }

        node.get("description")
            .or_else(|| self.resolve(node)?.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Stable definitions win over alpha and beta ones.
    fn definition(&self, kind: &str) -> Option<&Value> {
        self.definitions
            .iter()
            .filter(|(_, def)| declares_kind(def, kind))
            .min_by_key(|(id, _)| (id.contains("alpha") || id.contains("beta"), *id))
            .map(|(_, def)| def)
    }

    fn resolve<'a>(&'a self, mut node: &'a Value) -> Option<&'a Value> {
        for _ in 0..MAX_INDIRECTIONS {
            if let Some(items) = node.get("items") {
                node = items;
            } else if let Some(target) = node.get("$ref").and_then(Value::as_str) {
                node = self.definitions.get(target.strip_prefix(REF_PREFIX)?)?;
            } else {
                return Some(node);
            }
        }
        None
    }
}

fn declares_kind(definition: &Value, kind: &str) -> bool {
    definition
        .get("x-kubernetes-group-version-kind")
        .and_then(Value::as_array)
        .is_some_and(|gvks| gvks.iter().any(|gvk| gvk.get("kind").and_then(Value::as_str) == Some(kind)))
}
