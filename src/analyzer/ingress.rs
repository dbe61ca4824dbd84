//! Ingress analyzer: dangling class, backend service and TLS secret references.

use super::types::{AnalysisResult, Failure, object_key};
use super::{Analyzer, AnalyzerContext};
use crate::error::ClusterAccessError;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;

const CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

pub struct IngressAnalyzer;

#[async_trait]
impl Analyzer for IngressAnalyzer {
    fn kind(&self) -> &'static str {
        "Ingress"
    }

    fn description(&self) -> &'static str {
        "Missing ingress classes, backend services and TLS secrets"
    }

    async fn analyze(
        &self,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<AnalysisResult>, ClusterAccessError> {
        let ingresses = ctx.cluster.list_ingresses(ctx.namespace()).await?;
        let mut results = Vec::new();

        for ing in &ingresses {
            let failures = ingress_failures(ctx, ing).await?;
            let name = object_key(ing.metadata.namespace.as_deref(), ing.metadata.name.as_deref());
            if let Some(result) = AnalysisResult::new(self.kind(), name, failures) {
                results.push(result);
            }
        }

        Ok(results)
    }
}

async fn ingress_failures(
    ctx: &AnalyzerContext,
    ing: &Ingress,
) -> Result<Vec<Failure>, ClusterAccessError> {
    let mut failures = Vec::new();
    let namespace = ing.metadata.namespace.as_deref().unwrap_or_default();
    let name = ing.metadata.name.as_deref().unwrap_or_default();
    let spec = ing.spec.as_ref();

    let class = spec
        .and_then(|s| s.ingress_class_name.clone())
        .or_else(|| {
            ing.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(CLASS_ANNOTATION))
                .filter(|v| !v.is_empty())
                .cloned()
        });

    match class {
        None => failures.push(Failure::with_sensitive(
            format!("Ingress {}/{} does not specify an Ingress class.", namespace, name),
            &[namespace, name],
        )
        .on_field("spec.ingressClassName")),
        Some(class) => {
            if ctx.cluster.get_ingress_class(&class).await?.is_none() {
                failures.push(Failure::with_sensitive(
                    format!("Ingress uses the ingress class {} which does not exist.", class),
                    &[&class],
                )
                .on_field("spec.ingressClassName"));
            }
        }
    }

    let backends = spec
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter())
        .filter_map(|path| path.backend.service.as_ref())
        .map(|svc| svc.name.as_str());

    for service in backends {
        if ctx.cluster.get_service(namespace, service).await?.is_none() {
            failures.push(Failure::with_sensitive(
                format!("Ingress uses the service {}/{} which does not exist.", namespace, service),
                &[namespace, service],
            )
            .on_field("spec.rules.http.paths.backend.service"));
        }
    }

    let secrets = spec
        .and_then(|s| s.tls.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|tls| tls.secret_name.as_deref());

    for secret in secrets {
        if ctx.cluster.get_secret(namespace, secret).await?.is_none() {
            failures.push(Failure::with_sensitive(
                format!(
                    "Ingress uses the secret {}/{} as a TLS certificate which does not exist.",
                    namespace, secret
                ),
                &[namespace, secret],
            )
            .on_field("spec.tls.secretName"));
        }
    }

    Ok(failures)
}
