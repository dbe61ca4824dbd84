//! End-to-end runs through the public API against an in-memory cluster.

use async_trait::async_trait;
use kubesage::ai::AiProvider;
use kubesage::analysis::formatter::{OutputFormat, format_run};
use kubesage::analysis::{Analysis, AnalysisOptions, Explainer, Status};
use kubesage::analyzer::AnalyzerRegistry;
use kubesage::cache::{ExplanationCache, FileStore};
use kubesage::config::types::{CacheBackendConfig, Config, ProviderConfig};
use kubesage::error::{AiError, ConfigError, KubesageError};
use kubesage::kubernetes::{ApiDocs, InMemoryCluster};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn crash_looping_pod() -> serde_json::Value {
    json!({
        "metadata": {"name": "checkout-db-0", "namespace": "payments"},
        "status": {
            "phase": "Running",
            "containerStatuses": [{
                "name": "db", "image": "postgres:16", "imageID": "", "ready": false, "restartCount": 12,
                "state": {"waiting": {
                    "reason": "CrashLoopBackOff",
                    "message": "back-off 5m0s restarting failed container=db pod=checkout-db-0_payments"
                }}
            }]
        }
    })
}

fn broken_cluster() -> InMemoryCluster {
    InMemoryCluster {
        pods: vec![
            serde_json::from_value(crash_looping_pod()).unwrap(),
            serde_json::from_value(json!({
                "metadata": {"name": "web-0", "namespace": "payments"},
                "status": {"phase": "Running"}
            }))
            .unwrap(),
        ],
        services: vec![
            serde_json::from_value(json!({
                "metadata": {"name": "checkout", "namespace": "payments"},
                "spec": {"selector": {"app": "checkout"}}
            }))
            .unwrap(),
        ],
        ..Default::default()
    }
}

fn healthy_cluster() -> InMemoryCluster {
    InMemoryCluster {
        pods: vec![
            serde_json::from_value(json!({
                "metadata": {"name": "web-0", "namespace": "default"},
                "status": {"phase": "Running"}
            }))
            .unwrap(),
        ],
        ..Default::default()
    }
}

/// Records every prompt and answers by quoting it back.
#[derive(Clone, Default)]
struct QuotingProvider {
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AiProvider for QuotingProvider {
    fn name(&self) -> &str {
        "quoting"
    }

    fn language(&self) -> &str {
        "english"
    }

    fn configure(&mut self, _config: &ProviderConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("Error: {}\nSolution: restart it", prompt))
    }
}

fn noop_config(cache_path: std::path::PathBuf) -> Config {
    let mut config = Config::default();
    config.ai.upsert(ProviderConfig {
        name: "noop".to_string(),
        target_language: "english".to_string(),
        ..Default::default()
    });
    config.ai.default_provider = Some("noop".to_string());
    config.cache.backend = CacheBackendConfig::File {
        path: Some(cache_path),
    };
    config
}

#[tokio::test]
async fn healthy_cluster_reports_ok() {
    let analysis = Analysis::new(
        Arc::new(healthy_cluster()),
        &AnalyzerRegistry::builtin(),
        &AnalysisOptions::default(),
    )
    .unwrap();

    let run = analysis.run().await.unwrap();
    assert_eq!(run.status(), Status::Ok);
    assert_eq!(run.problem_count(), 0);
    assert!(run.errors.is_empty());

    let report: serde_json::Value =
        serde_json::from_str(&format_run(&run, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(report["status"], "OK");
    assert_eq!(report["problems"], 0);
    assert!(report.get("provider").is_none());
}

#[tokio::test]
async fn broken_workloads_are_counted() {
    let analysis = Analysis::new(
        Arc::new(broken_cluster()),
        &AnalyzerRegistry::builtin(),
        &AnalysisOptions {
            max_concurrency: 2,
            ..Default::default()
        },
    )
    .unwrap();

    let run = analysis.run().await.unwrap();
    assert_eq!(run.status(), Status::ProblemDetected);
    assert_eq!(run.problem_count(), 2);

    let mut names: Vec<_> = run.results.iter().map(|r| (r.kind.as_str(), r.name.as_str())).collect();
    names.sort();
    assert_eq!(
        names,
        vec![("Pod", "payments/checkout-db-0"), ("Service", "payments/checkout")]
    );

    let report: serde_json::Value =
        serde_json::from_str(&format_run(&run, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(report["problems"], 2);
    assert_eq!(report["results"][0]["kind"], "Pod");
    assert_eq!(report["results"][1]["kind"], "Service");
}

#[tokio::test]
async fn filters_and_object_references_narrow_the_run() {
    let options = AnalysisOptions {
        filters: vec!["pod".to_string(), "service".to_string()],
        objects: vec!["Service/payments/checkout".parse().unwrap()],
        ..Default::default()
    };
    let analysis =
        Analysis::new(Arc::new(broken_cluster()), &AnalyzerRegistry::builtin(), &options).unwrap();
    assert_eq!(analysis.active_kinds(), vec!["Service"]);

    let run = analysis.run().await.unwrap();
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].name, "payments/checkout");
}

#[tokio::test]
async fn unknown_provider_aborts_before_analysis() {
    let dir = tempdir().unwrap();
    let config = noop_config(dir.path().join("cache.json"));
    let options = AnalysisOptions {
        explain: true,
        backend: Some("gpt-9000".to_string()),
        ..Default::default()
    };

    let err = Analysis::from_config(
        Arc::new(broken_cluster()),
        &AnalyzerRegistry::builtin(),
        &config,
        &options,
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(
        err,
        KubesageError::Config(ConfigError::ProviderNotConfigured(ref name)) if name == "gpt-9000"
    ));
}

#[tokio::test]
async fn anonymized_explanations_round_trip_through_the_file_cache() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("explanations.json");
    let provider = QuotingProvider::default();
    let options = AnalysisOptions {
        anonymize: true,
        filters: vec!["Pod".to_string()],
        ..Default::default()
    };

    for _ in 0..2 {
        let explainer = Explainer::new(
            Box::new(provider.clone()),
            ExplanationCache::new(Arc::new(FileStore::new(cache_path.clone())), false),
            true,
        );
        let analysis = Analysis::new(Arc::new(broken_cluster()), &AnalyzerRegistry::builtin(), &options)
            .unwrap()
            .with_explainer(explainer);

        let run = analysis.run().await.unwrap();
        assert!(run.anonymized);
        assert_eq!(run.provider.as_deref(), Some("quoting"));
        let explanation = run.results[0].explanation.as_deref().unwrap();
        assert!(explanation.contains("pod=checkout-db-0_payments"));
        assert!(explanation.ends_with("Solution: restart it"));
    }

    // Second run is answered from the cache
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let sent = provider.prompts.lock().unwrap()[0].clone();
    assert!(!sent.contains("payments"));
    assert!(!sent.contains("checkout-db-0"));

    let stored = std::fs::read_to_string(&cache_path).unwrap();
    assert!(!stored.contains("checkout-db-0"));
}

#[tokio::test]
async fn noop_provider_from_config_explains_every_result() {
    let dir = tempdir().unwrap();
    let config = noop_config(dir.path().join("cache.json"));
    let options = AnalysisOptions {
        explain: true,
        ..Default::default()
    };

    let analysis = Analysis::from_config(
        Arc::new(broken_cluster()),
        &AnalyzerRegistry::builtin(),
        &config,
        &options,
    )
    .await
    .unwrap();
    let run = analysis.run().await.unwrap();

    assert_eq!(run.provider.as_deref(), Some("noop"));
    assert!(run.results.iter().all(|r| {
        r.explanation
            .as_deref()
            .is_some_and(|e| e.starts_with("I am a noop response to the prompt"))
    }));
    assert!(dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn unreachable_cluster_fails_every_analyzer() {
    let cluster = InMemoryCluster {
        offline: true,
        ..Default::default()
    };
    let analysis = Analysis::new(
        Arc::new(cluster),
        &AnalyzerRegistry::builtin(),
        &AnalysisOptions::default(),
    )
    .unwrap();

    match analysis.run().await {
        Err(KubesageError::AllAnalyzersFailed { count, first }) => {
            assert_eq!(count, 6);
            assert!(first.contains("cluster is offline"));
        }
        other => panic!("expected AllAnalyzersFailed, got {:?}", other.map(|r| r.status())),
    }
}

#[tokio::test]
async fn filter_matching_nothing_is_fatal() {
    let options = AnalysisOptions {
        filters: vec!["CronJob".to_string()],
        ..Default::default()
    };
    let err = Analysis::new(Arc::new(healthy_cluster()), &AnalyzerRegistry::builtin(), &options)
        .err()
        .unwrap();
    assert!(matches!(err, KubesageError::NoAnalyzers));
}

#[tokio::test]
async fn with_doc_documents_failures_in_the_json_report() {
    let cluster = InMemoryCluster {
        api_docs: ApiDocs::from_schema(json!({
            "definitions": {
                "io.k8s.api.core.v1.Pod": {
                    "description": "Pod is a collection of containers that can run on a host.",
                    "properties": {"status": {"$ref": "#/definitions/io.k8s.api.core.v1.PodStatus"}},
                    "x-kubernetes-group-version-kind": [{"group": "", "kind": "Pod", "version": "v1"}]
                },
                "io.k8s.api.core.v1.PodStatus": {
                    "properties": {"containerStatuses": {
                        "type": "array",
                        "items": {"$ref": "#/definitions/io.k8s.api.core.v1.ContainerStatus"}
                    }}
                },
                "io.k8s.api.core.v1.ContainerStatus": {
                    "properties": {"state": {"$ref": "#/definitions/io.k8s.api.core.v1.ContainerState"}}
                },
                "io.k8s.api.core.v1.ContainerState": {
                    "properties": {"waiting": {"description": "Details about a waiting container"}}
                }
            }
        })),
        ..broken_cluster()
    };
    let options = AnalysisOptions {
        filters: vec!["Pod".to_string(), "Service".to_string()],
        with_doc: true,
        ..Default::default()
    };

    let run = Analysis::new(Arc::new(cluster), &AnalyzerRegistry::builtin(), &options)
        .unwrap()
        .run()
        .await
        .unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&format_run(&run, OutputFormat::Json).unwrap()).unwrap();

    let pod_failure = &report["results"][0]["error"][0];
    assert_eq!(pod_failure["field"], "status.containerStatuses.state.waiting");
    assert_eq!(pod_failure["kubernetesDoc"], "Details about a waiting container");
    // The schema has no Service definition
    assert!(report["results"][1]["error"][0].get("kubernetesDoc").is_none());
    assert!(run.errors.is_empty());
}
