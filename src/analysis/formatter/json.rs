//! JSON formatter.

use super::sorted;
use crate::analysis::{AnalysisRun, Status};
use crate::analyzer::AnalysisResult;
use crate::error::KubesageError;
use serde::{Deserialize, Serialize};

/// Format a run as a JSON document.
pub fn format(run: &AnalysisRun) -> crate::Result<String> {
    render(&JsonOutput::from(run))
}

fn render<T: Serialize>(value: &T) -> crate::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| KubesageError::Output(e.to_string()))
}

/// The structured report.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub status: Status,
    pub problems: usize,
    #[serde(default)]
    pub anonymized: bool,
    pub results: Vec<AnalysisResult>,
}

impl From<&AnalysisRun> for JsonOutput {
    fn from(run: &AnalysisRun) -> Self {
        Self {
            provider: run.provider.clone(),
            errors: run.errors.clone(),
            status: run.status(),
            problems: run.problem_count(),
            anonymized: run.anonymized,
            results: sorted(&run.results).into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Failure;

    #[test]
    fn empty_run_is_ok_with_zero_problems() {
        let parsed: JsonOutput = serde_json::from_str(&format(&AnalysisRun::default()).unwrap()).unwrap();
        assert_eq!(parsed.status, Status::Ok);
        assert_eq!(parsed.problems, 0);
        assert!(parsed.results.is_empty());
        assert!(parsed.provider.is_none());
    }

    #[test]
    fn one_result_with_two_failures() {
        let run = AnalysisRun {
            results: vec![
                AnalysisResult::new(
                    "Ingress",
                    "shop/storefront",
                    vec![
                        Failure::with_sensitive("Ingress uses the service shop/cart which does not exist.", &["shop", "cart"]),
                        Failure::new("Ingress uses the ingress class nginx which does not exist."),
                    ],
                )
                .unwrap(),
            ],
            provider: Some("noop".to_string()),
            ..Default::default()
        };

        let value: serde_json::Value = serde_json::from_str(&format(&run).unwrap()).unwrap();
        assert_eq!(value["status"], "ProblemDetected");
        assert_eq!(value["problems"], 2);
        assert_eq!(value["provider"], "noop");
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
        assert_eq!(value["results"][0]["error"][0]["sensitive"][1]["unmasked"], "cart");
        assert!(value["results"][0].get("details").is_none());
    }

    #[test]
    fn unserializable_document_is_an_output_error() {
        let mut bad = std::collections::HashMap::new();
        bad.insert((1u8, 2u8), "pair keys are not valid JSON object keys");

        let err = render(&bad).unwrap_err();
        assert!(matches!(err, KubesageError::Output(_)));
        assert!(err.to_string().starts_with("Failed to render output"));
    }
}
