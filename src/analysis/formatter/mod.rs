//! Report formatters.
//!
//! Both renderings are pure functions of an [`AnalysisRun`]. Results are
//! sorted by kind and name, since the merged run is in completion order.

pub mod json;
pub mod plain;

use super::AnalysisRun;
use crate::analyzer::AnalysisResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Structured JSON document.
    Json,
}

impl OutputFormat {
    /// Parse from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Render a run.
pub fn format_run(run: &AnalysisRun, format: OutputFormat) -> crate::Result<String> {
    match format {
        OutputFormat::Text => Ok(plain::format(run)),
        OutputFormat::Json => json::format(run),
    }
}

/// Results in presentation order.
fn sorted(results: &[AnalysisResult]) -> Vec<&AnalysisResult> {
    let mut sorted: Vec<&AnalysisResult> = results.iter().collect();
    sorted.sort_by(|a, b| (&a.kind, &a.name).cmp(&(&b.kind, &b.name)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("plain"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("sarif"), None);
    }
}
