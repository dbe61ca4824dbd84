//! Plain text formatter.

use super::sorted;
use crate::analysis::AnalysisRun;
use colored::Colorize;

/// Format a run as text, one block per result.
pub fn format(run: &AnalysisRun) -> String {
    let mut output = String::new();

    if let Some(provider) = &run.provider {
        output.push_str(&format!("AI Provider: {}\n\n", provider.bold()));
    }

    if !run.errors.is_empty() {
        output.push_str(&format!("{}\n", "Warnings:".yellow().bold()));
        for error in &run.errors {
            output.push_str(&format!("- {}\n", error.yellow()));
        }
        output.push('\n');
    }

    if run.results.is_empty() {
        output.push_str(&format!("{}\n", "No problems detected".green()));
        return output;
    }

    for (index, result) in sorted(&run.results).into_iter().enumerate() {
        let parent = result
            .parent_object
            .as_ref()
            .map(|p| format!("({})", p))
            .unwrap_or_default();
        output.push_str(&format!(
            "{} {}{}\n",
            index.to_string().cyan(),
            result.name.yellow(),
            parent.cyan()
        ));

        for failure in &result.failures {
            output.push_str(&format!("- {} {}\n", "Error:".red().bold(), failure.text.red()));
            if let Some(doc) = &failure.kubernetes_doc {
                output.push_str(&format!("  {} {}\n", "Kubernetes Doc:".red(), doc.red()));
            }
        }

        if let Some(explanation) = &result.explanation {
            output.push_str(&format!("{}\n", explanation.green()));
        } else if let Some(reason) = &result.explanation_error {
            output.push_str(&format!("{} {}\n", "Explanation unavailable:".dimmed(), reason.dimmed()));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "{} problem(s) in {} object(s)\n",
        run.problem_count(),
        run.results.len()
    ));
    output
}
