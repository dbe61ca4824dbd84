use crate::{
    analyzer::AnalyzerRegistry,
    cli::FiltersCommand,
    config::{self, types::Config},
    error::ConfigError,
};
use colored::Colorize;
use std::path::Path;

pub fn handle_filters(command: FiltersCommand, config_path: &Path) -> crate::Result<()> {
    let registry = AnalyzerRegistry::builtin();
    let mut config = config::load_config(config_path)?;

    match command {
        FiltersCommand::List => {
            print!("{}", list_filters(&registry, &config));
            return Ok(());
        }
        FiltersCommand::Add { names } => {
            for kind in canonical(&registry, &names)? {
                if !config.analysis.filters.iter().any(|f| f == kind) {
                    config.analysis.filters.push(kind.to_string());
                }
            }
        }
        FiltersCommand::Remove { names } => {
            let kinds = canonical(&registry, &names)?;
            config
                .analysis
                .filters
                .retain(|f| !kinds.iter().any(|k| k.eq_ignore_ascii_case(f)));
        }
    }

    config::save_config(config_path, &config)?;
    println!("{} Active filters updated", "✓".green());
    Ok(())
}

/// Every analyzer with its active state. An empty configured set means all are active.
pub fn list_filters(registry: &AnalyzerRegistry, config: &Config) -> String {
    let active = &config.analysis.filters;
    let mut output = String::new();
    output.push_str("Active:\n");
    for analyzer in registry.analyzers() {
        if is_active(analyzer.kind(), active) {
            output.push_str(&format!(
                "> {} {}\n",
                analyzer.kind().green(),
                analyzer.description().dimmed()
            ));
        }
    }

    let inactive: Vec<_> = registry
        .kinds()
        .into_iter()
        .filter(|k| !is_active(k, active))
        .collect();
    if !inactive.is_empty() {
        output.push_str("Unused:\n");
        for kind in inactive {
            output.push_str(&format!("> {}\n", kind.red()));
        }
    }
    output
}

fn is_active(kind: &str, active: &[String]) -> bool {
    active.is_empty() || active.iter().any(|f| f.eq_ignore_ascii_case(kind))
}

fn canonical(registry: &AnalyzerRegistry, names: &[String]) -> Result<Vec<&'static str>, ConfigError> {
    names
        .iter()
        .map(|name| {
            registry
                .canonical_kind(name)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "filter".to_string(),
                    reason: format!(
                        "unknown analyzer '{}', available: {}",
                        name,
                        registry.kinds().join(", ")
                    ),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_and_remove_persist_canonical_kinds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        handle_filters(
            FiltersCommand::Add {
                names: vec!["pod".to_string(), "service".to_string()],
            },
            &path,
        )
        .unwrap();
        let config = config::load_config(&path).unwrap();
        assert_eq!(config.analysis.filters, vec!["Pod", "Service"]);

        handle_filters(
            FiltersCommand::Remove {
                names: vec!["POD".to_string()],
            },
            &path,
        )
        .unwrap();
        let config = config::load_config(&path).unwrap();
        assert_eq!(config.analysis.filters, vec!["Service"]);
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let dir = tempdir().unwrap();
        let err = handle_filters(
            FiltersCommand::Add {
                names: vec!["Deployment".to_string()],
            },
            &dir.path().join("config.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown analyzer 'Deployment'"));
    }

    #[test]
    fn list_marks_unused_analyzers() {
        colored::control::set_override(false);
        let mut config = Config::default();
        config.analysis.filters = vec!["Ingress".to_string()];

        let listing = list_filters(&AnalyzerRegistry::builtin(), &config);
        let (active, unused) = listing.split_once("Unused:\n").unwrap();
        assert_eq!(
            active,
            "Active:\n> Ingress Missing ingress classes, backend services and TLS secrets\n"
        );
        assert!(unused.contains("> Pod\n"));
        assert!(!unused.contains("Ingress"));
    }
}
