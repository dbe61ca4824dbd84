use crate::{
    cache::{CACHE_PROVIDERS, backend_name, file},
    cli::{CacheBackendArgs, CacheCommand},
    config::{
        self,
        types::{CacheBackendConfig, Config},
    },
};
use colored::Colorize;
use std::path::Path;

pub fn handle_cache(command: CacheCommand, config_path: &Path) -> crate::Result<()> {
    let mut config = config::load_config(config_path)?;

    config.cache.backend = match command {
        CacheCommand::List => {
            print!("{}", list_cache(&config));
            return Ok(());
        }
        CacheCommand::Add { backend } => match backend {
            CacheBackendArgs::File { path } => CacheBackendConfig::File { path },
            CacheBackendArgs::S3 {
                bucket,
                region,
                endpoint,
            } => CacheBackendConfig::S3 {
                bucket,
                region,
                endpoint,
            },
        },
        CacheCommand::Remove => CacheBackendConfig::default(),
    };

    config::save_config(config_path, &config)?;
    println!(
        "{} Cache backend set to {}",
        "✓".green(),
        backend_name(&config.cache.backend)
    );
    Ok(())
}

/// The active backend and the unused ones.
pub fn list_cache(config: &Config) -> String {
    let active = backend_name(&config.cache.backend);
    let mut output = String::new();

    output.push_str("Active:\n");
    let detail = match &config.cache.backend {
        CacheBackendConfig::File { path } => path
            .clone()
            .unwrap_or_else(file::default_path)
            .display()
            .to_string(),
        CacheBackendConfig::S3 {
            bucket,
            region,
            endpoint,
        } => match endpoint {
            Some(endpoint) => format!("s3://{} ({}, {})", bucket, region, endpoint),
            None => format!("s3://{} ({})", bucket, region),
        },
    };
    output.push_str(&format!("> {} {}\n", active.green(), detail.dimmed()));

    output.push_str("Unused:\n");
    for name in CACHE_PROVIDERS.iter().filter(|n| **n != active) {
        output.push_str(&format!("> {}\n", name.red()));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_s3_then_remove_resets_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        handle_cache(
            CacheCommand::Add {
                backend: CacheBackendArgs::S3 {
                    bucket: "explanations".to_string(),
                    region: "us-east-1".to_string(),
                    endpoint: None,
                },
            },
            &path,
        )
        .unwrap();
        let config = config::load_config(&path).unwrap();
        assert_eq!(backend_name(&config.cache.backend), "s3");

        handle_cache(CacheCommand::Remove, &path).unwrap();
        let config = config::load_config(&path).unwrap();
        assert_eq!(config.cache.backend, CacheBackendConfig::File { path: None });
    }

    #[test]
    fn list_names_every_backend() {
        colored::control::set_override(false);
        let mut config = Config::default();
        config.cache.backend = CacheBackendConfig::File {
            path: Some("/tmp/kubesage.json".into()),
        };

        let listing = list_cache(&config);
        assert!(listing.starts_with("Active:\n> file /tmp/kubesage.json\n"));
        assert!(listing.ends_with("Unused:\n> s3\n"));
    }
}
