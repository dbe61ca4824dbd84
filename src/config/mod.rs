pub mod types;

use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".kubesage.toml";

/// Get the global config file path (~/.kubesage.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Resolve the config path: explicit override first, then the global file
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => global_config_path().ok_or(ConfigError::NoHomeDirectory),
    }
}

/// Load configuration from `path`, or defaults when the file does not exist.
/// A file that exists but cannot be parsed is an error.
pub fn load_config(path: &Path) -> Result<types::Config, ConfigError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(types::Config::default());
    }

    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| ConfigError::ParsingFailed(e.to_string()))
}

/// Save configuration to `path`
pub fn save_config(path: &Path, config: &types::Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::ParsingFailed(e.to_string()))?;
    fs::write(path, content)?;

    // Credentials live in this file
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).ok();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::types::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.analysis.max_concurrency, 10);
        assert_eq!(config.cache.backend, CacheBackendConfig::File { path: None });
    }

    #[test]
    fn save_then_load_preserves_providers_and_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.ai.upsert(ProviderConfig {
            name: "openai".to_string(),
            credential: "sk-test".to_string(),
            model: "gpt-4o-mini".to_string(),
            target_language: "spanish".to_string(),
            base_url: None,
        });
        config.ai.default_provider = Some("openai".to_string());
        config.cache.backend = CacheBackendConfig::S3 {
            bucket: "explanations".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: None,
        };

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "ai = [not valid").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::ParsingFailed(_))
        ));
    }

    #[test]
    fn removing_default_provider_clears_default() {
        let mut ai = AiConfig::default();
        ai.upsert(ProviderConfig {
            name: "noop".to_string(),
            ..Default::default()
        });
        ai.default_provider = Some("NOOP".to_string());

        assert!(ai.remove("noop"));
        assert!(ai.default_provider.is_none());
        assert!(!ai.remove("noop"));
    }
}
