use crate::{
    ai::{DEFAULT_PROVIDER, ProviderType},
    cli::AuthCommand,
    config::{
        self,
        types::{Config, ProviderConfig},
    },
    error::ConfigError,
};
use colored::Colorize;
use std::path::Path;

pub fn handle_auth(command: AuthCommand, config_path: &Path) -> crate::Result<()> {
    let mut config = config::load_config(config_path)?;

    let message = match command {
        AuthCommand::List => {
            print!("{}", list_providers(&config));
            return Ok(());
        }
        AuthCommand::Add {
            backend,
            password,
            model,
            base_url,
            language,
        } => {
            let provider_type: ProviderType = backend.parse()?;
            let provider = ProviderConfig {
                name: provider_type.to_string(),
                credential: password.unwrap_or_default(),
                model: model.unwrap_or_else(|| provider_type.default_model().to_string()),
                target_language: language.unwrap_or_else(|| config.analysis.language.clone()),
                base_url,
            };

            // Reject settings the provider would refuse at analysis time
            provider_type.create().configure(&provider)?;

            if config.ai.default_provider.is_none() {
                config.ai.default_provider = Some(provider.name.clone());
            }
            let name = provider.name.clone();
            config.ai.upsert(provider);
            format!("{} added to the AI backend provider list", name)
        }
        AuthCommand::Remove { backend } => {
            if !config.ai.remove(&backend) {
                return Err(ConfigError::ProviderNotConfigured(backend).into());
            }
            format!("{} deleted from the AI backend provider list", backend)
        }
        AuthCommand::Default { backend } => {
            let name = config
                .ai
                .provider(&backend)
                .map(|p| p.name.clone())
                .ok_or_else(|| ConfigError::ProviderNotConfigured(backend.clone()))?;
            config.ai.default_provider = Some(name.clone());
            format!("Default provider set to {}", name)
        }
    };

    config::save_config(config_path, &config)?;
    println!("{} {}", "✓".green(), message);
    Ok(())
}

/// Configured providers, the default one, and the provider types not yet configured.
/// Credentials are never printed.
pub fn list_providers(config: &Config) -> String {
    let default = config
        .ai
        .default_provider
        .as_deref()
        .unwrap_or(DEFAULT_PROVIDER);
    let mut output = format!("Default:\n> {}\n", default.bold());

    output.push_str("Active:\n");
    for provider in &config.ai.providers {
        let endpoint = provider
            .base_url
            .as_deref()
            .map(|u| format!(", {}", u))
            .unwrap_or_default();
        output.push_str(&format!(
            "> {} {}\n",
            provider.name.green(),
            format!("({}, {}{})", provider.model, provider.target_language, endpoint).dimmed()
        ));
    }

    let unused: Vec<String> = ProviderType::ALL
        .iter()
        .map(|t| t.to_string())
        .filter(|t| config.ai.provider(t).is_none())
        .collect();
    if !unused.is_empty() {
        output.push_str("Unused:\n");
        for name in unused {
            output.push_str(&format!("> {}\n", name.red()));
        }
    }
    output
}
