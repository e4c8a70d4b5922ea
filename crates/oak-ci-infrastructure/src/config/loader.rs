//! Configuration loader: packaged defaults -> project `config.toml` ->
//! `OAK_`-prefixed environment overrides (spec.md §4.1).
//!
//! Resolution order: packaged defaults, then the project's TOML file, then
//! environment overrides, via `figment`'s `Serialized` + `Toml` + `Env`
//! providers.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

use oak_ci_domain::error::{Error, Result};

use super::paths::ProjectPaths;
use super::types::AppConfig;

/// Loads and validates [`AppConfig`] for one project root.
pub struct ConfigLoader {
    project_root: std::path::PathBuf,
}

impl ConfigLoader {
    /// Build a loader for the given project root.
    #[must_use]
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Load configuration, merging packaged defaults, the project's
    /// `.oak/ci/config.toml` (if present), then `OAK_`-prefixed
    /// environment variables, in that precedence order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the config file parses but fails
    /// validation.
    pub fn load(&self) -> Result<AppConfig> {
        let paths = ProjectPaths::new(&self.project_root);
        let config_path = paths.config_file();

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if config_path.exists() {
            figment = figment.merge(Toml::file(&config_path));
        }
        figment = figment.merge(Env::prefixed("OAK_").split("_"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| Error::ConfigError { message: e.to_string() })?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Write a new config file and return it parsed (for `PUT /api/config`
    /// — the caller is responsible for requesting a daemon restart; this
    /// never mutates a live snapshot, per spec.md §9).
    pub fn write(&self, config: &AppConfig) -> Result<()> {
        Self::validate(config)?;
        let paths = ProjectPaths::new(&self.project_root);
        std::fs::create_dir_all(paths.oak_dir())?;
        let body = toml::to_string_pretty(config).map_err(|e| Error::ConfigError { message: e.to_string() })?;
        std::fs::write(paths.config_file(), body)?;
        Ok(())
    }

    fn validate(config: &AppConfig) -> Result<()> {
        if config.retrieval.high_confidence_threshold <= config.retrieval.medium_confidence_threshold {
            return Err(Error::ConfigError {
                message: "retrieval.high_confidence_threshold must exceed medium_confidence_threshold".to_owned(),
            });
        }
        if config.session.stale_timeout_seconds <= 0 {
            return Err(Error::ConfigError {
                message: "session.stale_timeout_seconds must be positive".to_owned(),
            });
        }
        let known_providers = ["ollama", "openai", "lmstudio", "fastembed"];
        if !known_providers.contains(&config.embedding.provider.as_str()) {
            return Err(Error::ConfigError {
                message: format!("unknown embedding.provider '{}'", config.embedding.provider),
            });
        }
        Ok(())
    }
}

/// Probe a project root for a running/runnable embedding provider, used by
/// `POST /api/config/test-detect` (spec.md §6.1).
pub async fn detect_embedding_provider(base_url: &str) -> Result<bool> {
    let client = reqwest::Client::new();
    let ollama_tags = format!("{}/api/tags", base_url.trim_end_matches('/'));
    Ok(client.get(&ollama_tags).send().await.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.daemon.host, "127.0.0.1");
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.retrieval.high_confidence_threshold = 0.2;
        config.retrieval.medium_confidence_threshold = 0.8;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
