//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `ferrogram.toml`
//! - `yaml-config`: enables `ferrogram.yaml` / `ferrogram.yml`
//!
//! Both features can be enabled simultaneously; if so, both file formats are searched and loaded.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`ferrogram.{profile}.toml`)
//! 4. Main config file (`ferrogram.toml` / `ferrogram.yaml`)
//! 5. Environment variables (`FERROGRAM_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `FERROGRAM_` prefix with `__` as separator:
//!
//! - `FERROGRAM_BOT__TOKEN=123:abc` → `bot.token = "123:abc"`
//! - `FERROGRAM_POLLING__RETRY_LIMIT=-1` → `polling.retry_limit = -1`
//! - `FERROGRAM_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrogram_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/ferrogram.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::FerrogramConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "FERROGRAM_";
const PROFILE_VAR: &str = "FERROGRAM_PROFILE";
const APP_DIR: &str = "ferrogram";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the usual short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `FERROGRAM_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    profile: Profile,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
    /// Whether to run [`validate_config`] after extraction.
    validate: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            validate: true,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Skips validation of the extracted configuration.
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Merges configuration programmatically, above the defaults.
    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<FerrogramConfig> {
        let profile = self.profile.clone();
        let validate = self.validate;
        let figment = self.build_figment()?;

        let config: FerrogramConfig = figment.extract()?;

        if validate {
            validate_config(&config)?;
        }

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            has_token = config.bot.token.is_some(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(FerrogramConfig::default()));

        let overrides = std::mem::take(&mut self.figment);
        figment = figment.merge(overrides);

        if let Some(path) = self.config_file.as_deref() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Merges a single config file, dispatching on its extension.
    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join("config"));
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR));
        }
        paths
    }

    /// Searches `search_paths × base_names` for one format.
    ///
    /// A profile-specific variant is merged before its base file. Stops at
    /// the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_mut)
    )]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        let search_paths = self.resolve_search_paths();
        #[cfg_attr(
            not(any(feature = "toml-config", feature = "yaml-config")),
            allow(unused_mut)
        )]
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["ferrogram.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["ferrogram.yaml", "ferrogram.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations and environment.
pub fn load_config() -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogLevel, RetryLimit};
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::new()
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.polling.retry_limit, RetryLimit::Limited(3));
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_VAR, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("FERROGRAM_BOT__TOKEN", "test-token");
            jail.set_env("FERROGRAM_POLLING__RETRY_LIMIT", "-1");
            jail.set_env("FERROGRAM_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new().load().map_err(|e| e.to_string())?;

            assert_eq!(config.bot.token.as_deref(), Some("test-token"));
            assert_eq!(config.polling.retry_limit, RetryLimit::Unlimited);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        Jail::expect_with(|_jail| {
            let result = ConfigLoader::new().file("absent.toml").load();
            assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_file_format() {
        Jail::expect_with(|jail| {
            jail.create_file("ferrogram.ini", "[bot]\ntoken = x\n")?;

            let result = ConfigLoader::new().file("ferrogram.ini").load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn test_merge_overrides_defaults() {
        Jail::expect_with(|_jail| {
            let mut overrides = FerrogramConfig::default();
            overrides.polling.retry_wait_ms = 10;

            let config = ConfigLoader::new()
                .without_env()
                .merge(overrides)
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.polling.retry_wait_ms, 10);
            Ok(())
        });
    }

    #[test]
    fn test_validation_runs_on_load() {
        Jail::expect_with(|jail| {
            jail.set_env("FERROGRAM_WEBHOOK__PATH", "no-slash");

            let result = ConfigLoader::new().load();
            assert!(matches!(result, Err(ConfigError::ValidationError { .. })));

            let config = ConfigLoader::new()
                .without_validation()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.webhook.path, "no-slash");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ferrogram.toml",
                r#"
                [bot]
                token = "from-file"

                [polling]
                timeout_secs = 30
                allowed_updates = ["message", "callback_query"]
                "#,
            )?;
            jail.create_file(
                "ferrogram.production.toml",
                r#"
                [polling]
                retry_limit = 10
                "#,
            )?;
            jail.set_env("FERROGRAM_BOT__TOKEN", "from-env");

            let config = ConfigLoader::new()
                .profile("production")
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.bot.token.as_deref(), Some("from-env"));
            assert_eq!(config.polling.timeout_secs, 30);
            assert_eq!(config.polling.allowed_updates.len(), 2);
            assert_eq!(config.polling.retry_limit, RetryLimit::Limited(10));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_config_subdirectory() {
        Jail::expect_with(|jail| {
            std::fs::create_dir("config").map_err(|e| e.to_string())?;
            jail.create_file("config/ferrogram.toml", "[webhook]\nport = 9000\n")?;

            let config = ConfigLoader::new()
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.webhook.port, 9000);
            Ok(())
        });
    }
}
