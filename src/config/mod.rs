//! Configuration management.
//!
//! Configuration is resolved in this order, first match wins:
//! 1. An explicit `--config` path
//! 2. `CARDVAULT_CONFIG_PATH`
//! 3. Platform config dir (`~/Library/Application Support/cardvault/` on macOS)
//! 4. XDG config dir (`~/.config/cardvault/`)
//! 5. Built-in defaults
//!
//! Environment variables are applied on top of whichever source was used.

use crate::storage::PersistenceMode;
use crate::{Error, Result};
use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Matches `${VAR}` references in config values.
#[allow(clippy::expect_used)]
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex: env reference")
});

/// Main configuration for cardvault.
#[derive(Debug, Clone)]
pub struct CardvaultConfig {
    /// Storage settings.
    pub persistence: PersistenceConfig,
    /// Bulk-load dataset location.
    pub dataset: DatasetConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Query limits.
    pub query: QueryConfig,
    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Storage settings.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Mode active at startup.
    pub mode: PersistenceMode,
    /// `SQLite` database file for the relational engine.
    pub database_path: PathBuf,
}

/// Bulk-load dataset settings.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Path to the CSV dataset.
    pub path: PathBuf,
}

/// Language model provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Which provider to use.
    pub provider: LlmProvider,
    /// Model name.
    pub model: Option<String>,
    /// API key (may reference an environment variable like `${OPENAI_API_KEY}`).
    pub api_key: Option<SecretString>,
    /// Base URL for the provider.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available language model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// No language model; unmatched queries get guidance text.
    #[default]
    Disabled,
    /// `OpenAI` chat completions.
    OpenAi,
    /// LM Studio (local, OpenAI-compatible).
    LmStudio,
}

impl LlmProvider {
    /// Parses a provider string. Unknown names disable the provider.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "lmstudio" | "lm_studio" | "lm-studio" => Self::LmStudio,
            "none" | "" | "disabled" => Self::Disabled,
            other => {
                tracing::warn!(provider = other, "Unknown LLM provider, disabling");
                Self::Disabled
            },
        }
    }

    /// Returns the provider as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "none",
            Self::OpenAi => "openai",
            Self::LmStudio => "lmstudio",
        }
    }
}

/// Query limits.
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    /// Longest accepted query, in characters.
    pub max_query_length: usize,
    /// Most cards a non-count rule returns.
    pub max_rule_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_query_length: 500,
            max_rule_results: 10,
        }
    }
}

/// Logging and metrics configuration.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format string, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `cardvault=debug`.
    pub filter: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Copy)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus listener.
    pub enabled: bool,
    /// Listener port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// `[persistence]` section.
    pub persistence: Option<ConfigFilePersistence>,
    /// `[dataset]` section.
    pub dataset: Option<ConfigFileDataset>,
    /// `[llm]` section.
    pub llm: Option<ConfigFileLlm>,
    /// `[query]` section.
    pub query: Option<ConfigFileQuery>,
    /// `[observability]` section.
    pub observability: Option<ConfigFileObservability>,
}

/// Persistence section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePersistence {
    /// `memory` or `relational`.
    pub mode: Option<String>,
    /// Database file path.
    pub database_path: Option<String>,
}

/// Dataset section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDataset {
    /// CSV path.
    pub path: Option<String>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Query section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileQuery {
    /// Longest accepted query.
    pub max_query_length: Option<usize>,
    /// Cap for rule results.
    pub max_rule_results: Option<usize>,
}

/// Observability section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileObservability {
    /// `[observability.logging]`.
    pub logging: Option<ConfigFileLogging>,
    /// `[observability.metrics]`.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enable the Prometheus listener.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl Default for CardvaultConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig {
                mode: PersistenceMode::Memory,
                database_path: default_database_path(),
            },
            dataset: DatasetConfig {
                path: PathBuf::from("data").join("cards.csv"),
            },
            llm: LlmConfig::default(),
            query: QueryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("cardvault.db"),
        |dirs| dirs.data_dir().join("cardvault").join("cards.db"),
    )
}

impl CardvaultConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves configuration from file and environment.
    ///
    /// Loads `.env` first, then the first config file found (see module
    /// docs), then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly requested file cannot be read or
    /// parsed, or an override names an unknown persistence mode.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let from_env = std::env::var("CARDVAULT_CONFIG_PATH").ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default locations.
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("cardvault").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("cardvault")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `CardvaultConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(persistence) = file.persistence {
            if let Some(mode) = persistence.mode {
                config.persistence.mode = expand_env_vars(&mode).parse()?;
            }
            if let Some(path) = persistence.database_path {
                config.persistence.database_path = PathBuf::from(expand_env_vars(&path));
            }
        }
        if let Some(path) = file.dataset.and_then(|d| d.path) {
            config.dataset.path = PathBuf::from(expand_env_vars(&path));
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProvider::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm
                .api_key
                .map(|key| expand_env_vars(&key))
                .filter(|key| !key.is_empty())
                .map(SecretString::from);
            config.llm.base_url = llm.base_url.map(|url| expand_env_vars(&url));
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }
        if let Some(query) = file.query {
            if let Some(v) = query.max_query_length {
                config.query.max_query_length = v;
            }
            if let Some(v) = query.max_rule_results {
                config.query.max_rule_results = v;
            }
        }
        if let Some(observability) = file.observability {
            if let Some(logging) = observability.logging {
                if let Some(format) = logging.format {
                    config.observability.logging.format = LogFormat::parse(&format);
                }
                config.observability.logging.file =
                    logging.file.map(|f| PathBuf::from(expand_env_vars(&f)));
                config.observability.logging.filter = logging.filter;
            }
            if let Some(metrics) = observability.metrics {
                if let Some(enabled) = metrics.enabled {
                    config.observability.metrics.enabled = enabled;
                }
                if let Some(port) = metrics.port {
                    config.observability.metrics.port = port;
                }
            }
        }

        Ok(config)
    }

    /// Applies environment overrides using `get` to look up variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `CARDVAULT_PERSISTENCE_MODE` is not
    /// a known mode.
    pub fn apply_env_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = get("CARDVAULT_PERSISTENCE_MODE") {
            self.persistence.mode = mode.parse()?;
        }
        if let Some(path) = get("CARDVAULT_DATABASE_PATH") {
            self.persistence.database_path = PathBuf::from(path);
        }
        if let Some(path) = get("CARDVAULT_DATASET_PATH") {
            self.dataset.path = PathBuf::from(path);
        }
        if let Some(provider) = get("CARDVAULT_LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&provider);
        }
        if let Some(model) = get("CARDVAULT_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = get("CARDVAULT_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(v) = get("CARDVAULT_LLM_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.llm.timeout_ms = Some(v);
        }
        if let Some(v) = get("CARDVAULT_LLM_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.llm.connect_timeout_ms = Some(v);
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = get("OPENAI_API_KEY")
                .filter(|key| !key.is_empty())
                .map(SecretString::from);
        }
        if let Some(format) = get("CARDVAULT_LOG_FORMAT") {
            self.observability.logging.format = LogFormat::parse(&format);
        }
        if let Some(file) = get("CARDVAULT_LOG_FILE") {
            self.observability.logging.file = Some(PathBuf::from(file));
        }
        if let Some(enabled) = get("CARDVAULT_METRICS_ENABLED") {
            self.observability.metrics.enabled =
                matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(port) = get("CARDVAULT_METRICS_PORT").and_then(|v| v.parse().ok()) {
            self.observability.metrics.port = port;
        }
        Ok(())
    }

    /// Sets the startup persistence mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: PersistenceMode) -> Self {
        self.persistence.mode = mode;
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence.database_path = path.into();
        self
    }

    /// Sets the dataset path.
    #[must_use]
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset.path = path.into();
        self
    }
}

/// Expands `${VAR}` references from the process environment.
///
/// Unset variables expand to an empty string.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |key| std::env::var(key).ok())
}

fn expand_with<F>(value: &str, get: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            get(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CardvaultConfig::default();
        assert_eq!(config.persistence.mode, PersistenceMode::Memory);
        assert_eq!(config.query.max_query_length, 500);
        assert_eq!(config.query.max_rule_results, 10);
        assert_eq!(config.llm.provider, LlmProvider::Disabled);
        assert!(!config.observability.metrics.enabled);
    }

    #[test]
    fn test_from_toml() {
        let config = CardvaultConfig::from_toml(
            r#"
            [persistence]
            mode = "relational"
            database_path = "/tmp/cards.db"

            [dataset]
            path = "/data/cards.csv"

            [llm]
            provider = "lmstudio"
            model = "local-model"
            timeout_ms = 5000

            [query]
            max_rule_results = 5

            [observability.logging]
            format = "json"

            [observability.metrics]
            enabled = true
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.persistence.mode, PersistenceMode::Relational);
        assert_eq!(config.persistence.database_path, PathBuf::from("/tmp/cards.db"));
        assert_eq!(config.dataset.path, PathBuf::from("/data/cards.csv"));
        assert_eq!(config.llm.provider, LlmProvider::LmStudio);
        assert_eq!(config.llm.model.as_deref(), Some("local-model"));
        assert_eq!(config.llm.timeout_ms, Some(5000));
        assert_eq!(config.query.max_rule_results, 5);
        assert_eq!(config.query.max_query_length, 500);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
        assert!(config.observability.metrics.enabled);
        assert_eq!(config.observability.metrics.port, 9100);
    }

    #[test]
    fn test_unknown_mode_in_file_rejected() {
        let result = CardvaultConfig::from_toml("[persistence]\nmode = \"cassandra\"\n");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CardvaultConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("CARDVAULT_PERSISTENCE_MODE", "relational"),
                ("CARDVAULT_DATASET_PATH", "/srv/cards.csv"),
                ("CARDVAULT_LLM_PROVIDER", "openai"),
                ("CARDVAULT_LLM_TIMEOUT_MS", "1234"),
                ("OPENAI_API_KEY", "sk-test"),
                ("CARDVAULT_METRICS_ENABLED", "true"),
                ("CARDVAULT_METRICS_PORT", "not-a-port"),
            ]))
            .unwrap();

        assert_eq!(config.persistence.mode, PersistenceMode::Relational);
        assert_eq!(config.dataset.path, PathBuf::from("/srv/cards.csv"));
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.timeout_ms, Some(1234));
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert!(config.observability.metrics.enabled);
        assert_eq!(config.observability.metrics.port, 9090);
    }

    #[test]
    fn test_env_override_bad_mode() {
        let mut config = CardvaultConfig::default();
        let result = config.apply_env_overrides(lookup(&[("CARDVAULT_PERSISTENCE_MODE", "x")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        let get = lookup(&[("HOME_DIR", "/home/me")]);
        assert_eq!(expand_with("${HOME_DIR}/cards.db", &get), "/home/me/cards.db");
        assert_eq!(expand_with("${MISSING}x", &get), "x");
        assert_eq!(expand_with("plain", &get), "plain");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenAI"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::parse("lm-studio"), LlmProvider::LmStudio);
        assert_eq!(LlmProvider::parse("none"), LlmProvider::Disabled);
        assert_eq!(LlmProvider::parse("mystery"), LlmProvider::Disabled);
    }
}
