//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "INSIGHT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dataset store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("insight").to_string_lossy().to_string())
        .unwrap_or_else(|| "./data".to_string())
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return path.to_string(),
    };

    match dirs::home_dir() {
        Some(home) => {
            let home = home.to_string_lossy();
            format!("{}{}", home.trim_end_matches(['/', '\\']), rest)
        }
        None => path.to_string(),
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4321
}

fn default_cors_permissive() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        config.storage.data_dir = expand_home(&config.storage.data_dir);
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment.
    ///
    /// Runs before logging is set up, so nothing is logged here; call
    /// [`DefaultConfig::report`] once the subscriber is installed.
    pub fn load_default() -> DefaultConfig {
        let candidates: Vec<PathBuf> = [
            std::env::var(CONFIG_ENV).ok().map(PathBuf::from),
            dirs::config_dir().map(|p| p.join("insight").join("config.toml")),
            Some(PathBuf::from("./insight.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::search(&candidates, |name| std::env::var(name).ok())
    }

    /// First candidate that exists and loads wins; broken ones are kept for reporting
    fn search(candidates: &[PathBuf], var: impl Fn(&str) -> Option<String>) -> DefaultConfig {
        let mut skipped = Vec::new();

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(mut config) => {
                    config.apply_overrides(&var);
                    return DefaultConfig {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(e),
            }
        }

        let mut config = Config::default();
        config.apply_overrides(&var);
        DefaultConfig {
            config,
            source: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("INSIGHT_DATA_DIR") {
            self.storage.data_dir = expand_home(&data_dir);
        }

        if let Some(host) = var("INSIGHT_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("INSIGHT_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!("Ignoring invalid INSIGHT_PORT {:?}", port),
            }
        }

        if let Some(level) = var("INSIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("INSIGHT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Result of searching the default config locations
#[derive(Debug)]
pub struct DefaultConfig {
    pub config: Config,
    /// File the config came from, `None` for built-in defaults
    pub source: Option<PathBuf>,
    /// Candidate files that exist but failed to load
    pub skipped: Vec<ConfigError>,
}

impl DefaultConfig {
    /// Log where the config came from and every file that was passed over
    pub fn report(&self) {
        for error in &self.skipped {
            tracing::warn!("Skipping config file: {}", error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Events go to stderr so command
/// output on stdout stays clean. Later calls leave the first subscriber in place.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("insight={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Logging already initialised: {}", e);
    }
}

/// Generate a default config file content
///
/// The data directory is written out resolved for this machine.
pub fn generate_default_config() -> String {
    let data_dir = toml::Value::String(default_data_dir()).to_string();
    DEFAULT_CONFIG_TEMPLATE.replace("{data_dir}", &data_dir)
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Insight Configuration
#
# Environment variables override these settings:
# - INSIGHT_DATA_DIR
# - INSIGHT_HOST
# - INSIGHT_PORT
# - INSIGHT_LOG_LEVEL
# - INSIGHT_LOG_FORMAT
#
# INSIGHT_CONFIG points at a config file outside the default search path.

[storage]
# Directory holding one <id>.json file per registered dataset
data_dir = {data_dir}

[api]
# API server host
host = "127.0.0.1"

# API server port
port = 4321

# Allow requests from any origin
cors_permissive = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 4321);
        assert!(config.api.cors_permissive);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.api.addr(), "127.0.0.1:4321");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            Path::new("insight.toml"),
            "[api]\nport = 9000\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(Path::new("default.toml"), &generate_default_config()).unwrap();
        assert_eq!(config.api.port, 4321);
        assert_eq!(config.storage.data_dir, default_data_dir());
        assert!(!config.storage.data_dir.starts_with('~'));
    }

    #[test]
    fn test_data_dir_home_expansion() {
        assert_eq!(expand_home("/srv/insight"), "/srv/insight");
        assert_eq!(expand_home("./data"), "./data");
        assert_eq!(expand_home("~other/data"), "~other/data");

        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().trim_end_matches(['/', '\\']).to_string();
            assert_eq!(expand_home("~/insight"), format!("{}/insight", home));
            assert_eq!(expand_home("~"), home);

            let config = Config::parse(
                Path::new("insight.toml"),
                "[storage]\ndata_dir = \"~/insight\"\n",
            )
            .unwrap();
            assert_eq!(config.storage.data_dir, format!("{}/insight", home));
        }
    }

    #[test]
    fn test_search_keeps_broken_files_for_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[api\nport = ").unwrap();
        std::fs::write(&good, "[api]\nport = 9100\n").unwrap();

        let found = Config::search(&[missing.clone(), broken.clone(), good.clone()], |_| None);
        assert_eq!(found.source, Some(good));
        assert_eq!(found.config.api.port, 9100);
        assert_eq!(found.skipped.len(), 1);
        assert!(matches!(&found.skipped[0], ConfigError::Parse { path, .. } if *path == broken));

        let fallback = Config::search(&[missing, broken], |name| {
            (name == "INSIGHT_PORT").then(|| "8088".to_string())
        });
        assert_eq!(fallback.source, None);
        assert_eq!(fallback.config.api.port, 8088);
        assert_eq!(fallback.skipped.len(), 1);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[api\nport = ").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[storage]\ndata_dir = \"/tmp/insight\"\n").unwrap();
        assert_eq!(Config::load(&good).unwrap().storage.data_dir, "/tmp/insight");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INSIGHT_DATA_DIR", "/srv/insight"),
            ("INSIGHT_PORT", "8088"),
            ("INSIGHT_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.storage.data_dir, "/srv/insight");
        assert_eq!(config.api.port, 8088);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == "INSIGHT_PORT").then(|| "http".to_string()));
        assert_eq!(config.api.port, 4321);
    }
}
