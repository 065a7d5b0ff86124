use anyhow::{Context, Result};
use entity_repo::DbConnConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables with this prefix override file values,
/// e.g. `APP__DATABASE__DSN=postgres://...` maps to `database.dsn`.
pub const ENV_PREFIX: &str = "APP__";

/// Application configuration: defaults → YAML file → environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base directory for relative paths (log files). Normalized to an
    /// absolute path on load; empty means the working directory.
    #[serde(default)]
    pub home_dir: String,
    /// Database connection (optional).
    pub database: Option<DbConnConfig>,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
}

/// Logging configuration: subsystem (crate) name → settings.
/// Key "default" is the catch-all for targets without their own section.
pub type LoggingConfig = HashMap<String, Section>;

pub const DEFAULT_SECTION: &str = "default";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/app.log"; empty disables file output
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>, // rotated files to keep
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        DEFAULT_SECTION.to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            database: Some(DbConnConfig::default()),
            logging: Some(default_logging_config()),
        }
    }
}

impl AppConfig {
    /// Layered load: defaults → YAML file → `APP__*` environment variables.
    /// Normalizes `home_dir` to an absolute path.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with_env_prefix(config_path.as_ref(), ENV_PREFIX)
    }

    fn load_with_env_prefix(config_path: &Path, env_prefix: &str) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML or ENV provide them.
        let base = AppConfig {
            home_dir: String::new(),
            database: None,
            logging: None,
        };

        let mut config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        config.home_dir = resolve_home_dir(&config.home_dir)?
            .to_string_lossy()
            .to_string();
        Ok(config)
    }

    /// Load from file when given, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                c.home_dir = resolve_home_dir(&c.home_dir)?
                    .to_string_lossy()
                    .to_string();
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(dsn) = &args.dsn {
            self.database.get_or_insert_with(DbConnConfig::default).dsn = dsn.clone();
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut(DEFAULT_SECTION) {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }
}

/// Command line values that override the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub dsn: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

/// Absolute form of `raw`: empty → working directory, `~` → user home.
fn resolve_home_dir(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return std::env::current_dir().context("Failed to read the working directory");
    }

    if raw == "~" || raw.starts_with("~/") {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .context("Cannot expand '~' in home_dir: HOME is not set")?;
        let rest = raw.trim_start_matches('~').trim_start_matches('/');
        return Ok(PathBuf::from(home).join(rest));
    }

    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .context("Failed to read the working directory")?
            .join(path))
    }
}
