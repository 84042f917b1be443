//! Layered configuration loading.
//!
//! Layers, lowest precedence first:
//! base file, environment-specific file, `HEADUNIT_` environment variables,
//! command-line `--set` overrides. Layers merge as TOML tables and are
//! deserialized once.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::{Table, Value};

use crate::config::schema::AppConfig;
use crate::config::validation::ValidationError;

/// Prefix for environment-variable overrides.
pub const ENV_PREFIX: &str = "HEADUNIT_";

/// Environment variable selecting the environment-specific file.
pub const ENVIRONMENT_VAR: &str = "HEADUNIT_ENVIRONMENT";

const BASE_FILE: &str = "headunit";
const DEFAULT_ENVIRONMENT: &str = "production";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("malformed override '{0}', expected key=value")]
    Override(String),

    #[error("configuration does not match schema")]
    Schema(#[source] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The inputs the loader merges.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Directory holding `headunit.toml` and `headunit.<env>.toml`.
    pub config_dir: PathBuf,

    /// Explicit environment name; falls back to `HEADUNIT_ENVIRONMENT`.
    pub environment: Option<String>,

    /// Snapshot of environment variables (name, value).
    pub env: Vec<(String, String)>,

    /// Command-line `key=value` overrides in the order given.
    pub overrides: Vec<String>,
}

impl ConfigSources {
    /// Sources rooted at `config_dir` with the current process environment.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: None,
            env: std::env::vars().collect(),
            overrides: Vec::new(),
        }
    }

    /// Sources with no files, no environment and no overrides.
    pub fn isolated(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_override(mut self, assignment: impl Into<String>) -> Self {
        self.overrides.push(assignment.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Resolve the environment name.
    pub fn environment_name(&self) -> String {
        self.environment
            .clone()
            .or_else(|| {
                self.env
                    .iter()
                    .find(|(name, _)| name == ENVIRONMENT_VAR)
                    .map(|(_, value)| value.clone())
            })
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }
}

/// Load every layer and deserialize the result. Does not run semantic validation.
pub fn load_layered(sources: &ConfigSources) -> Result<AppConfig, ConfigError> {
    let environment = sources.environment_name();
    let mut merged = Table::new();

    let base = sources.config_dir.join(format!("{BASE_FILE}.toml"));
    if let Some(layer) = read_optional(&base)? {
        merge(&mut merged, layer);
    }

    let env_file = sources.config_dir.join(format!("{BASE_FILE}.{environment}.toml"));
    if let Some(layer) = read_optional(&env_file)? {
        merge(&mut merged, layer);
    }

    for (name, value) in &sources.env {
        if name == ENVIRONMENT_VAR {
            continue;
        }
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<String> = key
            .split("__")
            .filter(|part| !part.is_empty())
            .map(str::to_lowercase)
            .collect();
        if !path.is_empty() {
            set_path(&mut merged, &path, parse_scalar(value));
        }
    }

    for assignment in &sources.overrides {
        let (key, value) = assignment
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Override(assignment.clone()))?;
        let path: Vec<String> = key.trim().split('.').map(str::to_string).collect();
        set_path(&mut merged, &path, parse_scalar(value.trim()));
    }

    let mut config: AppConfig = Value::Table(merged).try_into().map_err(ConfigError::Schema)?;
    config.app.environment = environment;

    tracing::debug!(
        config_dir = %sources.config_dir.display(),
        environment = %config.app.environment,
        "Configuration layers merged"
    );
    Ok(config)
}

fn read_optional(path: &Path) -> Result<Option<Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = toml::from_str::<Table>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(table))
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts.
fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn set_path(table: &mut Table, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = table;
    for part in parents {
        let entry = cursor
            .entry(part.clone())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        let Value::Table(inner) = entry else {
            return;
        };
        cursor = inner;
    }
    cursor.insert(last.clone(), value);
}

/// Type an override string: bool, integer, float, then string.
fn parse_scalar(raw: &str) -> Value {
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Boolean(flag);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Integer(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::Float(float);
    }
    Value::String(raw.to_string())
}
