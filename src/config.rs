//! TOML configuration for pipelinehealth.
//!
//! Lookup order: an explicit `--config` path, the `PIPELINEHEALTH_CONFIG`
//! environment variable, `./pipelinehealth.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::DuplicatePolicy;

pub const CONFIG_ENV: &str = "PIPELINEHEALTH_CONFIG";
pub const LOCAL_CONFIG: &str = "pipelinehealth.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from the environment variable or the working directory, falling
    /// back to defaults when neither yields a readable file.
    ///
    /// Files that exist but cannot be loaded are skipped; the returned
    /// warnings say why, for the caller to log once tracing is up.
    pub fn load_or_default() -> (Self, Vec<String>) {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::discover(env_path.as_deref(), Path::new(LOCAL_CONFIG))
    }

    fn discover(env_path: Option<&Path>, local: &Path) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(path) = env_path {
            match Self::load(path) {
                Ok(cfg) => return (cfg, warnings),
                Err(e) => warnings.push(format!(
                    "{CONFIG_ENV}={} could not be loaded, trying fallback: {e:#}",
                    path.display()
                )),
            }
        }

        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return (cfg, warnings),
                Err(e) => warnings.push(format!(
                    "{} could not be loaded, using defaults: {e:#}",
                    local.display()
                )),
            }
        }

        if warnings.is_empty() {
            debug!("no config file found, using compiled-in defaults");
        }
        (Self::default(), warnings)
    }

    /// An explicitly requested file must load; otherwise use the fallback chain.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Vec<String>)> {
        match explicit {
            Some(path) => Ok((Self::load(path)?, Vec::new())),
            None => Ok(Self::load_or_default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP API.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Backing store of the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    Sqlite,
}

impl SourceKind {
    /// `.db`, `.sqlite` and `.sqlite3` are SQLite; anything else is CSV.
    pub fn infer(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("db" | "sqlite" | "sqlite3") => Self::Sqlite,
            _ => Self::Csv,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
    /// Reuse a loaded snapshot until the log's version changes.
    pub cache_snapshots: bool,
}

impl SourceConfig {
    /// Source at `path`, with the kind inferred from its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            kind: SourceKind::infer(&path),
            path,
            ..Self::default()
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            path: PathBuf::from("ejecuciones_pipelines.csv"),
            cache_snapshots: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// What to do when several executions share a (region, pipeline, day).
    pub duplicate_policy: DuplicatePolicy,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
