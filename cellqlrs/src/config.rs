//! Configuration for the column compiler.
//!
//! TOML-based, with global defaults and per-datasource overrides. Sort null
//! placement is fixed and has no setting here.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;
use crate::error::{CellqlError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CellqlConfig {
    /// Global defaults applied to all datasources unless overridden.
    pub defaults: GlobalDefaults,

    /// Per-datasource configuration overrides (keyed by datasource name).
    #[serde(default)]
    pub datasources: HashMap<String, DatasourceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub dialect: DialectKind,
    pub compiler: CompilerConfig,
    pub validation: ValidationConfig,
}

/// Knobs consumed by the sort and aggregation compilers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub lookup: LookupConfig,
    pub sort: SortConfig,
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Maximum hops followed through chained lookups (default: 16).
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SortConfig {
    /// Resolve sort specs concurrently (default: true).
    pub concurrent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Use the engine's percentile function for medians when it has one.
    pub prefer_native_median: bool,
    /// Exclude NULLs before picking the middle row(s) in the windowed median.
    pub median_skip_nulls: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Log findings instead of failing (default: false).
    pub warn_only: bool,
}

/// Per-datasource configuration (can override globals).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasourceConfig {
    pub dialect: Option<DialectKind>,
    pub compiler: Option<CompilerConfig>,
    pub validation: Option<ValidationConfig>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self { max_depth: 16 }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self { concurrent: true }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            prefer_native_median: true,
            median_skip_nulls: true,
        }
    }
}

impl CellqlConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CellqlError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| CellqlError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `CELLQL_CONFIG` environment variable
    /// 2. `./cellql.toml` (current directory)
    /// 3. `~/.config/cellql/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("CELLQL_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from CELLQL_CONFIG");
                    return cfg;
                }
                Err(err) => tracing::warn!(path = %path, error = %err, "ignoring CELLQL_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("cellql.toml") {
            tracing::info!("loaded config from ./cellql.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("cellql").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Get resolved config for a specific datasource (merges global defaults).
    pub fn for_datasource(&self, name: &str) -> ResolvedDatasourceConfig {
        ResolvedDatasourceConfig::merge(&self.defaults, self.datasources.get(name))
    }
}

/// Fully resolved configuration for a datasource (no Option fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDatasourceConfig {
    pub dialect: DialectKind,
    pub compiler: CompilerConfig,
    pub validation: ValidationConfig,
}

impl ResolvedDatasourceConfig {
    fn merge(defaults: &GlobalDefaults, override_cfg: Option<&DatasourceConfig>) -> Self {
        match override_cfg {
            Some(ds) => Self {
                dialect: ds.dialect.unwrap_or(defaults.dialect),
                compiler: ds
                    .compiler
                    .clone()
                    .unwrap_or_else(|| defaults.compiler.clone()),
                validation: ds
                    .validation
                    .clone()
                    .unwrap_or_else(|| defaults.validation.clone()),
            },
            None => Self {
                dialect: defaults.dialect,
                compiler: defaults.compiler.clone(),
                validation: defaults.validation.clone(),
            },
        }
    }
}
