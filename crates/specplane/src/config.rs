//! Project configuration file support for specplane.
//!
//! Loads configuration from `specplane.toml` in the working directory and
//! merges it with command-line overrides into [`Settings`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use specplane_core::{
    CategoryRoles, CoverageScorer, SessionMode, SpecGenerator, DEFAULT_AT_RISK_THRESHOLD,
};
use specplane_logging::LogFormat;
use specplane_store::{FileSessionStore, SessionStore, SqliteSessionStore};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "specplane.toml";

/// Output directory used when neither flag nor config names one
pub const DEFAULT_OUTPUT_DIR: &str = "specs";

/// Project-level configuration loaded from `specplane.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Question bank file (TOML or JSON); the built-in bank when unset
    pub bank: Option<PathBuf>,
    /// Where generated artifacts are written
    pub output_dir: Option<PathBuf>,
    pub mode: Option<SessionMode>,
    /// pretty, json or compact
    pub log_format: Option<String>,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CoverageConfig {
    /// Categories scoring strictly below this are at risk
    pub threshold: Option<f64>,
}

/// Which bank categories feed the dedicated prompt sections
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    pub purpose: Option<String>,
    pub failure_handling: Option<String>,
    pub state_management: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    /// Sessions directory (file) or database file (sqlite)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Sqlite,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}

/// Values given on the command line. Each one beats the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bank: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub mode: Option<SessionMode>,
    pub log_format: Option<LogFormat>,
    pub store: Option<StoreBackend>,
}

/// Effective settings after merging flags, config file and defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub working_dir: PathBuf,
    pub bank: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub mode: SessionMode,
    pub log_format: LogFormat,
    pub threshold: f64,
    pub roles: CategoryRoles,
    pub store_backend: StoreBackend,
    pub store_path: Option<PathBuf>,
}

impl Settings {
    /// Priority: command line > `specplane.toml` > built-in defaults.
    /// Relative paths are resolved against the working directory.
    pub fn resolve(
        working_dir: &Path,
        config: Option<ProjectConfig>,
        overrides: Overrides,
    ) -> Result<Self> {
        let config = config.unwrap_or_default();
        let absolute = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                working_dir.join(path)
            }
        };

        let log_format = match (overrides.log_format, config.log_format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => name
                .parse::<LogFormat>()
                .map_err(|e| anyhow::anyhow!("{} in {}", e, CONFIG_FILE_NAME))?,
            (None, None) => LogFormat::default(),
        };

        let threshold = config.coverage.threshold.unwrap_or(DEFAULT_AT_RISK_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "coverage.threshold must be within [0, 1], got {} in {}",
                threshold,
                CONFIG_FILE_NAME
            );
        }

        let defaults = CategoryRoles::default();
        let roles = CategoryRoles {
            purpose: config.roles.purpose.unwrap_or(defaults.purpose),
            failure_handling: config
                .roles
                .failure_handling
                .unwrap_or(defaults.failure_handling),
            state_management: config
                .roles
                .state_management
                .unwrap_or(defaults.state_management),
        };

        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            bank: overrides.bank.or(config.bank).map(absolute),
            output_dir: absolute(
                overrides
                    .output_dir
                    .or(config.output_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ),
            mode: overrides.mode.or(config.mode).unwrap_or_default(),
            log_format,
            threshold,
            roles,
            store_backend: overrides.store.or(config.store.backend).unwrap_or_default(),
            store_path: config.store.path.map(absolute),
        })
    }

    pub fn generator(&self) -> SpecGenerator {
        SpecGenerator::new(CoverageScorer::new(self.threshold), self.roles.clone())
    }

    pub fn open_store(&self) -> Result<Arc<dyn SessionStore>> {
        let store: Arc<dyn SessionStore> = match (self.store_backend, &self.store_path) {
            (StoreBackend::File, Some(path)) => Arc::new(FileSessionStore::with_dir(path)),
            (StoreBackend::File, None) => {
                Arc::new(FileSessionStore::new().context("Failed to locate sessions directory")?)
            }
            (StoreBackend::Sqlite, Some(path)) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Arc::new(
                    SqliteSessionStore::open_at(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                )
            }
            (StoreBackend::Sqlite, None) => {
                Arc::new(SqliteSessionStore::open().context("Failed to open session database")?)
            }
        };
        Ok(store)
    }
}
