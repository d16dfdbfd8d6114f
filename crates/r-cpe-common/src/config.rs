//! ---
//! cpe_section: "01-core-functionality"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Shared primitives and utilities for the convergence runtime."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_drift_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_job_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the R-CPE runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_CPE_CONFIG";

    /// Load configuration from disk, respecting the `R_CPE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.convergence.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            convergence: ConvergenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Tunables for the convergence and provisioning reconcilers.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Delay requested after patching a drifted field, giving the mutation
    /// time to propagate before the next comparison.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_drift_cooldown")]
    pub drift_cooldown: Duration,
    /// Cadence at which a provisioning request re-inspects its delegated job.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_job_poll_interval")]
    pub job_poll_interval: Duration,
}

impl ConvergenceConfig {
    fn validate(&self) -> Result<()> {
        if self.drift_cooldown.is_zero() {
            return Err(anyhow!("convergence.drift_cooldown must be non-zero"));
        }
        if self.job_poll_interval.is_zero() {
            return Err(anyhow!("convergence.job_poll_interval must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            drift_cooldown: default_drift_cooldown(),
            job_poll_interval: default_job_poll_interval(),
        }
    }
}

/// Logging sink configuration consumed by [`crate::logging::init_tracing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling daily log file; stdout-only when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: None,
            format: default_log_format(),
        }
    }
}
