use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_opt(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{} is not valid: {}", key, v))),
        None => Ok(None),
    }
}

fn default_experiments_dir() -> PathBuf {
    PathBuf::from("experiments")
}
fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}
fn default_max_num_report_rules() -> usize {
    2
}
fn default_poll_interval_ms() -> u64 {
    1000
}

// ── Service config ────────────────────────────────────────────

/// Service configuration. Every key has a default, so an empty file (or no
/// file) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Watched directory of experiment descriptors.
    #[serde(default = "default_experiments_dir")]
    pub experiments_dir: PathBuf,
    /// Root of progress, reports and dataset snapshots.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    /// Cap on records read from each dataset. None = unlimited.
    #[serde(default)]
    pub max_num_records: Option<usize>,
    /// Assessment worker threads. 0 = available parallelism.
    #[serde(default)]
    pub max_num_processes: usize,
    #[serde(default = "default_max_num_report_rules")]
    pub max_num_report_rules: usize,
    /// Watcher poll period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            experiments_dir: default_experiments_dir(),
            build_dir: default_build_dir(),
            max_num_records: None,
            max_num_processes: 0,
            max_num_report_rules: default_max_num_report_rules(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Read `path` (TOML) if given, then apply `RULEHUNTER_*` overrides from
    /// the environment (call `load_dotenv()` first).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Some(dir) = env_opt("RULEHUNTER_EXPERIMENTS_DIR") {
            self.experiments_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_opt("RULEHUNTER_BUILD_DIR") {
            self.build_dir = PathBuf::from(dir);
        }
        if let Some(n) = env_parse("RULEHUNTER_MAX_NUM_RECORDS")? {
            self.max_num_records = Some(n);
        }
        if let Some(n) = env_parse("RULEHUNTER_MAX_NUM_PROCESSES")? {
            self.max_num_processes = n;
        }
        if let Some(n) = env_parse("RULEHUNTER_MAX_NUM_REPORT_RULES")? {
            self.max_num_report_rules = n;
        }
        if let Some(ms) = env_parse("RULEHUNTER_POLL_INTERVAL_MS")? {
            self.poll_interval_ms = ms;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_num_report_rules < 1 {
            return Err(ConfigError::Invalid(
                "max_num_report_rules must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_num_records == Some(0) {
            return Err(ConfigError::Invalid(
                "max_num_records must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker threads to use: `max_num_processes`, or available parallelism
    /// when 0.
    pub fn resolved_max_num_processes(&self) -> usize {
        if self.max_num_processes > 0 {
            self.max_num_processes
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    pub fn progress_dir(&self) -> PathBuf {
        self.build_dir.join("progress")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.build_dir.join("reports")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.build_dir.join("tmp")
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  experiments: dir={}", self.experiments_dir.display());
        tracing::info!("  build:       dir={}", self.build_dir.display());
        tracing::info!(
            "  assessment:  processes={}, max_records={}",
            self.resolved_max_num_processes(),
            self.max_num_records
                .map_or_else(|| "(unlimited)".to_string(), |n| n.to_string())
        );
        tracing::info!("  report:      max_rules={}", self.max_num_report_rules);
        tracing::info!("  watcher:     poll_interval_ms={}", self.poll_interval_ms);
    }
}
