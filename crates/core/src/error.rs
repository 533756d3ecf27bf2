use std::path::PathBuf;

use thiserror::Error;

/// Failures while opening or reading a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("unsupported SQL driver: {0}")]
    UnsupportedDriver(String),

    #[error("wrong number of fields in record {record}: expected {expected}, got {got}")]
    FieldCount {
        record: u64,
        expected: usize,
        got: usize,
    },

    #[error("invalid dataset: {0}")]
    Invalid(String),
}

/// Failures while loading the service configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("couldn't parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
