use rulehunter_compute::AggregatorError;
use rulehunter_core::DatasetError;
use rulehunter_rules::{ExprError, RuleError};

/// Failures loading an experiment descriptor. Reported against the file;
/// the supervisor carries on with other experiments.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid extension: {0}")]
    InvalidExt(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("yaml: {}", yaml_message(.0))]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// `line N: problem`, with the location moved to the front.
fn yaml_message(err: &serde_yaml::Error) -> String {
    let text = err.to_string();
    match err.location() {
        Some(loc) => {
            let problem = text.find(" at line ").map_or(text.as_str(), |i| &text[..i]);
            format!("line {}: {}", loc.line(), problem)
        }
        None => text,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid progress file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("experiment not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("filesystem watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("experiment worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Progress(#[from] ProgressError),
}
