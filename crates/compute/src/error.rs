use rulehunter_core::DatasetError;
use rulehunter_rules::{ExprError, RuleError};

/// Failures while assessing rules against a dataset.
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("can't merge assessments: numRecords differ ({0} != {1})")]
    NumRecordsMismatch(u64, u64),

    #[error("assessment isn't sorted")]
    NotSorted,

    #[error("assessment isn't refined")]
    NotRefined,

    #[error("quit received")]
    Quit,

    #[error("couldn't start assessment workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Failures of a whole pipeline run. `Quit` isn't an experiment error: the
/// run was cancelled and nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("quit received")]
    Quit,

    #[error("Couldn't describe dataset: {0}")]
    Describe(DatasetError),

    #[error("Couldn't assess rules: {0}")]
    Assess(AssessError),

    #[error("Couldn't read dataset: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Couldn't write report: {0}")]
    Report(#[from] ReportError),
}

impl From<AssessError> for PipelineError {
    fn from(e: AssessError) -> Self {
        match e {
            AssessError::Quit => PipelineError::Quit,
            other => PipelineError::Assess(other),
        }
    }
}
