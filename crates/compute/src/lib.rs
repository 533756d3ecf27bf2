//! Rule assessment and the staged discovery pipeline.
//!
//! - [`aggregator`]: per-rule accumulators and their final values
//! - [`goal`]: boolean goals over aggregator values
//! - [`assessment`]: parallel assessment plus sort/refine/truncate
//! - [`pipeline`]: train and test modes for one experiment
//! - [`report`]: the JSON report written at the end of each mode

pub mod aggregator;
pub mod assessment;
pub mod error;
pub mod goal;
pub mod pipeline;
pub mod report;

pub use aggregator::{AggregatorDesc, AggregatorError, AggregatorKind, AggregatorSet};
pub use assessment::{Assessment, Assessor, Direction, RuleAssessment, SortField};
pub use error::{AssessError, PipelineError, ReportError};
pub use goal::{Goal, GoalAssessment};
pub use pipeline::{
    Experiment, Mode, NoProgress, Pipeline, PipelineConfig, ProgressReporter, TrainOptions,
};
pub use report::Report;
