//! Experiment lifecycle: descriptors, the `when` predicate, progress
//! tracking, the directory watcher and the supervisor tying them together.

pub mod descriptor;
pub mod error;
pub mod progress;
pub mod supervisor;
pub mod watcher;
pub mod when;

pub use descriptor::{ExperimentDesc, LoadedExperiment, ModePlan};
pub use error::{DescriptorError, ProgressError, SupervisorError};
pub use progress::{
    ExperimentRecord, ExperimentStatus, MonitorReporter, ProgressMonitor, ProgressUpdate, State,
};
pub use supervisor::Supervisor;
pub use watcher::{DirWatcher, FileEvent};
pub use when::When;
