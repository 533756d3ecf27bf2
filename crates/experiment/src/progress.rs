//! Progress monitor: the live state of every experiment the supervisor has
//! seen.
//!
//! The in-memory map holds every state. `progress.json` holds only the
//! Success records; they carry the last-success stamps the `when`
//! predicate reads after a restart. Every mutation rewrites the file and
//! broadcasts the changed record.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rulehunter_compute::{Mode, ProgressReporter};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::ProgressError;

pub type Result<T> = std::result::Result<T, ProgressError>;

pub const PROGRESS_FILENAME: &str = "progress.json";

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Waiting,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentStatus {
    pub stamp: DateTime<Utc>,
    pub msg: String,
    #[serde(skip)]
    pub percent: f64,
    pub state: State,
    /// The descriptor failed to load, so nothing ran.
    #[serde(skip)]
    pub load_error: bool,
}

impl ExperimentStatus {
    fn now(state: State, msg: impl Into<String>, percent: f64) -> Self {
        Self {
            stamp: Utc::now(),
            msg: msg.into(),
            percent,
            state,
            load_error: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Success | State::Error)
    }
}

/// Status message recorded for a descriptor that couldn't be loaded.
pub fn load_error_message(err: &dyn std::error::Error) -> String {
    format!("Error loading experiment: {}", err)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub filename: String,
    pub title: String,
    pub tags: Vec<String>,
    pub category: String,
    pub status: ExperimentStatus,
}

/// Broadcast after every mutation.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub experiment: ExperimentRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
    experiments: Vec<ExperimentRecord>,
}

pub struct ProgressMonitor {
    path: PathBuf,
    experiments: Mutex<HashMap<String, ExperimentRecord>>,
    updates: broadcast::Sender<ProgressUpdate>,
}

impl ProgressMonitor {
    /// Open the monitor over `progress_dir`, loading any earlier
    /// `progress.json`.
    pub fn new(progress_dir: &Path) -> Result<Self> {
        fs::create_dir_all(progress_dir)?;
        let path = progress_dir.join(PROGRESS_FILENAME);
        let file: ProgressFile = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => ProgressFile::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), experiments = file.experiments.len(), "progress loaded");
        let experiments = file
            .experiments
            .into_iter()
            .map(|e| (e.filename.clone(), e))
            .collect();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            experiments: Mutex::new(experiments),
            updates,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register (or re-register) an experiment about to be processed.
    pub fn add_experiment(
        &self,
        filename: &str,
        title: &str,
        tags: &[String],
        category: &str,
    ) -> Result<()> {
        self.update(filename, |experiments| {
            let record = ExperimentRecord {
                filename: filename.to_string(),
                title: title.to_string(),
                tags: tags.to_vec(),
                category: category.to_string(),
                status: ExperimentStatus::now(State::Waiting, "Waiting to be processed", 0.0),
            };
            experiments.insert(filename.to_string(), record);
            Ok(())
        })
    }

    pub fn report_progress(&self, filename: &str, mode: Mode, msg: &str, percent: f64) -> Result<()> {
        let msg = format!("{}: {}", mode.title(), msg);
        self.set_status(filename, ExperimentStatus::now(State::Processing, msg, percent))
    }

    pub fn report_success(&self, filename: &str) -> Result<()> {
        self.set_status(filename, ExperimentStatus::now(State::Success, "Finished processing successfully", 100.0))
    }

    pub fn report_error(&self, filename: &str, err: &dyn std::error::Error) -> Result<()> {
        self.set_status(filename, ExperimentStatus::now(State::Error, err.to_string(), 0.0))
    }

    /// Record a descriptor that couldn't be loaded. The record is created if
    /// the experiment was never added.
    pub fn report_load_error(&self, filename: &str, err: &dyn std::error::Error) -> Result<()> {
        let status = ExperimentStatus {
            load_error: true,
            ..ExperimentStatus::now(State::Error, load_error_message(err), 0.0)
        };
        self.update(filename, |experiments| {
            experiments
                .entry(filename.to_string())
                .and_modify(|e| e.status = status.clone())
                .or_insert_with(|| ExperimentRecord {
                    filename: filename.to_string(),
                    title: String::new(),
                    tags: Vec::new(),
                    category: String::new(),
                    status: status.clone(),
                });
            Ok(())
        })
    }

    /// `(is_finished, stamp)` of the experiment's last known status. A load
    /// error doesn't count as finished: the experiment never ran.
    pub fn get_finish_stamp(&self, filename: &str) -> (bool, Option<DateTime<Utc>>) {
        let experiments = self.experiments.lock().unwrap_or_else(|e| e.into_inner());
        match experiments.get(filename) {
            Some(e) => (
                e.status.is_finished() && !e.status.load_error,
                Some(e.status.stamp),
            ),
            None => (false, None),
        }
    }

    pub fn status(&self, filename: &str) -> Option<ExperimentStatus> {
        let experiments = self.experiments.lock().unwrap_or_else(|e| e.into_inner());
        experiments.get(filename).map(|e| e.status.clone())
    }

    /// Every record, most recently stamped first.
    pub fn get_experiments(&self) -> Vec<ExperimentRecord> {
        let experiments = self.experiments.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<ExperimentRecord> = experiments.values().cloned().collect();
        list.sort_by(|a, b| {
            b.status
                .stamp
                .cmp(&a.status.stamp)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        list
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.updates.subscribe()
    }

    fn set_status(&self, filename: &str, status: ExperimentStatus) -> Result<()> {
        self.update(filename, |experiments| match experiments.get_mut(filename) {
            Some(e) => {
                e.status = status;
                Ok(())
            }
            None => Err(ProgressError::NotFound(filename.to_string())),
        })
    }

    /// Apply `f` under the lock, persist, then broadcast `filename`'s record.
    fn update<F>(&self, filename: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, ExperimentRecord>) -> Result<()>,
    {
        let mut experiments = self.experiments.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut experiments)?;
        self.persist(&experiments)?;
        if let Some(record) = experiments.get(filename) {
            // No subscribers is fine.
            let _ = self.updates.send(ProgressUpdate {
                experiment: record.clone(),
            });
        }
        Ok(())
    }

    fn persist(&self, experiments: &HashMap<String, ExperimentRecord>) -> Result<()> {
        let mut succeeded: Vec<&ExperimentRecord> = experiments
            .values()
            .filter(|e| e.status.state == State::Success)
            .collect();
        succeeded.sort_by(|a, b| a.filename.cmp(&b.filename));

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(&serde_json::json!({ "experiments": succeeded }))?;
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Feeds one experiment's pipeline progress into the monitor.
pub struct MonitorReporter<'a> {
    monitor: &'a ProgressMonitor,
    filename: &'a str,
}

impl<'a> MonitorReporter<'a> {
    pub fn new(monitor: &'a ProgressMonitor, filename: &'a str) -> Self {
        Self { monitor, filename }
    }
}

impl ProgressReporter for MonitorReporter<'_> {
    fn report_progress(&self, mode: Mode, msg: &str, percent: f64) {
        if let Err(e) = self.monitor.report_progress(self.filename, mode, msg, percent) {
            warn!(file = self.filename, error = %e, "couldn't record progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn tags() -> Vec<String> {
        vec!["debt".to_string()]
    }

    fn on_disk(monitor: &ProgressMonitor) -> Vec<String> {
        let file: ProgressFile =
            serde_json::from_slice(&fs::read(monitor.path()).unwrap()).unwrap();
        file.experiments.into_iter().map(|e| e.filename).collect()
    }

    #[test]
    fn lifecycle_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();

        monitor.add_experiment("a.json", "A", &tags(), "").unwrap();
        monitor.add_experiment("b.json", "B", &tags(), "cat").unwrap();
        assert!(!monitor.get_finish_stamp("a.json").0);
        assert!(on_disk(&monitor).is_empty());

        monitor
            .report_progress("a.json", Mode::Train, "Tweaking rules (stage 2)", 40.0)
            .unwrap();
        let a = monitor
            .get_experiments()
            .into_iter()
            .find(|e| e.filename == "a.json")
            .unwrap();
        assert_eq!(a.status.state, State::Processing);
        assert_eq!(a.status.msg, "Train: Tweaking rules (stage 2)");
        assert_eq!(a.status.percent, 40.0);

        monitor.report_success("a.json").unwrap();
        monitor
            .report_error("b.json", &io::Error::new(io::ErrorKind::Other, "boom"))
            .unwrap();
        assert_eq!(on_disk(&monitor), vec!["a.json"]);

        let (finished, stamp) = monitor.get_finish_stamp("b.json");
        assert!(finished);
        assert!(stamp.is_some());

        // a new run resets to Waiting and drops the file entry
        monitor.add_experiment("a.json", "A", &tags(), "").unwrap();
        assert!(on_disk(&monitor).is_empty());
    }

    #[test]
    fn reload_keeps_only_successes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let monitor = ProgressMonitor::new(dir.path()).unwrap();
            monitor.add_experiment("a.json", "A", &tags(), "").unwrap();
            monitor.add_experiment("b.json", "B", &tags(), "").unwrap();
            monitor.report_success("a.json").unwrap();
        }
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        let all = monitor.get_experiments();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].filename, "a.json");
        assert_eq!(all[0].title, "A");
        assert_eq!(all[0].status.state, State::Success);
        assert!(monitor.get_finish_stamp("a.json").0);
    }

    #[test]
    fn load_error_creates_record() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        monitor
            .report_load_error("broken.yaml", &io::Error::new(io::ErrorKind::Other, "bad key"))
            .unwrap();
        let all = monitor.get_experiments();
        assert_eq!(all[0].status.state, State::Error);
        assert_eq!(all[0].status.msg, "Error loading experiment: bad key");
        assert!(all[0].status.load_error);
        let (finished, stamp) = monitor.get_finish_stamp("broken.yaml");
        assert!(!finished);
        assert!(stamp.is_some());

        monitor.add_experiment("broken.yaml", "B", &[], "").unwrap();
        monitor.report_error("broken.yaml", &io::Error::new(io::ErrorKind::Other, "boom")).unwrap();
        assert!(monitor.get_finish_stamp("broken.yaml").0);
    }

    #[test]
    fn unknown_experiment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        let err = monitor.report_success("nope.json").unwrap_err();
        assert!(matches!(err, ProgressError::NotFound(f) if f == "nope.json"));
    }

    #[test]
    fn experiments_sorted_by_stamp_descending() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        monitor.add_experiment("first.json", "1", &[], "").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        monitor.add_experiment("second.json", "2", &[], "").unwrap();
        let names: Vec<String> = monitor
            .get_experiments()
            .into_iter()
            .map(|e| e.filename)
            .collect();
        assert_eq!(names, vec!["second.json", "first.json"]);
    }

    #[test]
    fn updates_are_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        let mut rx = monitor.subscribe();
        monitor.add_experiment("a.json", "A", &[], "").unwrap();
        monitor.report_success("a.json").unwrap();
        assert_eq!(rx.try_recv().unwrap().experiment.status.state, State::Waiting);
        assert_eq!(rx.try_recv().unwrap().experiment.status.state, State::Success);
    }

    #[test]
    fn reporter_prefixes_mode() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = ProgressMonitor::new(dir.path()).unwrap();
        monitor.add_experiment("a.json", "A", &[], "").unwrap();
        MonitorReporter::new(&monitor, "a.json").report_progress(Mode::Test, "Assessing rules", 20.0);
        assert_eq!(monitor.get_experiments()[0].status.msg, "Test: Assessing rules");
    }
}
