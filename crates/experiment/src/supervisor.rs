//! The experiment supervisor.
//!
//! One event loop takes descriptor files from the watcher, loads each one,
//! asks its `when` predicates whether a mode is due and, if so, runs the
//! train then test pipelines on a blocking worker. Experiments run one at a
//! time, so a file is never processed twice concurrently. Experiment
//! failures are recorded in the progress monitor and never stop the loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rulehunter_compute::{Mode, Pipeline, PipelineConfig, PipelineError};
use rulehunter_core::{Config, QuitSignal};
use rulehunter_rules::GeneratorRegistry;
use tracing::{debug, error, info, warn};

use crate::descriptor::{self, LoadedExperiment, ModePlan};
use crate::error::SupervisorError;
use crate::progress::{load_error_message, MonitorReporter, ProgressMonitor, State};
use crate::watcher::{self, DirWatcher, FileEvent};

pub type Result<T> = std::result::Result<T, SupervisorError>;

pub struct Supervisor {
    config: Config,
    pipeline_config: PipelineConfig,
    monitor: Arc<ProgressMonitor>,
    registry: Arc<GeneratorRegistry>,
    quit: QuitSignal,
}

impl Supervisor {
    /// Create the directory layout and open the progress monitor.
    pub fn new(config: Config, quit: QuitSignal) -> Result<Self> {
        std::fs::create_dir_all(&config.experiments_dir)?;
        std::fs::create_dir_all(config.reports_dir())?;
        std::fs::create_dir_all(config.tmp_dir())?;
        let monitor = Arc::new(ProgressMonitor::new(&config.progress_dir())?);
        Ok(Self {
            pipeline_config: PipelineConfig::from(&config),
            config,
            monitor,
            registry: Arc::new(GeneratorRegistry::with_defaults()),
            quit,
        })
    }

    pub fn monitor(&self) -> &Arc<ProgressMonitor> {
        &self.monitor
    }

    /// Watch the experiments directory until quit.
    pub async fn serve(&self) -> Result<()> {
        let period = Duration::from_millis(self.config.poll_interval_ms);
        let (mut events, watcher) = watcher::spawn(
            self.config.experiments_dir.clone(),
            period,
            self.quit.clone(),
        )?;
        info!("supervisor started");

        loop {
            tokio::select! {
                _ = self.quit.raised() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(&event).await,
                    None => break,
                },
            }
        }

        drop(events);
        watcher.await?;
        info!("supervisor stopped");
        Ok(())
    }

    /// Process every descriptor in the experiments directory once.
    pub async fn run_once(&self) -> Result<()> {
        let events = DirWatcher::new().scan(&self.config.experiments_dir)?;
        for event in events {
            if self.quit.is_raised() {
                break;
            }
            self.handle(&event).await;
        }
        Ok(())
    }

    /// Process a single descriptor, wherever it lives.
    pub async fn run_file(&self, path: &Path) -> Result<()> {
        let event = FileEvent::from_path(path)?;
        self.process_file(&event).await
    }

    async fn handle(&self, event: &FileEvent) {
        if let Err(e) = self.process_file(event).await {
            error!(file = %event.name, error = %e, "couldn't process experiment file");
        }
    }

    /// Load, check `when`, and run whichever modes are due.
    pub async fn process_file(&self, event: &FileEvent) -> Result<()> {
        let file = event.name.as_str();
        let loaded = match descriptor::load(&event.path) {
            Ok(loaded) => loaded,
            Err(e) => {
                if self.already_reported(file, event.mod_time, &load_error_message(&e)) {
                    debug!(file, "load error already reported");
                    return Ok(());
                }
                error!("Error loading experiment: {}, error: {}", file, e);
                self.monitor.report_load_error(file, &e)?;
                return Ok(());
            }
        };

        let modes = match self.due_modes(event, &loaded) {
            Ok(modes) => modes,
            Err(e) => {
                if self.already_reported(file, event.mod_time, &e.to_string()) {
                    return Ok(());
                }
                error!("Error processing experiment: {}, error: {}", file, e);
                self.register(file, &loaded)?;
                self.monitor.report_error(file, &e)?;
                return Ok(());
            }
        };
        if modes.is_empty() {
            debug!(file, "experiment not due");
            return Ok(());
        }

        self.register(file, &loaded)?;
        let job = Job {
            file: file.to_string(),
            loaded,
            modes,
            pipeline_config: self.pipeline_config.clone(),
            monitor: Arc::clone(&self.monitor),
            registry: Arc::clone(&self.registry),
            quit: self.quit.clone(),
        };
        let (mode, outcome) = tokio::task::spawn_blocking(move || job.run()).await?;

        match outcome {
            Ok(()) => self.monitor.report_success(file)?,
            Err(PipelineError::Quit) => {
                info!(file, mode = %mode, "experiment interrupted by quit");
            }
            Err(e) => {
                error!(
                    "Error processing experiment: {}, mode: {}, error: {}",
                    file, mode, e
                );
                self.monitor.report_error(file, &e)?;
            }
        }
        Ok(())
    }

    /// Modes whose `when` holds, train first.
    fn due_modes(
        &self,
        event: &FileEvent,
        loaded: &LoadedExperiment,
    ) -> std::result::Result<Vec<Mode>, rulehunter_rules::ExprError> {
        let (is_finished, stamp) = self.monitor.get_finish_stamp(&event.name);
        let now = Utc::now();
        let mut modes = Vec::new();
        for (mode, plan) in [(Mode::Train, &loaded.train), (Mode::Test, &loaded.test)] {
            if let Some(plan) = plan {
                if plan.when.is_due(now, is_finished, stamp, event.mod_time)? {
                    modes.push(mode);
                }
            }
        }
        Ok(modes)
    }

    /// Whether this version of the file already ended in the error `msg`.
    /// Only the duplicate record is skipped; the file is still loaded on
    /// every event, so a fixed dataset is picked up.
    fn already_reported(&self, file: &str, mod_time: DateTime<Utc>, msg: &str) -> bool {
        matches!(
            self.monitor.status(file),
            Some(status) if status.state == State::Error
                && status.stamp >= mod_time
                && status.msg == msg
        )
    }

    fn register(&self, file: &str, loaded: &LoadedExperiment) -> Result<()> {
        let exp = &loaded.experiment;
        self.monitor
            .add_experiment(file, &exp.title, &exp.tags, &exp.category)?;
        Ok(())
    }
}

/// Everything one blocking experiment run needs.
struct Job {
    file: String,
    loaded: LoadedExperiment,
    modes: Vec<Mode>,
    pipeline_config: PipelineConfig,
    monitor: Arc<ProgressMonitor>,
    registry: Arc<GeneratorRegistry>,
    quit: QuitSignal,
}

impl Job {
    /// Run the due modes in order, stopping at the first failure. Returns
    /// the last mode attempted.
    fn run(self) -> (Mode, std::result::Result<(), PipelineError>) {
        let reporter = MonitorReporter::new(&self.monitor, &self.file);
        let pipeline = Pipeline::new(
            &self.loaded.experiment,
            &self.pipeline_config,
            &self.registry,
            &reporter,
            &self.quit,
        );
        let mut last = Mode::Train;
        for &mode in &self.modes {
            last = mode;
            let plan = match mode {
                Mode::Train => self.loaded.train.as_ref(),
                Mode::Test => self.loaded.test.as_ref(),
            };
            let Some(plan) = plan else { continue };
            info!("Processing experiment: {}, mode: {}", self.file, mode);
            if let Err(e) = run_mode(&pipeline, mode, plan) {
                return (mode, Err(e));
            }
            info!("Successfully processed experiment: {}, mode: {}", self.file, mode);
        }
        (last, Ok(()))
    }
}

fn run_mode(
    pipeline: &Pipeline<'_>,
    mode: Mode,
    plan: &ModePlan,
) -> std::result::Result<(), PipelineError> {
    let result = match mode {
        Mode::Train => pipeline.train(&*plan.dataset, &plan.options).map(|_| ()),
        Mode::Test => pipeline.test(&*plan.dataset).map(|_| ()),
    };
    if let Err(e) = plan.dataset.release() {
        warn!(mode = %mode, error = %e, "couldn't release dataset");
    }
    result
}
