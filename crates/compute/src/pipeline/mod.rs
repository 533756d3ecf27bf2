//! Staged rule discovery for one experiment mode.
//!
//! Train mode:
//! - **Describe**: one pass to summarise every field.
//! - **Bootstrap**: assess the user's rules plus `true()`.
//! - **Generate**: candidates from the description.
//! - **Tweak** (stages 1..=3): nudge numeric pivots of the survivors.
//! - **Reduce DP**: round pivots to fewer decimal places.
//! - **Combine**: `And`/`Or` pairs of the survivors.
//!
//! After every stage the assessment is merged, sorted, refined and
//! truncated, and the quit signal is checked. Test mode assesses the user's
//! rules plus those of the latest train report in a single pass.


use std::fmt;
use std::path::PathBuf;

use rulehunter_core::{make_dataset, Config, Dataset, Description, QuitSignal};
use rulehunter_rules::generate::{GenerationOptions, GeneratorRegistry};
use rulehunter_rules::rule::combine;
use rulehunter_rules::{Rule, RuleTracker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::AggregatorSet;
use crate::assessment::{Assessment, Assessor, SortField};
use crate::error::PipelineError;
use crate::goal::Goal;
use crate::report::Report;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Rules kept between stages.
pub const MAX_ASSESSED_RULES: usize = 5000;

/// Candidates produced by one combination round.
pub const MAX_COMBINATIONS: usize = 10_000;

pub const NUM_TWEAK_STAGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Test,
}

impl Mode {
    /// Capitalised name used to prefix progress messages.
    pub fn title(self) -> &'static str {
        match self {
            Mode::Train => "Train",
            Mode::Test => "Test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Train => f.write_str("train"),
            Mode::Test => f.write_str("test"),
        }
    }
}

/// Receives progress from a running pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, mode: Mode, msg: &str, percent: f64);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report_progress(&self, _mode: Mode, _msg: &str, _percent: f64) {}
}

/// Everything about an experiment the pipeline needs, compiled once.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub aggregators: AggregatorSet,
    pub goals: Vec<Goal>,
    pub sort_order: Vec<SortField>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    pub generation: GenerationOptions,
    pub combination_length: usize,
}

/// Service-wide limits and locations.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_num_records: Option<usize>,
    pub max_num_processes: usize,
    pub max_num_report_rules: usize,
    pub tmp_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_num_records: config.max_num_records,
            max_num_processes: config.resolved_max_num_processes(),
            max_num_report_rules: config.max_num_report_rules,
            tmp_dir: config.tmp_dir(),
            reports_dir: config.reports_dir(),
        }
    }
}

pub struct Pipeline<'a> {
    experiment: &'a Experiment,
    config: &'a PipelineConfig,
    registry: &'a GeneratorRegistry,
    reporter: &'a dyn ProgressReporter,
    quit: &'a QuitSignal,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        experiment: &'a Experiment,
        config: &'a PipelineConfig,
        registry: &'a GeneratorRegistry,
        reporter: &'a dyn ProgressReporter,
        quit: &'a QuitSignal,
    ) -> Self {
        Self {
            experiment,
            config,
            registry,
            reporter,
            quit,
        }
    }

    /// Discover rules on `source` and write the train report.
    pub fn train(&self, source: &dyn Dataset, opts: &TrainOptions) -> Result<Report> {
        let mode = Mode::Train;
        self.stage(mode, "Describing dataset", 0.0)?;
        let dataset = make_dataset(source, self.config.max_num_records, &self.config.tmp_dir)?;
        let desc = Description::describe(&dataset).map_err(PipelineError::Describe)?;
        let assessor = self.assessor()?;
        let mut tracker = RuleTracker::new();

        self.stage(mode, "Assessing user rules", 5.0)?;
        let mut bootstrap = self.experiment.rules.clone();
        bootstrap.push(Rule::True);
        let mut assessment = assessor.assess_rules(&dataset, &tracker.track(bootstrap))?;

        self.stage(mode, "Generating rules", 10.0)?;
        let generated = self.registry.generate(&desc, &opts.generation);
        self.assess_round(&assessor, &dataset, &mut tracker, &mut assessment, generated)?;

        for stage in 1..=NUM_TWEAK_STAGES {
            let msg = format!("Tweaking rules (stage {})", stage);
            self.stage(mode, &msg, 10.0 + 15.0 * stage as f64)?;
            let tweaked = assessment
                .rules()
                .iter()
                .flat_map(|r| r.tweak(&desc, stage))
                .collect();
            self.assess_round(&assessor, &dataset, &mut tracker, &mut assessment, tweaked)?;
        }

        self.stage(mode, "Reducing DP of rules", 60.0)?;
        let reduced = assessment
            .rules()
            .iter()
            .flat_map(|r| r.reduce_dp())
            .collect();
        self.assess_round(&assessor, &dataset, &mut tracker, &mut assessment, reduced)?;

        for round in 1..=opts.combination_length {
            let msg = format!("Combining rules (round {})", round);
            let percent = 70.0 + 25.0 * (round - 1) as f64 / opts.combination_length as f64;
            self.stage(mode, &msg, percent)?;
            let combined = combine(&assessment.rules(), MAX_COMBINATIONS);
            self.assess_round(&assessor, &dataset, &mut tracker, &mut assessment, combined)?;
        }

        self.stage(mode, "Writing report", 95.0)?;
        assessment.sort(&self.experiment.sort_order);
        assessment.refine()?;
        assessment.truncate_rule_assessments(self.config.max_num_report_rules)?;
        self.write_report(mode, desc, &assessment)
    }

    /// Assess the user's rules and the latest train report's rules on
    /// `source` and write the test report.
    pub fn test(&self, source: &dyn Dataset) -> Result<Report> {
        let mode = Mode::Test;
        self.stage(mode, "Describing dataset", 0.0)?;
        let dataset = make_dataset(source, self.config.max_num_records, &self.config.tmp_dir)?;
        let desc = Description::describe(&dataset).map_err(PipelineError::Describe)?;

        self.stage(mode, "Assessing rules", 20.0)?;
        let mut rules = self.experiment.rules.clone();
        let train = Report::load(
            &self.config.reports_dir,
            Mode::Train,
            &self.experiment.category,
            &self.experiment.title,
        )?;
        if let Some(train) = train {
            rules.extend(train.rules()?);
        }
        rules.push(Rule::True);
        let rules = RuleTracker::new().track(rules);
        debug!(rules = rules.len(), "test rules");

        let mut assessment = self.assessor()?.assess_rules(&dataset, &rules)?;
        assessment.sort(&self.experiment.sort_order);

        self.stage(mode, "Writing report", 95.0)?;
        self.write_report(mode, desc, &assessment)
    }

    fn assessor(&self) -> Result<Assessor<'a>> {
        Ok(Assessor::new(
            self.config.max_num_processes,
            &self.experiment.aggregators,
            &self.experiment.goals,
            self.quit.clone(),
        )?)
    }

    /// Assess the unseen candidates, fold them in, and rank.
    fn assess_round(
        &self,
        assessor: &Assessor<'_>,
        dataset: &dyn Dataset,
        tracker: &mut RuleTracker,
        assessment: &mut Assessment,
        candidates: Vec<Rule>,
    ) -> Result<()> {
        let rules = tracker.track(candidates);
        debug!(new_rules = rules.len(), "assessment round");
        if !rules.is_empty() {
            assessment.merge(assessor.assess_rules(dataset, &rules)?)?;
        }
        assessment.sort(&self.experiment.sort_order);
        assessment.refine()?;
        assessment.truncate_rule_assessments(MAX_ASSESSED_RULES)?;
        Ok(())
    }

    fn stage(&self, mode: Mode, msg: &str, percent: f64) -> Result<()> {
        if self.quit.is_raised() {
            return Err(PipelineError::Quit);
        }
        self.reporter.report_progress(mode, msg, percent);
        Ok(())
    }

    fn write_report(&self, mode: Mode, desc: Description, assessment: &Assessment) -> Result<Report> {
        if self.quit.is_raised() {
            return Err(PipelineError::Quit);
        }
        let report = Report::new(mode, self.experiment, desc, assessment);
        let path = report.write(&self.config.reports_dir)?;
        info!(
            title = %self.experiment.title,
            mode = %mode,
            path = %path.display(),
            rules = report.assessments.len(),
            "experiment mode finished"
        );
        Ok(report)
    }
}
