//! Report files written at the end of each experiment mode.
//!
//! One JSON file per `(mode, category, title)` under the reports directory.
//! Writes go through a temporary file and a rename so readers never see a
//! partial report.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rulehunter_core::{Description, Value};
use rulehunter_rules::Rule;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::AggregatorDesc;
use crate::assessment::{Assessment, SortField};
use crate::error::ReportError;
use crate::goal::GoalAssessment;
use crate::pipeline::{Experiment, Mode};

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: Mode,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub stamp: DateTime<Utc>,
    pub description: Description,
    pub aggregators: Vec<AggregatorDesc>,
    pub sort_order: Vec<SortField>,
    pub assessments: Vec<ReportAssessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAssessment {
    pub rule: String,
    pub aggregators: Vec<ReportAggregator>,
    pub goals: Vec<GoalAssessment>,
}

/// An aggregator value and how it differs from the `true()` rule's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAggregator {
    pub name: String,
    pub value: Value,
    pub difference: Value,
}

impl Report {
    pub fn new(
        mode: Mode,
        experiment: &Experiment,
        description: Description,
        assessment: &Assessment,
    ) -> Self {
        let baseline = assessment.true_assessment();
        let assessments = assessment
            .rule_assessments
            .iter()
            .map(|ra| ReportAssessment {
                rule: ra.rule.to_string(),
                aggregators: ra
                    .aggregators
                    .iter()
                    .map(|(name, value)| ReportAggregator {
                        name: name.clone(),
                        value: value.clone(),
                        difference: difference(
                            value,
                            baseline.and_then(|t| t.aggregators.get(name)),
                        ),
                    })
                    .collect(),
                goals: ra.goals.clone(),
            })
            .collect();

        Self {
            mode,
            title: experiment.title.clone(),
            category: experiment.category.clone(),
            tags: experiment.tags.clone(),
            stamp: Utc::now(),
            description,
            aggregators: experiment.aggregators.descs(),
            sort_order: experiment.sort_order.clone(),
            assessments,
        }
    }

    pub fn file_name(mode: Mode, category: &str, title: &str) -> String {
        let mut parts = vec![mode.to_string()];
        if !category.trim().is_empty() {
            parts.push(escape(category));
        }
        parts.push(escape(title));
        format!("{}.json", parts.join("_"))
    }

    pub fn path(dir: &Path, mode: Mode, category: &str, title: &str) -> PathBuf {
        dir.join(Self::file_name(mode, category, title))
    }

    /// Write atomically into `dir`, returning the report's path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path(dir, self.mode, &self.category, &self.title);
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(path = %path.display(), assessments = self.assessments.len(), "report written");
        Ok(path)
    }

    /// The report for `(mode, category, title)`, if one has been written.
    pub fn load(dir: &Path, mode: Mode, category: &str, title: &str) -> Result<Option<Self>> {
        let path = Self::path(dir, mode, category, title);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// The reported rules, parsed back into rules.
    pub fn rules(&self) -> Result<Vec<Rule>> {
        self.assessments
            .iter()
            .map(|a| Rule::parse(&a.rule).map_err(ReportError::from))
            .collect()
    }
}

/// `value − baseline` for numbers, at the larger of their decimal places.
fn difference(value: &Value, baseline: Option<&Value>) -> Value {
    let Some(baseline) = baseline else {
        return Value::Str("N/A".into());
    };
    match (value.as_f64(), baseline.as_f64()) {
        (Some(v), Some(b)) => Value::number(v - b, value.num_dp().max(baseline.num_dp())),
        _ => Value::Str("N/A".into()),
    }
}

/// Lowercase, keep only alphanumerics, and join words with `-`.
fn escape(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
