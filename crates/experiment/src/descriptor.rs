//! Experiment descriptors: YAML or JSON files in the experiments directory.
//!
//! A descriptor is parsed, validated and compiled in one go, so expression
//! and dataset problems surface as load errors before any mode runs.

use std::fs;
use std::path::{Path, PathBuf};

use rulehunter_compute::{AggregatorDesc, AggregatorSet, Experiment, Goal, SortField, TrainOptions};
use rulehunter_core::dataset::{CsvDataset, SqlDataset, SQL_DRIVERS};
use rulehunter_core::Dataset;
use rulehunter_rules::{GenerationOptions, Rule};
use serde::Deserialize;

use crate::error::DescriptorError;
use crate::when::When;

pub type Result<T> = std::result::Result<T, DescriptorError>;

// ── File format ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExperimentDesc {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub train: Option<ModeDesc>,
    #[serde(default)]
    pub test: Option<ModeDesc>,
    #[serde(default)]
    pub aggregators: Vec<AggregatorDesc>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub sort_order: Vec<SortField>,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModeDesc {
    pub dataset: DatasetDesc,
    #[serde(default)]
    pub when: String,
    /// Train only.
    #[serde(default)]
    pub rule_generation: Option<RuleGenerationDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetDesc {
    #[serde(default)]
    pub csv: Option<CsvDesc>,
    #[serde(default)]
    pub sql: Option<SqlDesc>,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CsvDesc {
    pub filename: String,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default)]
    pub separator: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlDesc {
    pub driver_name: String,
    pub data_source_name: String,
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleGenerationDesc {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub arithmetic: bool,
    #[serde(default)]
    pub combination_length: usize,
}

// ── Compiled form ───────────────────────────────────────────────────

/// One mode of a loaded experiment: where its data comes from and when
/// it's due.
pub struct ModePlan {
    pub dataset: Box<dyn Dataset>,
    pub when: When,
    pub options: TrainOptions,
}

impl std::fmt::Debug for ModePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModePlan")
            .field("when", &self.when)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct LoadedExperiment {
    pub experiment: Experiment,
    pub train: Option<ModePlan>,
    pub test: Option<ModePlan>,
}

/// Read, parse and compile the descriptor at `path`.
pub fn load(path: &Path) -> Result<LoadedExperiment> {
    let desc = parse(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    compile(desc, base_dir)
}

/// Parse by extension: `.yaml` or `.json`.
pub fn parse(path: &Path) -> Result<ExperimentDesc> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    match ext.as_str() {
        "yaml" => Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?),
        "json" => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        _ => Err(DescriptorError::InvalidExt(ext)),
    }
}

pub fn compile(desc: ExperimentDesc, base_dir: &Path) -> Result<LoadedExperiment> {
    if desc.title.trim().is_empty() {
        return Err(invalid("experiment field missing: title"));
    }
    if desc.train.is_none() && desc.test.is_none() {
        return Err(invalid("experiment field missing: train or test"));
    }
    if desc.test.as_ref().is_some_and(|t| t.rule_generation.is_some()) {
        return Err(invalid("test: ruleGeneration is only allowed in train"));
    }

    let aggregators = AggregatorSet::new(&desc.aggregators)?;
    for field in &desc.sort_order {
        if !aggregators.contains(&field.aggregator) {
            return Err(invalid(&format!(
                "sortOrder aggregator doesn't exist: {}",
                field.aggregator
            )));
        }
    }
    let goals = desc
        .goals
        .iter()
        .map(|g| Goal::new(g))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let rules = desc
        .rules
        .iter()
        .map(|r| Rule::parse(r))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let train = desc
        .train
        .as_ref()
        .map(|m| compile_mode(m, base_dir))
        .transpose()?;
    let test = desc
        .test
        .as_ref()
        .map(|m| compile_mode(m, base_dir))
        .transpose()?;

    Ok(LoadedExperiment {
        experiment: Experiment {
            title: desc.title,
            category: desc.category,
            tags: desc.tags,
            aggregators,
            goals,
            sort_order: desc.sort_order,
            rules,
        },
        train,
        test,
    })
}

fn compile_mode(mode: &ModeDesc, base_dir: &Path) -> Result<ModePlan> {
    let generation = mode.rule_generation.clone().unwrap_or_default();
    Ok(ModePlan {
        dataset: make_source(&mode.dataset, base_dir)?,
        when: When::new(&mode.when)?,
        options: TrainOptions {
            generation: GenerationOptions {
                fields: generation.fields,
                arithmetic: generation.arithmetic,
            },
            combination_length: generation.combination_length,
        },
    })
}

fn make_source(desc: &DatasetDesc, base_dir: &Path) -> Result<Box<dyn Dataset>> {
    match (&desc.csv, &desc.sql) {
        (Some(csv), None) => {
            let mut path = PathBuf::from(&csv.filename);
            if path.is_relative() {
                path = base_dir.join(path);
            }
            Ok(Box::new(CsvDataset::new(
                path,
                desc.fields.clone(),
                csv.has_header,
                &csv.separator,
            )?))
        }
        (None, Some(sql)) => {
            if !SQL_DRIVERS.contains(&sql.driver_name.as_str()) {
                return Err(invalid(&format!(
                    "dataset: invalid driverName: {}",
                    sql.driver_name
                )));
            }
            Ok(Box::new(SqlDataset::new(
                &sql.driver_name,
                &sql.data_source_name,
                &sql.query,
                desc.fields.clone(),
            )?))
        }
        (Some(_), Some(_)) => Err(invalid("dataset: only one of csv or sql allowed")),
        (None, None) => Err(invalid("dataset: one of csv or sql required")),
    }
}

fn invalid(msg: &str) -> DescriptorError {
    DescriptorError::Invalid(msg.to_string())
}
