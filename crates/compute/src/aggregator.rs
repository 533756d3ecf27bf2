//! Per-rule aggregators.
//!
//! Every assessed rule carries one accumulator per aggregator. Record-level
//! aggregators (`count`, `sum`, `mean`, `mcc`, `precision`, `recall`) are
//! fed during the dataset pass; `calc` and `goalsscore` are deferred until
//! the pass is over so they can see the final values of the others.

use indexmap::IndexMap;
use rulehunter_core::{Record, Value};
use rulehunter_rules::expr::{Expr, ExprError, ExprErrorKind, Vars};
use serde::{Deserialize, Serialize};

use crate::goal::{Goal, GoalAssessment};

pub const NUM_MATCHES: &str = "numMatches";
pub const PERCENT_MATCHES: &str = "percentMatches";
pub const GOALS_SCORE: &str = "goalsScore";
pub const NUM_RECORDS: &str = "numRecords";

const PERCENT_MATCHES_EXPR: &str = "roundto(100.0 * numMatches / numRecords, 2)";

/// Decimal places kept for `mcc`, `precision` and `recall`.
const RATIO_DP: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    Count,
    Calc,
    Sum,
    Mean,
    Mcc,
    Precision,
    Recall,
    GoalsScore,
}

/// Aggregator as declared in an experiment and echoed in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorDesc {
    pub name: String,
    pub function: AggregatorKind,
    #[serde(default)]
    pub arg: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("invalid aggregator name: {0}")]
    InvalidName(String),

    #[error("aggregator name reserved: {0}")]
    Reserved(String),

    #[error("duplicate aggregator name: {0}")]
    Duplicate(String),

    #[error("aggregator {0} needs an arg")]
    MissingArg(String),

    #[error(transparent)]
    Expr(#[from] ExprError),
}

// ── Compiled set ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Spec {
    name: String,
    kind: AggregatorKind,
    /// `None` only for the built-in `numMatches` and for `goalsscore`.
    arg: Option<Expr>,
}

/// The built-in aggregators followed by the experiment's own, with every
/// argument compiled.
#[derive(Debug, Clone)]
pub struct AggregatorSet {
    specs: Vec<Spec>,
}

impl AggregatorSet {
    pub fn new(user: &[AggregatorDesc]) -> Result<Self, AggregatorError> {
        let mut specs = vec![
            Spec {
                name: NUM_MATCHES.into(),
                kind: AggregatorKind::Count,
                arg: None,
            },
            Spec {
                name: PERCENT_MATCHES.into(),
                kind: AggregatorKind::Calc,
                arg: Some(Expr::compile(PERCENT_MATCHES_EXPR)?),
            },
            Spec {
                name: GOALS_SCORE.into(),
                kind: AggregatorKind::GoalsScore,
                arg: None,
            },
        ];

        for desc in user {
            if !is_identifier(&desc.name) {
                return Err(AggregatorError::InvalidName(desc.name.clone()));
            }
            if is_reserved(&desc.name) {
                return Err(AggregatorError::Reserved(desc.name.clone()));
            }
            if specs.iter().any(|s| s.name == desc.name) {
                return Err(AggregatorError::Duplicate(desc.name.clone()));
            }
            let arg = match desc.function {
                AggregatorKind::GoalsScore => None,
                _ if desc.arg.trim().is_empty() => {
                    return Err(AggregatorError::MissingArg(desc.name.clone()))
                }
                _ => Some(Expr::compile(&desc.arg)?),
            };
            specs.push(Spec {
                name: desc.name.clone(),
                kind: desc.function,
                arg,
            });
        }
        Ok(Self { specs })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Every aggregator, built-ins included, in declaration form.
    pub fn descs(&self) -> Vec<AggregatorDesc> {
        self.specs
            .iter()
            .map(|s| AggregatorDesc {
                name: s.name.clone(),
                function: s.kind,
                arg: match (&s.arg, s.kind) {
                    (Some(e), _) => e.src().to_string(),
                    (None, AggregatorKind::Count) => "true()".into(),
                    (None, _) => String::new(),
                },
            })
            .collect()
    }

    pub fn accumulators(&self) -> Accumulators {
        Accumulators {
            states: self
                .specs
                .iter()
                .map(|s| match s.kind {
                    AggregatorKind::Count => State::Count(0),
                    AggregatorKind::Sum | AggregatorKind::Mean => State::Sum {
                        sum: 0.0,
                        dp: 0,
                        n: 0,
                    },
                    AggregatorKind::Mcc | AggregatorKind::Precision | AggregatorKind::Recall => {
                        State::Confusion(Confusion::default())
                    }
                    AggregatorKind::Calc | AggregatorKind::GoalsScore => State::Deferred,
                })
                .collect(),
        }
    }

    /// Feed one record, given whether the rule holds for it.
    pub fn next(
        &self,
        accs: &mut Accumulators,
        record: &Record,
        rule_is_true: bool,
    ) -> Result<(), ExprError> {
        for (spec, state) in self.specs.iter().zip(accs.states.iter_mut()) {
            match state {
                State::Count(n) => {
                    if rule_is_true && arg_holds(spec.arg.as_ref(), record)? {
                        *n += 1;
                    }
                }
                State::Sum { sum, dp, n } => {
                    if rule_is_true {
                        if let Some(arg) = &spec.arg {
                            let v = arg.eval(record)?;
                            let x = v.as_f64().ok_or_else(|| {
                                ExprError::new(arg.src(), ExprErrorKind::IncompatibleTypes)
                            })?;
                            *sum += x;
                            *dp = (*dp).max(v.num_dp());
                            *n += 1;
                        }
                    }
                }
                State::Confusion(c) => {
                    let actual = arg_holds(spec.arg.as_ref(), record)?;
                    c.add(rule_is_true, actual);
                }
                State::Deferred => {}
            }
        }
        Ok(())
    }

    /// Final aggregator values and goal results for one rule.
    ///
    /// Values are produced in declaration order. Goals see every aggregator
    /// except goal scores, plus `numRecords`; goal scores are filled in once
    /// the goals have been assessed.
    pub fn results(
        &self,
        accs: &Accumulators,
        goals: &[Goal],
        num_records: u64,
    ) -> Result<(IndexMap<String, Value>, Vec<GoalAssessment>), ExprError> {
        let num_records = Value::Int(num_records as i64);
        let mut values: IndexMap<String, Value> = IndexMap::with_capacity(self.specs.len());

        for (spec, state) in self.specs.iter().zip(&accs.states) {
            let value = match state {
                State::Count(n) => Value::Int(*n),
                State::Sum { sum, dp, n } => match spec.kind {
                    AggregatorKind::Mean if *n == 0 => Value::Int(0),
                    AggregatorKind::Mean => Value::number(sum / *n as f64, dp + 2),
                    _ => Value::number(*sum, *dp),
                },
                State::Confusion(c) => c.result(spec.kind),
                State::Deferred => match (&spec.arg, spec.kind) {
                    (Some(arg), AggregatorKind::Calc) => {
                        let vars = ResultVars {
                            values: &values,
                            num_records: &num_records,
                        };
                        arg.eval(&vars)?
                    }
                    _ => continue,
                },
            };
            values.insert(spec.name.clone(), value);
        }

        let goal_results = {
            let vars = ResultVars {
                values: &values,
                num_records: &num_records,
            };
            goals
                .iter()
                .map(|g| {
                    Ok(GoalAssessment {
                        expr: g.src().to_string(),
                        passed: g.assess(&vars)?,
                    })
                })
                .collect::<Result<Vec<_>, ExprError>>()?
        };
        let score = goal_results.iter().filter(|g| g.passed).count() as i64;

        let mut ordered = IndexMap::with_capacity(self.specs.len());
        for spec in &self.specs {
            let value = match spec.kind {
                AggregatorKind::GoalsScore => Value::Int(score),
                _ => match values.swap_remove(&spec.name) {
                    Some(v) => v,
                    None => continue,
                },
            };
            ordered.insert(spec.name.clone(), value);
        }
        Ok((ordered, goal_results))
    }
}

fn arg_holds(arg: Option<&Expr>, record: &Record) -> Result<bool, ExprError> {
    match arg {
        Some(e) => e.eval_bool(record),
        None => Ok(true),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        NUM_MATCHES | PERCENT_MATCHES | GOALS_SCORE | NUM_RECORDS
    )
}

/// Aggregator values so far plus `numRecords`.
struct ResultVars<'a> {
    values: &'a IndexMap<String, Value>,
    num_records: &'a Value,
}

impl Vars for ResultVars<'_> {
    fn var(&self, name: &str) -> Option<&Value> {
        if name == NUM_RECORDS {
            return Some(self.num_records);
        }
        self.values.get(name)
    }
}

// ── Accumulators ────────────────────────────────────────────────────

/// Running state for one rule, one slot per aggregator.
#[derive(Debug, Clone)]
pub struct Accumulators {
    states: Vec<State>,
}

#[derive(Debug, Clone)]
enum State {
    Count(i64),
    Sum { sum: f64, dp: usize, n: i64 },
    Confusion(Confusion),
    Deferred,
}

/// Rule outcome against the aggregator arg, over every record.
#[derive(Debug, Clone, Copy, Default)]
struct Confusion {
    tp: i64,
    fp: i64,
    tn: i64,
    fn_: i64,
}

impl Confusion {
    fn add(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fn_ += 1,
        }
    }

    fn result(&self, kind: AggregatorKind) -> Value {
        let (tp, fp, tn, fn_) = (
            self.tp as f64,
            self.fp as f64,
            self.tn as f64,
            self.fn_ as f64,
        );
        let r = match kind {
            AggregatorKind::Mcc => {
                let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
                ratio(tp * tn - fp * fn_, denom)
            }
            AggregatorKind::Precision => ratio(tp, tp + fp),
            _ => ratio(tp, tp + fn_),
        };
        Value::number(r, RATIO_DP)
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}
