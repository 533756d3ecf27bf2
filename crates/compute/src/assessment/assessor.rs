use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use rulehunter_core::dataset::count_records;
use rulehunter_core::{Dataset, QuitSignal};
use rulehunter_rules::Rule;
use tracing::debug;

use super::{Assessment, Result, RuleAssessment};
use crate::aggregator::{AggregatorSet, NUM_MATCHES};
use crate::error::AssessError;
use crate::goal::Goal;

/// How often, in records, a worker checks the quit signal.
const QUIT_POLL_RECORDS: u64 = 1024;

/// Rules other than `true()` need at least this many matches to survive.
const MIN_NUM_MATCHES: i64 = 2;

/// Assesses batches of rules in parallel.
///
/// Rules are split into buckets by a hash of their canonical string; each
/// bucket runs on the worker pool and makes its own pass over the dataset.
pub struct Assessor<'a> {
    pool: rayon::ThreadPool,
    num_buckets: usize,
    aggregators: &'a AggregatorSet,
    goals: &'a [Goal],
    quit: QuitSignal,
}

struct Bucket {
    num_records: u64,
    rule_assessments: Vec<RuleAssessment>,
}

impl<'a> Assessor<'a> {
    pub fn new(
        num_processes: usize,
        aggregators: &'a AggregatorSet,
        goals: &'a [Goal],
        quit: QuitSignal,
    ) -> Result<Self> {
        let num_buckets = num_processes.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_buckets)
            .thread_name(|i| format!("assess-{}", i))
            .build()?;
        Ok(Self {
            pool,
            num_buckets,
            aggregators,
            goals,
            quit,
        })
    }

    /// Assess every rule against the dataset.
    ///
    /// Rules other than `true()` matching fewer than two records are
    /// dropped. Any rule or expression error fails the whole batch. The
    /// result is ordered by canonical string.
    pub fn assess_rules(&self, dataset: &dyn Dataset, rules: &[Rule]) -> Result<Assessment> {
        if self.quit.is_raised() {
            return Err(AssessError::Quit);
        }
        if rules.is_empty() {
            return Ok(Assessment::new(count_records(dataset)?, Vec::new()));
        }

        let buckets = self.partition(rules);
        debug!(
            rules = rules.len(),
            buckets = buckets.len(),
            "assessing rules"
        );
        let results = self.pool.install(|| {
            buckets
                .into_par_iter()
                .map(|bucket| self.assess_bucket(dataset, &bucket))
                .collect::<Result<Vec<Bucket>>>()
        })?;

        let num_records = results.first().map_or(0, |b| b.num_records);
        let mut keyed: Vec<(String, RuleAssessment)> = results
            .into_iter()
            .flat_map(|b| b.rule_assessments)
            .map(|ra| (ra.rule.to_string(), ra))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Assessment::new(
            num_records,
            keyed.into_iter().map(|(_, ra)| ra).collect(),
        ))
    }

    fn partition<'r>(&self, rules: &'r [Rule]) -> Vec<Vec<&'r Rule>> {
        let mut buckets: Vec<Vec<&Rule>> = vec![Vec::new(); self.num_buckets];
        for rule in rules {
            let mut hasher = DefaultHasher::new();
            rule.to_string().hash(&mut hasher);
            let i = (hasher.finish() % self.num_buckets as u64) as usize;
            buckets[i].push(rule);
        }
        buckets.retain(|b| !b.is_empty());
        buckets
    }

    fn assess_bucket(&self, dataset: &dyn Dataset, rules: &[&Rule]) -> Result<Bucket> {
        let mut accs: Vec<_> = rules.iter().map(|_| self.aggregators.accumulators()).collect();
        let mut num_records = 0u64;

        let mut conn = dataset.open()?;
        for record in conn.by_ref() {
            if num_records % QUIT_POLL_RECORDS == 0 && self.quit.is_raised() {
                return Err(AssessError::Quit);
            }
            let record = record?;
            for (rule, acc) in rules.iter().zip(accs.iter_mut()) {
                let holds = rule.is_true(&record)?;
                self.aggregators.next(acc, &record, holds)?;
            }
            num_records += 1;
        }
        conn.close();

        let mut rule_assessments = Vec::with_capacity(rules.len());
        for (rule, acc) in rules.iter().zip(&accs) {
            let (aggregators, goals) = self.aggregators.results(acc, self.goals, num_records)?;
            let num_matches = aggregators
                .get(NUM_MATCHES)
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            if rule.is_true_rule() || num_matches >= MIN_NUM_MATCHES {
                rule_assessments.push(RuleAssessment {
                    rule: (*rule).clone(),
                    aggregators,
                    goals,
                });
            }
        }
        Ok(Bucket {
            num_records,
            rule_assessments,
        })
    }
}
