use rulehunter_core::{Description, Value};

use super::{GenerationOptions, NUM_PARTITIONS};
use crate::rule::points::partition;
use crate::rule::{BetweenFV, GeFV, LeFV, OutsideFV, Rule};

/// `(field, points)` for every numeric rule field.
fn numeric_points(desc: &Description, opts: &GenerationOptions) -> Vec<(String, Vec<Value>)> {
    opts.rule_fields(desc)
        .into_iter()
        .filter_map(|field| {
            let fd = desc.field(&field)?;
            let (min, max) = fd.bounds()?;
            Some((field, partition(min, max, fd.max_dp, NUM_PARTITIONS)))
        })
        .collect()
}

pub(super) fn ge(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    numeric_points(desc, opts)
        .into_iter()
        .flat_map(|(field, points)| {
            points
                .into_iter()
                .map(move |p| Rule::GeFV(GeFV::new(field.clone(), p)))
        })
        .collect()
}

pub(super) fn le(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    numeric_points(desc, opts)
        .into_iter()
        .flat_map(|(field, points)| {
            points
                .into_iter()
                .map(move |p| Rule::LeFV(LeFV::new(field.clone(), p)))
        })
        .collect()
}

pub(super) fn between(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    pairs(desc, opts, |field, low, high| {
        BetweenFV::new(field, low, high).ok().map(Rule::BetweenFV)
    })
}

pub(super) fn outside(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    pairs(desc, opts, |field, low, high| {
        OutsideFV::new(field, low, high).ok().map(Rule::OutsideFV)
    })
}

/// One rule per `low < high` pair of partition points.
fn pairs(
    desc: &Description,
    opts: &GenerationOptions,
    make: impl Fn(&str, Value, Value) -> Option<Rule>,
) -> Vec<Rule> {
    let mut out = Vec::new();
    for (field, points) in numeric_points(desc, opts) {
        for (i, low) in points.iter().enumerate() {
            for high in &points[i + 1..] {
                if let Some(rule) = make(&field, low.clone(), high.clone()) {
                    out.push(rule);
                }
            }
        }
    }
    out
}
