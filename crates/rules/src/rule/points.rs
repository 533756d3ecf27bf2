//! Numeric pivot helpers shared by generation, tweaking and DP reduction.

use std::collections::HashSet;

use rulehunter_core::value::round_to;
use rulehunter_core::Value;

/// Decimal places never exceed this when reducing.
pub const MAX_DP: usize = 200;

/// Steps either side of a pivot when tweaking.
const TWEAK_STEPS: u32 = 5;

/// Partition `[min, max]` into `n` equal steps, giving `n + 1` points
/// rounded to `dp` and clamped to the range. Duplicates (e.g. when
/// `min == max`) are removed.
pub fn partition(min: f64, max: f64, dp: usize, n: u32) -> Vec<Value> {
    if max <= min {
        return vec![Value::number(min, dp)];
    }
    let step = (max - min) / n as f64;
    let mut seen = HashSet::new();
    (0..=n)
        .map(|i| clamp(round_to(min + step * i as f64, dp), min, max))
        .map(|p| Value::number(p, dp))
        .filter(|v| seen.insert(v.to_string()))
        .collect()
}

/// Candidates around `pivot`: `k × (max−min)/(10×stage)` for k = 1..=5 on
/// both sides, rounded to `dp`, clamped to `[min, max]`. Excludes the pivot.
pub fn tweak_points(pivot: f64, min: f64, max: f64, dp: usize, stage: usize) -> Vec<Value> {
    if max <= min || stage == 0 {
        return Vec::new();
    }
    let step = (max - min) / (10.0 * stage as f64);
    let pivot_key = Value::number(pivot, dp).to_string();
    let mut seen = HashSet::new();
    seen.insert(pivot_key);
    let mut out = Vec::new();
    for k in 1..=TWEAK_STEPS {
        for sign in [-1.0, 1.0] {
            let p = clamp(round_to(pivot + sign * step * k as f64, dp), min, max);
            let v = Value::number(p, dp);
            if seen.insert(v.to_string()) {
                out.push(v);
            }
        }
    }
    out
}

/// `value` rounded at every DP from `min(dp, 200) − 1` down to 0, without
/// duplicates or the original.
pub fn reduce_dp_points(value: &Value) -> Vec<Value> {
    let Some(x) = value.as_f64() else {
        return Vec::new();
    };
    let dp = value.num_dp().min(MAX_DP);
    let mut seen = HashSet::new();
    seen.insert(value.to_string());
    (0..dp)
        .rev()
        .map(|d| Value::number(round_to(x, d), d))
        .filter(|v| seen.insert(v.to_string()))
        .collect()
}

fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}
