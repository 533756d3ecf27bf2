use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Distinct values tracked per field before the histogram is dropped.
pub const MAX_NUM_VALUES: usize = 31;

/// What a field's values turned out to be. Ordered by promotion: a field
/// only ever moves to a later kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Unknown,
    Number,
    String,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: Value,
    pub num: u64,
}

/// Running statistics for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max: Option<f64>,
    #[serde(rename = "maxDP")]
    pub max_dp: usize,
    /// Keyed by the value's canonical string.
    pub values: BTreeMap<String, ValueCount>,
    pub too_many_values: bool,
}

impl Default for FieldDescription {
    fn default() -> Self {
        Self {
            kind: FieldKind::Unknown,
            min: None,
            max: None,
            max_dp: 0,
            values: BTreeMap::new(),
            too_many_values: false,
        }
    }
}

impl FieldDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one more value into the statistics.
    pub fn next_value(&mut self, value: &Value) {
        if self.kind == FieldKind::Ignore {
            return;
        }

        match value.as_f64().filter(|_| !value.is_error()) {
            Some(n) if self.kind <= FieldKind::Number => {
                self.kind = FieldKind::Number;
                self.min = Some(self.min.map_or(n, |m| m.min(n)));
                self.max = Some(self.max.map_or(n, |m| m.max(n)));
                self.max_dp = self.max_dp.max(value.num_dp());
            }
            _ => self.kind = self.kind.max(FieldKind::String),
        }

        if !self.too_many_values {
            let key = value.to_string();
            self.values
                .entry(key)
                .and_modify(|vc| vc.num += 1)
                .or_insert_with(|| ValueCount {
                    value: value.clone(),
                    num: 1,
                });
            if self.values.len() > MAX_NUM_VALUES {
                self.values.clear();
                self.too_many_values = true;
            }
        }

        if self.kind == FieldKind::String && self.too_many_values {
            self.kind = FieldKind::Ignore;
        }
    }

    pub fn is_number(&self) -> bool {
        self.kind == FieldKind::Number
    }

    pub fn is_string(&self) -> bool {
        self.kind == FieldKind::String
    }

    /// `(min, max)` for numeric fields.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.kind, self.min, self.max) {
            (FieldKind::Number, Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    /// Number of distinct values seen, while still tracked.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Values seen at least `min_count` times, in canonical string order.
    pub fn values_with_count(&self, min_count: u64) -> Vec<&Value> {
        self.values
            .values()
            .filter(|vc| vc.num >= min_count)
            .map(|vc| &vc.value)
            .collect()
    }

    pub fn count_of(&self, key: &str) -> u64 {
        self.values.get(key).map_or(0, |vc| vc.num)
    }
}
