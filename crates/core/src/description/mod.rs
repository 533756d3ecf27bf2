//! Per-field summary of a dataset, built in one pass. Drives rule
//! generation and tweaking.

mod field;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Result};
use crate::Record;

pub use field::{FieldDescription, FieldKind, ValueCount, MAX_NUM_VALUES};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub fields: BTreeMap<String, FieldDescription>,
    pub num_records: u64,
}

impl Description {
    /// Empty description for the given fields, all of kind Unknown.
    pub fn new(fields: &[String]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|f| (f.clone(), FieldDescription::new()))
                .collect(),
            num_records: 0,
        }
    }

    /// Fold every record of the dataset.
    pub fn describe(dataset: &dyn Dataset) -> Result<Self> {
        let mut desc = Self::new(dataset.fields());
        for record in dataset.open()? {
            desc.next_record(&record?);
        }
        tracing::debug!(
            fields = desc.fields.len(),
            records = desc.num_records,
            "dataset described"
        );
        Ok(desc)
    }

    pub fn next_record(&mut self, record: &Record) {
        for (name, value) in record {
            self.fields
                .entry(name.clone())
                .or_default()
                .next_value(value);
        }
        self.num_records += 1;
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.get(name)
    }

    /// Names of fields of the given kind, in name order.
    pub fn fields_of_kind(&self, kind: FieldKind) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, fd)| fd.kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use crate::Value;

    #[test]
    fn describe_folds_whole_dataset() {
        let ds = MemoryDataset::from_rows(
            &["band", "score"],
            vec![
                vec![Value::from("a"), Value::Int(1)],
                vec![Value::from("b"), Value::Float(2.5)],
                vec![Value::from("a"), Value::Int(3)],
            ],
        )
        .unwrap();
        let desc = Description::describe(&ds).unwrap();
        assert_eq!(desc.num_records, 3);
        assert_eq!(desc.fields_of_kind(FieldKind::String), vec!["band"]);
        let score = desc.field("score").unwrap();
        assert_eq!(score.bounds(), Some((1.0, 3.0)));
        assert_eq!(score.max_dp, 1);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut desc = Description::new(&["x".to_string()]);
        let mut record = Record::new();
        record.insert("x".to_string(), Value::Int(4));
        desc.next_record(&record);
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["numRecords"], 1);
        assert_eq!(json["fields"]["x"]["kind"], "number");
        assert_eq!(json["fields"]["x"]["maxDP"], 0);
        assert_eq!(json["fields"]["x"]["tooManyValues"], false);
    }
}
