use std::sync::Arc;

use super::{Conn, Dataset, Result};
use crate::error::DatasetError;
use crate::{Record, Value};

/// Records held in memory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    fields: Vec<String>,
    records: Arc<Vec<Record>>,
}

impl MemoryDataset {
    /// Build from records that must all carry exactly `fields`.
    pub fn new(fields: Vec<String>, records: Vec<Record>) -> Result<Self> {
        for (i, record) in records.iter().enumerate() {
            if record.len() != fields.len() || !fields.iter().all(|f| record.contains_key(f)) {
                return Err(DatasetError::Invalid(format!(
                    "record {} doesn't match fields: {}",
                    i,
                    fields.join(",")
                )));
            }
        }
        Ok(Self {
            fields,
            records: Arc::new(records),
        })
    }

    /// Build from rows of values in field order.
    pub fn from_rows(fields: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != fields.len() {
                return Err(DatasetError::FieldCount {
                    record: i as u64,
                    expected: fields.len(),
                    got: row.len(),
                });
            }
            records.push(fields.iter().cloned().zip(row).collect());
        }
        Ok(Self {
            fields,
            records: Arc::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Dataset for MemoryDataset {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn open(&self) -> Result<Conn<'_>> {
        Ok(Conn::new(self.records.iter().cloned().map(Ok)))
    }
}
