use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Conn, Dataset, Result};
use crate::error::DatasetError;
use crate::{Record, Value};

/// Delimited text file. Each cell is parsed with [`Value::parse`].
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
    fields: Vec<String>,
    has_header: bool,
    separator: u8,
}

impl CsvDataset {
    /// Describe a CSV source.
    ///
    /// When `fields` is empty the header row names the fields, so
    /// `has_header` must be set.
    pub fn new(
        path: impl Into<PathBuf>,
        fields: Vec<String>,
        has_header: bool,
        separator: &str,
    ) -> Result<Self> {
        let path = path.into();
        let separator = parse_separator(separator)?;
        let fields = if fields.is_empty() {
            if !has_header {
                return Err(DatasetError::Invalid(
                    "csv dataset needs fields when it has no header".to_string(),
                ));
            }
            read_header(&path, separator)?
        } else {
            fields
        };
        debug!(path = %path.display(), fields = fields.len(), "csv dataset");
        Ok(Self {
            path,
            fields,
            has_header,
            separator,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dataset for CsvDataset {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn open(&self) -> Result<Conn<'_>> {
        let reader = ::csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(self.separator)
            .flexible(true)
            .from_path(&self.path)?;
        let fields = &self.fields;
        let records = reader
            .into_records()
            .enumerate()
            .map(move |(i, row)| -> Result<Record> {
                let row = row?;
                if row.len() != fields.len() {
                    return Err(DatasetError::FieldCount {
                        record: i as u64,
                        expected: fields.len(),
                        got: row.len(),
                    });
                }
                Ok(fields
                    .iter()
                    .zip(row.iter())
                    .map(|(f, v)| (f.clone(), Value::parse(v)))
                    .collect())
            });
        Ok(Conn::new(records))
    }
}

fn parse_separator(separator: &str) -> Result<u8> {
    match separator.as_bytes() {
        [] => Ok(b','),
        [b] => Ok(*b),
        _ if separator == "\\t" => Ok(b'\t'),
        _ => Err(DatasetError::Invalid(format!(
            "csv separator must be a single byte: {:?}",
            separator
        ))),
    }
}

fn read_header(path: &Path, separator: u8) -> Result<Vec<String>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(separator)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}
