use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Conn, Dataset, Result};
use crate::error::DatasetError;
use crate::{Record, Value};

/// A local copy of another dataset, one JSON array of values per line.
///
/// Later passes read the copy, so a source that changes underneath a running
/// experiment can't change its results. The file is removed by
/// [`Dataset::release`] or when the snapshot is dropped.
#[derive(Debug)]
pub struct Snapshot {
    fields: Vec<String>,
    path: PathBuf,
    num_records: u64,
}

impl Snapshot {
    /// Copy every record of `source` into a fresh file under `tmp_dir`.
    pub fn create(source: &dyn Dataset, tmp_dir: &Path) -> Result<Self> {
        fs::create_dir_all(tmp_dir)?;
        let path = tmp_dir.join(format!("{}.jsonl", uuid::Uuid::new_v4()));
        let fields = source.fields().to_vec();

        // Construct first so a failed copy still cleans up after itself.
        let mut snapshot = Self {
            fields,
            path,
            num_records: 0,
        };
        let mut writer = BufWriter::new(File::create(&snapshot.path)?);
        for record in source.open()? {
            let record = record?;
            let row: Vec<&Value> = snapshot
                .fields
                .iter()
                .map(|f| {
                    record.get(f).ok_or_else(|| {
                        DatasetError::Invalid(format!("record missing field: {}", f))
                    })
                })
                .collect::<Result<_>>()?;
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            snapshot.num_records += 1;
        }
        writer.flush()?;

        debug!(
            path = %snapshot.path.display(),
            records = snapshot.num_records,
            "dataset snapshot written"
        );
        Ok(snapshot)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }
}

impl Dataset for Snapshot {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn open(&self) -> Result<Conn<'_>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let fields = &self.fields;
        let records = reader.lines().map(move |line| -> Result<Record> {
            let values: Vec<Value> = serde_json::from_str(&line?)?;
            Ok(fields.iter().cloned().zip(values).collect())
        });
        Ok(Conn::new(records))
    }

    fn release(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "couldn't remove dataset snapshot");
        }
    }
}
