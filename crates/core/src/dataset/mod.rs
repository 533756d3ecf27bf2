//! Dataset abstraction: sequential record iteration over a fixed schema.
//!
//! Every call to [`Dataset::open`] yields a [`Conn`] that visits the same
//! records in the same order, which assessment relies on because it walks the
//! dataset once per rule batch. Concrete sources:
//! - [`MemoryDataset`]: records held in memory
//! - [`CsvDataset`]: delimited text files
//! - [`SqlDataset`]: SQL query results (sqlite3)
//!
//! and wrappers [`Truncated`] and [`Snapshot`], combined by [`make_dataset`].

mod csv;
mod memory;
mod snapshot;
mod sql;
mod truncate;


use std::path::Path;
use std::sync::Arc;

use crate::error::DatasetError;
use crate::Record;

pub use self::csv::CsvDataset;
pub use self::memory::MemoryDataset;
pub use self::snapshot::Snapshot;
pub use self::sql::{SqlDataset, SQL_DRIVERS};
pub use self::truncate::Truncated;

/// Result alias for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// A finite, repeatable source of records sharing one schema.
pub trait Dataset: Send + Sync {
    /// Field names, in record order.
    fn fields(&self) -> &[String];

    /// Start a new pass over the records.
    fn open(&self) -> Result<Conn<'_>>;

    /// Drop anything held on behalf of the dataset (e.g. snapshot files).
    /// Safe to call more than once.
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

impl<D: Dataset + ?Sized> Dataset for &D {
    fn fields(&self) -> &[String] {
        (**self).fields()
    }

    fn open(&self) -> Result<Conn<'_>> {
        (**self).open()
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn fields(&self) -> &[String] {
        (**self).fields()
    }

    fn open(&self) -> Result<Conn<'_>> {
        (**self).open()
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    fn fields(&self) -> &[String] {
        (**self).fields()
    }

    fn open(&self) -> Result<Conn<'_>> {
        (**self).open()
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }
}

type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + Send + 'a>;

/// One pass over a dataset.
///
/// Yields records until the source is exhausted, an error is returned, or
/// [`close`](Conn::close) is called; after any of those it yields nothing.
pub struct Conn<'a> {
    records: Option<RecordIter<'a>>,
}

impl<'a> Conn<'a> {
    pub fn new<I>(records: I) -> Self
    where
        I: Iterator<Item = Result<Record>> + Send + 'a,
    {
        Self {
            records: Some(Box::new(records)),
        }
    }

    /// Stop iterating and free the underlying reader. Idempotent.
    pub fn close(&mut self) {
        self.records = None;
    }

    pub fn is_closed(&self) -> bool {
        self.records.is_none()
    }
}

impl Iterator for Conn<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let records = self.records.as_mut()?;
        match records.next() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.records = None;
                Some(Err(e))
            }
            None => {
                self.records = None;
                None
            }
        }
    }
}

/// Count the records in one full pass.
pub fn count_records(dataset: &dyn Dataset) -> Result<u64> {
    let mut n = 0;
    for record in dataset.open()? {
        record?;
        n += 1;
    }
    Ok(n)
}

/// Wrap a raw source for one experiment: optionally cap it to
/// `max_records`, then materialise it into a snapshot under `tmp_dir` so
/// every later pass sees the same records.
pub fn make_dataset(
    source: &dyn Dataset,
    max_records: Option<usize>,
    tmp_dir: &Path,
) -> Result<Snapshot> {
    match max_records {
        Some(max) => Snapshot::create(&Truncated::new(source, max), tmp_dir),
        None => Snapshot::create(source, tmp_dir),
    }
}
