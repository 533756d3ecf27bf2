use super::{Conn, Dataset, Result};

/// Caps another dataset to its first `max` records.
#[derive(Debug, Clone)]
pub struct Truncated<D> {
    inner: D,
    max: usize,
}

impl<D: Dataset> Truncated<D> {
    pub fn new(inner: D, max: usize) -> Self {
        Self { inner, max }
    }
}

impl<D: Dataset> Dataset for Truncated<D> {
    fn fields(&self) -> &[String] {
        self.inner.fields()
    }

    fn open(&self) -> Result<Conn<'_>> {
        Ok(Conn::new(self.inner.open()?.take(self.max)))
    }

    fn release(&self) -> Result<()> {
        self.inner.release()
    }
}
