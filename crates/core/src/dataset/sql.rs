use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use super::{Conn, Dataset, Result};
use crate::error::DatasetError;
use crate::{Record, Value};

/// Drivers a descriptor may name. Only `sqlite3` is bundled.
pub const SQL_DRIVERS: &[&str] = &["mysql", "mssql", "postgres", "sqlite3"];

/// Result of a SQL query. Each pass reruns the query on a fresh connection.
#[derive(Debug, Clone)]
pub struct SqlDataset {
    data_source_name: String,
    query: String,
    fields: Vec<String>,
}

impl SqlDataset {
    /// When `fields` is empty the query's column names are used; otherwise
    /// the query must return exactly that many columns, renamed in order.
    pub fn new(
        driver_name: &str,
        data_source_name: &str,
        query: &str,
        fields: Vec<String>,
    ) -> Result<Self> {
        if driver_name != "sqlite3" {
            return Err(DatasetError::UnsupportedDriver(driver_name.to_string()));
        }
        let conn = Connection::open(data_source_name)?;
        let columns: Vec<String> = {
            let stmt = conn.prepare(query)?;
            stmt.column_names().into_iter().map(String::from).collect()
        };
        let fields = if fields.is_empty() {
            columns
        } else if fields.len() != columns.len() {
            return Err(DatasetError::Invalid(format!(
                "query returns {} columns but {} fields were given",
                columns.len(),
                fields.len()
            )));
        } else {
            fields
        };
        debug!(dsn = data_source_name, fields = fields.len(), "sql dataset");
        Ok(Self {
            data_source_name: data_source_name.to_string(),
            query: query.to_string(),
            fields,
        })
    }

    fn fetch(&self) -> Result<Vec<Record>> {
        let conn = Connection::open(&self.data_source_name)?;
        let mut stmt = conn.prepare(&self.query)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::with_capacity(self.fields.len());
            for (i, field) in self.fields.iter().enumerate() {
                record.insert(field.clone(), to_value(row.get_ref(i)?));
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl Dataset for SqlDataset {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn open(&self) -> Result<Conn<'_>> {
        Ok(Conn::new(self.fetch()?.into_iter().map(Ok)))
    }
}

fn to_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Str(String::new()),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::parse(&String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => Value::Str(String::from_utf8_lossy(b).into_owned()),
    }
}
