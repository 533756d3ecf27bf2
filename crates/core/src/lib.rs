//! Shared building blocks: values and records, the dataset abstraction,
//! dataset description, configuration and the quit signal.

pub mod config;
pub mod dataset;
pub mod description;
pub mod error;
pub mod quit;
pub mod value;

use indexmap::IndexMap;

/// One row of a dataset: field name to value, in field order.
pub type Record = IndexMap<String, Value>;

pub use config::Config;
pub use dataset::{make_dataset, Conn, Dataset};
pub use description::{Description, FieldDescription, FieldKind};
pub use error::*;
pub use quit::QuitSignal;
pub use value::Value;
