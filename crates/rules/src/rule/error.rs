use thiserror::Error;

use crate::expr::ExprError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("invalid rule: {rule} (field doesn't exist: {field})")]
    InvalidRule { rule: String, field: String },

    #[error("incompatible types in rule: {rule} (field: {field})")]
    IncompatibleTypes { rule: String, field: String },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("can't compose rules: {0}")]
    Compose(String),

    #[error("can't construct rule: {0}")]
    Construct(String),
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
