use thiserror::Error;

/// An expression failure, tagged with the source it came from.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid expression: {src} ({kind})")]
pub struct ExprError {
    pub src: String,
    pub kind: ExprErrorKind,
}

impl ExprError {
    pub fn new(src: impl Into<String>, kind: ExprErrorKind) -> Self {
        Self {
            src: src.into(),
            kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprErrorKind {
    #[error("{0}")]
    Syntax(String),

    #[error("variable doesn't exist: {0}")]
    VarNotExist(String),

    #[error("function doesn't exist: {0}")]
    FunctionNotExist(String),

    #[error("incompatible types")]
    IncompatibleTypes,

    #[error("divide by zero")]
    DivideByZero,

    #[error("wrong number of arguments to {function}: {got}")]
    WrongNumArgs { function: String, got: usize },

    #[error("expression doesn't return a bool")]
    NotBool,
}
