use thiserror::Error;

/// Errors produced while building or validating core types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown operation: {0:?}")]
    UnknownOperation(String),

    #[error("missing parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("invalid store schema: {0}")]
    InvalidSchema(String),
}
