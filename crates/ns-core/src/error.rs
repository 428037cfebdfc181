//! Error types for NextStat

use thiserror::Error;

/// NextStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Lookup of a matrix component, bin or label that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operand shapes or dimensionalities do not line up
    #[error("Dimension error: {0}")]
    Dimension(String),

    /// An operation was invoked before its preconditions were configured
    #[error("Logic error: {0}")]
    Logic(String),

    /// A parameter vector has the wrong length
    #[error("Parameter count error: {0}")]
    ParameterCount(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Prefix the message of a [`Error::ParameterCount`] with the name of the owning component.
    ///
    /// Other variants pass through untouched.
    pub fn with_owner(self, owner: &str) -> Self {
        match self {
            Error::ParameterCount(msg) => Error::ParameterCount(format!("{owner} : {msg}")),
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
