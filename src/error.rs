//! Error types for the triple store

use std::path::PathBuf;

use thiserror::Error;

use crate::dictionary::Role;

pub type Result<T> = std::result::Result<T, HdtError>;

#[derive(Error, Debug)]
pub enum HdtError {
    #[error("Container not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Identifier {id} out of range for {role} (max {max})")]
    OutOfRange { id: u64, role: Role, max: u64 },

    #[error("Invalid generation input: {0}")]
    GenerationInput(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HdtError {
    /// Shorthand used by every decoder that hits a truncated or inconsistent byte range.
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        HdtError::CorruptContainer(msg.into())
    }

    /// Get error code for the binding layer
    pub fn code(&self) -> &'static str {
        match self {
            HdtError::FileNotFound(_) => "FILE_NOT_FOUND",
            HdtError::CorruptContainer(_) => "CORRUPT_CONTAINER",
            HdtError::OutOfRange { .. } => "OUT_OF_RANGE",
            HdtError::GenerationInput(_) => "GENERATION_INPUT",
            HdtError::InvalidQuery(_) => "INVALID_QUERY",
            HdtError::InvalidConfig(_) => "INVALID_CONFIG",
            HdtError::Io(_) | HdtError::Json(_) => "INTERNAL_ERROR",
        }
    }

    /// Numeric status for callers that speak exit codes. 0 is reserved for success.
    pub fn status_code(&self) -> i32 {
        match self {
            HdtError::FileNotFound(_) => 2,
            HdtError::CorruptContainer(_) => 3,
            HdtError::OutOfRange { .. } => 4,
            HdtError::GenerationInput(_) => 5,
            HdtError::InvalidQuery(_) => 6,
            HdtError::InvalidConfig(_) => 7,
            HdtError::Io(_) | HdtError::Json(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HdtError::OutOfRange { id: 9, role: Role::Object, max: 3 };
        assert_eq!(err.to_string(), "Identifier 9 out of range for object (max 3)");

        let err = HdtError::FileNotFound(PathBuf::from("/nope/wall.hdt"));
        assert_eq!(err.to_string(), "Container not found: /nope/wall.hdt");
    }

    #[test]
    fn test_codes_are_distinct_and_nonzero() {
        let errors = vec![
            HdtError::FileNotFound(PathBuf::new()),
            HdtError::corrupt("x"),
            HdtError::OutOfRange { id: 1, role: Role::Subject, max: 0 },
            HdtError::GenerationInput("x".into()),
            HdtError::InvalidQuery("x".into()),
            HdtError::InvalidConfig("x".into()),
        ];
        let mut seen = std::collections::HashSet::new();
        for err in &errors {
            assert_ne!(err.status_code(), 0);
            assert!(seen.insert(err.code()), "duplicate code {}", err.code());
        }
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: HdtError = io.into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(err.to_string().contains("boom"));
    }
}
