//! Error types for category import.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for callers that resubmit corrected input
//! - Context-aware recovery hints
//! - Structured JSON output for non-interactive consumers
//!
//! Row-level validation failures are not `Error`s: they are recorded in the
//! error aggregator and never abort a run. `Error` covers what does.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for category import operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Not Found (exit 3)
    CategoryNotFound,

    // Validation (exit 4)
    InvalidBehavior,
    InvalidArgument,

    // Import (exit 6)
    StagingError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CategoryNotFound => "CATEGORY_NOT_FOUND",
            Self::InvalidBehavior => "INVALID_BEHAVIOR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::StagingError => "STAGING_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::CategoryNotFound => 3,
            Self::InvalidBehavior | Self::InvalidArgument => 4,
            Self::StagingError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller should retry with corrected input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidBehavior | Self::InvalidArgument | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can abort a category import.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database not initialized at {path}")]
    NotInitialized { path: PathBuf },

    #[error("Category not found: {id}")]
    CategoryNotFound { id: i64 },

    #[error("Invalid import behavior: {0}")]
    InvalidBehavior(String),

    #[error("Staged bunch {id} is corrupt: {message}")]
    Staging { id: i64, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::CategoryNotFound { .. } => ErrorCode::CategoryNotFound,
            Self::InvalidBehavior(_) => ErrorCode::InvalidBehavior,
            Self::Staging { .. } => ErrorCode::StagingError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "No database at {}. Open it with `SqliteStorage::open` to create the schema.",
                path.display()
            )),

            Self::InvalidBehavior(_) => {
                Some("Valid behaviors: append, replace, delete".to_string())
            }

            Self::Staging { .. } => Some(
                "Clear the staging table and stage the bunches again".to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("include_in_menu") {
                    Some("include_in_menu must be 0 or 1".to_string())
                } else {
                    None
                }
            }

            Self::Config(msg) => {
                if msg.contains("validation_strategy") {
                    Some("Valid strategies: skip-errors, stop-on-error".to_string())
                } else {
                    None
                }
            }

            Self::CategoryNotFound { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::InvalidBehavior("x".into()).exit_code(), 4);
        assert_eq!(Error::CategoryNotFound { id: 9 }.exit_code(), 3);
        assert_eq!(Error::Config("bad".into()).exit_code(), 7);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::InvalidBehavior("upsert".to_string());
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "INVALID_BEHAVIOR");
        assert_eq!(json["error"]["retryable"], true);
        assert_eq!(json["error"]["exit_code"], 4);
        assert!(json["error"]["hint"].as_str().unwrap().contains("replace"));
    }

    #[test]
    fn test_structured_json_without_hint() {
        let err = Error::Other("unexpected".to_string());
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert!(json["error"].get("hint").is_none());
    }
}
