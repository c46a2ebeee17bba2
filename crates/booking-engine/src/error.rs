//! Error types for booking-engine operations.

use thiserror::Error;

/// Machine-readable codes carried by [`EngineError::BusinessRule`].
///
/// These are stable strings intended for client-side handling; the
/// human-readable message may change, the code must not.
pub mod codes {
    pub const INVALID_STATUS_TRANSITION: &str = "INVALID_STATUS_TRANSITION";
    pub const NO_SHOW_TOO_EARLY: &str = "NO_SHOW_TOO_EARLY";
    pub const NO_SHOW_ALREADY_MARKED: &str = "NO_SHOW_ALREADY_MARKED";
    pub const COMPLETED_TOO_EARLY: &str = "COMPLETED_TOO_EARLY";
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input: bad time format, out-of-range duration or buffer,
    /// missing mandatory cancellation reason. Recoverable by the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// A race was lost: the slot is already booked, or a concurrent
    /// transition changed the booking first. Retry against another resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A lifecycle rule was violated. Carries one of the [`codes`] constants.
    #[error("{message}")]
    BusinessRule { code: &'static str, message: String },

    /// Persistence failure mid-transition. The caller must not assume
    /// partial success.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn business(code: &'static str, message: impl Into<String>) -> Self {
        EngineError::BusinessRule {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::InvalidTimezone(_) => "INVALID_TIMEZONE",
            EngineError::InvalidRule(_) => "INVALID_RECURRENCE_RULE",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::BusinessRule { code, .. } => code,
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Convenience alias used throughout booking-engine.
pub type Result<T> = std::result::Result<T, EngineError>;
