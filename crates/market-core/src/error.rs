//! # Error Types
//!
//! Domain-specific error types for market-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  market-core errors (this file)                                        │
//! │  ├── CoreError        - Domain taxonomy (argument, not found, ...)     │
//! │  └── ValidationError  - Per-field validation failures                  │
//! │                                                                         │
//! │  market-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  market-api errors                                                     │
//! │  └── ApiError         - `{"Status": false, "Errors": ...}` envelope    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant maps to one entry of the boundary error taxonomy and is
/// converted into the response envelope by the API layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required request field is missing or malformed.
    ///
    /// ## When This Occurs
    /// - `items` absent from a basket request
    /// - Delete request with no numeric ids
    /// - PlaceOrder matched no basket of the caller
    #[error("{0}")]
    Argument(String),

    /// Field-level validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Object absent or not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation needs prior state that is not there.
    ///
    /// ## When This Occurs
    /// - Adding to the basket before a contact is on file
    #[error("{0}")]
    Precondition(String),

    /// Duplicate resource creation attempt.
    #[error("{field} '{value}' already exists")]
    Uniqueness { field: String, value: String },

    /// Fetching a remote document failed.
    #[error("Network error: {0}")]
    Network(String),
}

impl CoreError {
    /// Creates an Argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        CoreError::Argument(message.into())
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Uniqueness error.
    pub fn duplicate(field: impl Into<String>, value: impl ToString) -> Self {
        CoreError::Uniqueness {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Reported to clients keyed by [`ValidationError::field`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., not a number, not a YAML document).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value inside one request or document.
    #[error("{field} '{value}' is duplicated")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Name of the offending field, used as the key in error bodies.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. } => field,
        }
    }

    pub(crate) fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
