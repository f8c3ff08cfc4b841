// ⚠️ Error Taxonomy
// DomainError: a trust-index formula hit a zero denominator
// ValidationError: a boundary record (entity, query, market inputs) is malformed

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// DOMAIN ERROR
// ============================================================================

/// Fatal to a single index computation. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("division by zero in {operation}")]
    DivisionByZero { operation: &'static str },
}

impl DomainError {
    pub fn division_by_zero(operation: &'static str) -> Self {
        DomainError::DivisionByZero { operation }
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// Raised by the boundary layer (pool, store, CLI, HTTP) before data reaches
/// the matching core, which assumes well-typed inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DomainError::division_by_zero("unified_trust");
        assert_eq!(err.to_string(), "division by zero in unified_trust");

        let err = ValidationError::new("base_score", "must be within [0, 100]");
        assert_eq!(err.to_string(), "base_score: must be within [0, 100]");
    }
}
