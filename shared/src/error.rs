//! Domain errors raised by the workflow rules
//!
//! These carry no transport concerns; the backend maps them onto HTTP
//! responses.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced when a workflow rule rejects an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A reservation asked for more than the lot has available
    #[error("requested {requested} kg but only {available} kg is available")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    /// The entity's current status does not allow the requested action
    #[error("cannot {action} {entity} in status {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    /// Internal invariant violated
    #[error("consistency error: {0}")]
    Consistency(String),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        action: &'static str,
    ) -> Self {
        DomainError::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
