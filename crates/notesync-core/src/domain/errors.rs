//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier parsing failures and invalid state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Note identifier could not be parsed
    #[error("Invalid note ID: {0}")]
    InvalidNoteId(String),

    /// Invalid engine status transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Unknown conflict resolution strategy name
    #[error("Unknown conflict strategy: {0}")]
    UnknownStrategy(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
