//! Protocol error types

use thiserror::Error;

/// Errors raised while parsing host-neutral protocol values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Filter string is not of the form `VID:PID`
    #[error("Invalid filter format '{filter}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')")]
    InvalidFilter { filter: String },

    /// One half of a filter is not a valid 16-bit hex id
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidHexId {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
