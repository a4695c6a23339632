//! Error types for envelope validation, decoding and session sends.
//!
//! Looking up a session or a pending list that does not exist is never an
//! error; those lookups return `Option` or silently no-op.

use thiserror::Error;

// ── Error code constants ────────────────────────────────────────────

/// Envelope failed validation.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
/// Inbound text could not be decoded into an envelope.
pub const DECODE_ERROR: &str = "DECODE_ERROR";

/// Why a transmission envelope was rejected.
///
/// Variants are listed in the order the validator checks them.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `protocol` is missing or empty.
    #[error("transmission protocol must not be empty")]
    EmptyProtocol,

    /// `message` is missing or empty.
    #[error("transmission message must not be empty")]
    EmptyMessage,

    /// `message` is not syntactically valid JSON.
    #[error("transmission message is not valid JSON: {source}")]
    MalformedMessage {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// No receiver is registered for `protocol`.
    #[error("no receiver registered for protocol '{protocol}'")]
    UnknownProtocol {
        /// The rejected protocol name.
        protocol: String,
    },
}

impl ValidationError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        INVALID_ARGUMENT
    }
}

/// Errors raised while handling an inbound message.
#[derive(Debug, Error)]
pub enum TetherError {
    /// The envelope was decoded but is not routable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The raw text is not a `{protocol, message}` object.
    #[error("failed to decode transmission: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TetherError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::Decode(_) => DECODE_ERROR,
        }
    }
}

/// Why a session refused a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The underlying connection is gone.
    #[error("session is closed")]
    Closed,
    /// The outbound buffer is full.
    #[error("session outbound buffer is full")]
    Full,
}

/// Result alias for inbound message handling.
pub type Result<T> = std::result::Result<T, TetherError>;
