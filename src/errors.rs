//! Error Types
//!
//! [`BridgeError`] enumerates every failure mode the bridge can report.
//! Operations never panic or unwind across the public API boundary: a
//! failed operation returns `Err` (or, where the source contract dictates
//! reporting-without-propagation, is funneled through the diagnostic
//! callback in [`crate::diagnostic`]) and the caller's session remains
//! valid for subsequent calls.

use thiserror::Error;

/// All error kinds the bridge can produce.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Wrong source type, non-1D array where required, zero-size arrays,
    /// empty names, or bad dimensional counts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Component count mismatch between source array and destination
    /// attribute, or per-vertex/per-primitive disagreement.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A source type has no known mapping at all.
    #[error("unknown source type: {0}")]
    UnknownType(String),

    /// A source type is known but cannot be represented by any USD
    /// attribute value type in the current mapping.
    #[error("unsupported type for attribute {attribute}: {source_type}")]
    UnsupportedType {
        attribute: String,
        source_type: String,
    },

    /// The `Connection` failed to read, write, or create a path.
    #[error("io error writing {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted before `initialize_session` succeeded.
    #[error("session is not valid")]
    SessionInvalid,

    /// An internal invariant was violated; indicates a bridge bug.
    #[error("internal logic error: {0}")]
    LogicError(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidArgument(format!("malformed settings: {err}"))
    }
}

impl From<image::ImageError> for BridgeError {
    fn from(err: image::ImageError) -> Self {
        BridgeError::InvalidArgument(format!("image encode error: {err}"))
    }
}

/// Alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;
