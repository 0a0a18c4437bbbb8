//! Error types for the stream processor and its handle pool

use crate::pool::Handle;
use thiserror::Error;

/// Errors surfaced by processor and pool operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Handle is null, destroyed, or was never issued by this pool
    #[error("invalid processor handle {0}")]
    InvalidHandle(Handle),

    /// Parameter outside its accepted domain
    #[error("invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Declared frame count does not match the buffer handed in
    #[error("sample count mismatch: expected {expected} samples, buffer holds {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Byte buffer does not hold a whole number of 16-bit frames
    #[error("byte count {actual} is not a multiple of the {frame_bytes}-byte frame size")]
    PartialFrame { frame_bytes: usize, actual: usize },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
