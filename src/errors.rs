//! Custom error types for samstream operations.

use thiserror::Error;

/// Result type alias for samstream operations
pub type Result<T> = std::result::Result<T, SamstreamError>;

/// Error type for samstream operations
#[derive(Error, Debug)]
pub enum SamstreamError {
    /// Operation attempted on a handle that has already been closed
    #[error("Handle is closed: cannot {operation}")]
    HandleClosed {
        /// The operation that was attempted
        operation: &'static str,
    },

    /// A record could not be decoded into the semantic model
    #[error("Failed to decode record '{name}': {reason}")]
    RecordDecode {
        /// Query name of the offending record (may be empty)
        name: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A record field cannot be represented in the stream's wire encoding
    #[error("Failed to encode record '{name}': {reason}")]
    RecordEncode {
        /// Query name of the offending record (may be empty)
        name: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Target sequence index outside the target set
    #[error("Target index {index} out of range (target set has {len} sequences)")]
    TargetIndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of sequences in the set
        len: usize,
    },

    /// Target sequence with a length the stream header cannot represent
    #[error("Target sequence '{name}' has invalid length {length}")]
    InvalidTargetLength {
        /// The target sequence name
        name: String,
        /// The invalid length
        length: u64,
    },

    /// Underlying stream I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
