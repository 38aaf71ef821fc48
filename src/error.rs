//! Error types for blocktri

use crate::runtime::MemoryKind;
use thiserror::Error;

/// Result type alias using blocktri's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blocktri operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument provided to an operation
    ///
    /// `position` follows the LAPACK convention: argument *k* of the entry
    /// point (1-based) violated its precondition.
    #[error("Invalid argument {position} ('{arg}'): {reason}")]
    InvalidArgument {
        /// 1-based position of the argument in the entry point
        position: usize,
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Out of memory
    #[error("Out of {kind} memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
        /// Memory pool the request was made against
        kind: MemoryKind,
    },

    /// Pointer was not obtained from the allocator it is returned to
    #[error("Invalid pointer {ptr:#x} freed as {kind} memory")]
    InvalidPointer {
        /// The offending pointer
        ptr: u64,
        /// Memory pool the free was issued against
        kind: MemoryKind,
    },

    /// Shape or length mismatch
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Kernel launch rejected by the device
    #[error("Launch of '{kernel}' failed: {reason}")]
    KernelLaunch {
        /// Kernel name
        kernel: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// The execution queue worker is gone
    #[error("Execution queue closed")]
    QueueClosed,

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(position: usize, arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            position,
            arg,
            reason: reason.into(),
        }
    }

    /// Create a kernel launch error
    pub fn kernel_launch(kernel: &'static str, reason: impl Into<String>) -> Self {
        Self::KernelLaunch {
            kernel,
            reason: reason.into(),
        }
    }

    /// Argument position for `InvalidArgument`, `None` otherwise
    ///
    /// Mirrors the negative `info` of LAPACK-style interfaces.
    pub fn argument_position(&self) -> Option<usize> {
        match self {
            Self::InvalidArgument { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_position() {
        let err = Error::invalid_argument(5, "lda", "lda < n");
        assert_eq!(err.argument_position(), Some(5));
        assert_eq!(
            err.to_string(),
            "Invalid argument 5 ('lda'): lda < n".to_string()
        );
        assert_eq!(Error::QueueClosed.argument_position(), None);
    }

    #[test]
    fn test_out_of_memory_display() {
        let err = Error::OutOfMemory {
            size: 64,
            kind: MemoryKind::Pinned,
        };
        assert_eq!(
            err.to_string(),
            "Out of pinned memory: failed to allocate 64 bytes"
        );
    }
}
