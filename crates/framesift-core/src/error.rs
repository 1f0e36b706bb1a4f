//! Error kinds for the retrieval core.
//!
//! Per-item kinds ([`RetrievalError::UnreadableItem`],
//! [`RetrievalError::ZeroVector`]) are recovered by the caller: the item is
//! skipped and a warning logged. Structural kinds halt the operation they
//! occur in.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building or querying an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("No valid images found in corpus. Check the corpus root and extension list.")]
    EmptyCorpus,

    #[error("Failed to read image '{path}': {reason}")]
    UnreadableItem { path: PathBuf, reason: String },

    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector has zero magnitude and cannot be normalized")]
    ZeroVector,

    #[error("Query text produced no chunks")]
    EmptyQuery,

    #[error("Index capacity of {capacity} items exceeded. Rebuild with a larger capacity.")]
    CapacityExceeded { capacity: usize },

    #[error("Invalid index parameters: {0}")]
    InvalidParams(String),
}

impl RetrievalError {
    /// Stable identifier for JSON output and log fields.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::UnreadableItem { .. } => "UNREADABLE_ITEM",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::ZeroVector => "ZERO_VECTOR",
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::InvalidParams(_) => "INVALID_PARAMS",
        }
    }

    /// Whether a corpus build may skip the offending item and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnreadableItem { .. } | Self::ZeroVector)
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_kinds_are_recoverable() {
        assert!(RetrievalError::ZeroVector.is_recoverable());
        assert!(RetrievalError::UnreadableItem {
            path: PathBuf::from("a.png"),
            reason: "truncated".into(),
        }
        .is_recoverable());
        assert!(!RetrievalError::EmptyCorpus.is_recoverable());
        assert!(!RetrievalError::CapacityExceeded { capacity: 3 }.is_recoverable());
        assert!(!RetrievalError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
        .is_recoverable());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = RetrievalError::DimensionMismatch {
            expected: 512,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Vector dimension mismatch: index expects 512, got 384"
        );
        assert_eq!(err.status_code(), "DIMENSION_MISMATCH");
    }
}
