use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::diff::EditOperation;
use crate::path::Path;

/// Raised when an operation does not fit the target tree. Every variant
/// carries the failing operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("path not found: {}", .operation.path)]
    PathNotFound { operation: Box<EditOperation> },
    #[error("value at {} differs from the expected one", .operation.path)]
    ValueNotFound { operation: Box<EditOperation> },
    #[error("unexpected data already present at {}", .operation.path)]
    UnexpectedData { operation: Box<EditOperation> },
    #[error("more than one element matches {}", .operation.path)]
    InvalidMultiple { operation: Box<EditOperation> },
    #[error("expected a map at {at} while applying {} {}", .operation.command, .operation.path)]
    ExpectedHash {
        at: Path,
        operation: Box<EditOperation>,
    },
    #[error("expected a list at {at} while applying {} {}", .operation.command, .operation.path)]
    ExpectedArray {
        at: Path,
        operation: Box<EditOperation>,
    },
}

/// Discriminant of a [`PatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    PathNotFound,
    ValueNotFound,
    UnexpectedData,
    InvalidMultiple,
    ExpectedHash,
    ExpectedArray,
}

impl PatchError {
    pub fn operation(&self) -> &EditOperation {
        match self {
            PatchError::PathNotFound { operation }
            | PatchError::ValueNotFound { operation }
            | PatchError::UnexpectedData { operation }
            | PatchError::InvalidMultiple { operation }
            | PatchError::ExpectedHash { operation, .. }
            | PatchError::ExpectedArray { operation, .. } => operation,
        }
    }

    pub fn kind(&self) -> ConflictKind {
        match self {
            PatchError::PathNotFound { .. } => ConflictKind::PathNotFound,
            PatchError::ValueNotFound { .. } => ConflictKind::ValueNotFound,
            PatchError::UnexpectedData { .. } => ConflictKind::UnexpectedData,
            PatchError::InvalidMultiple { .. } => ConflictKind::InvalidMultiple,
            PatchError::ExpectedHash { .. } => ConflictKind::ExpectedHash,
            PatchError::ExpectedArray { .. } => ConflictKind::ExpectedArray,
        }
    }

    /// Kind mismatches are never downgraded to a skip.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PatchError::ExpectedHash { .. } | PatchError::ExpectedArray { .. }
        )
    }
}

impl Serialize for PatchError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PatchError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
