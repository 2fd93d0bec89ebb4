use serde::Serialize;

use crate::diff::{Command, EditOperation};
use crate::path::Path;

use super::error::PatchError;
use super::policy::PatchMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Applied,
    Unchanged,
    Skipped,
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub index: usize,
    pub command: Command,
    pub path: Path,
    pub status: Status,
    /// Mode that decided how a conflict was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PatchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<PatchError>,
}

impl OperationReport {
    pub(crate) fn applied(
        index: usize,
        operation: &EditOperation,
        changed: bool,
        mode: Option<PatchMode>,
    ) -> Self {
        Self {
            index,
            command: operation.command,
            path: operation.path.clone(),
            status: if changed {
                Status::Applied
            } else {
                Status::Unchanged
            },
            mode,
            conflict: None,
        }
    }

    pub(crate) fn skipped(index: usize, operation: &EditOperation, conflict: PatchError) -> Self {
        Self {
            index,
            command: operation.command,
            path: operation.path.clone(),
            status: Status::Skipped,
            mode: Some(PatchMode::Skip),
            conflict: Some(conflict),
        }
    }

    pub fn changed(&self) -> bool {
        self.status == Status::Applied
    }
}

/// Per-operation results of a patch run, in operation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchReport {
    pub entries: Vec<OperationReport>,
}

impl PatchReport {
    pub(crate) fn push(&mut self, entry: OperationReport) {
        self.entries.push(entry);
    }

    /// Whether any operation modified the target.
    pub fn changed(&self) -> bool {
        self.entries.iter().any(OperationReport::changed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &OperationReport> {
        self.entries
            .iter()
            .filter(|entry| entry.status == Status::Skipped)
    }

    pub fn first_conflict(&self) -> Option<&PatchError> {
        self.entries.iter().find_map(|entry| entry.conflict.as_ref())
    }

    /// Turn the first skipped conflict into an error.
    pub fn check(self) -> Result<Self, PatchError> {
        match self.first_conflict() {
            Some(conflict) => Err(conflict.clone()),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
