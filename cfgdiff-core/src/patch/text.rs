use tracing::warn;

use crate::diff::{apply_unified, text::is_unified, Command, EditOperation};

use super::error::PatchError;
use super::policy::{ConflictPolicy, PatchMode};
use super::report::{OperationReport, PatchReport};

/// Apply operations to opaque text content.
///
/// Only a root `set` is meaningful here: a unified diff value is applied
/// hunk by hunk, any other string replaces the text.
pub fn patch_text(
    target: &mut String,
    operations: &[EditOperation],
    policy: &ConflictPolicy,
) -> Result<PatchReport, PatchError> {
    let mut scratch = target.clone();
    let mut report = PatchReport::default();
    for (index, operation) in operations.iter().enumerate() {
        match apply_one(&scratch, operation) {
            Ok(Some(text)) => {
                scratch = text;
                report.push(OperationReport::applied(index, operation, true, None));
            }
            Ok(None) => report.push(OperationReport::applied(index, operation, false, None)),
            Err(err) if policy.contains(PatchMode::Skip) => {
                warn!(path = %operation.path, error = %err, "skipping text operation");
                report.push(OperationReport::skipped(index, operation, err));
            }
            Err(err) if policy.contains(PatchMode::Force) => {
                let Some(text) = operation.value.as_ref().and_then(|v| v.text()) else {
                    return Err(err);
                };
                if is_unified(&text) {
                    return Err(err);
                }
                scratch = text;
                report.push(OperationReport::applied(
                    index,
                    operation,
                    true,
                    Some(PatchMode::Force),
                ));
            }
            Err(err) => return Err(err),
        }
    }
    if !policy.contains(PatchMode::Dummy) {
        *target = scratch;
    }
    Ok(report)
}

fn apply_one(text: &str, operation: &EditOperation) -> Result<Option<String>, PatchError> {
    let boxed = || Box::new(operation.clone());
    if operation.command != Command::Set || !operation.path.is_root() {
        return Err(PatchError::PathNotFound { operation: boxed() });
    }
    let value = operation
        .value
        .as_ref()
        .and_then(|value| value.text())
        .unwrap_or_default();
    if !is_unified(&value) {
        return Ok((value != text).then_some(value));
    }
    match apply_unified(text, &value) {
        Ok(patched) => Ok((patched != text).then_some(patched)),
        Err(err) => {
            warn!(error = %err, "unified diff does not apply");
            Err(PatchError::ValueNotFound { operation: boxed() })
        }
    }
}
