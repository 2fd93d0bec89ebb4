//! Replaying edit operations onto a target tree under a conflict policy.

mod apply;
mod error;
mod policy;
mod report;
mod text;

pub use apply::patch;
pub use error::{ConflictKind, PatchError};
pub use policy::{ConflictPolicy, PatchMode};
pub use report::{OperationReport, PatchReport, Status};
pub use text::patch_text;
