//! Structural diffing of configuration trees and opaque text.

pub mod engine;
pub mod operation;
pub mod text;

pub use engine::{diff, diff_with_options, DiffOptions};
pub use operation::{Anchor, Command, EditOperation};
pub use text::{apply_unified, unified_diff, HunkError};
