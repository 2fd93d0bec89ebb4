//! Renderers for edit operation lists.

pub mod json;
pub mod line;
pub mod text;

pub use json::{format_json, parse_json};
pub use line::{
    format_file_line, format_line, format_lines, parse_file_lines, parse_line, parse_lines,
    FilePatch, LineError,
};
pub use text::{format_summary, format_text};
