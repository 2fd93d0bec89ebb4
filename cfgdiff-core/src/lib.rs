//! Structured configuration diff and patch primitives.
//!
//! Files are loaded into a [`Node`] tree by a format adapter, compared with
//! [`same`] and [`similar`], diffed into a list of [`EditOperation`]s and
//! replayed onto a third, independently edited tree with [`patch`].

pub mod adapter;
pub mod compare;
pub mod config;
pub mod diff;
pub mod format;
pub mod parser;
pub mod patch;
pub mod path;
pub mod tree;
pub mod writer;

pub use adapter::{Content, Format};
pub use compare::{deep_index, same, similar};
pub use config::{Config, ConfigError};
pub use diff::{diff, diff_with_options, Anchor, Command, DiffOptions, EditOperation};
pub use format::{
    format_json, format_lines, format_summary, format_text, parse_file_lines, parse_json,
    parse_lines, FilePatch,
};
pub use parser::{parse, parse_file, LoadError, ParseError};
pub use patch::{
    patch, patch_text, ConflictKind, ConflictPolicy, OperationReport, PatchError, PatchMode,
    PatchReport, Status,
};
pub use path::{Path, PathError, Segment};
pub use tree::{Identity, Kind, List, Map, Node, Order, Scalar, Value};
pub use writer::{write, write_file, WriteError};
