use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::adapter::{oneconf, shell, yaml, Content, Format};

/// Errors that can occur while parsing file content.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input does not follow the format's grammar.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    /// YAML could not be decoded.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A YAML mapping key that is not a scalar.
    #[error("unsupported mapping key {0}")]
    UnsupportedKey(String),
    /// Two YAML keys that collapse to the same text.
    #[error("duplicate mapping key {0:?}")]
    DuplicateKey(String),
}

/// Errors raised when loading a file from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. } | LoadError::Parse { path, .. } => path,
        }
    }
}

/// Parse `input` as `format`.
pub fn parse(format: Format, input: &str) -> Result<Content, ParseError> {
    let node = match format {
        Format::Text => return Ok(Content::Text(input.to_string())),
        Format::Shell => shell::parse(input)?,
        Format::OneConf => oneconf::parse(input)?,
        Format::Yaml => yaml::parse(input, false)?,
        Format::YamlStrict => yaml::parse(input, true)?,
    };
    Ok(Content::Tree(node))
}

/// Read and parse the file at `path`.
pub fn parse_file(format: Format, path: &Path) -> Result<Content, LoadError> {
    let input = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(format, &input).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
