use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::adapter::{oneconf, shell, yaml, Content, Format};
use crate::tree::Kind;

/// Errors that can occur while rendering or saving content.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize YAML.
    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Tree content given to the text format or the other way round.
    #[error("{format} files cannot hold {content} content")]
    Mismatch {
        format: Format,
        content: &'static str,
    },
    /// A value the format has no syntax for.
    #[error("cannot write {kind} value of {key}")]
    Unrepresentable { key: String, kind: Kind },
    /// Failed to write output file.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Render `content` in `format`.
pub fn write(format: Format, content: &Content) -> Result<String, WriteError> {
    let mismatch = || WriteError::Mismatch {
        format,
        content: content.kind_name(),
    };
    match (format, content) {
        (Format::Text, Content::Text(text)) => Ok(text.clone()),
        (Format::Text, Content::Tree(_)) | (_, Content::Text(_)) => Err(mismatch()),
        (Format::Shell, Content::Tree(node)) => shell::render(node),
        (Format::OneConf, Content::Tree(node)) => oneconf::render(node),
        (Format::Yaml | Format::YamlStrict, Content::Tree(node)) => yaml::render(node),
    }
}

/// Render `content` and write it to `path`, creating parent directories.
pub fn write_file(format: Format, content: &Content, path: &Path) -> Result<(), WriteError> {
    let text = write(format, content)?;
    let io_error = |source: io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, text).map_err(io_error)
}
