//! One operation per line: `<set|ins|rm> <path> [<json value>]`.
//!
//! Meant for hand-written patch documents. Recorded old values and insert
//! anchors are not part of this form. A document spanning several files
//! prefixes each line with the file it applies to:
//!
//! ```text
//! /etc/one/oned.conf set PORT 2634
//! /etc/one/oned.conf rm LISTEN_ADDRESS
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::diff::{Command, EditOperation};
use crate::path::{Path, PathError};
use crate::tree::Node;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing path")]
    MissingPath,
    #[error("{0} needs a value")]
    MissingValue(Command),
    #[error("delete takes no value, found {0:?}")]
    UnexpectedValue(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("unterminated quoted path")]
    Unterminated,
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<LineError>,
    },
}

fn command_word(command: Command) -> &'static str {
    match command {
        Command::Set => "set",
        Command::Insert => "ins",
        Command::Delete => "rm",
    }
}

/// Render one operation.
pub fn format_line(operation: &EditOperation) -> String {
    let path = quote(&operation.path.to_string());
    let mut line = format!("{} {path}", command_word(operation.command));
    if let Some(value) = &operation.value {
        line.push(' ');
        line.push_str(&value.to_plain().to_string());
    }
    line
}

fn quote(token: &str) -> String {
    if token.contains(char::is_whitespace) {
        format!("'{}'", token.replace('\\', "\\\\").replace('\'', "\\'"))
    } else {
        token.to_string()
    }
}

pub fn format_lines(operations: &[EditOperation]) -> String {
    operations
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Operations of a multi-file document that target the same file.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePatch {
    /// `None` for lines without a file prefix.
    pub file: Option<PathBuf>,
    pub operations: Vec<EditOperation>,
}

fn command_of(word: &str) -> Option<Command> {
    match word {
        "set" => Some(Command::Set),
        "ins" | "insert" => Some(Command::Insert),
        "rm" | "delete" => Some(Command::Delete),
        _ => None,
    }
}

/// Render one operation of a multi-file document.
pub fn format_file_line(file: &std::path::Path, operation: &EditOperation) -> String {
    format!("{} {}", quote(&file.display().to_string()), format_line(operation))
}

/// Parse one line; blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<EditOperation>, LineError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let Some(command) = command_of(word) else {
        return Err(LineError::UnknownCommand(word.to_string()));
    };

    let (path, rest) = path_token(rest.trim_start())?;
    let path: Path = path.parse()?;
    let rest = rest.trim();

    let operation = match command {
        Command::Delete if !rest.is_empty() => {
            return Err(LineError::UnexpectedValue(rest.to_string()))
        }
        Command::Delete => EditOperation::delete(path, None),
        _ if rest.is_empty() => return Err(LineError::MissingValue(command)),
        Command::Set => EditOperation::set(path, value(rest), None),
        Command::Insert => EditOperation::insert(path, value(rest), Default::default()),
    };
    Ok(Some(operation))
}

pub fn parse_lines(input: &str) -> Result<Vec<EditOperation>, LineError> {
    let mut operations = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let parsed = parse_line(line).map_err(|source| LineError::AtLine {
            line: index + 1,
            source: Box::new(source),
        })?;
        operations.extend(parsed);
    }
    Ok(operations)
}

/// Parse a document whose lines may carry a leading file path, grouping the
/// operations per file in the order the files first appear.
pub fn parse_file_lines(input: &str) -> Result<Vec<FilePatch>, LineError> {
    let mut patches: Vec<FilePatch> = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let at_line = |source| LineError::AtLine {
            line: index + 1,
            source: Box::new(source),
        };
        let Some((file, operation)) = parse_file_line(line).map_err(at_line)? else {
            continue;
        };
        match patches.iter_mut().find(|patch| patch.file == file) {
            Some(patch) => patch.operations.push(operation),
            None => patches.push(FilePatch {
                file,
                operations: vec![operation],
            }),
        }
    }
    Ok(patches)
}

fn parse_file_line(line: &str) -> Result<Option<(Option<PathBuf>, EditOperation)>, LineError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let first = trimmed.split(char::is_whitespace).next().unwrap_or(trimmed);
    if command_of(first).is_some() {
        return Ok(parse_line(trimmed)?.map(|operation| (None, operation)));
    }

    let (file, rest) = path_token(trimmed)?;
    let rest = rest.trim_start();
    let word = rest.split(char::is_whitespace).next().unwrap_or(rest);
    if command_of(word).is_none() {
        // Neither a command nor a file followed by one.
        return Err(LineError::UnknownCommand(first.to_string()));
    }
    Ok(parse_line(rest)?.map(|operation| (Some(PathBuf::from(file)), operation)))
}

fn path_token(input: &str) -> Result<(String, &str), LineError> {
    if input.is_empty() {
        return Err(LineError::MissingPath);
    }
    let Some(quoted) = input.strip_prefix('\'') else {
        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        return Ok((input[..end].to_string(), &input[end..]));
    };

    let mut token = String::new();
    let mut chars = quoted.char_indices();
    while let Some((at, c)) = chars.next() {
        match c {
            '\'' => return Ok((token, &quoted[at + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => token.push(escaped),
                None => break,
            },
            other => token.push(other),
        }
    }
    Err(LineError::Unterminated)
}

/// JSON when it parses as JSON, a plain string otherwise.
fn value(text: &str) -> Node {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => Node::from_plain(&value),
        Err(_) => Node::scalar(text),
    }
}
