//! Addressing of nodes inside a configuration tree.
//!
//! A path is written as `/`-separated keys. Keys that contain whitespace,
//! slashes, brackets or quotes are double-quoted. List elements are selected
//! with a bracket suffix: `[3]` by index, `[NAME="kvm"]` by the value of a
//! child key, `[.="x"]` by the element's own scalar value. The root path is
//! written as `/`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
    Match { key: String, value: String },
}

impl Segment {
    pub fn key(key: impl Into<String>) -> Self {
        Segment::Key(key.into())
    }

    pub fn matching(key: impl Into<String>, value: impl Into<String>) -> Self {
        Segment::Match {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Errors returned when parsing a textual path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("unterminated quote in path {0:?}")]
    UnterminatedQuote(String),
    #[error("unterminated bracket in path {0:?}")]
    UnterminatedBracket(String),
    #[error("invalid selector [{selector}] in path {path:?}")]
    InvalidSelector { path: String, selector: String },
    #[error("empty segment in path {0:?}")]
    EmptySegment(String),
}

/// Location of a node inside a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Path built from plain map keys.
    pub fn from_keys(keys: &[&str]) -> Self {
        Self(keys.iter().map(|k| Segment::key(*k)).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment);
        Path(segments)
    }

    pub fn key(&self, key: &str) -> Path {
        self.child(Segment::key(key))
    }

    pub fn index(&self, index: usize) -> Path {
        self.child(Segment::Index(index))
    }

    /// Split into the parent path and the last segment.
    pub fn split_last(&self) -> Option<(Path, &Segment)> {
        let (last, rest) = self.0.split_last()?;
        Some((Path(rest.to_vec()), last))
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        let mut first = true;
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    if !first {
                        write!(f, "/")?;
                    }
                    write_key(f, key)?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Match { key, value } => {
                    write!(f, "[")?;
                    write_key(f, key)?;
                    write!(f, "=")?;
                    write_quoted(f, value)?;
                    write!(f, "]")?;
                }
            }
            first = false;
        }
        Ok(())
    }
}

fn needs_quotes(key: &str) -> bool {
    key.is_empty()
        || key
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '[' | ']' | '"' | '=' | '\''))
}

fn write_key(f: &mut Formatter<'_>, key: &str) -> fmt::Result {
    if needs_quotes(key) {
        write_quoted(f, key)
    } else {
        write!(f, "{key}")
    }
}

fn write_quoted(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in text.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            _ => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        PathParser::new(input).parse()
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

struct PathParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.trim().chars().peekable(),
        }
    }

    fn parse(mut self) -> Result<Path, PathError> {
        let mut segments = Vec::new();
        if self.chars.peek() == Some(&'/') {
            self.chars.next();
        }
        if self.chars.peek().is_none() {
            return Ok(Path::root());
        }
        loop {
            match self.chars.peek() {
                Some('"') => {
                    self.chars.next();
                    segments.push(Segment::Key(self.quoted()?));
                }
                Some('[') => {}
                Some('/') | None => return Err(PathError::EmptySegment(self.input.to_string())),
                Some(_) => segments.push(Segment::Key(self.bare(&['/', '['])?)),
            }
            while self.chars.peek() == Some(&'[') {
                self.chars.next();
                segments.push(self.selector()?);
            }
            match self.chars.next() {
                None => break,
                Some('/') => {}
                Some(_) => return Err(PathError::EmptySegment(self.input.to_string())),
            }
        }
        Ok(Path(segments))
    }

    fn bare(&mut self, stops: &[char]) -> Result<String, PathError> {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if stops.contains(&c) {
                break;
            }
            if c == ']' || c == '"' {
                return Err(PathError::EmptySegment(self.input.to_string()));
            }
            out.push(c);
            self.chars.next();
        }
        if out.is_empty() {
            return Err(PathError::EmptySegment(self.input.to_string()));
        }
        Ok(out)
    }

    // Opening quote already consumed.
    fn quoted(&mut self) -> Result<String, PathError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(c) => out.push(c),
                    None => return Err(PathError::UnterminatedQuote(self.input.to_string())),
                },
                Some('"') => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(PathError::UnterminatedQuote(self.input.to_string())),
            }
        }
    }

    // Opening bracket already consumed.
    fn selector(&mut self) -> Result<Segment, PathError> {
        let key = match self.chars.peek() {
            Some('"') => {
                self.chars.next();
                self.quoted()?
            }
            Some(_) => self.bare(&['=', ']'])?,
            None => return Err(PathError::UnterminatedBracket(self.input.to_string())),
        };
        match self.chars.next() {
            Some(']') => key
                .parse::<usize>()
                .map(Segment::Index)
                .map_err(|_| PathError::InvalidSelector {
                    path: self.input.to_string(),
                    selector: key,
                }),
            Some('=') => {
                let value = match self.chars.peek() {
                    Some('"') => {
                        self.chars.next();
                        self.quoted()?
                    }
                    _ => self.bare(&[']'])?,
                };
                match self.chars.next() {
                    Some(']') => Ok(Segment::Match { key, value }),
                    _ => Err(PathError::UnterminatedBracket(self.input.to_string())),
                }
            }
            _ => Err(PathError::UnterminatedBracket(self.input.to_string())),
        }
    }
}
