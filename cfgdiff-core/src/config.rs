//! Per-file handle tying a file name and format to its loaded content.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::adapter::{Content, Format};
use crate::compare;
use crate::diff::{diff_with_options, unified_diff, DiffOptions, EditOperation};
use crate::parser::{parse_file, LoadError};
use crate::patch::{patch, patch_text, ConflictPolicy, PatchError, PatchMode, PatchReport};
use crate::tree::Node;
use crate::writer::{write, write_file, WriteError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("{0} has no content loaded")]
    NotLoaded(String),
    #[error("cannot compare {left} content with {right} content")]
    FormatMismatch { left: Format, right: Format },
    #[error("cannot diff {left} content against {right} content")]
    ContentMismatch {
        left: &'static str,
        right: &'static str,
    },
    #[error("configuration has no file name")]
    Unnamed,
}

/// A configuration file of a known [`Format`].
#[derive(Debug, Clone)]
pub struct Config {
    name: Option<PathBuf>,
    format: Format,
    content: Option<Content>,
}

impl Config {
    pub fn new(format: Format, name: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            format,
            content: None,
        }
    }

    pub fn unnamed(format: Format) -> Self {
        Self {
            name: None,
            format,
            content: None,
        }
    }

    pub fn from_content(format: Format, content: Content) -> Self {
        Self {
            name: None,
            format,
            content: Some(content),
        }
    }

    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn set_content(&mut self, content: Content) {
        self.content = Some(content);
    }

    /// Forget loaded content.
    pub fn reset(&mut self) {
        self.content = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// Whether the named file exists.
    pub fn exist(&self) -> bool {
        self.name.as_deref().is_some_and(Path::is_file)
    }

    pub fn load(&mut self) -> Result<&Content, ConfigError> {
        let name = self.name.clone().ok_or(ConfigError::Unnamed)?;
        self.load_from(&name)
    }

    /// Load content from `path`; on failure the handle is left empty.
    pub fn load_from(&mut self, path: &Path) -> Result<&Content, ConfigError> {
        self.content = None;
        let content = parse_file(self.format, path)?;
        debug!(path = %path.display(), format = %self.format, "loaded configuration");
        Ok(self.content.insert(content))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let name = self.name.as_deref().ok_or(ConfigError::Unnamed)?;
        self.save_to(name)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_file(self.format, self.loaded()?, path)?;
        debug!(path = %path.display(), format = %self.format, "saved configuration");
        Ok(())
    }

    /// Content rendered as it would be saved.
    pub fn render(&self) -> Result<String, ConfigError> {
        Ok(write(self.format, self.loaded()?)?)
    }

    /// Strict equality of content; `false` when either side is not loaded.
    pub fn same(&self, other: &Config) -> bool {
        match (&self.content, &other.content) {
            (Some(Content::Tree(a)), Some(Content::Tree(b))) => compare::same(a, b),
            (Some(Content::Text(a)), Some(Content::Text(b))) => a == b,
            _ => false,
        }
    }

    /// Equality up to order and quoting; `false` when either side is not
    /// loaded.
    pub fn similar(&self, other: &Config) -> bool {
        match (&self.content, &other.content) {
            (Some(Content::Tree(a)), Some(Content::Tree(b))) => compare::similar(a, b),
            (Some(Content::Text(a)), Some(Content::Text(b))) => a == b,
            _ => false,
        }
    }

    /// Operations turning this content into `other`'s; `None` when there
    /// is nothing to change.
    pub fn diff(&self, other: &Config) -> Result<Option<Vec<EditOperation>>, ConfigError> {
        self.diff_with(other, &DiffOptions::default())
    }

    pub fn diff_with(
        &self,
        other: &Config,
        opts: &DiffOptions,
    ) -> Result<Option<Vec<EditOperation>>, ConfigError> {
        if self.format != other.format {
            return Err(ConfigError::FormatMismatch {
                left: self.format,
                right: other.format,
            });
        }
        let operations = match (self.loaded()?, other.loaded()?) {
            (Content::Tree(old), Content::Tree(new)) => diff_with_options(old, new, opts),
            (Content::Text(old), Content::Text(new)) => unified_diff(old, new)
                .map(|hunks| {
                    EditOperation::set(crate::path::Path::root(), Node::scalar(hunks), None)
                })
                .into_iter()
                .collect(),
            (old, new) => {
                return Err(ConfigError::ContentMismatch {
                    left: old.kind_name(),
                    right: new.kind_name(),
                })
            }
        };
        Ok((!operations.is_empty()).then_some(operations))
    }

    /// Apply `operations` to the loaded content. Trees are normalized to
    /// their format's shape afterwards unless the run is a dummy one.
    pub fn patch(
        &mut self,
        operations: &[EditOperation],
        policy: &ConflictPolicy,
    ) -> Result<PatchReport, ConfigError> {
        let format = self.format;
        let label = self.label();
        let content = self
            .content
            .as_mut()
            .ok_or(ConfigError::NotLoaded(label))?;
        let report = match content {
            Content::Text(text) => patch_text(text, operations, policy)?,
            Content::Tree(node) => {
                let report = patch(node, operations, policy)?;
                if !policy.contains(PatchMode::Dummy) {
                    format.normalize(node);
                }
                report
            }
        };
        debug!(
            config = %self.label(),
            operations = operations.len(),
            changed = report.changed(),
            "patched configuration"
        );
        Ok(report)
    }

    fn loaded(&self) -> Result<&Content, ConfigError> {
        self.content
            .as_ref()
            .ok_or_else(|| ConfigError::NotLoaded(self.label()))
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.display().to_string(),
            None => format!("unnamed {} configuration", self.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loaded(format: Format, text: &str) -> Config {
        let content = crate::parser::parse(format, text).expect("parse");
        Config::from_content(format, content)
    }

    #[test]
    fn load_and_save_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("kvmrc");
        fs::write(&path, "# comment\nA=1\nexport B=\"two\"\n").expect("write");

        let mut config = Config::new(Format::Shell, &path);
        assert!(config.exist());
        config.load().expect("load");

        let out = dir.path().join("nested").join("kvmrc");
        config.save_to(&out).expect("save");
        assert_eq!(
            fs::read_to_string(out).expect("read"),
            "# comment\nA=1\nexport B=\"two\"\n"
        );
    }

    #[test]
    fn missing_and_invalid_files_fail_to_load() {
        let dir = tempdir().expect("tempdir");
        let mut missing = Config::new(Format::Yaml, dir.path().join("nope.yaml"));
        assert!(!missing.exist());
        assert!(matches!(
            missing.load(),
            Err(ConfigError::Load(LoadError::Io { .. }))
        ));

        let path = dir.path().join("bad.yaml");
        fs::write(&path, "a: [1, 2\n").expect("write");
        let mut invalid = Config::new(Format::Yaml, &path);
        assert!(matches!(
            invalid.load(),
            Err(ConfigError::Load(LoadError::Parse { .. }))
        ));
        assert!(!invalid.is_loaded());
    }

    #[test]
    fn identical_content_has_no_diff() {
        let a = loaded(Format::Yaml, "a: 1\nb: [x, y]\n");
        let b = loaded(Format::Yaml, "b: [x, y]\na: 1\n");
        assert!(a.same(&b));
        assert_eq!(a.diff(&b).expect("diff"), None);
    }

    #[test]
    fn unloaded_configs_are_never_equal() {
        let a = Config::unnamed(Format::Shell);
        let b = loaded(Format::Shell, "A=1\n");
        assert!(!a.same(&b));
        assert!(!b.similar(&a));
        assert!(matches!(a.diff(&b), Err(ConfigError::NotLoaded(_))));
    }

    #[test]
    fn text_content_diffs_as_hunks() {
        let old = loaded(Format::Text, "a\nb\nc\n");
        let new = loaded(Format::Text, "a\nB\nc\n");
        let operations = old.diff(&new).expect("diff").expect("changes");
        assert_eq!(operations.len(), 1);

        let mut target = loaded(Format::Text, "a\nb\nc\n");
        target
            .patch(&operations, &ConflictPolicy::new())
            .expect("patch");
        assert!(target.same(&new));
    }
}
