//! Line-based unified diffs for opaque text content.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};
use thiserror::Error;

const CONTEXT_LINES: usize = 3;
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Errors raised when a unified diff cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HunkError {
    #[error("malformed hunk header {0:?}")]
    Header(String),
    #[error("line {0:?} is outside of any hunk")]
    Stray(String),
    #[error("hunk {index} (@@ -{old_start}) does not match the target text")]
    Mismatch { index: usize, old_start: usize },
}

/// Unified diff between two texts, `None` when they are equal.
pub fn unified_diff(old: &str, new: &str) -> Option<String> {
    if old == new {
        return None;
    }
    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();
    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let new_start = first.new_range().start;
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            old_start + 1,
            last.old_range().end - old_start,
            new_start + 1,
            last.new_range().end - new_start
        );
        for op in &group {
            for change in diff.iter_changes(op) {
                out.push(match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                });
                let text = change.value();
                match text.strip_suffix('\n') {
                    Some(line) => {
                        out.push_str(line);
                        out.push('\n');
                    }
                    None => {
                        out.push_str(text);
                        out.push('\n');
                        out.push_str(NO_NEWLINE_MARKER);
                        out.push('\n');
                    }
                }
            }
        }
    }
    Some(out)
}

/// Whether `value` looks like output of [`unified_diff`].
pub fn is_unified(value: &str) -> bool {
    value.starts_with("@@ ")
}

struct Hunk {
    old_start: usize,
    old: Vec<String>,
    new: Vec<String>,
}

fn parse_hunks(patch: &str) -> Result<Vec<Hunk>, HunkError> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut last_sign = ' ';
    for raw in patch.split_terminator('\n') {
        if let Some(header) = raw.strip_prefix("@@ ") {
            hunks.push(Hunk {
                old_start: parse_old_start(header)?,
                old: Vec::new(),
                new: Vec::new(),
            });
            continue;
        }
        let hunk = hunks
            .last_mut()
            .ok_or_else(|| HunkError::Stray(raw.to_string()))?;
        if raw == NO_NEWLINE_MARKER {
            if matches!(last_sign, ' ' | '-') {
                strip_newline(hunk.old.last_mut());
            }
            if matches!(last_sign, ' ' | '+') {
                strip_newline(hunk.new.last_mut());
            }
            continue;
        }
        let mut chars = raw.chars();
        let sign = chars.next().unwrap_or(' ');
        let line = format!("{}\n", chars.as_str());
        match sign {
            ' ' => {
                hunk.old.push(line.clone());
                hunk.new.push(line);
            }
            '-' => hunk.old.push(line),
            '+' => hunk.new.push(line),
            _ => return Err(HunkError::Stray(raw.to_string())),
        }
        last_sign = sign;
    }
    Ok(hunks)
}

fn strip_newline(line: Option<&mut String>) {
    if let Some(line) = line {
        if line.ends_with('\n') {
            line.pop();
        }
    }
}

fn parse_old_start(header: &str) -> Result<usize, HunkError> {
    header
        .strip_prefix('-')
        .and_then(|rest| rest.split([',', ' ']).next())
        .and_then(|start| start.parse().ok())
        .ok_or_else(|| HunkError::Header(header.to_string()))
}

/// Apply a unified diff to `target`. Each hunk is located by its context,
/// first at the recorded line (adjusted by earlier hunks), then at the
/// nearest matching position.
pub fn apply_unified(target: &str, patch: &str) -> Result<String, HunkError> {
    let hunks = parse_hunks(patch)?;
    let mut lines: Vec<String> = target.split_inclusive('\n').map(str::to_string).collect();
    let mut offset: isize = 0;
    let mut floor = 0usize;

    for (index, hunk) in hunks.iter().enumerate() {
        let recorded = hunk.old_start.saturating_sub(1) as isize;
        let expected = (recorded + offset).max(0) as usize;
        let at = locate(&lines, &hunk.old, expected, floor).ok_or(HunkError::Mismatch {
            index,
            old_start: hunk.old_start,
        })?;
        lines.splice(at..at + hunk.old.len(), hunk.new.iter().cloned());
        offset = at as isize - recorded + hunk.new.len() as isize - hunk.old.len() as isize;
        floor = at + hunk.new.len();
    }
    Ok(lines.concat())
}

fn locate(lines: &[String], block: &[String], expected: usize, floor: usize) -> Option<usize> {
    let fits = |at: usize| {
        at >= floor && at + block.len() <= lines.len() && lines[at..at + block.len()] == *block
    };
    if fits(expected) {
        return Some(expected);
    }
    for delta in 1..=lines.len().max(expected) {
        if let Some(at) = expected.checked_sub(delta) {
            if fits(at) {
                return Some(at);
            }
        }
        if fits(expected + delta) {
            return Some(expected + delta);
        }
    }
    None
}
