//! Shell variable files: `NAME=VALUE`, `export NAME=VALUE` and bare
//! `export NAME` lines.
//!
//! Unchanged entries are written back from their source text, so inline
//! comments and the author's quoting survive a round trip.

use crate::parser::ParseError;
use crate::tree::{Node, Quote, Scalar, Value};
use crate::writer::WriteError;

use super::entries::EntryFolder;

enum EntryError {
    /// A quoted value runs past the end of the text seen so far.
    Unterminated,
    Invalid(String),
}

pub fn parse(input: &str) -> Result<Node, ParseError> {
    let lines: Vec<&str> = input.lines().collect();
    let mut folder = EntryFolder::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            folder.trivia(line);
            i += 1;
            continue;
        }

        let first = i;
        let mut raw = line.to_string();
        let (key, mut node) = loop {
            match parse_entry(&raw) {
                Ok(entry) => break entry,
                Err(EntryError::Unterminated) if i + 1 < lines.len() => {
                    i += 1;
                    raw.push('\n');
                    raw.push_str(lines[i]);
                }
                Err(EntryError::Unterminated) => {
                    return Err(syntax(first, "unterminated quoted value"));
                }
                Err(EntryError::Invalid(message)) => return Err(syntax(first, message)),
            }
        };
        node.annotations.raw = Some(raw);
        folder.push(key, node);
        i += 1;
    }

    let (map, trailing) = folder.finish();
    let mut root = Node::map(map);
    root.annotations.trailing = trailing;
    root.annotations.no_final_newline = !input.is_empty() && !input.ends_with('\n');
    Ok(root)
}

fn syntax(index: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line: index + 1,
        message: message.into(),
    }
}

fn parse_entry(raw: &str) -> Result<(String, Node), EntryError> {
    let body = raw.trim_start();
    let (exported, body) = match body.strip_prefix("export") {
        Some(rest) if rest.starts_with([' ', '\t']) => (true, rest.trim_start()),
        _ => (false, body),
    };

    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    let name = &body[..name_len];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(EntryError::Invalid(format!(
            "invalid variable name in {:?}",
            body.lines().next().unwrap_or_default()
        )));
    }
    let rest = &body[name_len..];

    let Some(rest) = rest.strip_prefix('=') else {
        if exported && only_comment(rest) {
            let mut node = Node::null();
            node.annotations.exported = true;
            return Ok((name.to_string(), node));
        }
        return Err(EntryError::Invalid(format!("expected '=' after {name}")));
    };

    let (value, quote, rest) = parse_value(rest)?;
    let (value, quote) = if only_comment(rest) {
        (value, quote)
    } else if quote == Quote::None {
        (format!("{value}{}", strip_comment(rest)), Quote::Raw)
    } else {
        return Err(EntryError::Invalid(format!(
            "unexpected text after value of {name}"
        )));
    };
    let mut node = Node::scalar(value);
    node.annotations.exported = exported;
    node.annotations.quote = quote;
    Ok((name.to_string(), node))
}

fn only_comment(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.is_empty() || rest.starts_with('#')
}

/// Text before an inline `# comment`.
fn strip_comment(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|&(at, c)| c == '#' && text[..at].ends_with(char::is_whitespace))
        .map_or(text.len(), |(at, _)| at);
    text[..end].trim_end()
}

fn parse_value(rest: &str) -> Result<(String, Quote, &str), EntryError> {
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, '"')) => {
            let mut value = String::new();
            while let Some((at, c)) = chars.next() {
                match c {
                    '"' => return Ok((value, Quote::Double, &rest[at + 1..])),
                    '\\' => match chars.next() {
                        Some((_, escaped @ ('"' | '\\' | '$' | '`'))) => value.push(escaped),
                        Some((_, '\n')) => {}
                        Some((_, other)) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return Err(EntryError::Unterminated),
                    },
                    other => value.push(other),
                }
            }
            Err(EntryError::Unterminated)
        }
        Some((_, '\'')) => match rest[1..].find('\'') {
            Some(end) => Ok((rest[1..end + 1].to_string(), Quote::Single, &rest[end + 2..])),
            None => Err(EntryError::Unterminated),
        },
        _ => {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            Ok((rest[..end].to_string(), Quote::None, &rest[end..]))
        }
    }
}

pub fn render(root: &Node) -> Result<String, WriteError> {
    let map = root.as_map().ok_or_else(|| WriteError::Unrepresentable {
        key: "/".to_string(),
        kind: root.kind(),
    })?;
    let mut out = String::new();
    for (key, node) in map.iter() {
        match &node.value {
            Value::List(list) => {
                for item in &list.items {
                    render_entry(&mut out, key, item)?;
                }
            }
            _ => render_entry(&mut out, key, node)?,
        }
    }
    for line in &root.annotations.trailing {
        out.push_str(line);
        out.push('\n');
    }
    if root.annotations.no_final_newline && out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn render_entry(out: &mut String, key: &str, node: &Node) -> Result<(), WriteError> {
    for line in &node.annotations.leading {
        out.push_str(line);
        out.push('\n');
    }
    if let Some(raw) = &node.annotations.raw {
        out.push_str(raw);
        out.push('\n');
        return Ok(());
    }

    let Value::Scalar(scalar) = &node.value else {
        return Err(WriteError::Unrepresentable {
            key: key.to_string(),
            kind: node.kind(),
        });
    };
    if node.annotations.exported {
        out.push_str("export ");
    }
    out.push_str(key);
    if *scalar == Scalar::Null && node.annotations.exported {
        out.push('\n');
        return Ok(());
    }
    out.push('=');
    out.push_str(&quote(&scalar.to_text(), node.annotations.quote));
    out.push('\n');
    Ok(())
}

fn quote(text: &str, style: Quote) -> String {
    match style {
        Quote::Raw => text.to_string(),
        Quote::Single if !text.contains('\'') => format!("'{text}'"),
        Quote::None if !needs_quotes(text) => text.to_string(),
        _ => {
            let mut quoted = String::with_capacity(text.len() + 2);
            quoted.push('"');
            for c in text.chars() {
                if matches!(c, '"' | '\\' | '$' | '`') {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
            quoted.push('"');
            quoted
        }
    }
}

fn needs_quotes(text: &str) -> bool {
    text.chars().any(|c| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '`' | '#' | ';' | '&' | '|')
    })
}
