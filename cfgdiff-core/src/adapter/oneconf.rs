//! Nested `KEY = value` configuration with bracketed blocks, as used by
//! daemon configuration files:
//!
//! ```text
//! LOG = [
//!     SYSTEM      = "file",
//!     DEBUG_LEVEL = 3
//! ]
//! ```

use crate::parser::ParseError;
use crate::tree::{Node, Quote, Value};
use crate::writer::WriteError;

use super::entries::EntryFolder;

const INDENT: &str = "    ";

pub fn parse(input: &str) -> Result<Node, ParseError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        line: 1,
    };
    parser.document()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn document(&mut self) -> Result<Node, ParseError> {
        let mut folder = EntryFolder::new();
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let line_len = rest.find('\n').unwrap_or(rest.len());
            let line = &rest[..line_len];
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                folder.trivia(line);
                self.skip_line(line_len);
                continue;
            }

            let start = self.pos;
            self.skip_blank();
            let key = self.key()?;
            let node = self.assignment()?;
            self.skip_blank();
            if self.peek() == Some('#') {
                self.skip_comment();
            }
            let end = self.pos;
            match self.peek() {
                None => {}
                Some('\n') => self.bump(),
                Some(other) => return Err(self.error(format!("unexpected {other:?} after {key}"))),
            }

            let mut node = node;
            node.annotations.raw = Some(self.src[start..end].trim_end().to_string());
            folder.push(key, node);
        }

        let (map, trailing) = folder.finish();
        let mut root = Node::map(map);
        root.annotations.trailing = trailing;
        root.annotations.no_final_newline = !self.src.is_empty() && !self.src.ends_with('\n');
        Ok(root)
    }

    /// `= value` after a key.
    fn assignment(&mut self) -> Result<Node, ParseError> {
        self.skip_blank();
        if self.peek() != Some('=') {
            return Err(self.error("expected '='"));
        }
        self.bump();
        self.skip_space();
        self.value()
    }

    fn value(&mut self) -> Result<Node, ParseError> {
        match self.peek() {
            Some('[') => {
                self.bump();
                self.block()
            }
            Some('"') => {
                self.bump();
                let text = self.quoted()?;
                let mut node = Node::scalar(text);
                node.annotations.quote = Quote::Double;
                Ok(node)
            }
            _ => {
                let rest = &self.src[self.pos..];
                let len = rest
                    .find(|c: char| c.is_whitespace() || matches!(c, ',' | ']' | '#' | '['))
                    .unwrap_or(rest.len());
                if len == 0 {
                    return Err(self.error("missing value"));
                }
                let text = rest[..len].to_string();
                self.pos += len;
                Ok(Node::scalar(text))
            }
        }
    }

    fn block(&mut self) -> Result<Node, ParseError> {
        let mut folder = EntryFolder::new();
        loop {
            self.skip_space();
            match self.peek() {
                None => return Err(self.error("unterminated block")),
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(',') => self.bump(),
                Some('#') => {
                    let comment = self.skip_comment();
                    folder.trivia(comment);
                }
                Some(_) => {
                    let key = self.key()?;
                    let node = self.assignment()?;
                    folder.push(key, node);
                    self.skip_blank();
                    match self.peek() {
                        Some(',' | '\n' | ']' | '#') => {}
                        None => return Err(self.error("unterminated block")),
                        Some(other) => {
                            return Err(self.error(format!("unexpected {other:?} in block")))
                        }
                    }
                }
            }
        }
        let (map, trailing) = folder.finish();
        let mut node = Node::map(map);
        node.annotations.trailing = trailing;
        Ok(node)
    }

    fn key(&mut self) -> Result<String, ParseError> {
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
            .unwrap_or(rest.len());
        if len == 0 {
            let found = rest.chars().next().unwrap_or(' ');
            return Err(self.error(format!("expected a key, found {found:?}")));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    /// Body of a double-quoted string; the opening quote is consumed.
    fn quoted(&mut self) -> Result<String, ParseError> {
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            self.bump();
            match c {
                '"' => return Ok(text),
                '\\' => match self.peek() {
                    Some(escaped @ ('"' | '\\')) => {
                        self.bump();
                        text.push(escaped);
                    }
                    _ => text.push('\\'),
                },
                other => text.push(other),
            }
        }
    }

    /// Consume a `#` comment up to, not including, the newline.
    fn skip_comment(&mut self) -> String {
        let rest = &self.src[self.pos..];
        let len = rest.find('\n').unwrap_or(rest.len());
        self.pos += len;
        rest[..len].to_string()
    }

    fn skip_line(&mut self, len: usize) {
        self.pos += len;
        if self.peek() == Some('\n') {
            self.bump();
        }
    }

    /// Spaces and tabs only.
    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.bump();
        }
    }

    /// Any whitespace, newlines included.
    fn skip_space(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line,
            message: message.into(),
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
        let items: Vec<&Node> = match &node.value {
            Value::List(list) => list.items.iter().collect(),
            _ => vec![node],
        };
        for item in items {
            for line in &item.annotations.leading {
                out.push_str(line);
                out.push('\n');
            }
            match &item.annotations.raw {
                Some(raw) => out.push_str(raw),
                None => {
                    out.push_str(key);
                    out.push_str(" = ");
                    render_value(&mut out, key, item, 0)?;
                }
            }
            out.push('\n');
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

fn render_value(out: &mut String, key: &str, node: &Node, depth: usize) -> Result<(), WriteError> {
    match &node.value {
        Value::Scalar(scalar) => {
            let text = scalar.to_text();
            if node.annotations.quote != Quote::None || needs_quotes(&text) {
                out.push('"');
                for c in text.chars() {
                    if matches!(c, '"' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            } else {
                out.push_str(&text);
            }
            Ok(())
        }
        Value::Map(block) => {
            let inner = INDENT.repeat(depth + 1);
            out.push_str("[\n");
            let entries: Vec<(&str, &Node)> = block
                .iter()
                .flat_map(|(k, v)| match &v.value {
                    Value::List(list) => list.items.iter().map(|item| (k, item)).collect::<Vec<_>>(),
                    _ => vec![(k, v)],
                })
                .collect();
            for (i, (child_key, child)) in entries.iter().enumerate() {
                for line in &child.annotations.leading {
                    out.push_str(&inner);
                    out.push_str(line.trim_start());
                    out.push('\n');
                }
                out.push_str(&inner);
                out.push_str(child_key);
                out.push_str(" = ");
                render_value(out, child_key, child, depth + 1)?;
                if i + 1 < entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            for line in &node.annotations.trailing {
                out.push_str(&inner);
                out.push_str(line.trim_start());
                out.push('\n');
            }
            out.push_str(&INDENT.repeat(depth));
            out.push(']');
            Ok(())
        }
        Value::List(_) => Err(WriteError::Unrepresentable {
            key: key.to_string(),
            kind: node.kind(),
        }),
    }
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '[' | ']' | '#' | '"' | '='))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Identity;
    use pretty_assertions::assert_eq;

    const ONED: &str = r#"# Daemon configuration

LOG = [
  SYSTEM      = "file",
  DEBUG_LEVEL = 3
]

PORT = 2633
DB = [ BACKEND = "sqlite", TIMEOUT = 2500 ]

VM_MAD = [
    NAME       = "kvm",
    # driver arguments
    ARGUMENTS  = "-t 15 -r 0 kvm"
]
VM_MAD = [
    NAME       = "lxd",
    ARGUMENTS  = "-t 15 -r 0 lxd"
]
VM_RESTRICTED_ATTR = "CONTEXT/FILES"
VM_RESTRICTED_ATTR = "NIC/MAC"
"#;

    #[test]
    fn parses_blocks_and_repeated_keys() {
        let root = parse(ONED).expect("parse");
        assert_eq!(
            root.get_path(&["LOG", "DEBUG_LEVEL"]).and_then(Node::text).as_deref(),
            Some("3")
        );
        assert_eq!(
            root.get_path(&["DB", "TIMEOUT"]).and_then(Node::text).as_deref(),
            Some("2500")
        );

        let mads = root.get("VM_MAD").and_then(Node::as_list).expect("list");
        assert_eq!(mads.identity, Identity::Key("NAME".to_string()));
        assert_eq!(mads.items.len(), 2);
        assert_eq!(
            mads.items[0].get("ARGUMENTS").map(|n| n.annotations.leading.clone()),
            Some(vec!["# driver arguments".to_string()])
        );

        let attrs = root.get("VM_RESTRICTED_ATTR").and_then(Node::as_list).expect("list");
        assert_eq!(attrs.identity, Identity::Value);
    }

    #[test]
    fn unchanged_document_renders_verbatim() {
        let root = parse(ONED).expect("parse");
        assert_eq!(render(&root).expect("render"), ONED);
    }

    #[test]
    fn modified_block_is_rendered_canonically() {
        let mut root = parse(ONED).expect("parse");
        let log = root
            .as_map_mut()
            .and_then(|map| map.get_mut("LOG"))
            .expect("log");
        log.annotations.raw = None;
        if let Some(block) = log.as_map_mut() {
            block.insert("DEBUG_LEVEL", Node::scalar("5"));
        }
        let text = render(&root).expect("render");
        assert!(text.contains("LOG = [\n    SYSTEM = \"file\",\n    DEBUG_LEVEL = 5\n]\n"));

        let reparsed = parse(&text).expect("reparse");
        assert_eq!(
            reparsed.get_path(&["LOG", "DEBUG_LEVEL"]).and_then(Node::text).as_deref(),
            Some("5")
        );
    }

    #[test]
    fn empty_input_is_an_empty_map() {
        let root = parse("").expect("parse");
        assert!(root.as_map().is_some_and(|map| map.is_empty()));
    }

    #[test]
    fn rejects_invalid_syntax() {
        for input in ["LOG = [ A = 1", "= 3\n", "A = \"open\n", "A 1\n", "A = 1 2\n"] {
            assert!(parse(input).is_err(), "{input:?} should not parse");
        }
    }
}
