use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::path::Path;
use crate::tree::Node;

/// Edit verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Set,
    Insert,
    Delete,
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set => write!(f, "set"),
            Command::Insert => write!(f, "insert"),
            Command::Delete => write!(f, "delete"),
        }
    }
}

/// Where an inserted entry lands among its siblings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Append after the last sibling.
    #[default]
    End,
    /// Before the first sibling.
    Start,
    /// Right after the map entry with this key.
    AfterKey(String),
    /// Right after the list element equal to this node.
    AfterValue(Node),
}

impl Anchor {
    pub fn is_end(&self) -> bool {
        matches!(self, Anchor::End)
    }
}

/// A single structural edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    pub command: Command,
    pub path: Path,
    /// New subtree for `set` and `insert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Node>,
    /// Value the differencer saw in the old tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Node>,
    #[serde(default, skip_serializing_if = "Anchor::is_end")]
    pub anchor: Anchor,
}

impl EditOperation {
    pub fn set(path: Path, value: Node, old: Option<Node>) -> Self {
        Self {
            command: Command::Set,
            path,
            value: Some(value),
            old,
            anchor: Anchor::End,
        }
    }

    pub fn insert(path: Path, value: Node, anchor: Anchor) -> Self {
        Self {
            command: Command::Insert,
            path,
            value: Some(value),
            old: None,
            anchor,
        }
    }

    pub fn delete(path: Path, old: Option<Node>) -> Self {
        Self {
            command: Command::Delete,
            path,
            value: None,
            old,
            anchor: Anchor::End,
        }
    }
}

impl Display for EditOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.path)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_stable_shape() {
        let op = EditOperation::insert(
            "C".parse().expect("path"),
            Node::scalar(3_i64),
            Anchor::AfterKey("B".to_string()),
        );
        let json = serde_json::to_value(&op).expect("serialize");
        assert_eq!(json["command"], "insert");
        assert_eq!(json["path"], "C");
        assert_eq!(json["value"]["value"]["scalar"], 3);
        assert_eq!(json["anchor"]["after_key"], "B");
        assert!(json.get("old").is_none());

        let back: EditOperation = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, op);
    }
}
