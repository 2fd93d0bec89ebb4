//! The closed set of file formats the engine can load and save.

mod entries;
pub mod oneconf;
pub mod shell;
pub mod yaml;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tree::Node;

/// File format of a managed configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// Opaque text, diffed line by line.
    Text,
    /// Shell variable assignments.
    Shell,
    /// Nested `KEY = value` blocks.
    #[serde(rename = "one", alias = "oneconf")]
    OneConf,
    /// YAML where mapping order does not matter.
    Yaml,
    /// YAML where every order matters.
    YamlStrict,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Shell => "shell",
            Format::OneConf => "one",
            Format::Yaml => "yaml",
            Format::YamlStrict => "yaml-strict",
        }
    }

    /// Whether content of this format is parsed into a tree.
    pub fn is_structured(self) -> bool {
        self != Format::Text
    }

    /// Bring a patched tree back to the shape the parser produces.
    pub fn normalize(self, node: &mut Node) {
        match self {
            Format::Text => {}
            Format::Shell | Format::OneConf => {
                if let Some(map) = node.as_map_mut() {
                    entries::normalize_entries(map);
                }
            }
            Format::Yaml => yaml::restamp(node, false),
            Format::YamlStrict => yaml::restamp(node, true),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "simple" | "plain" => Ok(Format::Text),
            "shell" | "sh" => Ok(Format::Shell),
            "one" | "oneconf" | "ini" => Ok(Format::OneConf),
            "yaml" | "yml" => Ok(Format::Yaml),
            "yaml-strict" | "strict-yaml" => Ok(Format::YamlStrict),
            other => Err(format!("unknown file format {other:?}")),
        }
    }
}

/// Loaded content of a file: a tree, or raw text for [`Format::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Tree(Node),
}

impl Content {
    pub fn as_tree(&self) -> Option<&Node> {
        match self {
            Content::Tree(node) => Some(node),
            Content::Text(_) => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut Node> {
        match self {
            Content::Tree(node) => Some(node),
            Content::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Tree(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Tree(_) => "tree",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_back() {
        for format in [
            Format::Text,
            Format::Shell,
            Format::OneConf,
            Format::Yaml,
            Format::YamlStrict,
        ] {
            assert_eq!(format.name().parse::<Format>(), Ok(format));
        }
        assert_eq!("strict-yaml".parse::<Format>(), Ok(Format::YamlStrict));
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn manifest_spelling_deserializes() {
        let format: Format = serde_json::from_str("\"yaml-strict\"").expect("format");
        assert_eq!(format, Format::YamlStrict);
        let format: Format = serde_json::from_str("\"oneconf\"").expect("alias");
        assert_eq!(format, Format::OneConf);
    }
}
