//! YAML documents in loose (unordered mappings) and strict (ordered
//! everything) flavors.

use serde_yaml::{Mapping, Number};
use tracing::debug;

use crate::parser::ParseError;
use crate::tree::{Identity, KeyTag, List, Map, Node, Order, Scalar, Value};
use crate::writer::WriteError;

fn map_order(strict: bool) -> Order {
    if strict {
        Order::Kept
    } else {
        Order::Free
    }
}

fn list_order(strict: bool) -> Order {
    if strict {
        Order::Strict
    } else {
        Order::Kept
    }
}

pub fn parse(input: &str, strict: bool) -> Result<Node, ParseError> {
    if input.trim().is_empty() {
        return Ok(Node::map(Map::new(map_order(strict))));
    }
    let value: serde_yaml::Value = serde_yaml::from_str(input)?;
    if value.is_null() {
        return Ok(Node::map(Map::new(map_order(strict))));
    }
    to_node(&value, strict)
}

fn to_node(value: &serde_yaml::Value, strict: bool) -> Result<Node, ParseError> {
    let node = match value {
        serde_yaml::Value::Null => Node::null(),
        serde_yaml::Value::Bool(b) => Node::scalar(*b),
        serde_yaml::Value::Number(n) => Node::new(Value::Scalar(number(n))),
        serde_yaml::Value::String(s) => Node::scalar(s.as_str()),
        serde_yaml::Value::Sequence(items) => {
            let mut list = List::new(list_order(strict), Identity::Position);
            for item in items {
                list.items.push(to_node(item, strict)?);
            }
            Node::list(list)
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new(map_order(strict));
            for (key, child) in mapping {
                let (key, tag) = key_text(key)?;
                if map.contains_key(&key) {
                    return Err(ParseError::DuplicateKey(key));
                }
                let mut child = to_node(child, strict)?;
                child.annotations.key_tag = tag;
                map.insert(key, child);
            }
            Node::map(map)
        }
        serde_yaml::Value::Tagged(tagged) => {
            debug!(tag = %tagged.tag, "dropping YAML tag");
            to_node(&tagged.value, strict)?
        }
    };
    Ok(node)
}

fn number(n: &Number) -> Scalar {
    match n.as_i64() {
        Some(i) => Scalar::Int(i),
        None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn key_text(key: &serde_yaml::Value) -> Result<(String, Option<KeyTag>), ParseError> {
    match key {
        serde_yaml::Value::String(s) => Ok((s.clone(), None)),
        serde_yaml::Value::Number(n) => {
            let tag = if n.is_f64() { KeyTag::Float } else { KeyTag::Int };
            Ok((n.to_string(), Some(tag)))
        }
        serde_yaml::Value::Bool(b) => Ok((b.to_string(), Some(KeyTag::Bool))),
        serde_yaml::Value::Null => Ok(("null".to_string(), Some(KeyTag::Null))),
        serde_yaml::Value::Tagged(tagged) => key_text(&tagged.value),
        other => Err(ParseError::UnsupportedKey(format!("{other:?}"))),
    }
}

pub fn render(root: &Node) -> Result<String, WriteError> {
    Ok(serde_yaml::to_string(&to_yaml(root))?)
}

fn to_yaml(node: &Node) -> serde_yaml::Value {
    match &node.value {
        Value::Scalar(Scalar::Null) => serde_yaml::Value::Null,
        Value::Scalar(Scalar::Bool(b)) => serde_yaml::Value::Bool(*b),
        Value::Scalar(Scalar::Int(i)) => serde_yaml::Value::Number(Number::from(*i)),
        Value::Scalar(Scalar::Float(f)) => serde_yaml::Value::Number(Number::from(*f)),
        Value::Scalar(Scalar::Str(s)) => serde_yaml::Value::String(s.clone()),
        Value::Map(map) => {
            let mut mapping = Mapping::new();
            for (key, child) in map.iter() {
                mapping.insert(yaml_key(key, child.annotations.key_tag), to_yaml(child));
            }
            serde_yaml::Value::Mapping(mapping)
        }
        Value::List(list) => {
            serde_yaml::Value::Sequence(list.items.iter().map(to_yaml).collect())
        }
    }
}

fn yaml_key(key: &str, tag: Option<KeyTag>) -> serde_yaml::Value {
    let typed = match tag {
        Some(KeyTag::Int) => key.parse::<i64>().ok().map(|i| serde_yaml::Value::Number(i.into())),
        Some(KeyTag::Float) => key.parse::<f64>().ok().map(|f| serde_yaml::Value::Number(f.into())),
        Some(KeyTag::Bool) => key.parse::<bool>().ok().map(serde_yaml::Value::Bool),
        Some(KeyTag::Null) => Some(serde_yaml::Value::Null),
        None => None,
    };
    typed.unwrap_or_else(|| serde_yaml::Value::String(key.to_string()))
}

/// Stamp the order flags of the flavor onto every container, including
/// ones created by a patch.
pub(crate) fn restamp(node: &mut Node, strict: bool) {
    match &mut node.value {
        Value::Map(map) => {
            map.order = map_order(strict);
            for (_, child) in map.iter_mut() {
                restamp(child, strict);
            }
        }
        Value::List(list) => {
            list.order = list_order(strict);
            list.identity = Identity::Position;
            for item in &mut list.items {
                restamp(item, strict);
            }
        }
        Value::Scalar(_) => {}
    }
}
