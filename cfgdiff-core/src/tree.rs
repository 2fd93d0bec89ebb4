use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// How much the order of children matters for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Order never matters.
    Free,
    /// Order matters for `same?` but not for `similar?`.
    #[default]
    Kept,
    /// Order matters for both `same?` and `similar?`.
    Strict,
}

impl Order {
    pub fn is_significant(self) -> bool {
        !matches!(self, Order::Free)
    }
}

/// How elements of a list are told apart when lists are matched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Elements are identified by their index.
    #[default]
    Position,
    /// Elements are maps identified by the scalar stored under this key.
    Key(String),
    /// Elements are scalars identified by their own value.
    Value,
}

/// Quoting style of a scalar in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quote {
    #[default]
    None,
    Double,
    Single,
    /// Unquoted shell text such as `$(cmd arg)`, written back as is.
    Raw,
}

/// Original kind of a non-string YAML mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTag {
    Int,
    Float,
    Bool,
    Null,
}

/// Format-specific metadata carried by a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotations {
    /// Shell entry carries an `export` prefix.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exported: bool,
    #[serde(default, skip_serializing_if = "is_unquoted")]
    pub quote: Quote,
    /// Kind of the key this node is stored under, when it was not a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_tag: Option<KeyTag>,
    /// Comment and blank lines preceding the entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leading: Vec<String>,
    /// Comment and blank lines after the last entry of a document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<String>,
    /// Document did not end with a newline.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_final_newline: bool,
    /// Source text of the entry; dropped whenever the entry changes.
    #[serde(skip)]
    pub raw: Option<String>,
}

fn is_unquoted(quote: &Quote) -> bool {
    *quote == Quote::None
}

/// A typed leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Text form used by line-oriented formats and predicates.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Node kind, used in error messages and kind checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Scalar,
    Map,
    List,
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Scalar => write!(f, "scalar"),
            Kind::Map => write!(f, "map"),
            Kind::List => write!(f, "list"),
        }
    }
}

/// Ordered map with unique keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Map {
    #[serde(default)]
    pub order: Order,
    entries: Vec<(String, Node)>,
}

impl Map {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace the value of an existing key in place, or append a new entry.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, node)),
            None => {
                self.entries.push((key, node));
                None
            }
        }
    }

    /// Insert a new entry at `index` (clamped). An existing entry with the
    /// same key is removed first.
    pub fn insert_at(&mut self, index: usize, key: impl Into<String>, node: Node) {
        let key = key.into();
        self.remove(&key);
        let index = index.min(self.entries.len());
        self.entries.insert(index, (key, node));
    }

    /// Insert `key` right after (or before) `anchor`. Appends when the anchor
    /// is missing.
    pub fn insert_near(&mut self, anchor: &str, key: impl Into<String>, node: Node, before: bool) {
        let key = key.into();
        self.remove(&key);
        match self.position(anchor) {
            Some(pos) if before => self.entries.insert(pos, (key, node)),
            Some(pos) => self.entries.insert(pos + 1, (key, node)),
            None => self.entries.push((key, node)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let pos = self.position(key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Return the entry for `key`, inserting `make()` at the end when absent.
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> Node) -> &mut Node {
        let pos = match self.position(key) {
            Some(pos) => pos,
            None => {
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str, &Node) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }
}

/// Ordered sequence of nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct List {
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub identity: Identity,
    pub items: Vec<Node>,
}

impl List {
    pub fn new(order: Order, identity: Identity) -> Self {
        Self {
            order,
            identity,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    Map(Map),
    List(List),
}

/// A node of a parsed configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub value: Value,
    #[serde(default)]
    pub annotations: Annotations,
}

impl Node {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            annotations: Annotations::default(),
        }
    }

    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self::new(Value::Scalar(value.into()))
    }

    pub fn null() -> Self {
        Self::new(Value::Scalar(Scalar::Null))
    }

    pub fn map(map: Map) -> Self {
        Self::new(Value::Map(map))
    }

    pub fn list(list: List) -> Self {
        Self::new(Value::List(list))
    }

    pub fn kind(&self) -> Kind {
        match self.value {
            Value::Scalar(_) => Kind::Scalar,
            Value::Map(_) => Kind::Map,
            Value::List(_) => Kind::List,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match &self.value {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match &mut self.value {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.value {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match &mut self.value {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Text of a scalar node; `None` for containers.
    pub fn text(&self) -> Option<String> {
        self.as_scalar().map(Scalar::to_text)
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map()?.get(key)
    }

    /// Walk nested map keys.
    pub fn get_path(&self, keys: &[&str]) -> Option<&Node> {
        let mut current = self;
        for key in keys {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Whether this node is the element selected by a `[key="value"]`
    /// predicate. The key `.` selects a scalar by its own value.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        if key == "." {
            return self.text().as_deref() == Some(value);
        }
        self.get(key)
            .and_then(Node::text)
            .is_some_and(|text| text == value)
    }

    /// Convert to plain JSON data, dropping annotations and order flags.
    pub fn to_plain(&self) -> serde_json::Value {
        match &self.value {
            Value::Scalar(Scalar::Null) => serde_json::Value::Null,
            Value::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::Scalar(Scalar::Int(i)) => serde_json::Value::from(*i),
            Value::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Scalar(Scalar::Str(s)) => serde_json::Value::String(s.clone()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_plain()))
                    .collect(),
            ),
            Value::List(list) => {
                serde_json::Value::Array(list.items.iter().map(Node::to_plain).collect())
            }
        }
    }

    /// Build a tree from plain JSON data.
    pub fn from_plain(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Node::null(),
            serde_json::Value::Bool(b) => Node::scalar(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Node::scalar(i),
                None => Node::new(Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(0.0)))),
            },
            serde_json::Value::String(s) => Node::scalar(s.as_str()),
            serde_json::Value::Array(items) => Node::list(List {
                order: Order::Kept,
                identity: Identity::Position,
                items: items.iter().map(Node::from_plain).collect(),
            }),
            serde_json::Value::Object(entries) => {
                let mut map = Map::new(Order::Kept);
                for (k, v) in entries {
                    map.insert(k.clone(), Node::from_plain(v));
                }
                Node::map(map)
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Scalar(Scalar::Str(s)) => write!(f, "{s:?}"),
            Value::Scalar(s) if *s == Scalar::Null => write!(f, "null"),
            Value::Scalar(s) => write!(f, "{}", s.to_text()),
            _ => write!(f, "{}", self.to_plain()),
        }
    }
}
