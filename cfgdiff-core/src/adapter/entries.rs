//! Shared folding of `KEY = value` entries for the key/value formats.

use crate::tree::{Identity, List, Map, Node, Order, Value};

/// Key every element of a block list must carry to be matched by name.
pub(crate) const NAME_KEY: &str = "NAME";

/// Collects entries of one block. Repeated keys fold into a list; comment
/// and blank lines attach to the entry that follows them.
#[derive(Debug, Default)]
pub(crate) struct EntryFolder {
    map: Map,
    pending: Vec<String>,
}

impl EntryFolder {
    pub(crate) fn new() -> Self {
        Self {
            map: Map::new(Order::Kept),
            pending: Vec::new(),
        }
    }

    pub(crate) fn trivia(&mut self, line: impl Into<String>) {
        self.pending.push(line.into());
    }

    pub(crate) fn push(&mut self, key: String, mut node: Node) {
        node.annotations.leading.append(&mut self.pending);
        match self.map.get_mut(&key) {
            Some(existing) => match &mut existing.value {
                Value::List(list) => list.items.push(node),
                _ => {
                    let first = std::mem::replace(existing, Node::null());
                    let mut list = List::new(Order::Free, Identity::Position);
                    list.items = vec![first, node];
                    *existing = Node::list(list);
                }
            },
            None => {
                self.map.insert(key, node);
            }
        }
    }

    /// The folded block and any trivia after its last entry.
    pub(crate) fn finish(mut self) -> (Map, Vec<String>) {
        for (_, node) in self.map.iter_mut() {
            if let Value::List(list) = &mut node.value {
                list.identity = identity_for(&list.items);
            }
        }
        (self.map, self.pending)
    }
}

pub(crate) fn identity_for(items: &[Node]) -> Identity {
    if items.iter().all(|item| item.get(NAME_KEY).is_some()) {
        Identity::Key(NAME_KEY.to_string())
    } else if items.iter().all(|item| item.as_scalar().is_some()) {
        Identity::Value
    } else {
        Identity::Position
    }
}

/// Restore the shape the parser would produce: one-element lists become
/// the element, empty lists disappear, list identities are recomputed.
pub(crate) fn normalize_entries(map: &mut Map) {
    map.retain(|_, node| node.as_list().map_or(true, |list| !list.items.is_empty()));
    for (_, node) in map.iter_mut() {
        if let Value::List(list) = &mut node.value {
            if list.items.len() == 1 {
                if let Some(only) = list.items.pop() {
                    let leading = std::mem::take(&mut node.annotations.leading);
                    *node = only;
                    if node.annotations.leading.is_empty() {
                        node.annotations.leading = leading;
                    }
                }
            } else {
                list.order = Order::Free;
                list.identity = identity_for(&list.items);
            }
        }
        match &mut node.value {
            Value::Map(block) => {
                block.order = Order::Kept;
                normalize_entries(block);
            }
            Value::List(list) => {
                for item in &mut list.items {
                    if let Value::Map(block) = &mut item.value {
                        block.order = Order::Kept;
                        normalize_entries(block);
                    }
                }
            }
            Value::Scalar(_) => {}
        }
    }
}
