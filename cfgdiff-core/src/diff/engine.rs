use std::collections::HashSet;
use std::fmt::Write as _;

use similar::{capture_diff_slices, Algorithm, DiffTag};
use tracing::debug;

use crate::compare::same;
use crate::diff::operation::{Anchor, EditOperation};
use crate::path::{Path, Segment};
use crate::tree::{Identity, Kind, List, Map, Node, Value};

/// Configures tree diff behavior.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Subtrees whose changes are not reported.
    pub ignore_paths: Vec<Path>,
}

/// Diff two trees with default options.
pub fn diff(old: &Node, new: &Node) -> Vec<EditOperation> {
    diff_with_options(old, new, &DiffOptions::default())
}

/// Diff two trees with custom options.
pub fn diff_with_options(old: &Node, new: &Node, opts: &DiffOptions) -> Vec<EditOperation> {
    let mut ctx = DiffContext {
        opts,
        out: Vec::new(),
    };
    ctx.node(old, new, &Path::root());
    debug!(operations = ctx.out.len(), "computed tree diff");
    ctx.out
}

struct DiffContext<'a> {
    opts: &'a DiffOptions,
    out: Vec<EditOperation>,
}

impl DiffContext<'_> {
    fn ignored(&self, path: &Path) -> bool {
        self.opts.ignore_paths.iter().any(|p| path.starts_with(p))
    }

    fn emit(&mut self, operation: EditOperation) {
        if !self.ignored(&operation.path) {
            self.out.push(operation);
        }
    }

    fn node(&mut self, old: &Node, new: &Node, path: &Path) {
        if self.ignored(path) {
            return;
        }
        match (&old.value, &new.value) {
            (Value::Scalar(_), Value::Scalar(_)) => {
                if !same(old, new) {
                    self.emit(EditOperation::set(path.clone(), new.clone(), Some(old.clone())));
                }
            }
            (Value::Map(a), Value::Map(b)) => self.maps(a, b, path),
            (Value::List(a), Value::List(b)) => self.lists(a, b, path),
            // A keyed block that gained or lost siblings.
            (Value::List(a), _) if accepts_singleton(a, new) => {
                self.lists(a, &singleton_like(a, new), path)
            }
            (_, Value::List(b)) if accepts_singleton(b, old) => {
                self.lists(&singleton_like(b, old), b, path)
            }
            _ => self.emit(EditOperation::set(path.clone(), new.clone(), Some(old.clone()))),
        }
    }

    fn maps(&mut self, old: &Map, new: &Map, path: &Path) {
        let moved = if old.order.is_significant() && new.order.is_significant() {
            moved_keys(old, new)
        } else {
            HashSet::new()
        };

        for (key, old_child) in old.iter() {
            if !new.contains_key(key) || moved.contains(key) {
                self.emit(EditOperation::delete(path.key(key), Some(old_child.clone())));
            }
        }

        let mut previous: Option<&str> = None;
        for (key, new_child) in new.iter() {
            let child_path = path.key(key);
            match old.get(key) {
                Some(old_child) if !moved.contains(key) => {
                    self.node(old_child, new_child, &child_path)
                }
                _ => {
                    let anchor = match previous {
                        Some(prev) => Anchor::AfterKey(prev.to_string()),
                        None => Anchor::Start,
                    };
                    self.emit(EditOperation::insert(child_path, new_child.clone(), anchor));
                }
            }
            previous = Some(key);
        }
    }

    fn lists(&mut self, old: &List, new: &List, path: &Path) {
        if old.order.is_significant() {
            return self.ordered(old, new, path);
        }
        match &old.identity {
            Identity::Key(key) => self.keyed(old, new, key, path),
            Identity::Value => self.by_value(old, new, path),
            Identity::Position => self.positional(old, new, path),
        }
    }

    /// LCS over element fingerprints. `cursor` tracks the index in the list
    /// as it evolves while the operations are replayed.
    fn ordered(&mut self, old: &List, new: &List, path: &Path) {
        let old_prints: Vec<String> = old.items.iter().map(fingerprint).collect();
        let new_prints: Vec<String> = new.items.iter().map(fingerprint).collect();
        let mut cursor = 0usize;

        for op in capture_diff_slices(Algorithm::Myers, &old_prints, &new_prints) {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => {
                    for (i, j) in old_range.zip(new_range) {
                        self.node(&old.items[i], &new.items[j], &path.index(cursor));
                        cursor += 1;
                    }
                }
                DiffTag::Delete => {
                    for i in old_range {
                        self.emit(EditOperation::delete(
                            path.index(cursor),
                            Some(old.items[i].clone()),
                        ));
                    }
                }
                DiffTag::Insert => {
                    for j in new_range {
                        self.emit(EditOperation::insert(
                            path.index(cursor),
                            new.items[j].clone(),
                            list_anchor(new, j),
                        ));
                        cursor += 1;
                    }
                }
                DiffTag::Replace => {
                    let pairwise = old_range.len() == new_range.len()
                        && old_range
                            .clone()
                            .zip(new_range.clone())
                            .all(|(i, j)| both_containers(&old.items[i], &new.items[j]));
                    if pairwise {
                        for (i, j) in old_range.zip(new_range) {
                            self.replaced_element(&old.items[i], &new.items[j], &path.index(cursor));
                            cursor += 1;
                        }
                        continue;
                    }
                    for i in old_range {
                        self.emit(EditOperation::delete(
                            path.index(cursor),
                            Some(old.items[i].clone()),
                        ));
                    }
                    for j in new_range {
                        self.emit(EditOperation::insert(
                            path.index(cursor),
                            new.items[j].clone(),
                            list_anchor(new, j),
                        ));
                        cursor += 1;
                    }
                }
            }
        }
    }

    /// Elements that still resemble each other are diffed field by field;
    /// anything else is replaced as a whole.
    fn replaced_element(&mut self, old: &Node, new: &Node, path: &Path) {
        let related = match (&old.value, &new.value) {
            (Value::Map(a), Value::Map(b)) => a.keys().any(|k| b.contains_key(k)),
            (Value::List(_), Value::List(_)) => true,
            _ => false,
        };
        if related {
            self.node(old, new, path);
        } else {
            self.emit(EditOperation::set(path.clone(), new.clone(), Some(old.clone())));
        }
    }

    fn keyed(&mut self, old: &List, new: &List, key: &str, path: &Path) {
        let key_of = |node: &Node| node.get(key).and_then(Node::text);
        let mut matched = vec![false; old.items.len()];
        let mut pairs: Vec<(Option<usize>, usize)> = Vec::with_capacity(new.items.len());

        for (j, item) in new.items.iter().enumerate() {
            let hit = key_of(item).and_then(|wanted| {
                old.items.iter().enumerate().position(|(i, candidate)| {
                    !matched[i] && key_of(candidate).as_deref() == Some(wanted.as_str())
                })
            });
            if let Some(i) = hit {
                matched[i] = true;
            }
            pairs.push((hit, j));
        }

        // Positional fallback for elements without an identifying key.
        let keyless: Vec<usize> = (0..old.items.len())
            .filter(|&i| !matched[i] && key_of(&old.items[i]).is_none())
            .collect();
        let mut keyless = keyless.into_iter();
        for pair in pairs.iter_mut() {
            if pair.0.is_none() && key_of(&new.items[pair.1]).is_none() {
                if let Some(i) = keyless.next() {
                    matched[i] = true;
                    pair.0 = Some(i);
                }
            }
        }

        // Index-addressed deletes go first, highest index first, so the
        // remaining indices stay valid.
        for i in (0..old.items.len()).rev() {
            if !matched[i] && key_of(&old.items[i]).is_none() {
                self.emit(EditOperation::delete(path.index(i), Some(old.items[i].clone())));
            }
        }
        for (i, item) in old.items.iter().enumerate() {
            if let (false, Some(value)) = (matched[i], key_of(item)) {
                self.emit(EditOperation::delete(
                    path.child(Segment::matching(key, value)),
                    Some(item.clone()),
                ));
            }
        }

        let survivors: Vec<usize> = (0..old.items.len()).filter(|&i| matched[i]).collect();
        let mut appended = survivors.len();
        for (hit, j) in pairs {
            let item = &new.items[j];
            let element_path = match (key_of(item), hit) {
                (Some(value), _) => path.child(Segment::matching(key, value)),
                (None, Some(i)) => path.index(survivors.iter().position(|&s| s == i).unwrap_or(i)),
                (None, None) => path.index(appended),
            };
            match hit {
                Some(i) => self.node(&old.items[i], item, &element_path),
                None => {
                    self.emit(EditOperation::insert(element_path, item.clone(), Anchor::End));
                    appended += 1;
                }
            }
        }
    }

    fn by_value(&mut self, old: &List, new: &List, path: &Path) {
        let mut used = vec![false; new.items.len()];
        let mut kept = vec![false; old.items.len()];
        for (i, item) in old.items.iter().enumerate() {
            let hit = new
                .items
                .iter()
                .enumerate()
                .position(|(j, candidate)| !used[j] && same(item, candidate));
            if let Some(j) = hit {
                used[j] = true;
                kept[i] = true;
            }
        }

        for i in (0..old.items.len()).rev() {
            if !kept[i] {
                let item = &old.items[i];
                self.emit(EditOperation::delete(value_path(path, item, i), Some(item.clone())));
            }
        }
        let mut len = kept.iter().filter(|k| **k).count();
        for (j, item) in new.items.iter().enumerate() {
            if !used[j] {
                self.emit(EditOperation::insert(value_path(path, item, len), item.clone(), Anchor::End));
                len += 1;
            }
        }
    }

    fn positional(&mut self, old: &List, new: &List, path: &Path) {
        let common = old.items.len().min(new.items.len());
        for i in (common..old.items.len()).rev() {
            self.emit(EditOperation::delete(path.index(i), Some(old.items[i].clone())));
        }
        for i in 0..common {
            self.node(&old.items[i], &new.items[i], &path.index(i));
        }
        for (j, item) in new.items.iter().enumerate().skip(common) {
            self.emit(EditOperation::insert(path.index(j), item.clone(), Anchor::End));
        }
    }
}

fn accepts_singleton(list: &List, node: &Node) -> bool {
    match &list.identity {
        Identity::Key(_) => node.kind() == Kind::Map,
        Identity::Value => node.kind() == Kind::Scalar,
        Identity::Position => false,
    }
}

fn singleton_like(list: &List, node: &Node) -> List {
    List {
        order: list.order,
        identity: list.identity.clone(),
        items: vec![node.clone()],
    }
}

fn both_containers(a: &Node, b: &Node) -> bool {
    a.kind() != Kind::Scalar && b.kind() != Kind::Scalar
}

fn list_anchor(list: &List, index: usize) -> Anchor {
    match index.checked_sub(1) {
        Some(prev) => Anchor::AfterValue(list.items[prev].clone()),
        None => Anchor::Start,
    }
}

fn value_path(path: &Path, item: &Node, index: usize) -> Path {
    match item.text() {
        Some(text) => path.child(Segment::matching(".", text)),
        None => path.index(index),
    }
}

/// Keys present on both sides whose relative order changed.
fn moved_keys(old: &Map, new: &Map) -> HashSet<String> {
    let old_common: Vec<&str> = old.keys().filter(|k| new.contains_key(k)).collect();
    let new_common: Vec<&str> = new.keys().filter(|k| old.contains_key(k)).collect();
    let mut moved = HashSet::new();
    if old_common == new_common {
        return moved;
    }
    for op in capture_diff_slices(Algorithm::Myers, &old_common, &new_common) {
        let (tag, old_range, _) = op.as_tag_tuple();
        if tag != DiffTag::Equal {
            moved.extend(old_range.map(|i| old_common[i].to_string()));
        }
    }
    moved
}

/// Canonical text of a subtree; order-free containers are sorted.
fn fingerprint(node: &Node) -> String {
    let mut out = String::new();
    write_fingerprint(node, &mut out);
    out
}

fn write_fingerprint(node: &Node, out: &mut String) {
    match &node.value {
        Value::Scalar(scalar) => {
            let _ = write!(out, "{scalar:?}");
        }
        Value::Map(map) => {
            let mut entries: Vec<(&str, String)> =
                map.iter().map(|(k, v)| (k, fingerprint(v))).collect();
            if !map.order.is_significant() {
                entries.sort();
            }
            out.push('{');
            for (key, print) in entries {
                let _ = write!(out, "{key:?}:{print},");
            }
            out.push('}');
        }
        Value::List(list) => {
            let mut items: Vec<String> = list.items.iter().map(fingerprint).collect();
            if !list.order.is_significant() {
                items.sort();
            }
            out.push('[');
            for item in items {
                out.push_str(&item);
                out.push(',');
            }
            out.push(']');
        }
    }
    if node.annotations.exported {
        out.push('!');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::operation::Command;
    use crate::tree::Order;

    fn map(order: Order, entries: &[(&str, Node)]) -> Node {
        let mut map = Map::new(order);
        for (k, v) in entries {
            map.insert(*k, v.clone());
        }
        Node::map(map)
    }

    fn list(order: Order, identity: Identity, items: Vec<Node>) -> Node {
        Node::list(List {
            order,
            identity,
            items,
        })
    }

    fn s(text: &str) -> Node {
        Node::scalar(text)
    }

    fn paths(ops: &[EditOperation]) -> Vec<String> {
        ops.iter()
            .map(|op| format!("{} {}", op.command, op.path))
            .collect()
    }

    #[test]
    fn identical_trees_produce_nothing() {
        let tree = map(Order::Free, &[("a", s("1"))]);
        assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn deletes_come_before_inserts() {
        let old = map(Order::Free, &[("a", s("1")), ("gone", s("x"))]);
        let new = map(Order::Free, &[("a", s("2")), ("b", s("3"))]);
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec!["delete gone", "set a", "insert b"]);
        assert_eq!(ops[1].old, Some(s("1")));
        assert_eq!(ops[2].anchor, Anchor::AfterKey("a".to_string()));
    }

    #[test]
    fn reordered_kept_map_moves_keys() {
        let old = map(Order::Kept, &[("a", s("1")), ("b", s("2")), ("c", s("3"))]);
        let new = map(Order::Kept, &[("a", s("1")), ("c", s("3")), ("b", s("2"))]);
        let ops = diff(&old, &new);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].command, Command::Delete);
        assert_eq!(ops[1].command, Command::Insert);
        assert_eq!(ops[0].path, ops[1].path);
    }

    #[test]
    fn free_map_reorder_is_not_a_change() {
        let old = map(Order::Free, &[("a", s("1")), ("b", s("2"))]);
        let new = map(Order::Free, &[("b", s("2")), ("a", s("1"))]);
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn ordered_list_insert_tracks_evolving_index() {
        let old = list(Order::Strict, Identity::Position, vec![s("a"), s("c")]);
        let new = list(Order::Strict, Identity::Position, vec![s("a"), s("b"), s("c"), s("d")]);
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec!["insert [1]", "insert [3]"]);
        assert_eq!(ops[0].anchor, Anchor::AfterValue(s("a")));
        assert_eq!(ops[1].anchor, Anchor::AfterValue(s("c")));
    }

    #[test]
    fn replaced_scalars_in_ordered_list_become_delete_insert() {
        let old = list(Order::Kept, Identity::Position, vec![s("a"), s("b")]);
        let new = list(Order::Kept, Identity::Position, vec![s("a"), s("x")]);
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec!["delete [1]", "insert [1]"]);
        assert_eq!(ops[0].old, Some(s("b")));
    }

    #[test]
    fn reshaped_list_element_is_set_whole() {
        let old = list(
            Order::Strict,
            Identity::Position,
            vec![map(Order::Kept, &[("name", s("a")), ("x", s("1"))])],
        );
        let new = list(
            Order::Strict,
            Identity::Position,
            vec![map(Order::Kept, &[("id", s("7")), ("y", s("2"))])],
        );
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec!["set [0]"]);
    }

    #[test]
    fn keyed_list_matches_by_name() {
        let block = |name: &str, exec: &str| {
            map(Order::Kept, &[("NAME", s(name)), ("EXECUTABLE", s(exec))])
        };
        let key = Identity::Key("NAME".to_string());
        let old = list(Order::Free, key.clone(), vec![block("kvm", "a"), block("xen", "b")]);
        let new = list(Order::Free, key, vec![block("lxd", "c"), block("kvm", "z")]);
        let ops = diff(&old, &new);
        assert_eq!(
            paths(&ops),
            vec![
                r#"delete [NAME="xen"]"#,
                r#"insert [NAME="lxd"]"#,
                r#"set [NAME="kvm"]/EXECUTABLE"#
            ]
        );
    }

    #[test]
    fn singleton_block_gains_a_sibling() {
        let block = |name: &str| map(Order::Kept, &[("NAME", s(name))]);
        let old = map(Order::Kept, &[("VM_MAD", block("kvm"))]);
        let new = map(
            Order::Kept,
            &[(
                "VM_MAD",
                list(
                    Order::Free,
                    Identity::Key("NAME".to_string()),
                    vec![block("kvm"), block("lxd")],
                ),
            )],
        );
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec![r#"insert VM_MAD[NAME="lxd"]"#]);
    }

    #[test]
    fn value_lists_diff_as_multisets() {
        let old = list(Order::Free, Identity::Value, vec![s("a"), s("b")]);
        let new = list(Order::Free, Identity::Value, vec![s("b"), s("c")]);
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec![r#"delete [.="a"]"#, r#"insert [.="c"]"#]);
    }

    #[test]
    fn kind_mismatch_sets_whole_subtree() {
        let old = map(Order::Free, &[("a", s("1"))]);
        let new = map(Order::Free, &[("a", map(Order::Free, &[("b", s("2"))]))]);
        let ops = diff(&old, &new);
        assert_eq!(paths(&ops), vec!["set a"]);
        assert_eq!(ops[0].old, Some(s("1")));
    }

    #[test]
    fn ignore_paths_suppress_subtrees() {
        let old = map(Order::Free, &[("VERSION", s("1")), ("a", s("1"))]);
        let new = map(Order::Free, &[("VERSION", s("2")), ("a", s("2"))]);
        let opts = DiffOptions {
            ignore_paths: vec!["VERSION".parse().expect("path")],
        };
        assert_eq!(paths(&diff_with_options(&old, &new, &opts)), vec!["set a"]);
    }
}
