use tracing::{debug, warn};

use crate::compare::{deep_index, same, similar};
use crate::diff::{Anchor, Command, EditOperation};
use crate::path::{Path, Segment};
use crate::tree::{Identity, Kind, List, Map, Node, Order, Value};

use super::error::PatchError;
use super::policy::{ConflictPolicy, PatchMode};
use super::report::{OperationReport, PatchReport};

/// Apply `operations` to `target` in order.
///
/// Conflicts are resolved according to `policy`; with [`PatchMode::Skip`]
/// a conflicting operation is recorded in the report and the run goes on.
/// Kind mismatches always fail unless [`PatchMode::Replace`] is set. With
/// [`PatchMode::Dummy`] the whole run happens on a copy.
pub fn patch(
    target: &mut Node,
    operations: &[EditOperation],
    policy: &ConflictPolicy,
) -> Result<PatchReport, PatchError> {
    if policy.contains(PatchMode::Dummy) {
        let mut scratch = target.clone();
        return apply_all(&mut scratch, operations, policy);
    }
    apply_all(target, operations, policy)
}

fn apply_all(
    target: &mut Node,
    operations: &[EditOperation],
    policy: &ConflictPolicy,
) -> Result<PatchReport, PatchError> {
    let mut report = PatchReport::default();
    for (index, operation) in operations.iter().enumerate() {
        let mut applier = Applier {
            policy,
            operation,
            mode: None,
        };
        // A skipped operation must leave no trace, so under skip each
        // operation works on a scratch copy that is committed on success.
        let outcome = if policy.contains(PatchMode::Skip) {
            let mut scratch = target.clone();
            applier.apply(&mut scratch).map(|changed| {
                *target = scratch;
                changed
            })
        } else {
            applier.apply(target)
        };
        match outcome {
            Ok(changed) => {
                if changed {
                    clear_raw(target, &operation.path);
                }
                debug!(%operation, changed, "applied operation");
                report.push(OperationReport::applied(
                    index,
                    operation,
                    changed,
                    applier.mode,
                ));
            }
            Err(err) if policy.contains(PatchMode::Skip) && !err.is_structural() => {
                warn!(path = %operation.path, error = %err, "skipping conflicting operation");
                report.push(OperationReport::skipped(index, operation, err));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

struct Applier<'a> {
    policy: &'a ConflictPolicy,
    operation: &'a EditOperation,
    mode: Option<PatchMode>,
}

impl<'a> Applier<'a> {
    fn apply(&mut self, root: &mut Node) -> Result<bool, PatchError> {
        let operation = self.operation;
        let value = operation.value.clone().unwrap_or_else(Node::null);
        let Some((parent_path, last)) = operation.path.split_last() else {
            return self.apply_at_root(root, value);
        };

        let create = operation.command != Command::Delete;
        let parent = match self.descend(root, &parent_path, last, create) {
            Ok(parent) => parent,
            Err(PatchError::PathNotFound { .. }) if !create => return self.absent_for_delete(),
            Err(err) => return Err(err),
        };

        match operation.command {
            Command::Set => self.set(parent, last, &parent_path, value),
            Command::Insert => self.insert(parent, last, &parent_path, value),
            Command::Delete => self.delete(parent, last, &parent_path),
        }
    }

    fn apply_at_root(&mut self, root: &mut Node, value: Node) -> Result<bool, PatchError> {
        match self.operation.command {
            Command::Set => self.overwrite(root, value),
            Command::Insert => self.collide(root, value),
            Command::Delete => {
                if root.as_map().is_some_and(Map::is_empty) {
                    return Ok(false);
                }
                self.check_old(root)?;
                let order = root.as_map().map_or(Order::Kept, |map| map.order);
                *root = Node::map(Map::new(order));
                Ok(true)
            }
        }
    }

    fn descend<'n>(
        &mut self,
        root: &'n mut Node,
        parent_path: &Path,
        last: &Segment,
        create: bool,
    ) -> Result<&'n mut Node, PatchError> {
        let segments = parent_path.segments();
        let mut node = root;
        let mut at = Path::root();
        for (i, segment) in segments.iter().enumerate() {
            let next = segments.get(i + 1).unwrap_or(last);
            node = self.step(node, segment, next, &at, create)?;
            at = at.child(segment.clone());
        }
        Ok(node)
    }

    fn step<'n>(
        &mut self,
        node: &'n mut Node,
        segment: &Segment,
        next: &Segment,
        at: &Path,
        create: bool,
    ) -> Result<&'n mut Node, PatchError> {
        match segment {
            Segment::Key(key) => {
                let map = if create {
                    self.map_mut(node, at)?
                } else {
                    match self.existing_map(node, at)? {
                        Some(map) => map,
                        None => return Err(self.path_not_found()),
                    }
                };
                if !map.contains_key(key) {
                    if !create {
                        return Err(self.path_not_found());
                    }
                    self.on_conflict(self.path_not_found())?;
                    let order = map.order;
                    map.insert(key.clone(), container_for(next, order));
                }
                map.get_mut(key).ok_or_else(|| self.path_not_found())
            }
            Segment::Index(index) => {
                let list = if create {
                    self.list_mut(node, at)?
                } else {
                    match self.existing_list(node, at)? {
                        Some(list) => list,
                        None => return Err(self.path_not_found()),
                    }
                };
                list.items
                    .get_mut(*index)
                    .ok_or_else(|| self.path_not_found())
            }
            Segment::Match { key, value } => {
                if node.kind() != Kind::List {
                    if node.matches(key, value) {
                        return Ok(node);
                    }
                    if !create {
                        return Err(self.path_not_found());
                    }
                }
                let list = if create {
                    self.promote(node, key, at)?
                } else {
                    match node.as_list_mut() {
                        Some(list) => list,
                        None => return Err(self.path_not_found()),
                    }
                };
                match self.hit(list, key, value)? {
                    Some(i) => Ok(&mut list.items[i]),
                    None if !create => Err(self.path_not_found()),
                    None => {
                        self.on_conflict(self.path_not_found())?;
                        list.items.push(new_element(key, value));
                        let last = list.items.len() - 1;
                        Ok(&mut list.items[last])
                    }
                }
            }
        }
    }

    fn set(
        &mut self,
        parent: &mut Node,
        last: &Segment,
        at: &Path,
        value: Node,
    ) -> Result<bool, PatchError> {
        match last {
            Segment::Key(key) => {
                let map = self.map_mut(parent, at)?;
                match map.get_mut(key) {
                    Some(current) => self.overwrite(current, value),
                    None => {
                        self.absent_for_set()?;
                        map.insert(key.clone(), value);
                        Ok(true)
                    }
                }
            }
            Segment::Index(index) => {
                let list = self.list_mut(parent, at)?;
                match list.items.get_mut(*index) {
                    Some(current) => self.overwrite(current, value),
                    None => {
                        self.absent_for_set()?;
                        list.items.push(value);
                        Ok(true)
                    }
                }
            }
            Segment::Match {
                key,
                value: wanted,
            } => {
                if parent.kind() != Kind::List && parent.matches(key, wanted) {
                    return self.overwrite(parent, value);
                }
                let list = self.promote(parent, key, at)?;
                match self.hit(list, key, wanted)? {
                    Some(i) => self.overwrite(&mut list.items[i], value),
                    None => {
                        self.absent_for_set()?;
                        list.items.push(value);
                        Ok(true)
                    }
                }
            }
        }
    }

    fn insert(
        &mut self,
        parent: &mut Node,
        last: &Segment,
        at: &Path,
        value: Node,
    ) -> Result<bool, PatchError> {
        let operation = self.operation;
        match last {
            Segment::Key(key) => {
                let map = self.map_mut(parent, at)?;
                if let Some(current) = map.get_mut(key) {
                    return self.collide(current, value);
                }
                match &operation.anchor {
                    Anchor::AfterKey(anchor) => map.insert_near(anchor, key.clone(), value, false),
                    Anchor::Start => map.insert_at(0, key.clone(), value),
                    Anchor::End | Anchor::AfterValue(_) => {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(true)
            }
            Segment::Index(index) => {
                let list = self.list_mut(parent, at)?;
                let position = self.list_position(list, *index)?;
                list.items.insert(position, value);
                Ok(true)
            }
            Segment::Match {
                key,
                value: wanted,
            } => {
                if parent.kind() != Kind::List && parent.matches(key, wanted) {
                    return self.collide(parent, value);
                }
                let list = self.promote(parent, key, at)?;
                match self.hit(list, key, wanted)? {
                    Some(i) => self.collide(&mut list.items[i], value),
                    None => {
                        list.items.push(value);
                        Ok(true)
                    }
                }
            }
        }
    }

    fn delete(&mut self, parent: &mut Node, last: &Segment, at: &Path) -> Result<bool, PatchError> {
        let operation = self.operation;
        match last {
            Segment::Key(key) => {
                let Some(map) = self.existing_map(parent, at)? else {
                    return self.absent_for_delete();
                };
                match map.get(key) {
                    None => self.absent_for_delete(),
                    Some(current) => {
                        self.check_old(current)?;
                        let position = map.position(key);
                        if let (Some(position), Some(removed)) = (position, map.remove(key)) {
                            carry_spacing(map, position, &removed);
                        }
                        Ok(true)
                    }
                }
            }
            Segment::Index(index) => {
                let Some(list) = self.existing_list(parent, at)? else {
                    return self.absent_for_delete();
                };
                let expected = |node: &Node| {
                    operation
                        .old
                        .as_ref()
                        .map_or(true, |old| similar(node, old))
                };
                if list.items.get(*index).is_some_and(expected) {
                    list.items.remove(*index);
                    return Ok(true);
                }
                let out_of_range = *index >= list.items.len();
                if out_of_range && operation.old.is_none() {
                    return self.absent_for_delete();
                }
                let conflict = if out_of_range {
                    self.path_not_found()
                } else {
                    self.value_not_found()
                };
                self.on_conflict(conflict)?;
                match operation
                    .old
                    .as_ref()
                    .and_then(|old| deep_index(&list.items, old))
                {
                    Some(found) => {
                        list.items.remove(found);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            Segment::Match {
                key,
                value: wanted,
            } => {
                if parent.kind() != Kind::List {
                    if !parent.matches(key, wanted) {
                        return self.absent_for_delete();
                    }
                    self.check_old(parent)?;
                    // Emptied lists are dropped when the format normalizes.
                    *parent = Node::list(List::new(Order::Free, identity_for(key)));
                    return Ok(true);
                }
                let Value::List(list) = &mut parent.value else {
                    return self.absent_for_delete();
                };
                match self.hit(list, key, wanted)? {
                    None => self.absent_for_delete(),
                    Some(i) => {
                        self.check_old(&list.items[i])?;
                        list.items.remove(i);
                        Ok(true)
                    }
                }
            }
        }
    }

    /// `set` onto an existing node.
    fn overwrite(&mut self, current: &mut Node, value: Node) -> Result<bool, PatchError> {
        if same(current, &value) {
            return Ok(false);
        }
        let operation = self.operation;
        if let Some(old) = &operation.old {
            self.check_kind(current, old)?;
            if !similar(current, old) {
                self.on_conflict(self.value_not_found())?;
            }
        }
        self.install(current, value);
        Ok(true)
    }

    /// `insert` onto a node that already exists.
    fn collide(&mut self, current: &mut Node, value: Node) -> Result<bool, PatchError> {
        if similar(current, &value) {
            return Ok(false);
        }
        self.check_kind(current, &value)?;
        if !self.policy.contains(PatchMode::Replace) {
            self.on_conflict(self.unexpected_data())?;
        }
        self.install(current, value);
        Ok(true)
    }

    /// Put `value` in place of `current`. Maps are merged unless replacing:
    /// new entries win and entries that only the target has survive. The
    /// target's leading comments are kept.
    fn install(&mut self, current: &mut Node, value: Node) {
        let leading = std::mem::take(&mut current.annotations.leading);
        let replace = self.policy.contains(PatchMode::Replace);
        let merge = !replace && current.kind() == Kind::Map && value.kind() == Kind::Map;
        if replace {
            self.mode = Some(PatchMode::Replace);
            *current = value;
        } else if merge {
            let old = self.operation.old.as_ref().and_then(Node::as_map);
            if let (Some(existing), Some(incoming)) = (current.as_map_mut(), value.as_map()) {
                merge_maps(existing, incoming, old);
            }
            current.annotations.raw = None;
        } else {
            *current = value;
        }
        current.annotations.leading = leading;
    }

    fn check_old(&mut self, current: &Node) -> Result<(), PatchError> {
        let operation = self.operation;
        if let Some(old) = &operation.old {
            if !similar(current, old) {
                self.on_conflict(self.value_not_found())?;
            }
        }
        Ok(())
    }

    fn check_kind(&mut self, current: &Node, expected: &Node) -> Result<(), PatchError> {
        let wanted = expected.kind();
        if wanted == Kind::Scalar || current.kind() == wanted {
            return Ok(());
        }
        if self.policy.contains(PatchMode::Replace) {
            self.mode = Some(PatchMode::Replace);
            return Ok(());
        }
        let at = &self.operation.path;
        Err(match wanted {
            Kind::Map => self.expected_hash(at),
            _ => self.expected_array(at),
        })
    }

    /// Insert position in an ordered list, checked against the anchor.
    fn list_position(&mut self, list: &List, index: usize) -> Result<usize, PatchError> {
        let operation = self.operation;
        let len = list.items.len();
        let fits = index <= len
            && match &operation.anchor {
                Anchor::Start => index == 0,
                Anchor::AfterValue(prev) => index > 0 && similar(&list.items[index - 1], prev),
                Anchor::End | Anchor::AfterKey(_) => true,
            };
        if fits {
            return Ok(index);
        }

        let conflict = if index > len {
            self.path_not_found()
        } else {
            self.value_not_found()
        };
        self.on_conflict(conflict)?;
        let located = match &operation.anchor {
            Anchor::Start => Some(0),
            Anchor::AfterValue(prev) => deep_index(&list.items, prev).map(|i| i + 1),
            Anchor::End | Anchor::AfterKey(_) => None,
        };
        match located {
            Some(position) => Ok(position),
            None if self.policy.contains(PatchMode::Force) => Err(self.value_not_found()),
            None => Ok(index.min(len)),
        }
    }

    /// Index of the element selected by a predicate.
    fn hit(&mut self, list: &List, key: &str, wanted: &str) -> Result<Option<usize>, PatchError> {
        let hits: Vec<usize> = list
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.matches(key, wanted))
            .map(|(i, _)| i)
            .collect();
        match hits.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            [first, ..] => {
                self.on_conflict(self.invalid_multiple())?;
                Ok(Some(*first))
            }
        }
    }

    /// View `node` as the list a predicate selects from, turning a single
    /// matching-shaped entry into a one-element list.
    fn promote<'n>(
        &mut self,
        node: &'n mut Node,
        key: &str,
        at: &Path,
    ) -> Result<&'n mut List, PatchError> {
        let fits_singleton = match node.kind() {
            Kind::List => true,
            Kind::Map => key != ".",
            Kind::Scalar => key == ".",
        };
        if !fits_singleton {
            if !self.policy.contains(PatchMode::Replace) {
                return Err(self.expected_array(at));
            }
            self.mode = Some(PatchMode::Replace);
            *node = Node::list(List::new(Order::Free, identity_for(key)));
        }
        if node.kind() != Kind::List {
            let placeholder = node.as_map().is_some_and(Map::is_empty);
            let previous = std::mem::replace(node, Node::null());
            let mut list = List::new(Order::Free, identity_for(key));
            if !placeholder {
                list.items.push(previous);
            }
            *node = Node::list(list);
        }
        match &mut node.value {
            Value::List(list) => Ok(list),
            _ => Err(self.expected_array(at)),
        }
    }

    fn map_mut<'n>(&mut self, node: &'n mut Node, at: &Path) -> Result<&'n mut Map, PatchError> {
        if node.kind() != Kind::Map {
            if !self.policy.contains(PatchMode::Replace) {
                return Err(self.expected_hash(at));
            }
            self.mode = Some(PatchMode::Replace);
            *node = Node::map(Map::new(Order::Kept));
        }
        match &mut node.value {
            Value::Map(map) => Ok(map),
            _ => Err(self.expected_hash(at)),
        }
    }

    fn list_mut<'n>(&mut self, node: &'n mut Node, at: &Path) -> Result<&'n mut List, PatchError> {
        if node.kind() != Kind::List {
            if !self.policy.contains(PatchMode::Replace) {
                return Err(self.expected_array(at));
            }
            self.mode = Some(PatchMode::Replace);
            *node = Node::list(List::new(Order::Kept, Identity::Position));
        }
        match &mut node.value {
            Value::List(list) => Ok(list),
            _ => Err(self.expected_array(at)),
        }
    }

    /// Map to delete from; `None` when a kind mismatch is tolerated because
    /// replace mode is on.
    fn existing_map<'n>(
        &mut self,
        node: &'n mut Node,
        at: &Path,
    ) -> Result<Option<&'n mut Map>, PatchError> {
        if node.kind() != Kind::Map && !self.policy.contains(PatchMode::Replace) {
            return Err(self.expected_hash(at));
        }
        Ok(node.as_map_mut())
    }

    fn existing_list<'n>(
        &mut self,
        node: &'n mut Node,
        at: &Path,
    ) -> Result<Option<&'n mut List>, PatchError> {
        if node.kind() != Kind::List && !self.policy.contains(PatchMode::Replace) {
            return Err(self.expected_array(at));
        }
        Ok(node.as_list_mut())
    }

    fn on_conflict(&mut self, conflict: PatchError) -> Result<(), PatchError> {
        if self.policy.contains(PatchMode::Force) {
            debug!(error = %conflict, "forcing through conflict");
            self.mode = Some(PatchMode::Force);
            return Ok(());
        }
        if self.policy.contains(PatchMode::Skip) {
            return Err(conflict);
        }
        warn!(error = %conflict, "overriding conflicting target content");
        Ok(())
    }

    /// A `set` whose recorded prior value has no counterpart in the target.
    fn absent_for_set(&mut self) -> Result<(), PatchError> {
        if self.operation.old.is_some() {
            self.on_conflict(self.path_not_found())?;
        }
        Ok(())
    }

    fn absent_for_delete(&mut self) -> Result<bool, PatchError> {
        if self.policy.contains(PatchMode::Skip) && !self.policy.contains(PatchMode::Force) {
            return Err(self.path_not_found());
        }
        Ok(false)
    }

    fn boxed(&self) -> Box<EditOperation> {
        Box::new(self.operation.clone())
    }

    fn path_not_found(&self) -> PatchError {
        PatchError::PathNotFound {
            operation: self.boxed(),
        }
    }

    fn value_not_found(&self) -> PatchError {
        PatchError::ValueNotFound {
            operation: self.boxed(),
        }
    }

    fn unexpected_data(&self) -> PatchError {
        PatchError::UnexpectedData {
            operation: self.boxed(),
        }
    }

    fn invalid_multiple(&self) -> PatchError {
        PatchError::InvalidMultiple {
            operation: self.boxed(),
        }
    }

    fn expected_hash(&self, at: &Path) -> PatchError {
        PatchError::ExpectedHash {
            at: at.clone(),
            operation: self.boxed(),
        }
    }

    fn expected_array(&self, at: &Path) -> PatchError {
        PatchError::ExpectedArray {
            at: at.clone(),
            operation: self.boxed(),
        }
    }
}

fn identity_for(key: &str) -> Identity {
    if key == "." {
        Identity::Value
    } else {
        Identity::Key(key.to_string())
    }
}

fn container_for(next: &Segment, order: Order) -> Node {
    match next {
        Segment::Key(_) => Node::map(Map::new(order)),
        Segment::Index(_) => Node::list(List::new(Order::Kept, Identity::Position)),
        Segment::Match { key, .. } => Node::list(List::new(Order::Free, identity_for(key))),
    }
}

fn new_element(key: &str, value: &str) -> Node {
    if key == "." {
        return Node::scalar(value);
    }
    let mut map = Map::new(Order::Kept);
    map.insert(key, Node::scalar(value));
    Node::map(map)
}

/// Hand the blank lines in front of a removed entry to the entry that
/// took its place, so paragraphs stay separated.
fn carry_spacing(map: &mut Map, position: usize, removed: &Node) {
    let blank: Vec<String> = removed
        .annotations
        .leading
        .iter()
        .take_while(|line| line.trim().is_empty())
        .cloned()
        .collect();
    if blank.is_empty() {
        return;
    }
    if let Some((_, next)) = map.iter_mut().nth(position) {
        let next = match &mut next.value {
            Value::List(list) => match list.items.first_mut() {
                Some(first) => first,
                None => return,
            },
            _ => next,
        };
        if next.annotations.leading.is_empty() {
            next.annotations.leading = blank;
        }
    }
}

fn merge_maps(existing: &mut Map, incoming: &Map, old: Option<&Map>) {
    let mut merged = Map::new(existing.order);
    for (key, new_child) in incoming.iter() {
        let child = match (existing.get(key), &new_child.value) {
            (Some(current), Value::Map(new_map)) if current.kind() == Kind::Map => {
                let mut current = current.clone();
                let old_child = old.and_then(|o| o.get(key)).and_then(Node::as_map);
                if let Value::Map(current_map) = &mut current.value {
                    merge_maps(current_map, new_map, old_child);
                }
                current.annotations.raw = None;
                current
            }
            _ => new_child.clone(),
        };
        merged.insert(key, child);
    }
    for (key, current) in existing.iter() {
        let known = incoming.contains_key(key) || old.is_some_and(|o| o.contains_key(key));
        if !known {
            merged.insert(key, current.clone());
        }
    }
    *existing = merged;
}

/// Drop cached source text on every ancestor of `path`.
fn clear_raw(root: &mut Node, path: &Path) {
    let mut node = root;
    for segment in path.segments() {
        node.annotations.raw = None;
        if matches!(segment, Segment::Match { .. }) && node.kind() != Kind::List {
            continue;
        }
        let next = match segment {
            Segment::Key(key) => node.as_map_mut().and_then(|map| map.get_mut(key)),
            Segment::Index(i) => node.as_list_mut().and_then(|list| list.items.get_mut(*i)),
            Segment::Match { key, value } => node.as_list_mut().and_then(|list| {
                list.items
                    .iter_mut()
                    .find(|item| item.matches(key, value))
            }),
        };
        match next {
            Some(child) => node = child,
            None => return,
        }
    }
}
