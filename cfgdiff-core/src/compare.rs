//! Structural (`same`) and tolerant (`similar`) equality of trees.

use crate::tree::{List, Map, Node, Order, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    Same,
    Similar,
}

/// Identical shape, keys, values and semantic annotations. Order is compared
/// wherever the container's order flag is not [`Order::Free`].
pub fn same(a: &Node, b: &Node) -> bool {
    compare(a, b, Strictness::Same)
}

/// Like [`same`] but ignores map order, list order unless
/// [`Order::Strict`], quoting style and YAML key kinds.
pub fn similar(a: &Node, b: &Node) -> bool {
    compare(a, b, Strictness::Similar)
}

/// Index of the first list element similar to `needle`.
pub fn deep_index(items: &[Node], needle: &Node) -> Option<usize> {
    items.iter().position(|item| similar(item, needle))
}

fn compare(a: &Node, b: &Node, mode: Strictness) -> bool {
    if a.annotations.exported != b.annotations.exported {
        return false;
    }
    if mode == Strictness::Same
        && (a.annotations.quote != b.annotations.quote
            || a.annotations.key_tag != b.annotations.key_tag)
    {
        return false;
    }
    match (&a.value, &b.value) {
        (Value::Scalar(x), Value::Scalar(y)) => x == y,
        (Value::Map(x), Value::Map(y)) => compare_maps(x, y, mode),
        (Value::List(x), Value::List(y)) => compare_lists(x, y, mode),
        _ => false,
    }
}

fn compare_maps(a: &Map, b: &Map, mode: Strictness) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let ordered = mode == Strictness::Same && a.order.is_significant();
    if ordered && !a.keys().eq(b.keys()) {
        return false;
    }
    a.iter().all(|(key, left)| {
        b.get(key)
            .is_some_and(|right| compare(left, right, mode))
    })
}

fn compare_lists(a: &List, b: &List, mode: Strictness) -> bool {
    if a.items.len() != b.items.len() {
        return false;
    }
    let ordered = match mode {
        Strictness::Same => a.order.is_significant(),
        Strictness::Similar => a.order == Order::Strict,
    };
    if ordered {
        return a
            .items
            .iter()
            .zip(&b.items)
            .all(|(x, y)| compare(x, y, mode));
    }

    // Multiset comparison; equality here is an equivalence so a greedy
    // pairing is exact.
    let mut used = vec![false; b.items.len()];
    a.items.iter().all(|x| {
        let hit = b
            .items
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && compare(x, y, mode));
        match hit {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
