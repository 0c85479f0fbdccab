//! Bidirectional ID <-> node registry.
//!
//! Invariants:
//! - After `add`, `get` and `get_id` are mutual inverses until the next
//!   `remove`/`reset`.
//! - `IdGen` never hands out the same id twice within a session, so a
//!   removed mapping's id stays retired.

use crate::mutation::Id;
use crate::tree::NodeRef;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Mirror {
    by_id: HashMap<Id, NodeRef>,
    by_node: HashMap<NodeRef, Id>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Id) -> Option<NodeRef> {
        self.by_id.get(&id).copied()
    }

    pub fn get_id(&self, node: NodeRef) -> Option<Id> {
        self.by_node.get(&node).copied()
    }

    pub fn has(&self, id: Id) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn add(&mut self, node: NodeRef, id: Id) {
        debug_assert!(!self.by_id.contains_key(&id), "id already mapped");
        debug_assert!(!self.by_node.contains_key(&node), "node already mapped");
        self.by_id.insert(id, node);
        self.by_node.insert(node, id);
    }

    pub fn remove(&mut self, node: NodeRef) -> Option<Id> {
        let id = self.by_node.remove(&node)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Re-point an existing id at a different node. Used when a virtual
    /// parent stands in for a real one. Returns the node previously mapped.
    pub fn replace(&mut self, id: Id, node: NodeRef) -> Option<NodeRef> {
        let old = self.by_id.insert(id, node);
        if let Some(old) = old {
            self.by_node.remove(&old);
        }
        self.by_node.insert(node, id);
        old
    }

    pub fn reset(&mut self) {
        self.by_id.clear();
        self.by_node.clear();
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Monotonic id source for the capture side.
#[derive(Debug)]
pub struct IdGen {
    next: u32,
}

impl Default for IdGen {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> Id {
        let id = Id(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    #[test]
    fn add_makes_mutual_inverses() {
        let mut tree = Tree::new();
        let node = tree.create_element("div");
        let mut mirror = Mirror::new();
        mirror.add(node, Id(7));
        assert_eq!(mirror.get(Id(7)), Some(node));
        assert_eq!(mirror.get_id(node), Some(Id(7)));
        assert!(mirror.has(Id(7)));
    }

    #[test]
    fn remove_retires_the_mapping() {
        let mut tree = Tree::new();
        let node = tree.create_element("div");
        let mut mirror = Mirror::new();
        mirror.add(node, Id(3));
        assert_eq!(mirror.remove(node), Some(Id(3)));
        assert_eq!(mirror.get(Id(3)), None);
        assert_eq!(mirror.get_id(node), None);
    }

    #[test]
    fn replace_repoints_the_id() {
        let mut tree = Tree::new();
        let real = tree.create_element("div");
        let frag = tree.create_fragment();
        let mut mirror = Mirror::new();
        mirror.add(real, Id(5));
        assert_eq!(mirror.replace(Id(5), frag), Some(real));
        assert_eq!(mirror.get(Id(5)), Some(frag));
        assert_eq!(mirror.get_id(real), None);
    }

    #[test]
    fn id_gen_is_monotonic() {
        let mut ids = IdGen::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b.0 > a.0);
    }
}
