//! Pending-add forest for the resolve-tree pass.
//!
//! Requeued adds are linked by their declared parent ids into an arena of
//! records; resolution walks it parent-first with an explicit worklist, so
//! arbitrarily deep reported-before-parent chains never recurse.

use dom::mutation::{AddedNodeMutation, Id};
use std::collections::HashMap;

pub(crate) struct PendingForest {
    records: Vec<AddedNodeMutation>,
    by_id: HashMap<Id, usize>,
}

impl PendingForest {
    pub(crate) fn new(pending: Vec<AddedNodeMutation>) -> Self {
        let by_id = pending
            .iter()
            .enumerate()
            .map(|(i, m)| (m.node.id, i))
            .collect();
        Self {
            records: pending,
            by_id,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn mutation(&self, index: usize) -> &AddedNodeMutation {
        &self.records[index]
    }

    /// Index of the pending record that is this record's declared parent,
    /// if the parent is itself pending. `None` marks a root cause rather
    /// than a cascade. Self-parented records count as roots.
    pub(crate) fn parent_index(&self, index: usize) -> Option<usize> {
        let parent = self.records[index].parent_id;
        self.by_id.get(&parent).copied().filter(|&p| p != index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::mutation::SerializedNode;

    fn add(id: u32, parent: u32) -> AddedNodeMutation {
        AddedNodeMutation {
            parent_id: Id(parent),
            next_id: None,
            previous_id: None,
            node: SerializedNode::element(Id(id), "div"),
        }
    }

    #[test]
    fn cascades_point_at_pending_parents() {
        let forest = PendingForest::new(vec![add(2, 99), add(3, 2), add(4, 3)]);
        assert_eq!(forest.parent_index(0), None);
        assert_eq!(forest.parent_index(1), Some(0));
        assert_eq!(forest.parent_index(2), Some(1));
    }

    #[test]
    fn self_parented_record_is_a_root() {
        let forest = PendingForest::new(vec![add(2, 2)]);
        assert_eq!(forest.parent_index(0), None);
    }
}
