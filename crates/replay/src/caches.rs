//! Side caches keyed by node, populated while a subtree is virtualized and
//! committed at the flush boundary.

use core_types::DialogState;
use dom::mutation::RuleEdit;
use dom::tree::{NodeRef, Tree};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SideCaches {
    pub(crate) style_journal: HashMap<NodeRef, Vec<RuleEdit>>,
    pub(crate) scroll: HashMap<NodeRef, (i32, i32)>,
    pub(crate) dialog: HashMap<NodeRef, Option<DialogState>>,
}

impl SideCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.style_journal.is_empty() && self.scroll.is_empty() && self.dialog.is_empty()
    }

    pub fn clear(&mut self) {
        self.style_journal.clear();
        self.scroll.clear();
        self.dialog.clear();
    }

    pub(crate) fn journal_rules(&mut self, node: NodeRef, edits: impl IntoIterator<Item = RuleEdit>) {
        self.style_journal.entry(node).or_default().extend(edits);
    }

    /// Remove every cached entry for a subtree about to be destroyed.
    pub(crate) fn drop_subtree(&mut self, tree: &Tree, root: NodeRef) {
        for node in tree.subtree_refs(root) {
            self.style_journal.remove(&node);
            self.scroll.remove(&node);
            self.dialog.remove(&node);
        }
    }
}
