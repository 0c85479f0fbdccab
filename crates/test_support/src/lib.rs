//! End-to-end harness: a scripted capture session and a replay session,
//! plus tree comparison between them. Panics on misuse; test-only code.

use dom::mutation::{Delta, Id};
use dom::snapshot::{compare_trees, TreeSnapshotOptions};
use dom::tree::NodeRef;
use record::{CaptureContext, CollectSink, MutationBuffer, RawMutation};
use replay::{Applier, ReplayConfig, ReplayContext};

pub use dom::snapshot::{diff_lines, TreeSnapshot};

/// Drives a capture session: every helper performs the host-tree edit and
/// feeds the observation record the host would deliver for it.
pub struct Recorder {
    pub ctx: CaptureContext,
    pub buffer: MutationBuffer,
    pub sink: CollectSink,
    pub root: NodeRef,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        let mut ctx = CaptureContext::new(1);
        let root = ctx.tree.create_document(None);
        ctx.serialize(root);
        Self {
            ctx,
            buffer: MutationBuffer::default(),
            sink: CollectSink::default(),
            root,
        }
    }

    pub fn root_id(&self) -> Id {
        self.ctx.mirror.get_id(self.root).expect("root is serialized")
    }

    pub fn id_of(&self, node: NodeRef) -> Id {
        self.ctx.mirror.get_id(node).expect("node has been emitted")
    }

    fn record_child_list(&mut self, target: NodeRef, added: Vec<NodeRef>, removed: Vec<NodeRef>) {
        self.buffer.process_mutation(
            &mut self.ctx,
            &RawMutation::ChildList {
                target,
                added,
                removed,
            },
        );
    }

    pub fn append_element(&mut self, parent: NodeRef, tag: &str) -> NodeRef {
        let node = self.ctx.tree.create_element(tag);
        self.ctx.tree.append_child(parent, node).unwrap();
        self.record_child_list(parent, vec![node], vec![]);
        node
    }

    pub fn append_text(&mut self, parent: NodeRef, value: &str) -> NodeRef {
        let node = self.ctx.tree.create_text(value);
        self.ctx.tree.append_child(parent, node).unwrap();
        self.record_child_list(parent, vec![node], vec![]);
        node
    }

    pub fn insert_element_before(
        &mut self,
        parent: NodeRef,
        tag: &str,
        before: NodeRef,
    ) -> NodeRef {
        let node = self.ctx.tree.create_element(tag);
        self.ctx.tree.insert_before(parent, node, before).unwrap();
        self.record_child_list(parent, vec![node], vec![]);
        node
    }

    pub fn set_text(&mut self, node: NodeRef, value: &str) {
        let old = self.ctx.tree.text(node).map(str::to_string);
        self.ctx.tree.set_text(node, value).unwrap();
        self.buffer.process_mutation(
            &mut self.ctx,
            &RawMutation::CharacterData {
                target: node,
                old_value: old,
            },
        );
    }

    pub fn set_attribute(&mut self, node: NodeRef, name: &str, value: Option<&str>) {
        let old = self
            .ctx
            .tree
            .attribute(node, name)
            .flatten()
            .map(str::to_string);
        match value {
            Some(value) => self.ctx.tree.set_attribute(node, name, Some(value)).unwrap(),
            None => {
                self.ctx.tree.remove_attribute(node, name).unwrap();
            }
        }
        self.buffer.process_mutation(
            &mut self.ctx,
            &RawMutation::Attribute {
                target: node,
                name: name.to_string(),
                old_value: old,
            },
        );
    }

    pub fn set_style_property(&mut self, node: NodeRef, name: &str, value: &str, important: bool) {
        let old = self
            .ctx
            .tree
            .attribute(node, "style")
            .flatten()
            .map(str::to_string);
        self.ctx
            .tree
            .set_style_property(node, name, value, important)
            .unwrap();
        self.buffer.process_mutation(
            &mut self.ctx,
            &RawMutation::Attribute {
                target: node,
                name: "style".to_string(),
                old_value: old,
            },
        );
    }

    pub fn remove_style_property(&mut self, node: NodeRef, name: &str) {
        let old = self
            .ctx
            .tree
            .attribute(node, "style")
            .flatten()
            .map(str::to_string);
        self.ctx.tree.remove_style_property(node, name).unwrap();
        self.buffer.process_mutation(
            &mut self.ctx,
            &RawMutation::Attribute {
                target: node,
                name: "style".to_string(),
                old_value: old,
            },
        );
    }

    pub fn remove_node(&mut self, node: NodeRef) {
        let parent = self.ctx.tree.parent(node).expect("node is attached");
        self.ctx.tree.detach(parent, node).unwrap();
        self.record_child_list(parent, vec![], vec![node]);
    }

    pub fn move_node(&mut self, node: NodeRef, new_parent: NodeRef) {
        let old_parent = self.ctx.tree.parent(node).expect("node is attached");
        self.ctx.tree.detach(old_parent, node).unwrap();
        self.ctx.tree.append_child(new_parent, node).unwrap();
        self.record_child_list(old_parent, vec![], vec![node]);
        self.record_child_list(new_parent, vec![node], vec![]);
    }

    /// End the capture cycle. Returns the emitted delta, if any.
    pub fn emit(&mut self) -> Option<Delta> {
        if self.buffer.emit(&mut self.ctx, &mut self.sink) {
            self.sink.0.last().cloned()
        } else {
            None
        }
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.sink.0
    }
}

/// Drives a replay session seeded with the capture root's id.
pub struct Replayer {
    pub ctx: ReplayContext,
    pub applier: Applier,
    pub root: NodeRef,
}

impl Replayer {
    pub fn new(root_id: Id) -> Self {
        Self::with_config(root_id, ReplayConfig::default())
    }

    pub fn with_config(root_id: Id, config: ReplayConfig) -> Self {
        let mut ctx = ReplayContext::new();
        let root = ctx.tree.create_document(None);
        ctx.mirror.add(root, root_id);
        Self {
            ctx,
            applier: Applier::new(config),
            root,
        }
    }

    pub fn apply(&mut self, delta: &Delta) {
        self.applier.apply(&mut self.ctx, delta).unwrap();
    }

    pub fn apply_all(&mut self, deltas: &[Delta]) {
        for delta in deltas {
            self.apply(delta);
        }
    }

    pub fn flush(&mut self) {
        self.applier.flush(&mut self.ctx).unwrap();
    }
}

/// Panic with a line diff if the replayed tree differs from the captured one.
pub fn assert_round_trip(recorder: &Recorder, replayer: &Replayer) {
    assert_trees_match(recorder, replayer, TreeSnapshotOptions::default());
}

pub fn assert_trees_match(
    recorder: &Recorder,
    replayer: &Replayer,
    options: TreeSnapshotOptions,
) {
    let expected = recorder
        .ctx
        .tree
        .materialize(recorder.root)
        .expect("capture root is live");
    let actual = replayer
        .ctx
        .tree
        .materialize(replayer.root)
        .expect("replay root is live");
    if let Err(diff) = compare_trees(&expected, &actual, options) {
        panic!("replayed tree diverges from the captured one:\n{diff}");
    }
}
