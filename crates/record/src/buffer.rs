//! Capture-side mutation coalescing.
//!
//! Contract:
//! - `process_mutation` must never panic: it runs inside the host's
//!   observation callback.
//! - A node added and removed within one uncommitted cycle leaves no trace
//!   in the emitted delta, nor do its descendants.
//! - A relocation of an already-identified node emits a single add under
//!   the new parent; the observation records' implied remove is cancelled
//!   whichever order the records arrive in.
//! - Emission serializes moves before adds, defers unresolvable entries to
//!   a pending list rescanned from its tail, and gives up only after a
//!   no-progress pass or the configured wall-clock budget.
//! - Identity-map removals recorded in one cycle are flushed at the start
//!   of the next emit, so same-cycle text/attribute entries still resolve.

use crate::style_diff::diff_style;
use crate::{CanvasSink, DeltaSink};
use core_types::{DeltaSeq, SessionId};
use dom::mutation::{
    AddedNodeMutation, AttrValue, AttributeMutation, Delta, Id, RemovedNodeMutation, TextMutation,
};
use dom::style::parse_inline_style;
use dom::tree::{NodeRef, Tree};
use dom::{IdGen, Mirror, SerializedNode, Serializer};
use std::collections::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Raw per-node change record delivered by the observation source.
/// Batched; order within a batch is arbitrary, and a child may be reported
/// before its parent.
#[derive(Clone, Debug)]
pub enum RawMutation {
    CharacterData {
        target: NodeRef,
        old_value: Option<String>,
    },
    Attribute {
        target: NodeRef,
        name: String,
        old_value: Option<String>,
    },
    ChildList {
        target: NodeRef,
        added: Vec<NodeRef>,
        removed: Vec<NodeRef>,
    },
}

/// Per-session capture state shared by the serializer and the buffer.
pub struct CaptureContext {
    pub session: SessionId,
    pub tree: Tree,
    pub mirror: Mirror,
    pub ids: IdGen,
    pub serializer: Serializer,
}

impl CaptureContext {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            tree: Tree::new(),
            mirror: Mirror::new(),
            ids: IdGen::new(),
            serializer: Serializer::new(),
        }
    }

    pub fn serialize(&mut self, node: NodeRef) -> Option<SerializedNode> {
        self.serializer
            .serialize(&self.tree, node, &mut self.mirror, &mut self.ids)
    }

    fn is_blocked_up(&self, node: NodeRef) -> bool {
        self.serializer.is_blocked_up(&self.tree, node)
    }
}

#[derive(Debug)]
pub struct BufferConfig {
    /// Wall-clock budget for the pending-add resolution loop.
    pub resolve_budget: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            resolve_budget: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct MovedEdge {
    new_parent: Option<Id>,
    /// A remove cancelled when the move was recorded; restored if the node
    /// is genuinely removed later in the same cycle.
    displaced_remove: Option<RemovedNodeMutation>,
}

#[derive(Debug)]
struct TextCursor {
    target: NodeRef,
    value: String,
}

#[derive(Debug)]
struct AttrCursor {
    target: NodeRef,
    attributes: BTreeMap<String, Option<AttrValue>>,
}

enum SerializeOutcome {
    Ready(AddedNodeMutation),
    NotReady,
    Skip,
}

pub struct MutationBuffer {
    config: BufferConfig,
    frozen: bool,
    locked: bool,
    seq: DeltaSeq,
    texts: Vec<TextCursor>,
    text_index: HashMap<NodeRef, usize>,
    attributes: Vec<AttrCursor>,
    attr_index: HashMap<NodeRef, usize>,
    added: Vec<NodeRef>,
    added_set: HashSet<NodeRef>,
    moved: Vec<NodeRef>,
    moved_set: HashSet<NodeRef>,
    moved_edges: HashMap<Id, MovedEdge>,
    removes: Vec<RemovedNodeMutation>,
    removed_targets: HashSet<NodeRef>,
    dropped: HashSet<NodeRef>,
    /// Unregistered at the start of the NEXT emit.
    unregister_next: Vec<NodeRef>,
    /// Carried over from the previous emit; flushed first.
    unregister_now: Vec<NodeRef>,
    canvas: Option<Box<dyn CanvasSink>>,
}

impl MutationBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            frozen: false,
            locked: false,
            seq: 0,
            texts: Vec::new(),
            text_index: HashMap::new(),
            attributes: Vec::new(),
            attr_index: HashMap::new(),
            added: Vec::new(),
            added_set: HashSet::new(),
            moved: Vec::new(),
            moved_set: HashSet::new(),
            moved_edges: HashMap::new(),
            removes: Vec::new(),
            removed_targets: HashSet::new(),
            dropped: HashSet::new(),
            unregister_next: Vec::new(),
            unregister_now: Vec::new(),
            canvas: None,
        }
    }

    pub fn with_canvas(mut self, canvas: Box<dyn CanvasSink>) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    // ---- classification --------------------------------------------------

    pub fn process_mutation(&mut self, ctx: &mut CaptureContext, mutation: &RawMutation) {
        match mutation {
            RawMutation::CharacterData { target, old_value } => {
                self.process_text(ctx, *target, old_value.as_deref());
            }
            RawMutation::Attribute {
                target,
                name,
                old_value,
            } => {
                self.process_attribute(ctx, *target, name, old_value.as_deref());
            }
            RawMutation::ChildList {
                target,
                added,
                removed,
            } => {
                self.process_child_list(ctx, *target, added, removed);
            }
        }
    }

    fn process_text(&mut self, ctx: &mut CaptureContext, target: NodeRef, old_value: Option<&str>) {
        if ctx.is_blocked_up(target) {
            return;
        }
        let Some(text) = ctx.tree.text(target) else {
            return;
        };
        let masked = ctx.serializer.masker.mask_text(text);
        if Some(masked.as_str()) == old_value {
            return;
        }
        match self.text_index.get(&target) {
            Some(&i) => self.texts[i].value = masked,
            None => {
                self.text_index.insert(target, self.texts.len());
                self.texts.push(TextCursor {
                    target,
                    value: masked,
                });
            }
        }
    }

    fn process_attribute(
        &mut self,
        ctx: &mut CaptureContext,
        target: NodeRef,
        name: &str,
        old_value: Option<&str>,
    ) {
        if ctx.is_blocked_up(target) {
            return;
        }
        let Ok(element) = ctx.tree.element(target) else {
            return;
        };
        let value = if name == "style" {
            let reference = parse_inline_style(old_value.unwrap_or(""));
            let diff = diff_style(&reference, &element.style);
            if diff.is_empty() {
                return;
            }
            Some(AttrValue::Style(diff))
        } else {
            match ctx.tree.attribute(target, name) {
                None => None,
                Some(live) => {
                    let live = live.unwrap_or("");
                    let tag = element.name.clone();
                    Some(AttrValue::Text(ctx.serializer.masker.mask_attribute(
                        &tag, name, live,
                    )))
                }
            }
        };
        let cursor = match self.attr_index.get(&target) {
            Some(&i) => &mut self.attributes[i],
            None => {
                self.attr_index.insert(target, self.attributes.len());
                self.attributes.push(AttrCursor {
                    target,
                    attributes: BTreeMap::new(),
                });
                self.attributes.last_mut().unwrap()
            }
        };
        match value {
            Some(AttrValue::Style(diff)) => match cursor.attributes.get_mut(name) {
                // per-property merge; last write wins per property
                Some(Some(AttrValue::Style(existing))) => existing.extend(diff),
                _ => {
                    cursor
                        .attributes
                        .insert(name.to_string(), Some(AttrValue::Style(diff)));
                }
            },
            other => {
                cursor.attributes.insert(name.to_string(), other);
            }
        }
    }

    fn process_child_list(
        &mut self,
        ctx: &mut CaptureContext,
        target: NodeRef,
        added: &[NodeRef],
        removed: &[NodeRef],
    ) {
        if ctx.is_blocked_up(target) {
            return;
        }
        for &node in added {
            self.gen_adds(ctx, node, target);
        }
        for &node in removed {
            self.process_removal(ctx, node, target);
        }
    }

    /// Mark an added subtree. Already-identified roots are moves; fresh
    /// nodes are walked iteratively, skipping blocked branches.
    fn gen_adds(&mut self, ctx: &mut CaptureContext, root: NodeRef, target: NodeRef) {
        if let Some(id) = ctx.mirror.get_id(root) {
            if self.moved_set.insert(root) {
                self.moved.push(root);
            }
            let new_parent = self.parent_id_for(ctx, target);
            let displaced = self.cancel_recorded_remove(ctx, root, id);
            self.moved_edges.insert(
                id,
                MovedEdge {
                    new_parent,
                    displaced_remove: displaced,
                },
            );
            return;
        }
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if ctx.serializer.is_blocked(&ctx.tree, node) {
                continue;
            }
            if ctx.mirror.get_id(node).is_some() {
                // an identified node nested under a fresh subtree is still
                // a move
                self.gen_adds(ctx, node, ctx.tree.parent(node).unwrap_or(target));
                continue;
            }
            if self.added_set.insert(node) {
                self.dropped.remove(&node);
                self.added.push(node);
            }
            for &child in ctx.tree.children(node).iter().rev() {
                stack.push(child);
            }
            if let Some(shadow) = ctx.tree.shadow_root(node) {
                stack.push(shadow);
            }
        }
    }

    fn process_removal(&mut self, ctx: &mut CaptureContext, node: NodeRef, target: NodeRef) {
        let node_id = ctx.mirror.get_id(node);
        if self.added_set.contains(&node) {
            // added and removed within the same uncommitted cycle
            self.deep_cancel_add(ctx, node);
            return;
        }
        let Some(id) = node_id else {
            // never tracked: removal of a child of a pending or blocked node
            return;
        };
        if self.ancestor_removed(ctx, target) {
            self.unregister_next.push(node);
            return;
        }
        let parent_id = self.parent_id_for(ctx, target);
        if self.moved_set.contains(&node) {
            let genuine = self
                .moved_edges
                .get(&id)
                .is_some_and(|e| e.new_parent.is_some() && e.new_parent == parent_id);
            if genuine {
                // moved earlier this cycle, now removed from its new home:
                // the move collapses back into a plain remove
                self.moved_set.remove(&node);
                let displaced = self
                    .moved_edges
                    .remove(&id)
                    .and_then(|e| e.displaced_remove);
                let remove = displaced.unwrap_or(RemovedNodeMutation {
                    id,
                    parent_id: parent_id.unwrap_or(Id(0)),
                    is_shadow_root: ctx.tree.is_shadow_root(target),
                });
                self.removes.push(remove);
                self.removed_targets.insert(node);
                self.unregister_next.push(node);
            }
            // otherwise: the counterpart record of the move; no remove
            return;
        }
        let Some(parent_id) = parent_id else {
            return;
        };
        self.removes.push(RemovedNodeMutation {
            id,
            parent_id,
            is_shadow_root: ctx.tree.is_shadow_root(target),
        });
        self.removed_targets.insert(node);
        self.unregister_next.push(node);
    }

    fn parent_id_for(&self, ctx: &CaptureContext, target: NodeRef) -> Option<Id> {
        if ctx.tree.is_shadow_root(target) {
            let host = ctx.tree.shadow_host(target)?;
            ctx.mirror.get_id(host)
        } else {
            ctx.mirror.get_id(target)
        }
    }

    fn cancel_recorded_remove(
        &mut self,
        _ctx: &CaptureContext,
        node: NodeRef,
        id: Id,
    ) -> Option<RemovedNodeMutation> {
        let pos = self.removes.iter().position(|r| r.id == id)?;
        self.removed_targets.remove(&node);
        self.unregister_next.retain(|n| *n != node);
        Some(self.removes.remove(pos))
    }

    fn deep_cancel_add(&mut self, ctx: &CaptureContext, root: NodeRef) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.added_set.remove(&node) {
                self.dropped.insert(node);
            }
            stack.extend(ctx.tree.children(node).iter().copied());
            if let Some(shadow) = ctx.tree.shadow_root(node) {
                stack.push(shadow);
            }
        }
    }

    fn ancestor_removed(&self, ctx: &CaptureContext, node: NodeRef) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.removed_targets.contains(&n) {
                return true;
            }
            current = ctx.tree.parent(n);
        }
        false
    }

    // ---- emission --------------------------------------------------------

    pub fn emit(&mut self, ctx: &mut CaptureContext, sink: &mut dyn DeltaSink) -> bool {
        if self.frozen || self.locked {
            return false;
        }
        for node in self.unregister_now.drain(..) {
            ctx.mirror.remove(node);
        }

        let deadline = Instant::now() + self.config.resolve_budget;
        let mut adds = Vec::new();
        let mut pending: Vec<NodeRef> = Vec::new();

        let moved: Vec<NodeRef> = self.moved.clone();
        for node in moved {
            if !self.moved_set.contains(&node) {
                continue;
            }
            self.push_or_defer(ctx, node, &mut adds, &mut pending);
        }
        let added: Vec<NodeRef> = self.added.clone();
        for node in added {
            if !self.added_set.contains(&node) || self.dropped.contains(&node) {
                continue;
            }
            self.push_or_defer(ctx, node, &mut adds, &mut pending);
        }

        // Rescan the pending list from its tail; entries become resolvable
        // as earlier passes hand out ids. A pass without progress, or the
        // wall-clock budget, ends the loop.
        let mut timed_out = false;
        while !pending.is_empty() && !timed_out {
            let mut progress = false;
            let mut i = pending.len();
            while i > 0 {
                i -= 1;
                if Instant::now() >= deadline {
                    timed_out = true;
                    break;
                }
                match self.try_serialize_add(ctx, pending[i]) {
                    SerializeOutcome::Ready(mutation) => {
                        adds.push(mutation);
                        pending.remove(i);
                        progress = true;
                    }
                    SerializeOutcome::Skip => {
                        pending.remove(i);
                        progress = true;
                    }
                    SerializeOutcome::NotReady => {}
                }
            }
            if !progress {
                break;
            }
        }
        if !pending.is_empty() {
            log::warn!(
                target: "record.mutation",
                "session {}: discarding {} unresolvable pending adds (timed_out={})",
                ctx.session,
                pending.len(),
                timed_out
            );
        }

        let texts: Vec<TextMutation> = self
            .texts
            .iter()
            .filter(|c| !self.ancestor_removed(ctx, c.target) && !self.dropped.contains(&c.target))
            .filter_map(|c| {
                let id = ctx.mirror.get_id(c.target)?;
                Some(TextMutation {
                    id,
                    value: c.value.clone(),
                })
            })
            .collect();
        let attributes: Vec<AttributeMutation> = self
            .attributes
            .iter()
            .filter(|c| !self.ancestor_removed(ctx, c.target) && !self.dropped.contains(&c.target))
            .filter_map(|c| {
                let id = ctx.mirror.get_id(c.target)?;
                Some(AttributeMutation {
                    id,
                    attributes: c.attributes.clone(),
                })
            })
            .collect();

        let delta = Delta {
            adds,
            removes: std::mem::take(&mut self.removes),
            texts,
            attributes,
        };
        let emitted = !delta.is_empty();
        self.clear_cycle();
        if emitted {
            self.seq += 1;
            log::debug!(
                target: "record.mutation",
                "session {}: emit #{} adds={} removes={} texts={} attributes={}",
                ctx.session,
                self.seq,
                delta.adds.len(),
                delta.removes.len(),
                delta.texts.len(),
                delta.attributes.len()
            );
            sink.emit(delta);
        }
        emitted
    }

    fn push_or_defer(
        &mut self,
        ctx: &mut CaptureContext,
        node: NodeRef,
        adds: &mut Vec<AddedNodeMutation>,
        pending: &mut Vec<NodeRef>,
    ) {
        match self.try_serialize_add(ctx, node) {
            SerializeOutcome::Ready(mutation) => adds.push(mutation),
            SerializeOutcome::NotReady => pending.push(node),
            SerializeOutcome::Skip => {}
        }
    }

    fn try_serialize_add(&mut self, ctx: &mut CaptureContext, node: NodeRef) -> SerializeOutcome {
        if !ctx.tree.is_live(node) {
            return SerializeOutcome::Skip;
        }
        let Some(parent) = ctx.tree.parent(node) else {
            log::debug!(target: "record.mutation", "pending add lost its parent");
            return SerializeOutcome::Skip;
        };
        let Some(parent_id) = self.parent_id_for(ctx, parent) else {
            return SerializeOutcome::NotReady;
        };
        let next_id = match ctx.tree.next_sibling(node) {
            Some(sibling) => match ctx.mirror.get_id(sibling) {
                Some(id) => Some(id),
                None => return SerializeOutcome::NotReady,
            },
            None => None,
        };
        let previous_id = ctx
            .tree
            .previous_sibling(node)
            .and_then(|s| ctx.mirror.get_id(s));
        let Some(serialized) = ctx.serialize(node) else {
            return SerializeOutcome::Skip;
        };
        SerializeOutcome::Ready(AddedNodeMutation {
            parent_id,
            next_id,
            previous_id,
            node: serialized,
        })
    }

    fn clear_cycle(&mut self) {
        self.texts.clear();
        self.text_index.clear();
        self.attributes.clear();
        self.attr_index.clear();
        self.added.clear();
        self.added_set.clear();
        self.moved.clear();
        self.moved_set.clear();
        self.moved_edges.clear();
        self.removes.clear();
        self.removed_targets.clear();
        self.dropped.clear();
        self.unregister_now.append(&mut self.unregister_next);
    }

    // ---- freeze / lock ---------------------------------------------------

    pub fn freeze(&mut self) {
        self.frozen = true;
        if let Some(canvas) = &mut self.canvas {
            canvas.freeze();
        }
    }

    pub fn unfreeze(&mut self, ctx: &mut CaptureContext, sink: &mut dyn DeltaSink) {
        self.frozen = false;
        if let Some(canvas) = &mut self.canvas {
            canvas.unfreeze();
        }
        self.emit(ctx, sink);
    }

    pub fn lock(&mut self) {
        self.locked = true;
        if let Some(canvas) = &mut self.canvas {
            canvas.lock();
        }
    }

    pub fn unlock(&mut self, ctx: &mut CaptureContext, sink: &mut dyn DeltaSink) {
        self.locked = false;
        if let Some(canvas) = &mut self.canvas {
            canvas.unlock();
        }
        self.emit(ctx, sink);
    }

    pub fn reset(&mut self) {
        self.clear_cycle();
        self.unregister_now.clear();
        self.unregister_next.clear();
        if let Some(canvas) = &mut self.canvas {
            canvas.reset();
        }
    }
}

impl Default for MutationBuffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}
