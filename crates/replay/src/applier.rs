//! Incremental delta applier.
//!
//! Consumes one `Delta` per step in the fixed category order
//! removes -> adds -> texts -> attributes. Adds that reference parents or
//! siblings not yet in the identity map are requeued into a pending forest
//! and resolved parent-first; whatever still cannot resolve is parked for
//! later deltas or dropped with a diagnostic. Structural writes under
//! detached parents are batched behind off-tree fragments and committed at
//! the explicit flush boundary.

use crate::caches::SideCaches;
use crate::resolve::PendingForest;
use core_types::DialogState;
use dom::mutation::{
    AddedNodeMutation, AttrValue, Delta, Id, RuleEdit, SerializedKind, SerializedNode, StyleProp,
};
use dom::tree::{NodeRef, Tree, TreeError};
use dom::Mirror;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// The replayed host tree and its identity map.
#[derive(Debug, Default)]
pub struct ReplayContext {
    pub tree: Tree,
    pub mirror: Mirror,
}

impl ReplayContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Batch structural writes under detached parents behind fragments.
    pub virtualize: bool,
    /// Wall-clock budget for one resolve pass over requeued adds.
    pub resolve_budget: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            virtualize: true,
            resolve_budget: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ApplyError {
    Tree(TreeError),
}

impl From<TreeError> for ApplyError {
    fn from(err: TreeError) -> Self {
        ApplyError::Tree(err)
    }
}

/// Non-fatal anomalies observed while applying. One entry per root cause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    NodeNotFound { id: Id, op: &'static str },
    UnresolvedAdd { id: Id, parent_id: Id },
    ResolveBudgetExhausted { dropped: usize },
    HostRejected { id: Id, op: &'static str },
}

enum AddOutcome {
    Applied,
    MissingParent,
    MissingSibling(Id),
}

/// Fate of a pending add that survived the resolve pass.
enum Fate {
    Park(Id),
    Drop { diagnose: bool },
}

#[derive(Debug, Default)]
pub struct Applier {
    config: ReplayConfig,
    /// Real parent -> (stand-in fragment, wire id currently pointing at it).
    virtual_by_real: HashMap<NodeRef, (NodeRef, Id)>,
    real_by_virtual: HashMap<NodeRef, NodeRef>,
    /// Adds parked until the keyed node id appears in the identity map.
    legacy_pending: HashMap<Id, Vec<AddedNodeMutation>>,
    /// Sub-document roots created before their frame element arrived.
    queued_documents: HashMap<Id, NodeRef>,
    caches: SideCaches,
    diagnostics: Vec<Diagnostic>,
}

impl Applier {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_virtual_parents(&self) -> bool {
        !self.virtual_by_real.is_empty()
    }

    fn note(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Fragment -> real redirect for write targets.
    fn backing(&self, node: NodeRef) -> NodeRef {
        self.real_by_virtual.get(&node).copied().unwrap_or(node)
    }

    fn under_fragment(&self, ctx: &ReplayContext, node: NodeRef) -> bool {
        ctx.tree.is_fragment(ctx.tree.root_of(node))
    }

    /// Apply one delta, then raise the flush boundary: many structural
    /// writes batched behind virtual parents collapse into one real attach
    /// per delta.
    pub fn apply(&mut self, ctx: &mut ReplayContext, delta: &Delta) -> Result<(), ApplyError> {
        self.apply_removes(ctx, delta)?;
        self.apply_adds(ctx, &delta.adds)?;
        self.apply_texts(ctx, delta);
        self.apply_attributes(ctx, delta);
        self.flush(ctx)
    }

    // ---- removes ---------------------------------------------------------

    fn apply_removes(&mut self, ctx: &mut ReplayContext, delta: &Delta) -> Result<(), ApplyError> {
        for removal in &delta.removes {
            let Some(mapped) = ctx.mirror.get(removal.id) else {
                if delta.removes.iter().any(|other| other.id == removal.parent_id) {
                    log::debug!(
                        target: "replay.applier",
                        "remove of {:?} skipped, its parent goes in the same delta",
                        removal.id
                    );
                } else {
                    self.note(Diagnostic::NodeNotFound {
                        id: removal.id,
                        op: "remove",
                    });
                }
                continue;
            };
            // A virtualized parent's id points at its fragment; destroying it
            // means destroying the real node and the fragment both.
            let (target, stub) = match self.real_by_virtual.get(&mapped) {
                Some(&real) => (real, Some(mapped)),
                None => (mapped, None),
            };
            if !ctx.tree.is_live(target) {
                continue;
            }
            self.caches.drop_subtree(&ctx.tree, target);

            // Honor the declared parent when it checks out; a stale one is
            // tolerated because remove_subtree unhooks from the actual one.
            let declared = if removal.is_shadow_root {
                ctx.mirror.get(removal.parent_id).and_then(|p| {
                    let host = self.backing(p);
                    ctx.tree.shadow_root(host)
                })
            } else {
                ctx.mirror.get(removal.parent_id)
            };
            if let Some(parent) = declared {
                match ctx.tree.detach(parent, target) {
                    Ok(()) => {}
                    Err(TreeError::NotAChild { .. }) | Err(TreeError::MissingNode(_)) => {
                        log::debug!(
                            target: "replay.applier",
                            "declared parent of {:?} is stale, detaching in place",
                            removal.id
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let mut destroyed = ctx.tree.remove_subtree(target)?;
            if let Some(stub) = stub {
                destroyed.extend(ctx.tree.remove_subtree(stub)?);
                self.real_by_virtual.remove(&stub);
                self.virtual_by_real.remove(&target);
            }
            let mut index = 0;
            while index < destroyed.len() {
                let node = destroyed[index];
                ctx.mirror.remove(node);
                // Fragments virtualizing descendants of the removed subtree
                // go with it, pending children included.
                if let Some((fragment, _)) = self.virtual_by_real.remove(&node) {
                    self.real_by_virtual.remove(&fragment);
                    self.caches.drop_subtree(&ctx.tree, fragment);
                    destroyed.extend(ctx.tree.remove_subtree(fragment)?);
                }
                index += 1;
            }
        }
        Ok(())
    }

    // ---- adds ------------------------------------------------------------

    fn apply_adds(
        &mut self,
        ctx: &mut ReplayContext,
        adds: &[AddedNodeMutation],
    ) -> Result<(), ApplyError> {
        let mut pending = Vec::new();
        for mutation in adds {
            match self.apply_add(ctx, mutation)? {
                AddOutcome::Applied => self.drain_parked(ctx, mutation.node.id)?,
                AddOutcome::MissingParent | AddOutcome::MissingSibling(_) => {
                    pending.push(mutation.clone());
                }
            }
        }
        if !pending.is_empty() {
            self.resolve_pending(ctx, pending)?;
        }
        Ok(())
    }

    fn apply_add(
        &mut self,
        ctx: &mut ReplayContext,
        mutation: &AddedNodeMutation,
    ) -> Result<AddOutcome, ApplyError> {
        let Some(mapped_parent) = ctx.mirror.get(mutation.parent_id) else {
            return Ok(AddOutcome::MissingParent);
        };
        if !ctx.tree.is_live(mapped_parent) {
            return Ok(AddOutcome::MissingParent);
        }
        let mut parent = mapped_parent;

        // A serialized shadow root attaches to its host out of band.
        if matches!(mutation.node.kind, SerializedKind::ShadowRoot) {
            let host = self.backing(parent);
            let root = match ctx.tree.attach_shadow(host) {
                Ok(root) => root,
                Err(TreeError::WrongKind(_)) => {
                    self.note(Diagnostic::HostRejected {
                        id: mutation.node.id,
                        op: "attachShadow",
                    });
                    return Ok(AddOutcome::Applied);
                }
                Err(err) => return Err(err.into()),
            };
            if ctx.mirror.get_id(root).is_none() && !ctx.mirror.has(mutation.node.id) {
                ctx.mirror.add(root, mutation.node.id);
            }
            return Ok(AddOutcome::Applied);
        }

        // Shadow children address their host element; route them into the
        // host's shadow root.
        if mutation.node.is_shadow
            && !ctx.tree.is_shadow_root(parent)
            && !ctx.tree.is_fragment(parent)
        {
            let host = self.backing(parent);
            match ctx.tree.attach_shadow(host) {
                Ok(root) => parent = root,
                Err(TreeError::WrongKind(_)) => {
                    self.note(Diagnostic::HostRejected {
                        id: mutation.node.id,
                        op: "attachShadow",
                    });
                    return Ok(AddOutcome::Applied);
                }
                Err(err) => return Err(err.into()),
            }
        }

        // A serialized document targeting a frame element becomes its
        // sub-document.
        if let SerializedKind::Document { .. } = mutation.node.kind {
            let frame = self.backing(parent);
            if ctx.tree.element(frame).is_ok() {
                let doc = self.construct(ctx, &mutation.node);
                ctx.tree.attach_sub_document(frame, doc)?;
                return Ok(AddOutcome::Applied);
            }
        }

        if self.config.virtualize
            && parent == mapped_parent
            && !ctx.tree.is_fragment(parent)
            && !ctx.tree.is_attached(parent)
            && !ctx.tree.is_fragment(ctx.tree.root_of(parent))
            && !self.skip_virtualize(ctx, parent, &mutation.node)
        {
            parent = self.virtualize_parent(ctx, mutation.parent_id, parent)?;
        }

        // A known nextId that is not yet mapped parks the add; a mapped one
        // living under a different parent is a stale hint and degrades to
        // append.
        let next = match mutation.next_id {
            Some(id) => match ctx.mirror.get(id) {
                None => return Ok(AddOutcome::MissingSibling(id)),
                Some(sibling) => {
                    let sibling = self.backing_sibling(sibling);
                    if ctx.tree.parent(sibling) == Some(parent) {
                        Some(sibling)
                    } else {
                        log::debug!(
                            target: "replay.applier",
                            "stale nextId {:?} for add {:?}, appending instead",
                            id,
                            mutation.node.id
                        );
                        None
                    }
                }
            },
            None => None,
        };
        let previous = mutation
            .previous_id
            .and_then(|id| ctx.mirror.get(id))
            .map(|sibling| self.backing_sibling(sibling))
            .filter(|sibling| ctx.tree.parent(*sibling) == Some(parent));

        // An id already in the map means the node moved; detach and reuse it
        // so identity survives the move.
        let node = match ctx.mirror.get(mutation.node.id) {
            Some(existing) if ctx.tree.is_live(existing) && !ctx.tree.is_fragment(existing) => {
                if let Some(old_parent) = ctx.tree.parent(existing) {
                    match ctx.tree.detach(old_parent, existing) {
                        Ok(()) | Err(TreeError::NotAChild { .. }) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                self.sync_serialized(ctx, existing, &mutation.node);
                existing
            }
            _ => self.construct(ctx, &mutation.node),
        };

        if next.is_none() && previous.is_none() && ctx.tree.is_text(node) {
            self.clear_stray_text(ctx, parent, node)?;
        }

        let inserted = if let Some(next) = next {
            ctx.tree.insert_before(parent, node, next)
        } else if let Some(previous) = previous {
            ctx.tree.insert_after(parent, node, previous)
        } else {
            ctx.tree.append_child(parent, node)
        };
        match inserted {
            Ok(()) => {}
            Err(
                TreeError::CycleDetected { .. }
                | TreeError::AlreadyParented(_)
                | TreeError::WrongKind(_)
                | TreeError::InvalidSibling { .. },
            ) => {
                log::warn!(
                    target: "replay.applier",
                    "host rejected insertion of {:?} under {:?}",
                    mutation.node.id,
                    mutation.parent_id
                );
                self.note(Diagnostic::HostRejected {
                    id: mutation.node.id,
                    op: "insert",
                });
                return Ok(AddOutcome::Applied);
            }
            Err(err) => return Err(err.into()),
        }

        // A frame arriving after its sub-document was queued claims it now.
        if let Some(doc) = self.queued_documents.remove(&mutation.node.id) {
            if ctx.tree.is_live(doc) && ctx.tree.element(node).is_ok() {
                ctx.tree.attach_sub_document(node, doc)?;
            }
        }
        Ok(AddOutcome::Applied)
    }

    /// Sibling hints may point at a virtualized parent; the node actually
    /// sitting in a child list is the real one.
    fn backing_sibling(&self, node: NodeRef) -> NodeRef {
        self.real_by_virtual.get(&node).copied().unwrap_or(node)
    }

    fn construct(&mut self, ctx: &mut ReplayContext, serialized: &SerializedNode) -> NodeRef {
        let node = match &serialized.kind {
            SerializedKind::Document { doctype } => ctx.tree.create_document(doctype.clone()),
            SerializedKind::ShadowRoot => {
                debug_assert!(false, "shadow roots attach to hosts, they are not constructed");
                ctx.tree.create_fragment()
            }
            SerializedKind::Element { tag, attributes, .. } => {
                let element = ctx.tree.create_element(tag);
                for (name, value) in attributes {
                    if ctx.tree.set_attribute(element, name, value.as_deref()).is_err() {
                        self.note(Diagnostic::HostRejected {
                            id: serialized.id,
                            op: "attribute",
                        });
                    }
                }
                element
            }
            SerializedKind::Text { value } => ctx.tree.create_text(value),
            SerializedKind::Comment { value } => ctx.tree.create_comment(value),
        };
        if ctx.mirror.has(serialized.id) {
            log::warn!(
                target: "replay.applier",
                "id {:?} already mapped, repointing at the new node",
                serialized.id
            );
            ctx.mirror.replace(serialized.id, node);
        } else {
            ctx.mirror.add(node, serialized.id);
        }
        node
    }

    /// Refresh a reused (moved) node from its serialized form.
    fn sync_serialized(
        &mut self,
        ctx: &mut ReplayContext,
        node: NodeRef,
        serialized: &SerializedNode,
    ) {
        match &serialized.kind {
            SerializedKind::Element { attributes, .. } => {
                let stale: Vec<String> = match ctx.tree.element(node) {
                    Ok(element) => element
                        .attributes
                        .iter()
                        .map(|(name, _)| name.clone())
                        .filter(|name| !attributes.iter().any(|(other, _)| other == name))
                        .collect(),
                    Err(_) => Vec::new(),
                };
                for name in stale {
                    let _ = ctx.tree.remove_attribute(node, &name);
                }
                for (name, value) in attributes {
                    if ctx.tree.set_attribute(node, name, value.as_deref()).is_err() {
                        self.note(Diagnostic::HostRejected {
                            id: serialized.id,
                            op: "attribute",
                        });
                    }
                }
            }
            SerializedKind::Text { value } => {
                let _ = ctx.tree.set_text(node, value);
            }
            _ => {}
        }
    }

    /// Single-value text containers keep exactly one text child; appending a
    /// fresh one drops whatever stray text the snapshot left behind.
    fn clear_stray_text(
        &mut self,
        ctx: &mut ReplayContext,
        parent: NodeRef,
        incoming: NodeRef,
    ) -> Result<(), ApplyError> {
        if !matches!(ctx.tree.name(parent), Some("textarea" | "title" | "option")) {
            return Ok(());
        }
        for stray in ctx.tree.children(parent).to_vec() {
            if stray != incoming && ctx.tree.is_text(stray) {
                for node in ctx.tree.remove_subtree(stray)? {
                    ctx.mirror.remove(node);
                }
            }
        }
        Ok(())
    }

    fn skip_virtualize(
        &self,
        ctx: &ReplayContext,
        parent: NodeRef,
        node: &SerializedNode,
    ) -> bool {
        // Frames resist reparenting: never virtualize a parent that owns a
        // sub-document, sits next to a frame, or receives a style element
        // while holding frames.
        if ctx.tree.sub_document(parent).is_some() {
            return true;
        }
        if let Some(grandparent) = ctx.tree.parent(parent) {
            if ctx
                .tree
                .children(grandparent)
                .iter()
                .any(|c| ctx.tree.is_frame(*c))
            {
                return true;
            }
        }
        if matches!(&node.kind, SerializedKind::Element { tag, .. } if tag == "style")
            && ctx.tree.children(parent).iter().any(|c| ctx.tree.is_frame(*c))
        {
            return true;
        }
        false
    }

    /// Install a fragment in the identity map in `parent`'s place and move
    /// its current children into it. Scroll offsets and live sheet rules are
    /// snapshotted into the side caches first, since detaching resets them.
    fn virtualize_parent(
        &mut self,
        ctx: &mut ReplayContext,
        parent_id: Id,
        parent: NodeRef,
    ) -> Result<NodeRef, ApplyError> {
        let fragment = ctx.tree.create_fragment();
        for child in ctx.tree.children(parent).to_vec() {
            for node in ctx.tree.subtree_refs(child) {
                if let Some((left, top)) = ctx.tree.scroll(node) {
                    if (left, top) != (0, 0) {
                        self.caches.scroll.entry(node).or_insert((left, top));
                    }
                }
                if let Some(rules) = ctx.tree.sheet(node) {
                    if !rules.is_empty() {
                        let snapshot: Vec<RuleEdit> = rules
                            .iter()
                            .map(|rule| RuleEdit::Insert {
                                rule: rule.clone(),
                                index: None,
                            })
                            .collect();
                        let journal = self.caches.style_journal.entry(node).or_default();
                        for (position, edit) in snapshot.into_iter().enumerate() {
                            journal.insert(position, edit);
                        }
                    }
                }
            }
        }
        ctx.tree.move_children(parent, fragment)?;
        ctx.mirror.replace(parent_id, fragment);
        self.virtual_by_real.insert(parent, (fragment, parent_id));
        self.real_by_virtual.insert(fragment, parent);
        log::debug!(
            target: "replay.applier",
            "virtualized parent {:?} behind a fragment",
            parent_id
        );
        Ok(fragment)
    }

    // ---- pending resolution ----------------------------------------------

    fn resolve_pending(
        &mut self,
        ctx: &mut ReplayContext,
        pending: Vec<AddedNodeMutation>,
    ) -> Result<(), ApplyError> {
        let deadline = Instant::now() + self.config.resolve_budget;
        let forest = PendingForest::new(pending);
        let mut remaining: Vec<usize> = (0..forest.len()).collect();
        let mut missing_sibling: HashMap<usize, Id> = HashMap::new();
        let mut timed_out = false;

        // Each round rescans the tail; applying a parent unlocks its
        // children in the next round, so progress is monotone.
        loop {
            let mut progress = false;
            let mut next_round = Vec::with_capacity(remaining.len());
            for index in remaining {
                if Instant::now() >= deadline {
                    timed_out = true;
                    next_round.push(index);
                    continue;
                }
                let mutation = forest.mutation(index);
                match self.apply_add(ctx, mutation)? {
                    AddOutcome::Applied => {
                        progress = true;
                        missing_sibling.remove(&index);
                        let id = mutation.node.id;
                        self.drain_parked(ctx, id)?;
                    }
                    AddOutcome::MissingParent => {
                        missing_sibling.remove(&index);
                        next_round.push(index);
                    }
                    AddOutcome::MissingSibling(id) => {
                        missing_sibling.insert(index, id);
                        next_round.push(index);
                    }
                }
            }
            remaining = next_round;
            if remaining.is_empty() || timed_out || !progress {
                break;
            }
        }
        if remaining.is_empty() {
            return Ok(());
        }

        let remaining_set: HashSet<usize> = remaining.iter().copied().collect();
        let mut fate: HashMap<usize, Fate> = HashMap::new();
        for &index in &remaining {
            if let Some(&sibling) = missing_sibling.get(&index) {
                fate.insert(index, Fate::Park(sibling));
            }
        }
        // Propagate fates down cascades: children of a parked parent park on
        // that parent's id, children of a dropped parent drop silently.
        loop {
            let mut changed = false;
            for &index in &remaining {
                if fate.contains_key(&index) {
                    continue;
                }
                let resolved = match forest.parent_index(index) {
                    None => Some(Fate::Drop { diagnose: true }),
                    Some(parent) if !remaining_set.contains(&parent) => {
                        // Parent applied but the budget ran out before this
                        // record's retry; covered by the budget diagnostic.
                        Some(Fate::Drop { diagnose: false })
                    }
                    Some(parent) => match fate.get(&parent) {
                        Some(Fate::Park(_)) => {
                            Some(Fate::Park(forest.mutation(index).parent_id))
                        }
                        Some(Fate::Drop { .. }) => Some(Fate::Drop { diagnose: false }),
                        None => None,
                    },
                };
                if let Some(resolved) = resolved {
                    fate.insert(index, resolved);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut parked = 0usize;
        let mut cycle_witness: Option<usize> = None;
        for &index in &remaining {
            let mutation = forest.mutation(index);
            match fate.get(&index) {
                Some(Fate::Park(key)) => {
                    parked += 1;
                    log::debug!(
                        target: "replay.resolve",
                        "parking add {:?} until {:?} arrives",
                        mutation.node.id,
                        key
                    );
                    self.legacy_pending
                        .entry(*key)
                        .or_default()
                        .push(mutation.clone());
                }
                Some(Fate::Drop { diagnose: true }) => {
                    log::warn!(
                        target: "replay.resolve",
                        "dropping add {:?}: parent {:?} never resolved",
                        mutation.node.id,
                        mutation.parent_id
                    );
                    self.note(Diagnostic::UnresolvedAdd {
                        id: mutation.node.id,
                        parent_id: mutation.parent_id,
                    });
                }
                Some(Fate::Drop { diagnose: false }) => {
                    log::debug!(
                        target: "replay.resolve",
                        "dropping add {:?} under unresolved parent {:?}",
                        mutation.node.id,
                        mutation.parent_id
                    );
                }
                // Records left without a fate form a parent cycle; surface
                // the group through one representative.
                None => cycle_witness = cycle_witness.or(Some(index)),
            }
        }
        if let Some(index) = cycle_witness {
            let mutation = forest.mutation(index);
            log::warn!(
                target: "replay.resolve",
                "dropping cyclic pending adds rooted at {:?}",
                mutation.node.id
            );
            self.note(Diagnostic::UnresolvedAdd {
                id: mutation.node.id,
                parent_id: mutation.parent_id,
            });
        }
        if timed_out {
            self.note(Diagnostic::ResolveBudgetExhausted {
                dropped: remaining.len() - parked,
            });
        }
        Ok(())
    }

    /// Re-run adds parked behind `id` now that it exists. Newly applied ones
    /// unlock their own waiters in turn.
    fn drain_parked(&mut self, ctx: &mut ReplayContext, id: Id) -> Result<(), ApplyError> {
        let Some(waiters) = self.legacy_pending.remove(&id) else {
            return Ok(());
        };
        log::debug!(
            target: "replay.resolve",
            "resolving {} parked adds behind {:?}",
            waiters.len(),
            id
        );
        let mut queue: VecDeque<AddedNodeMutation> = waiters.into();
        while let Some(mutation) = queue.pop_front() {
            match self.apply_add(ctx, &mutation)? {
                AddOutcome::Applied => {
                    if let Some(more) = self.legacy_pending.remove(&mutation.node.id) {
                        queue.extend(more);
                    }
                }
                AddOutcome::MissingSibling(sibling) => {
                    self.legacy_pending
                        .entry(sibling)
                        .or_default()
                        .push(mutation);
                }
                AddOutcome::MissingParent => {
                    self.note(Diagnostic::UnresolvedAdd {
                        id: mutation.node.id,
                        parent_id: mutation.parent_id,
                    });
                }
            }
        }
        Ok(())
    }

    // ---- texts / attributes ----------------------------------------------

    fn apply_texts(&mut self, ctx: &mut ReplayContext, delta: &Delta) {
        for text in &delta.texts {
            let Some(node) = ctx.mirror.get(text.id) else {
                if !delta.removes.iter().any(|r| r.id == text.id) {
                    self.note(Diagnostic::NodeNotFound {
                        id: text.id,
                        op: "text",
                    });
                }
                continue;
            };
            let node = self.backing(node);
            if ctx.tree.set_text(node, &text.value).is_err() {
                self.note(Diagnostic::HostRejected {
                    id: text.id,
                    op: "text",
                });
            }
        }
    }

    fn apply_attributes(&mut self, ctx: &mut ReplayContext, delta: &Delta) {
        for mutation in &delta.attributes {
            let Some(node) = ctx.mirror.get(mutation.id) else {
                if !delta.removes.iter().any(|r| r.id == mutation.id) {
                    self.note(Diagnostic::NodeNotFound {
                        id: mutation.id,
                        op: "attribute",
                    });
                }
                continue;
            };
            let node = self.backing(node);
            for (name, value) in &mutation.attributes {
                let result = match value {
                    None => ctx.tree.remove_attribute(node, name).map(|_| ()),
                    Some(AttrValue::Text(text)) => {
                        ctx.tree.set_attribute(node, name, Some(text))
                    }
                    Some(AttrValue::Style(properties)) => {
                        self.apply_style_attr(ctx, node, properties);
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    log::warn!(
                        target: "replay.applier",
                        "host rejected attribute {:?} on {:?}: {:?}",
                        name,
                        mutation.id,
                        err
                    );
                    self.note(Diagnostic::HostRejected {
                        id: mutation.id,
                        op: "attribute",
                    });
                }
            }
        }
    }

    fn apply_style_attr(
        &mut self,
        ctx: &mut ReplayContext,
        node: NodeRef,
        properties: &std::collections::BTreeMap<String, StyleProp>,
    ) {
        for (property, value) in properties {
            let result = match value {
                StyleProp::Cleared(_) => {
                    ctx.tree.remove_style_property(node, property).map(|_| ())
                }
                StyleProp::Value(v) => ctx.tree.set_style_property(node, property, v, false),
                StyleProp::WithPriority(v, priority) => {
                    ctx.tree
                        .set_style_property(node, property, v, priority == "important")
                }
            };
            if result.is_err() {
                self.note(Diagnostic::HostRejected {
                    id: ctx.mirror.get_id(node).unwrap_or(Id(0)),
                    op: "style",
                });
            }
        }
    }

    // ---- side channel ----------------------------------------------------

    pub fn apply_scroll(&mut self, ctx: &mut ReplayContext, id: Id, left: i32, top: i32) {
        let Some(mapped) = ctx.mirror.get(id) else {
            self.note(Diagnostic::NodeNotFound { id, op: "scroll" });
            return;
        };
        let node = self.backing(mapped);
        if self.under_fragment(ctx, node) {
            self.caches.scroll.insert(node, (left, top));
        } else if ctx.tree.set_scroll(node, left, top).is_err() {
            self.note(Diagnostic::HostRejected { id, op: "scroll" });
        }
    }

    pub fn apply_style_rule(&mut self, ctx: &mut ReplayContext, id: Id, edits: &[RuleEdit]) {
        let Some(mapped) = ctx.mirror.get(id) else {
            self.note(Diagnostic::NodeNotFound {
                id,
                op: "styleSheetRule",
            });
            return;
        };
        let node = self.backing(mapped);
        if self.under_fragment(ctx, node) {
            self.caches.journal_rules(node, edits.iter().cloned());
            return;
        }
        for edit in edits {
            let result = match edit {
                RuleEdit::Insert { rule, index } => ctx.tree.insert_sheet_rule(node, rule, *index),
                RuleEdit::Delete { index } => ctx.tree.delete_sheet_rule(node, *index),
            };
            if let Err(err) = result {
                log::warn!(
                    target: "replay.applier",
                    "sheet edit on {:?} rejected: {:?}",
                    id,
                    err
                );
                self.note(Diagnostic::HostRejected {
                    id,
                    op: "styleSheetRule",
                });
            }
        }
    }

    pub fn apply_dialog(&mut self, ctx: &mut ReplayContext, id: Id, state: Option<DialogState>) {
        let Some(mapped) = ctx.mirror.get(id) else {
            self.note(Diagnostic::NodeNotFound { id, op: "dialog" });
            return;
        };
        let node = self.backing(mapped);
        if self.under_fragment(ctx, node) {
            self.caches.dialog.insert(node, state);
        } else if ctx.tree.set_dialog(node, state).is_err() {
            self.note(Diagnostic::HostRejected { id, op: "dialog" });
        }
    }

    // ---- flush / lifecycle -----------------------------------------------

    /// Commit every virtualized parent: move the batched children back, point
    /// the identity map at the real node again and replay the side caches.
    pub fn flush(&mut self, ctx: &mut ReplayContext) -> Result<(), ApplyError> {
        if !self.virtual_by_real.is_empty() {
            let mut parents: Vec<(NodeRef, NodeRef, Id)> = self
                .virtual_by_real
                .drain()
                .map(|(real, (fragment, id))| (real, fragment, id))
                .collect();
            self.real_by_virtual.clear();
            parents.sort_by_key(|(real, _, _)| *real);
            for (real, fragment, id) in parents {
                if !ctx.tree.is_live(fragment) {
                    continue;
                }
                if ctx.tree.is_live(real) {
                    ctx.tree.move_children(fragment, real)?;
                    ctx.mirror.replace(id, real);
                    let _ = ctx.tree.remove_subtree(fragment);
                    log::debug!(target: "replay.applier", "flushed virtual parent {:?}", id);
                } else {
                    for node in ctx.tree.remove_subtree(fragment)? {
                        ctx.mirror.remove(node);
                    }
                }
            }
        }
        for (node, (left, top)) in std::mem::take(&mut self.caches.scroll) {
            if ctx.tree.is_live(node) {
                let _ = ctx.tree.set_scroll(node, left, top);
            }
        }
        for (node, edits) in std::mem::take(&mut self.caches.style_journal) {
            if !ctx.tree.is_live(node) {
                continue;
            }
            for edit in edits {
                let result = match edit {
                    RuleEdit::Insert { rule, index } => {
                        ctx.tree.insert_sheet_rule(node, &rule, index)
                    }
                    RuleEdit::Delete { index } => ctx.tree.delete_sheet_rule(node, index),
                };
                if let Err(err) = result {
                    log::warn!(
                        target: "replay.applier",
                        "journaled sheet edit rejected at flush: {:?}",
                        err
                    );
                }
            }
        }
        for (node, state) in std::mem::take(&mut self.caches.dialog) {
            if ctx.tree.is_live(node) {
                let _ = ctx.tree.set_dialog(node, state);
            }
        }
        Ok(())
    }

    /// Create (or queue) the root document for a frame that navigated.
    pub fn queue_new_document(
        &mut self,
        ctx: &mut ReplayContext,
        frame_id: Id,
    ) -> Result<NodeRef, ApplyError> {
        if let Some(frame) = ctx.mirror.get(frame_id) {
            let frame = self.backing(frame);
            if ctx.tree.element(frame).is_ok() {
                let doc = ctx.tree.create_document(None);
                ctx.tree.attach_sub_document(frame, doc)?;
                return Ok(doc);
            }
        }
        let doc = ctx.tree.create_document(None);
        self.queued_documents.insert(frame_id, doc);
        Ok(doc)
    }

    /// Drop all incremental state ahead of a full-snapshot rebuild.
    pub fn reset(&mut self, ctx: &mut ReplayContext) {
        ctx.mirror.reset();
        self.virtual_by_real.clear();
        self.real_by_virtual.clear();
        self.legacy_pending.clear();
        self.queued_documents.clear();
        self.caches.clear();
        self.diagnostics.clear();
        log::debug!(target: "replay.applier", "applier state reset for full-snapshot rebuild");
    }
}
