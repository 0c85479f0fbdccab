//! Arena-backed host-tree stand-in.
//!
//! Contract:
//! - `NodeRef` values are never reused within a `Tree`'s lifetime; removing
//!   a subtree tombstones its slots.
//! - Shadow roots and sub-document roots keep an arena `parent` link to
//!   their host/frame element but do not appear in its child list, so
//!   attachment walks are plain parent-chain walks.
//! - Detaching a node resets scroll offsets and runtime sheet rules in the
//!   detached subtree, matching host behavior.
//! - Structural ops validate kind, liveness, cycles and sibling membership
//!   and return `TreeError` instead of panicking.

use crate::node::Node;
use crate::style::{StyleDeclaration, parse_inline_style, render_inline_style};
use core_types::DialogState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(u32);

impl NodeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    MissingNode(NodeRef),
    WrongKind(NodeRef),
    NotAChild { parent: NodeRef, child: NodeRef },
    CycleDetected { parent: NodeRef, child: NodeRef },
    AlreadyParented(NodeRef),
    InvalidSibling { parent: NodeRef, sibling: NodeRef },
    InvalidAttributeName(String),
    RuleIndexOutOfRange { node: NodeRef, index: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub attributes: Vec<(String, Option<String>)>,
    pub style: Vec<StyleDeclaration>,
    pub scroll_left: i32,
    pub scroll_top: i32,
    pub sheet: Vec<String>,
    pub dialog: Option<DialogState>,
    pub sub_document: Option<NodeRef>,
    pub shadow_root: Option<NodeRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document { doctype: Option<String> },
    Fragment,
    ShadowRoot,
    Element(Box<ElementData>),
    Text { text: String },
    Comment { text: String },
}

impl NodeKind {
    fn allows_children(&self) -> bool {
        matches!(
            self,
            NodeKind::Document { .. }
                | NodeKind::Fragment
                | NodeKind::ShadowRoot
                | NodeKind::Element(_)
        )
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

#[derive(Debug)]
struct Slot {
    data: NodeData,
    live: bool,
}

#[derive(Debug, Default)]
pub struct Tree {
    slots: Vec<Slot>,
}

impl Tree {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeRef {
        let index = self.slots.len();
        self.slots.push(Slot {
            data: NodeData {
                kind,
                parent: None,
                children: Vec::new(),
            },
            live: true,
        });
        NodeRef(index as u32)
    }

    pub fn create_document(&mut self, doctype: Option<String>) -> NodeRef {
        self.alloc(NodeKind::Document { doctype })
    }

    pub fn create_fragment(&mut self) -> NodeRef {
        self.alloc(NodeKind::Fragment)
    }

    pub fn create_element(&mut self, name: &str) -> NodeRef {
        self.alloc(NodeKind::Element(Box::new(ElementData {
            name: name.to_ascii_lowercase(),
            ..ElementData::default()
        })))
    }

    pub fn create_text(&mut self, text: &str) -> NodeRef {
        self.alloc(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeRef {
        self.alloc(NodeKind::Comment {
            text: text.to_string(),
        })
    }

    fn data(&self, node: NodeRef) -> Result<&NodeData, TreeError> {
        match self.slots.get(node.index()) {
            Some(slot) if slot.live => Ok(&slot.data),
            _ => Err(TreeError::MissingNode(node)),
        }
    }

    fn data_mut(&mut self, node: NodeRef) -> Result<&mut NodeData, TreeError> {
        match self.slots.get_mut(node.index()) {
            Some(slot) if slot.live => Ok(&mut slot.data),
            _ => Err(TreeError::MissingNode(node)),
        }
    }

    pub fn is_live(&self, node: NodeRef) -> bool {
        self.slots.get(node.index()).is_some_and(|s| s.live)
    }

    pub fn kind(&self, node: NodeRef) -> Result<&NodeKind, TreeError> {
        Ok(&self.data(node)?.kind)
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.data(node).ok().and_then(|d| d.parent)
    }

    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn element(&self, node: NodeRef) -> Result<&ElementData, TreeError> {
        match &self.data(node)?.kind {
            NodeKind::Element(data) => Ok(data),
            _ => Err(TreeError::WrongKind(node)),
        }
    }

    fn element_mut(&mut self, node: NodeRef) -> Result<&mut ElementData, TreeError> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Element(data) => Ok(data),
            _ => Err(TreeError::WrongKind(node)),
        }
    }

    pub fn name(&self, node: NodeRef) -> Option<&str> {
        self.element(node).ok().map(|e| e.name.as_str())
    }

    pub fn text(&self, node: NodeRef) -> Option<&str> {
        match &self.data(node).ok()?.kind {
            NodeKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_text(&self, node: NodeRef) -> bool {
        matches!(self.data(node), Ok(d) if matches!(d.kind, NodeKind::Text { .. }))
    }

    pub fn is_fragment(&self, node: NodeRef) -> bool {
        matches!(self.data(node), Ok(d) if matches!(d.kind, NodeKind::Fragment))
    }

    pub fn is_shadow_root(&self, node: NodeRef) -> bool {
        matches!(self.data(node), Ok(d) if matches!(d.kind, NodeKind::ShadowRoot))
    }

    // ---- structure -------------------------------------------------------

    fn check_attachable(
        &self,
        parent: NodeRef,
        child: NodeRef,
    ) -> Result<(), TreeError> {
        // A cycle can arrive in crafted wire input; it is host-level input,
        // not a programming error, so no assert here.
        if parent == child || self.is_descendant(child, parent) {
            return Err(TreeError::CycleDetected { parent, child });
        }
        if !self.data(parent)?.kind.allows_children() {
            return Err(TreeError::WrongKind(parent));
        }
        if self.data(child)?.parent.is_some() {
            return Err(TreeError::AlreadyParented(child));
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeRef, child: NodeRef) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        self.data_mut(parent)?.children.push(child);
        self.data_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeRef,
        child: NodeRef,
        before: NodeRef,
    ) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        let pos = self
            .data(parent)?
            .children
            .iter()
            .position(|c| *c == before)
            .ok_or(TreeError::InvalidSibling {
                parent,
                sibling: before,
            })?;
        self.data_mut(parent)?.children.insert(pos, child);
        self.data_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(
        &mut self,
        parent: NodeRef,
        child: NodeRef,
        after: NodeRef,
    ) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        let pos = self
            .data(parent)?
            .children
            .iter()
            .position(|c| *c == after)
            .ok_or(TreeError::InvalidSibling {
                parent,
                sibling: after,
            })?;
        self.data_mut(parent)?.children.insert(pos + 1, child);
        self.data_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from `parent` without destroying it. Scroll offsets
    /// and runtime sheet rules in the detached subtree are reset.
    pub fn detach(&mut self, parent: NodeRef, child: NodeRef) -> Result<(), TreeError> {
        let parent_data = self.data(parent)?;
        let Some(pos) = parent_data.children.iter().position(|c| *c == child) else {
            return Err(TreeError::NotAChild { parent, child });
        };
        self.data_mut(parent)?.children.remove(pos);
        self.data_mut(child)?.parent = None;
        self.reset_detached_state(child);
        Ok(())
    }

    fn reset_detached_state(&mut self, root: NodeRef) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let Ok(data) = self.data_mut(node) else {
                continue;
            };
            if let NodeKind::Element(element) = &mut data.kind {
                element.scroll_left = 0;
                element.scroll_top = 0;
                element.sheet.clear();
            }
            stack.extend(self.children(node).iter().copied());
        }
    }

    /// Move every child of `from` to the end of `to`'s child list,
    /// preserving order.
    pub fn move_children(&mut self, from: NodeRef, to: NodeRef) -> Result<(), TreeError> {
        let children: Vec<NodeRef> = self.data(from)?.children.clone();
        for child in children {
            self.detach(from, child)?;
            self.append_child(to, child)?;
        }
        Ok(())
    }

    /// Destroy `node` and its subtree (including shadow roots and
    /// sub-documents hanging off it), detaching from any parent first.
    /// Returns every destroyed ref so callers can clean up side tables.
    pub fn remove_subtree(&mut self, node: NodeRef) -> Result<Vec<NodeRef>, TreeError> {
        if let Some(parent) = self.data(node)?.parent {
            let _ = self.detach(parent, node);
        }
        let mut removed = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if !slot.live {
                continue;
            }
            slot.live = false;
            stack.extend(slot.data.children.drain(..));
            if let NodeKind::Element(element) = &slot.data.kind {
                stack.extend(element.shadow_root);
                stack.extend(element.sub_document);
            }
            removed.push(current);
        }
        Ok(removed)
    }

    // ---- content ---------------------------------------------------------

    pub fn set_text(&mut self, node: NodeRef, value: &str) -> Result<(), TreeError> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Text { text } => {
                text.clear();
                text.push_str(value);
                Ok(())
            }
            _ => Err(TreeError::WrongKind(node)),
        }
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<Option<&str>> {
        let element = self.element(node).ok()?;
        element
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    pub fn set_attribute(
        &mut self,
        node: NodeRef,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), TreeError> {
        if !is_valid_attribute_name(name) {
            return Err(TreeError::InvalidAttributeName(name.to_string()));
        }
        let element = self.element_mut(node)?;
        let value = value.map(str::to_string);
        if name == "style" {
            element.style = parse_inline_style(value.as_deref().unwrap_or(""));
        }
        if let Some(slot) = element.attributes.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            element.attributes.push((name.to_string(), value));
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeRef, name: &str) -> Result<bool, TreeError> {
        let element = self.element_mut(node)?;
        let before = element.attributes.len();
        element.attributes.retain(|(n, _)| n != name);
        if name == "style" {
            element.style.clear();
        }
        Ok(element.attributes.len() != before)
    }

    pub fn set_style_property(
        &mut self,
        node: NodeRef,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<(), TreeError> {
        let element = self.element_mut(node)?;
        if let Some(decl) = element.style.iter_mut().find(|d| d.name == name) {
            decl.value = value.to_string();
            decl.important = important;
        } else {
            element.style.push(StyleDeclaration {
                name: name.to_string(),
                value: value.to_string(),
                important,
            });
        }
        self.sync_style_attribute(node)
    }

    pub fn remove_style_property(&mut self, node: NodeRef, name: &str) -> Result<bool, TreeError> {
        let element = self.element_mut(node)?;
        let before = element.style.len();
        element.style.retain(|d| d.name != name);
        let changed = element.style.len() != before;
        if changed {
            self.sync_style_attribute(node)?;
        }
        Ok(changed)
    }

    fn sync_style_attribute(&mut self, node: NodeRef) -> Result<(), TreeError> {
        let element = self.element_mut(node)?;
        let rendered = render_inline_style(&element.style);
        let value = if rendered.is_empty() {
            element.attributes.retain(|(n, _)| n != "style");
            return Ok(());
        } else {
            Some(rendered)
        };
        if let Some(slot) = element.attributes.iter_mut().find(|(n, _)| n == "style") {
            slot.1 = value;
        } else {
            element.attributes.push(("style".to_string(), value));
        }
        Ok(())
    }

    pub fn style_property(&self, node: NodeRef, name: &str) -> Option<&StyleDeclaration> {
        self.element(node).ok()?.style.iter().find(|d| d.name == name)
    }

    pub fn scroll(&self, node: NodeRef) -> Option<(i32, i32)> {
        let element = self.element(node).ok()?;
        Some((element.scroll_left, element.scroll_top))
    }

    pub fn set_scroll(&mut self, node: NodeRef, left: i32, top: i32) -> Result<(), TreeError> {
        let element = self.element_mut(node)?;
        element.scroll_left = left;
        element.scroll_top = top;
        Ok(())
    }

    pub fn sheet(&self, node: NodeRef) -> Option<&[String]> {
        self.element(node).ok().map(|e| e.sheet.as_slice())
    }

    pub fn insert_sheet_rule(
        &mut self,
        node: NodeRef,
        rule: &str,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let element = self.element_mut(node)?;
        let at = index.unwrap_or(element.sheet.len());
        if at > element.sheet.len() {
            return Err(TreeError::RuleIndexOutOfRange { node, index: at });
        }
        element.sheet.insert(at, rule.to_string());
        Ok(())
    }

    pub fn delete_sheet_rule(&mut self, node: NodeRef, index: usize) -> Result<(), TreeError> {
        let element = self.element_mut(node)?;
        if index >= element.sheet.len() {
            return Err(TreeError::RuleIndexOutOfRange { node, index });
        }
        element.sheet.remove(index);
        Ok(())
    }

    pub fn dialog(&self, node: NodeRef) -> Option<DialogState> {
        self.element(node).ok().and_then(|e| e.dialog)
    }

    pub fn set_dialog(
        &mut self,
        node: NodeRef,
        state: Option<DialogState>,
    ) -> Result<(), TreeError> {
        self.element_mut(node)?.dialog = state;
        Ok(())
    }

    // ---- shadow / sub-document -------------------------------------------

    pub fn attach_shadow(&mut self, host: NodeRef) -> Result<NodeRef, TreeError> {
        if let Some(existing) = self.element(host)?.shadow_root {
            return Ok(existing);
        }
        let root = self.alloc(NodeKind::ShadowRoot);
        self.data_mut(root)?.parent = Some(host);
        self.element_mut(host)?.shadow_root = Some(root);
        Ok(root)
    }

    pub fn shadow_root(&self, host: NodeRef) -> Option<NodeRef> {
        self.element(host).ok()?.shadow_root
    }

    /// For a `ShadowRoot` node, the element hosting it.
    pub fn shadow_host(&self, root: NodeRef) -> Option<NodeRef> {
        if self.is_shadow_root(root) {
            self.parent(root)
        } else {
            None
        }
    }

    pub fn attach_sub_document(&mut self, frame: NodeRef, doc: NodeRef) -> Result<(), TreeError> {
        if !matches!(self.data(doc)?.kind, NodeKind::Document { .. }) {
            return Err(TreeError::WrongKind(doc));
        }
        if self.data(doc)?.parent.is_some() {
            return Err(TreeError::AlreadyParented(doc));
        }
        if let Some(old) = self.element(frame)?.sub_document {
            let _ = self.remove_subtree(old);
        }
        self.data_mut(doc)?.parent = Some(frame);
        self.element_mut(frame)?.sub_document = Some(doc);
        Ok(())
    }

    pub fn sub_document(&self, frame: NodeRef) -> Option<NodeRef> {
        self.element(frame).ok()?.sub_document
    }

    pub fn is_frame(&self, node: NodeRef) -> bool {
        self.element(node)
            .map(|e| e.sub_document.is_some() || e.name == "iframe")
            .unwrap_or(false)
    }

    // ---- queries ---------------------------------------------------------

    pub fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.parent(node)?;
        let children = self.children(parent);
        let pos = children.iter().position(|c| *c == node)?;
        children.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.parent(node)?;
        let children = self.children(parent);
        let pos = children.iter().position(|c| *c == node)?;
        pos.checked_sub(1).and_then(|p| children.get(p).copied())
    }

    pub fn root_of(&self, node: NodeRef) -> NodeRef {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// A node is attached when its parent chain ends at a `Document`.
    /// Fragment-rooted (virtualized) and free-floating nodes are not.
    pub fn is_attached(&self, node: NodeRef) -> bool {
        matches!(
            self.data(self.root_of(node)),
            Ok(d) if matches!(d.kind, NodeKind::Document { .. })
        )
    }

    /// Parent-chain containment check (shadow and sub-document links count).
    pub fn contains(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        let mut current = node;
        loop {
            if current == ancestor {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_descendant(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        ancestor != node && self.contains(ancestor, node)
    }

    /// Every live ref in the subtree, including shadow roots and
    /// sub-documents, in pre-order.
    pub fn subtree_refs(&self, root: NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.is_live(node) {
                continue;
            }
            out.push(node);
            if let Ok(element) = self.element(node) {
                stack.extend(element.sub_document);
                stack.extend(element.shadow_root);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Value snapshot of a subtree for comparisons and tests.
    pub fn materialize(&self, node: NodeRef) -> Result<Node, TreeError> {
        let data = self.data(node)?;
        let children = data
            .children
            .iter()
            .map(|c| self.materialize(*c))
            .collect::<Result<Vec<_>, _>>()?;
        let node = match &data.kind {
            NodeKind::Document { doctype } => Node::Document {
                doctype: doctype.clone(),
                children,
            },
            NodeKind::Fragment => Node::Fragment { children },
            NodeKind::ShadowRoot => Node::ShadowRoot { children },
            NodeKind::Element(element) => Node::Element {
                name: element.name.clone(),
                attributes: element.attributes.clone(),
                style: element.style.clone(),
                scroll: (element.scroll_left, element.scroll_top),
                sheet: element.sheet.clone(),
                dialog: element.dialog,
                shadow: match element.shadow_root {
                    Some(root) => Some(Box::new(self.materialize(root)?)),
                    None => None,
                },
                content_document: match element.sub_document {
                    Some(doc) => Some(Box::new(self.materialize(doc)?)),
                    None => None,
                },
                children,
            },
            NodeKind::Text { text } => Node::Text { text: text.clone() },
            NodeKind::Comment { text } => Node::Comment { text: text.clone() },
        };
        Ok(node)
    }
}

fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && c != '=' && c != '"' && c != '\'' && c != '>' && c != '/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_materialize() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("DIV");
        let text = tree.create_text("hi");
        tree.append_child(doc, div).unwrap();
        tree.append_child(div, text).unwrap();
        assert_eq!(tree.name(div), Some("div"));
        let Node::Document { children, .. } = tree.materialize(doc).unwrap() else {
            panic!("expected document");
        };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn insert_before_orders_children() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let a = tree.create_element("a");
        let b = tree.create_element("b");
        tree.append_child(doc, a).unwrap();
        tree.insert_before(doc, b, a).unwrap();
        assert_eq!(tree.children(doc), &[b, a]);
        assert_eq!(tree.next_sibling(b), Some(a));
        assert_eq!(tree.previous_sibling(a), Some(b));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let a = tree.create_element("a");
        let b = tree.create_element("b");
        tree.append_child(doc, a).unwrap();
        tree.append_child(a, b).unwrap();
        tree.detach(doc, a).unwrap();
        assert_eq!(
            tree.append_child(b, a),
            Err(TreeError::CycleDetected { parent: b, child: a })
        );
    }

    #[test]
    fn detach_of_non_child_errors() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let a = tree.create_element("a");
        assert_eq!(
            tree.detach(doc, a),
            Err(TreeError::NotAChild { parent: doc, child: a })
        );
    }

    #[test]
    fn detach_resets_scroll_and_sheet() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("div");
        let style = tree.create_element("style");
        tree.append_child(doc, div).unwrap();
        tree.append_child(div, style).unwrap();
        tree.set_scroll(div, 3, 40).unwrap();
        tree.insert_sheet_rule(style, "a { color: red }", None).unwrap();
        tree.detach(doc, div).unwrap();
        assert_eq!(tree.scroll(div), Some((0, 0)));
        assert_eq!(tree.sheet(style), Some(&[][..]));
    }

    #[test]
    fn style_attribute_stays_in_sync() {
        let mut tree = Tree::new();
        let div = tree.create_element("div");
        tree.set_attribute(div, "style", Some("color: red")).unwrap();
        assert_eq!(tree.style_property(div, "color").map(|d| d.value.as_str()), Some("red"));
        tree.set_style_property(div, "width", "4px", true).unwrap();
        let attr = tree.attribute(div, "style").unwrap().unwrap().to_string();
        let parsed = crate::style::parse_inline_style(&attr);
        assert!(parsed.iter().any(|d| d.name == "width" && d.important));
        tree.remove_style_property(div, "color").unwrap();
        tree.remove_style_property(div, "width").unwrap();
        assert_eq!(tree.attribute(div, "style"), None);
    }

    #[test]
    fn remove_subtree_tombstones_refs() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("div");
        let text = tree.create_text("x");
        tree.append_child(doc, div).unwrap();
        tree.append_child(div, text).unwrap();
        let removed = tree.remove_subtree(div).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!tree.is_live(div));
        assert!(!tree.is_live(text));
        assert!(tree.children(doc).is_empty());
    }

    #[test]
    fn shadow_root_attaches_outside_child_list() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let host = tree.create_element("div");
        tree.append_child(doc, host).unwrap();
        let root = tree.attach_shadow(host).unwrap();
        assert!(tree.children(host).is_empty());
        assert_eq!(tree.shadow_host(root), Some(host));
        assert!(tree.is_attached(root));
    }

    #[test]
    fn fragment_roots_are_not_attached() {
        let mut tree = Tree::new();
        let frag = tree.create_fragment();
        let div = tree.create_element("div");
        tree.append_child(frag, div).unwrap();
        assert!(!tree.is_attached(div));
        assert_eq!(tree.root_of(div), frag);
    }

    #[test]
    fn sub_document_links_to_frame() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let frame = tree.create_element("iframe");
        tree.append_child(doc, frame).unwrap();
        let inner = tree.create_document(None);
        tree.attach_sub_document(frame, inner).unwrap();
        assert_eq!(tree.sub_document(frame), Some(inner));
        assert!(tree.is_attached(inner));
        assert!(tree.is_frame(frame));
    }

    #[test]
    fn invalid_attribute_name_rejected() {
        let mut tree = Tree::new();
        let div = tree.create_element("div");
        assert!(matches!(
            tree.set_attribute(div, "bad name", Some("x")),
            Err(TreeError::InvalidAttributeName(_))
        ));
    }
}
