//! Live node -> serialized form, with policy hooks.
//!
//! The serializer owns the capture-side policy surface: masking transforms,
//! the block predicate, and the registrar notified when sub-document or
//! shadow-hosting nodes are serialized. Children are always omitted; a
//! subtree arrives as one add per node.

use crate::mirror::{IdGen, Mirror};
use crate::mutation::{Id, SerializedKind, SerializedNode};
use crate::tree::{NodeRef, Tree};
use core_types::TreeScope;

/// Caller-supplied pure redaction transforms.
#[derive(Default)]
pub struct Masker {
    pub text: Option<Box<dyn Fn(&str) -> String>>,
    pub input_value: Option<Box<dyn Fn(&str) -> String>>,
    pub image_attr: Option<Box<dyn Fn(&str, &str) -> String>>,
}

impl Masker {
    pub fn mask_text(&self, value: &str) -> String {
        match &self.text {
            Some(f) => f(value),
            None => value.to_string(),
        }
    }

    pub fn mask_attribute(&self, tag: &str, name: &str, value: &str) -> String {
        if name == "value" && is_input_like(tag) {
            if let Some(f) = &self.input_value {
                return f(value);
            }
        }
        if tag == "img" {
            if let Some(f) = &self.image_attr {
                return f(name, value);
            }
        }
        value.to_string()
    }
}

fn is_input_like(tag: &str) -> bool {
    matches!(tag, "input" | "textarea" | "select" | "option")
}

/// Notified synchronously when a qualifying node is serialized.
pub trait AttachRegistrar {
    fn register(&mut self, _scope: TreeScope, _node: NodeRef, _id: Id) {}
    /// On-load hook for sub-documents.
    fn sub_document_loaded(&mut self, _frame: NodeRef, _id: Id) {}
}

pub struct NoopRegistrar;

impl AttachRegistrar for NoopRegistrar {}

pub type BlockPolicy = Box<dyn Fn(&Tree, NodeRef) -> bool>;

pub struct Serializer {
    pub masker: Masker,
    pub block: Option<BlockPolicy>,
    pub registrar: Box<dyn AttachRegistrar>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self {
            masker: Masker::default(),
            block: None,
            registrar: Box::new(NoopRegistrar),
        }
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy check for the node itself.
    pub fn is_blocked(&self, tree: &Tree, node: NodeRef) -> bool {
        self.block.as_ref().is_some_and(|f| f(tree, node))
    }

    /// Policy check including ancestors; a blocked ancestor blocks the
    /// whole subtree.
    pub fn is_blocked_up(&self, tree: &Tree, node: NodeRef) -> bool {
        let Some(block) = self.block.as_ref() else {
            return false;
        };
        let mut current = Some(node);
        while let Some(n) = current {
            if block(tree, n) {
                return true;
            }
            current = tree.parent(n);
        }
        false
    }

    /// Serialize one node, assigning an id if it has none. Returns `None`
    /// for policy-filtered nodes.
    pub fn serialize(
        &mut self,
        tree: &Tree,
        node: NodeRef,
        mirror: &mut Mirror,
        ids: &mut IdGen,
    ) -> Option<SerializedNode> {
        if self.is_blocked(tree, node) {
            log::trace!(target: "dom.serialize", "node {node:?} blocked from serialization");
            return None;
        }
        let id = match mirror.get_id(node) {
            Some(id) => id,
            None => {
                let id = ids.next_id();
                mirror.add(node, id);
                id
            }
        };
        let is_shadow = tree
            .parent(node)
            .is_some_and(|p| tree.is_shadow_root(p));
        let kind = match tree.kind(node).ok()? {
            crate::tree::NodeKind::Document { doctype } => SerializedKind::Document {
                doctype: doctype.clone(),
            },
            crate::tree::NodeKind::ShadowRoot => SerializedKind::ShadowRoot,
            crate::tree::NodeKind::Element(element) => {
                let attributes = element
                    .attributes
                    .iter()
                    .map(|(name, value)| {
                        let masked = value
                            .as_deref()
                            .map(|v| self.masker.mask_attribute(&element.name, name, v));
                        (name.clone(), masked)
                    })
                    .collect();
                SerializedKind::Element {
                    tag: element.name.clone(),
                    attributes,
                    is_frame: tree.is_frame(node),
                }
            }
            crate::tree::NodeKind::Text { text } => SerializedKind::Text {
                value: self.masker.mask_text(text),
            },
            crate::tree::NodeKind::Comment { text } => SerializedKind::Comment {
                value: text.clone(),
            },
            crate::tree::NodeKind::Fragment => return None,
        };
        match &kind {
            SerializedKind::Element { is_frame: true, .. } => {
                self.registrar.register(TreeScope::SubDocument, node, id);
            }
            SerializedKind::Element { .. } if tree.shadow_root(node).is_some() => {
                self.registrar.register(TreeScope::ShadowRoot, node, id);
            }
            SerializedKind::ShadowRoot => {
                self.registrar.register(TreeScope::ShadowRoot, node, id);
            }
            SerializedKind::Document { .. } if tree.parent(node).is_some() => {
                self.registrar.sub_document_loaded(tree.parent(node)?, id);
            }
            _ => {}
        }
        Some(SerializedNode {
            id,
            kind,
            is_shadow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::{IdGen, Mirror};
    use crate::tree::Tree;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> (Tree, Mirror, IdGen) {
        (Tree::new(), Mirror::new(), IdGen::new())
    }

    #[test]
    fn serialize_assigns_and_reuses_ids() {
        let (mut tree, mut mirror, mut ids) = session();
        let div = tree.create_element("div");
        let mut ser = Serializer::new();
        let first = ser.serialize(&tree, div, &mut mirror, &mut ids).unwrap();
        let second = ser.serialize(&tree, div, &mut mirror, &mut ids).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(mirror.get(first.id), Some(div));
    }

    #[test]
    fn blocked_nodes_serialize_to_none() {
        let (mut tree, mut mirror, mut ids) = session();
        let div = tree.create_element("div");
        tree.set_attribute(div, "class", Some("blocked")).unwrap();
        let mut ser = Serializer::new();
        ser.block = Some(Box::new(|tree, node| {
            tree.attribute(node, "class").flatten() == Some("blocked")
        }));
        assert!(ser.serialize(&tree, div, &mut mirror, &mut ids).is_none());
        assert!(mirror.is_empty());
    }

    #[test]
    fn text_and_input_masking_applied() {
        let (mut tree, mut mirror, mut ids) = session();
        let input = tree.create_element("input");
        tree.set_attribute(input, "value", Some("secret")).unwrap();
        let text = tree.create_text("hello");
        let mut ser = Serializer::new();
        ser.masker.text = Some(Box::new(|s| "*".repeat(s.len())));
        ser.masker.input_value = Some(Box::new(|_| "***".to_string()));
        let node = ser.serialize(&tree, input, &mut mirror, &mut ids).unwrap();
        let SerializedKind::Element { attributes, .. } = &node.kind else {
            panic!("expected element");
        };
        assert_eq!(attributes[0].1.as_deref(), Some("***"));
        let node = ser.serialize(&tree, text, &mut mirror, &mut ids).unwrap();
        let SerializedKind::Text { value } = &node.kind else {
            panic!("expected text");
        };
        assert_eq!(value, "*****");
    }

    #[test]
    fn registrar_sees_frames_and_shadow_hosts() {
        let (mut tree, mut mirror, mut ids) = session();
        let frame = tree.create_element("iframe");
        let host = tree.create_element("div");
        tree.attach_shadow(host).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        struct Recording(Rc<RefCell<Vec<TreeScope>>>);
        impl AttachRegistrar for Recording {
            fn register(&mut self, scope: TreeScope, _node: NodeRef, _id: Id) {
                self.0.borrow_mut().push(scope);
            }
        }
        let mut ser = Serializer::new();
        ser.registrar = Box::new(Recording(seen.clone()));
        ser.serialize(&tree, frame, &mut mirror, &mut ids).unwrap();
        ser.serialize(&tree, host, &mut mirror, &mut ids).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![TreeScope::SubDocument, TreeScope::ShadowRoot]
        );
    }

    #[test]
    fn shadow_children_are_flagged() {
        let (mut tree, mut mirror, mut ids) = session();
        let host = tree.create_element("div");
        let root = tree.attach_shadow(host).unwrap();
        let span = tree.create_element("span");
        tree.append_child(root, span).unwrap();
        let mut ser = Serializer::new();
        let node = ser.serialize(&tree, span, &mut mirror, &mut ids).unwrap();
        assert!(node.is_shadow);
    }
}
