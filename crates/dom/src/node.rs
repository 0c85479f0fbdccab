//! Materialized value snapshot of a tree, used for comparisons and tests.

use crate::style::StyleDeclaration;
use core_types::DialogState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Document {
        doctype: Option<String>,
        children: Vec<Node>,
    },
    Fragment {
        children: Vec<Node>,
    },
    ShadowRoot {
        children: Vec<Node>,
    },
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        style: Vec<StyleDeclaration>,
        scroll: (i32, i32),
        sheet: Vec<String>,
        dialog: Option<DialogState>,
        shadow: Option<Box<Node>>,
        content_document: Option<Box<Node>>,
        children: Vec<Node>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children, .. }
            | Node::Fragment { children }
            | Node::ShadowRoot { children }
            | Node::Element { children, .. } => children,
            _ => &[],
        }
    }
}
