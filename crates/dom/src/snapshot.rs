//! Deterministic tree serialization and equality for tests.
//! Not a public stable format; intended for internal test comparisons.
//!
//! Equivalence rules:
//! - Node kinds, element names and attribute lists (order-significant)
//!   must match.
//! - Text/comment content and doctypes must match exactly.
//! - Scroll offsets, sheet rules and dialog state compare only when the
//!   options ask for them.

use crate::node::Node;
use std::fmt::Write;

#[derive(Clone, Copy, Debug)]
pub struct TreeSnapshotOptions {
    pub include_scroll: bool,
    pub include_sheet: bool,
    pub include_dialog: bool,
}

impl Default for TreeSnapshotOptions {
    fn default() -> Self {
        Self {
            include_scroll: true,
            include_sheet: true,
            include_dialog: true,
        }
    }
}

#[derive(Debug)]
pub struct TreeSnapshot {
    lines: Vec<String>,
}

impl TreeSnapshot {
    pub fn new(root: &Node, options: TreeSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk(root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

fn walk(node: &Node, options: &TreeSnapshotOptions, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mut line = indent.clone();
    match node {
        Node::Document { doctype, .. } => {
            line.push_str("#document");
            if let Some(doctype) = doctype {
                let _ = write!(line, " doctype={doctype}");
            }
        }
        Node::Fragment { .. } => line.push_str("#fragment"),
        Node::ShadowRoot { .. } => line.push_str("#shadow-root"),
        Node::Element {
            name,
            attributes,
            scroll,
            sheet,
            dialog,
            ..
        } => {
            let _ = write!(line, "<{name}");
            for (attr, value) in attributes {
                match value {
                    Some(value) => {
                        let _ = write!(line, " {attr}=\"{}\"", escape_text(value));
                    }
                    None => {
                        let _ = write!(line, " {attr}");
                    }
                }
            }
            line.push('>');
            if options.include_scroll && *scroll != (0, 0) {
                let _ = write!(line, " scroll={},{}", scroll.0, scroll.1);
            }
            if options.include_dialog {
                if let Some(dialog) = dialog {
                    let _ = write!(line, " dialog={dialog:?}");
                }
            }
            if options.include_sheet && !sheet.is_empty() {
                let _ = write!(line, " rules={}", sheet.len());
            }
        }
        Node::Text { text } => {
            let _ = write!(line, "\"{}\"", escape_text(text));
        }
        Node::Comment { text } => {
            let _ = write!(line, "<!--{}-->", escape_text(text));
        }
    }
    lines.push(line);
    if options.include_sheet {
        if let Node::Element { sheet, .. } = node {
            for rule in sheet {
                lines.push(format!("{indent}  @rule {}", escape_text(rule)));
            }
        }
    }
    if let Node::Element {
        shadow,
        content_document,
        ..
    } = node
    {
        if let Some(shadow) = shadow {
            walk(shadow, options, depth + 1, lines);
        }
        if let Some(doc) = content_document {
            walk(doc, options, depth + 1, lines);
        }
    }
    for child in node.children() {
        walk(child, options, depth + 1, lines);
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => {
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Compare two trees; `Err` carries a windowed line diff around the first
/// mismatch.
pub fn compare_trees(
    expected: &Node,
    actual: &Node,
    options: TreeSnapshotOptions,
) -> Result<(), String> {
    let expected = TreeSnapshot::new(expected, options);
    let actual = TreeSnapshot::new(actual, options);
    diff_lines(expected.as_lines(), actual.as_lines())
}

pub fn diff_lines(expected: &[String], actual: &[String]) -> Result<(), String> {
    let max = expected.len().max(actual.len());
    let missing = "<missing>";
    let mut mismatch = None;
    for i in 0..max {
        let left = expected.get(i).map(String::as_str).unwrap_or(missing);
        let right = actual.get(i).map(String::as_str).unwrap_or(missing);
        if left != right {
            mismatch = Some(i);
            break;
        }
    }
    let Some(i) = mismatch else {
        return Ok(());
    };
    let start = i.saturating_sub(2);
    let end = (i + 3).min(max);
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "first mismatch at line {} (showing {}..={}):",
        i + 1,
        start + 1,
        end
    );
    for line_idx in start..end {
        let left = expected.get(line_idx).map(String::as_str).unwrap_or(missing);
        let right = actual.get(line_idx).map(String::as_str).unwrap_or(missing);
        let marker = if line_idx == i { ">" } else { " " };
        let _ = writeln!(&mut out, "{marker} expected: {left}");
        let _ = writeln!(&mut out, "{marker} actual:   {right}");
    }
    Err(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    #[test]
    fn identical_trees_compare_equal() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("div");
        tree.append_child(doc, div).unwrap();
        let snap = tree.materialize(doc).unwrap();
        assert!(compare_trees(&snap, &snap, TreeSnapshotOptions::default()).is_ok());
    }

    #[test]
    fn mismatch_reports_first_divergent_line() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("div");
        tree.append_child(doc, div).unwrap();
        let before = tree.materialize(doc).unwrap();
        tree.set_attribute(div, "class", Some("x")).unwrap();
        let after = tree.materialize(doc).unwrap();
        let err = compare_trees(&before, &after, TreeSnapshotOptions::default()).unwrap_err();
        assert!(err.contains("first mismatch"));
        assert!(err.contains("class"));
    }

    #[test]
    fn scroll_can_be_ignored() {
        let mut tree = Tree::new();
        let doc = tree.create_document(None);
        let div = tree.create_element("div");
        tree.append_child(doc, div).unwrap();
        let before = tree.materialize(doc).unwrap();
        tree.set_scroll(div, 0, 100).unwrap();
        let after = tree.materialize(doc).unwrap();
        let options = TreeSnapshotOptions {
            include_scroll: false,
            ..TreeSnapshotOptions::default()
        };
        assert!(compare_trees(&before, &after, options).is_ok());
        assert!(compare_trees(&before, &after, TreeSnapshotOptions::default()).is_err());
    }
}
