//! HTML serialization of arena nodes.

use super::{Document, NodeData, NodeId};

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
    "script",
    "style",
    "xmp",
];

enum Step {
    Open(NodeId),
    Close(NodeId),
}

pub(super) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Appends the markup of `id` and its subtree to `out`.
pub(super) fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let mut stack = vec![Step::Open(id)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node) => match &doc.node(node).data {
                NodeData::Document => {
                    push_children(doc, node, &mut stack);
                }
                NodeData::Doctype { name } => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeData::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
                NodeData::Text(text) => {
                    let raw = doc
                        .parent(node)
                        .and_then(|parent| doc.tag_name(parent))
                        .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                    if raw {
                        out.push_str(text);
                    } else {
                        escape_text(text, out);
                    }
                }
                NodeData::Element { name, attrs } => {
                    out.push('<');
                    out.push_str(name);
                    for attr in attrs {
                        out.push(' ');
                        out.push_str(&attr.name);
                        out.push_str("=\"");
                        escape_attribute(&attr.value, out);
                        out.push('"');
                    }
                    if is_void(name) {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        stack.push(Step::Close(node));
                        push_children(doc, node, &mut stack);
                    }
                }
            },
            Step::Close(node) => {
                if let Some(name) = doc.tag_name(node) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }
}

fn push_children(doc: &Document, id: NodeId, stack: &mut Vec<Step>) {
    stack.extend(doc.child_nodes(id).iter().rev().map(|&child| Step::Open(child)));
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
