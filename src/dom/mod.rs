//! Mutable document tree.
//!
//! The tree is an arena: every node lives in one `Vec` owned by the
//! `Document` and is addressed by a `NodeId`. Parent and child links are
//! plain indices, so re-parenting and removal never leave dangling
//! references. A removed subtree simply stays unreachable in the arena until
//! the document is dropped.
//!
//! Markup is parsed with `scraper` (html5ever tree construction) and copied
//! into the arena once; every later query and mutation works on the arena.

mod serialize;

use scraper::Html;

/// Stable handle of a node inside its `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Doctype,
    Element,
    Text,
    Comment,
}

/// An element attribute. Names are stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Doctype { name: String },
    Element { name: String, attrs: Vec<Attribute> },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document holding only its root node.
    pub fn new() -> Self {
        Document {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Parses a complete HTML document.
    ///
    /// Tree construction follows the HTML5 algorithm, so any input yields a
    /// tree with `html`, `head` and `body` elements.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Document::new();
        let root = doc.root;

        // Explicit stack keeps deeply nested markup off the call stack.
        // Children are pushed in reverse so they pop in document order.
        let mut stack: Vec<_> = parsed
            .tree
            .root()
            .children()
            .rev()
            .map(|child| (child, root))
            .collect();

        while let Some((source, parent)) = stack.pop() {
            let data = match source.value() {
                scraper::Node::Element(element) => NodeData::Element {
                    name: element.name().to_ascii_lowercase(),
                    attrs: element
                        .attrs()
                        .map(|(name, value)| Attribute {
                            name: name.to_ascii_lowercase(),
                            value: value.to_string(),
                        })
                        .collect(),
                },
                scraper::Node::Text(text) => {
                    let content: &str = text;
                    NodeData::Text(content.to_string())
                }
                scraper::Node::Comment(comment) => {
                    let content: &str = comment;
                    NodeData::Comment(content.to_string())
                }
                scraper::Node::Doctype(doctype) => NodeData::Doctype {
                    name: doctype.name().to_string(),
                },
                scraper::Node::Document | scraper::Node::Fragment => {
                    stack.extend(source.children().rev().map(|child| (child, parent)));
                    continue;
                }
                scraper::Node::ProcessingInstruction(_) => continue,
            };

            let id = doc.alloc(data);
            doc.attach_last(parent, id);
            stack.extend(source.children().rev().map(|child| (child, id)));
        }

        doc
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<html>` element, if present.
    pub fn document_element(&self) -> Option<NodeId> {
        self.first_element_child(self.root)
    }

    /// The first `<body>` element, if present.
    pub fn body(&self) -> Option<NodeId> {
        self.get_elements_by_tag_name(self.root, "body")
            .into_iter()
            .next()
    }

    /// The first `<head>` element, if present.
    pub fn head(&self) -> Option<NodeId> {
        self.get_elements_by_tag_name(self.root, "head")
            .into_iter()
            .next()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    // ---- node inspection ----

    pub fn kind(&self, id: NodeId) -> NodeKind {
        match self.node(id).data {
            NodeData::Document => NodeKind::Document,
            NodeData::Doctype { .. } => NodeKind::Doctype,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Element
    }

    /// Lower-case tag name of an element, `None` for other kinds.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // ---- traversal ----

    /// All child nodes (elements, text and comments interleaved).
    pub fn child_nodes(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Element children only.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&child| self.is_element(child))
    }

    /// Next element among the node's following siblings.
    ///
    /// A detached node has no siblings.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.node(parent).children;
        let position = siblings.iter().position(|&sibling| sibling == id)?;
        siblings[position + 1..]
            .iter()
            .copied()
            .find(|&sibling| self.is_element(sibling))
    }

    /// Every descendant of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.node(current).children.iter().rev().copied());
        }
        out
    }

    /// Descendant elements with the given tag name; `"*"` matches all.
    pub fn get_elements_by_tag_name(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        let wildcard = tag == "*";
        self.descendants(id)
            .into_iter()
            .filter(|&node| match self.tag_name(node) {
                Some(name) => wildcard || name.eq_ignore_ascii_case(tag),
                None => false,
            })
            .collect()
    }

    /// Descendant elements whose tag is any of `tags`, in document order.
    pub fn get_all_nodes_with_tag(&self, id: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| match self.tag_name(node) {
                Some(name) => tags.iter().any(|tag| name.eq_ignore_ascii_case(tag)),
                None => false,
            })
            .collect()
    }

    /// Whether `node` is part of `nodes`.
    pub fn include_node(nodes: &[NodeId], node: NodeId) -> bool {
        nodes.contains(&node)
    }

    // ---- attributes ----

    /// Attributes in their stored order; empty for non-elements.
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    /// Sets an attribute, replacing an existing value in place.
    ///
    /// New attributes are appended; non-elements are left untouched.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            match attrs
                .iter_mut()
                .find(|attr| attr.name.eq_ignore_ascii_case(name))
            {
                Some(attr) => attr.value = value.to_string(),
                None => attrs.push(Attribute {
                    name: name.to_ascii_lowercase(),
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.retain(|attr| !attr.name.eq_ignore_ascii_case(name));
        }
    }

    /// Value of the `id` attribute, empty when absent.
    pub fn element_id(&self, id: NodeId) -> String {
        self.get_attribute(id, "id").unwrap_or_default().trim().to_string()
    }

    /// Value of the `class` attribute with whitespace collapsed.
    pub fn class_name(&self, id: NodeId) -> String {
        self.get_attribute(id, "class")
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ---- content ----

    /// Descendant text concatenated in document order, whitespace kept.
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeData::Text(text) = &self.node(id).data {
            return text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match &self.node(node).data {
                NodeData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Markup of the node and its descendants.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, id, &mut out);
        out
    }

    /// Markup of the node's descendants only.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        if self.kind(id) == NodeKind::Text {
            return out;
        }
        for &child in self.child_nodes(id) {
            serialize::write_node(self, child, &mut out);
        }
        out
    }

    // ---- creation ----

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            name: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Creates a detached text node.
    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Deep-copies a node and its subtree into new, detached nodes.
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        let copy = self.alloc(self.node(id).data.clone());
        let mut stack: Vec<(NodeId, NodeId)> = self
            .node(id)
            .children
            .iter()
            .rev()
            .map(|&child| (child, copy))
            .collect();
        while let Some((source, parent)) = stack.pop() {
            let node = self.alloc(self.node(source).data.clone());
            self.attach_last(parent, node);
            stack.extend(
                self.node(source)
                    .children
                    .iter()
                    .rev()
                    .map(|&child| (child, node)),
            );
        }
        copy
    }

    // ---- mutation ----

    /// Removes a node from its parent; the subtree stays intact but detached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn attach_last(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Appends `child` as the last child of `parent`, moving it out of its
    /// previous parent first. Moving a node into its own subtree is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.is_inclusive_ancestor(child, parent) {
            log::debug!("Ignoring append of {:?} into its own subtree", child);
            return;
        }
        self.detach(child);
        self.attach_last(parent, child);
    }

    /// Inserts `child` as the first child of `parent`, moving it out of its
    /// previous parent first.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if self.is_inclusive_ancestor(child, parent) {
            log::debug!("Ignoring prepend of {:?} into its own subtree", child);
            return;
        }
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(0, child);
    }

    /// Puts `new_node` where `old` is; `old` ends up detached.
    ///
    /// Nothing happens when `old` has no parent.
    pub fn replace_node(&mut self, old: NodeId, new_node: NodeId) {
        if old == new_node {
            return;
        }
        let Some(parent) = self.parent(old) else {
            return;
        };
        if self.is_inclusive_ancestor(new_node, parent) {
            return;
        }
        self.detach(new_node);
        let Some(position) = self
            .node(parent)
            .children
            .iter()
            .position(|&child| child == old)
        else {
            return;
        };
        self.node_mut(parent).children[position] = new_node;
        self.node_mut(new_node).parent = Some(parent);
        self.node_mut(old).parent = None;
    }

    /// Detaches every node in `nodes` accepted by `filter`, or all of them
    /// when `filter` is `None`. Children of a removed node go with it.
    pub fn remove_nodes(
        &mut self,
        nodes: &[NodeId],
        filter: Option<&dyn Fn(&Document, NodeId) -> bool>,
    ) {
        let doomed: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&node| filter.map_or(true, |keep| keep(self, node)))
            .collect();
        for node in doomed.into_iter().rev() {
            self.detach(node);
        }
    }

    /// Replaces all children with a single text node.
    ///
    /// On a text node the character data itself is replaced.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeData::Text(existing) = &mut self.node_mut(id).data {
            *existing = text.to_string();
            return;
        }
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
        let text_node = self.create_text_node(text);
        self.attach_last(id, text_node);
    }
}
