//! Document arena
//!
//! The live document is owned by its host context. The engine only ever holds
//! [`NodeId`]s, stable indices into this arena, and checks whether a node is
//! still attached to the body lazily through [`Document::is_connected`].
//! Detaching a node unlinks it from its parent but keeps it in the arena, so
//! an id never dangles.

pub mod query;
pub mod spec;

pub use query::Selector;
pub use spec::{DocumentSpec, NodeSpec};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Document shared between the listeners of one content context
pub type SharedDocument = Arc<Mutex<Document>>;

/// Stable identifier of a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in source order, names lowercase
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct Document {
    title: String,
    nodes: Vec<Node>,
    body: NodeId,
    focused: Option<NodeId>,
}

impl Document {
    /// Create an empty document with a `body` root
    pub fn new(title: &str) -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: "body".to_string(),
                attributes: Vec::new(),
            }),
        };
        Self {
            title: title.to_string(),
            nodes: vec![body],
            body: NodeId(0),
            focused: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(n, v)| (n.to_ascii_lowercase(), v.to_string()))
                .collect(),
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Append `child` to `parent`, moving it out of its previous parent
    ///
    /// Appending is refused (returns `false`) when `parent` is a text node,
    /// when either id is unknown, or when it would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || self.node(child).is_none() || self.element(parent).is_none() {
            return false;
        }
        if self.ancestors(parent).any(|a| a == child) {
            return false;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        true
    }

    /// Create an element and append it to `parent`
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let id = self.create_element(tag, attributes);
        self.append_child(parent, id);
        id
    }

    /// Create a text node and append it to `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    /// Unlink a node from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
        if self.focused.is_some_and(|f| f == id || self.ancestors(f).any(|a| a == id)) {
            self.focused = None;
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(Node {
            data: NodeData::Element(element),
            ..
        }) = self.nodes.get_mut(id.0)
        else {
            return;
        };
        let name = name.to_ascii_lowercase();
        match element.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => element.attributes.push((name, value.to_string())),
        }
    }

    /// Strict ancestors of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Whether the node is still attached to the body
    pub fn is_connected(&self, id: NodeId) -> bool {
        if self.node(id).is_none() {
            return false;
        }
        id == self.body || self.ancestors(id).any(|a| a == self.body)
    }

    /// The node and all its descendants in document (pre-)order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.node(current).is_none() {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes, like DOM `textContent`
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.data(n) {
                Some(NodeData::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace the text of a node
    ///
    /// For an element this drops all its children (they become detached) and
    /// inserts a single text node, mirroring DOM `textContent` assignment.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        match self.data(id) {
            Some(NodeData::Text(_)) => self.nodes[id.0].data = NodeData::Text(text.to_string()),
            Some(NodeData::Element(_)) => {
                for child in self.children(id).to_vec() {
                    self.detach(child);
                }
                if !text.is_empty() {
                    self.append_text(id, text);
                }
            }
            None => {}
        }
    }

    /// All connected elements matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    /// First connected element matching `selector`, in document order
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| selector.matches(self, *n))
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.element(id).is_some() && self.is_connected(id) {
            self.focused = Some(id);
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused.filter(|f| self.is_connected(*f))
    }
}
