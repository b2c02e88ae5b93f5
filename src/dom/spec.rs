//! Serializable description of a document, used to load pages from JSON
//! and to dump them back after a transformation.
//!
//! ```json
//! {
//!   "title": "Example",
//!   "body": [
//!     { "tag": "h1", "children": ["Welcome"] },
//!     { "tag": "p", "attrs": { "class": "lead" }, "children": ["Hello ", { "tag": "b", "children": ["world"] }] }
//!   ]
//! }
//! ```

use super::{Document, NodeData, NodeId};
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
    /// `id` attribute of the element that has focus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeSpec>,
    },
}

impl Document {
    pub fn from_spec(spec: &DocumentSpec) -> Self {
        let mut doc = Document::new(&spec.title);
        let body = doc.body();
        for child in &spec.body {
            doc.build(body, child);
        }
        if let Some(focused_id) = &spec.focused {
            let target = doc
                .descendants(body)
                .into_iter()
                .find(|n| doc.element(*n).and_then(|e| e.id()) == Some(focused_id.as_str()));
            if let Some(target) = target {
                doc.focus(target);
            }
        }
        doc
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let spec: DocumentSpec = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid document: {}", e)))?;
        Ok(Self::from_spec(&spec))
    }

    fn build(&mut self, parent: NodeId, spec: &NodeSpec) {
        match spec {
            NodeSpec::Text(text) => {
                self.append_text(parent, text);
            }
            NodeSpec::Element {
                tag,
                attrs,
                children,
            } => {
                let attributes: Vec<(&str, &str)> = attrs
                    .iter()
                    .map(|(n, v)| (n.as_str(), v.as_str()))
                    .collect();
                let id = self.append_element(parent, tag, &attributes);
                for child in children {
                    self.build(id, child);
                }
            }
        }
    }

    /// Snapshot of the connected tree
    pub fn to_spec(&self) -> DocumentSpec {
        DocumentSpec {
            title: self.title().to_string(),
            body: self
                .children(self.body())
                .iter()
                .filter_map(|c| self.node_spec(*c))
                .collect(),
            focused: self
                .focused()
                .and_then(|f| self.element(f))
                .and_then(|e| e.id())
                .map(str::to_string),
        }
    }

    fn node_spec(&self, id: NodeId) -> Option<NodeSpec> {
        match self.data(id)? {
            NodeData::Text(text) => Some(NodeSpec::Text(text.clone())),
            NodeData::Element(element) => Some(NodeSpec::Element {
                tag: element.tag.clone(),
                attrs: element.attributes.iter().cloned().collect(),
                children: self
                    .children(id)
                    .iter()
                    .filter_map(|c| self.node_spec(*c))
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;

    const PAGE: &str = r#"{
        "title": "Example",
        "body": [
            { "tag": "h1", "children": ["Welcome"] },
            { "tag": "p", "attrs": { "class": "lead" }, "children": ["Hello ", { "tag": "b", "children": ["world"] }] },
            { "tag": "textarea", "attrs": { "id": "editor" } }
        ],
        "focused": "editor"
    }"#;

    #[test]
    fn test_from_json_builds_tree() {
        let doc = Document::from_json(PAGE).unwrap();
        assert_eq!(doc.title(), "Example");
        assert_eq!(doc.text_content(doc.body()), "WelcomeHello world");
        let lead = doc.query_selector(&Selector::parse("p.lead").unwrap()).unwrap();
        assert_eq!(doc.text_content(lead), "Hello world");
        assert_eq!(doc.focused().and_then(|f| doc.tag(f)), Some("textarea"));
    }

    #[test]
    fn test_to_spec_reflects_mutations() {
        let mut doc = Document::from_json(PAGE).unwrap();
        let h1 = doc.query_selector(&Selector::parse("h1").unwrap()).unwrap();
        doc.set_text_content(h1, "Bienvenue");
        let spec = doc.to_spec();
        assert_eq!(
            spec.body[0],
            NodeSpec::Element {
                tag: "h1".to_string(),
                attrs: BTreeMap::new(),
                children: vec![NodeSpec::Text("Bienvenue".to_string())],
            }
        );
        assert_eq!(spec.focused.as_deref(), Some("editor"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Document::from_json("{\"body\": 3}"),
            Err(EngineError::InvalidRequest(_))
        ));
    }
}
