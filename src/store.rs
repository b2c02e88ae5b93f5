//! Side table of pre-transformation text, keyed by node id
//!
//! The store never owns nodes. Whether a node still exists in the live tree
//! is checked when restoring, not tracked eagerly.

use crate::dom::{Document, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct OriginalStore {
    originals: HashMap<NodeId, String>,
}

impl OriginalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `original` for `node`; a later record for the same node wins
    pub fn record(&mut self, node: NodeId, original: impl Into<String>) {
        self.originals.insert(node, original.into());
    }

    pub fn get(&self, node: NodeId) -> Option<&str> {
        self.originals.get(&node).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn clear(&mut self) {
        self.originals.clear();
    }

    /// Write every original back into `doc` and empty the store
    ///
    /// Entries whose node is no longer connected are dropped silently.
    /// Returns how many nodes were restored.
    pub fn restore_into(&mut self, doc: &mut Document) -> usize {
        let mut restored = 0;
        for (node, original) in self.originals.drain() {
            if doc.is_connected(node) {
                doc.set_text_content(node, &original);
                restored += 1;
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut store = OriginalStore::new();
        store.record(NodeId(3), "first");
        store.record(NodeId(3), "second");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(NodeId(3)), Some("second"));
    }

    #[test]
    fn test_restore_skips_detached_nodes() {
        let mut doc = Document::new("t");
        let body = doc.body();
        let kept = doc.append_element(body, "p", &[]);
        doc.append_text(kept, "kept original");
        let gone = doc.append_element(body, "p", &[]);
        doc.append_text(gone, "gone original");

        let mut store = OriginalStore::new();
        store.record(kept, doc.text_content(kept));
        store.record(gone, doc.text_content(gone));
        doc.set_text_content(kept, "changed");
        doc.set_text_content(gone, "changed too");
        doc.detach(gone);

        assert_eq!(store.restore_into(&mut doc), 1);
        assert_eq!(doc.text_content(kept), "kept original");
        assert_eq!(doc.text_content(gone), "changed too");
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_unknown_ids_is_harmless() {
        let mut doc = Document::new("t");
        let mut store = OriginalStore::new();
        store.record(NodeId(999), "nothing");
        assert_eq!(store.restore_into(&mut doc), 0);
        assert!(store.is_empty());
    }
}
