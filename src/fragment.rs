//! Fragment selection
//!
//! Decides which parts of a [`Document`] are content worth transforming.
//! Two read-only paths live here:
//!
//! - [`FragmentSelector::select`] returns every qualifying element for the
//!   per-element translation path.
//! - [`FragmentSelector::extract`] summarizes the page (title, main content
//!   region, links, images) for the panel.

use crate::config::{BUILTIN_EXCLUDED_SELECTORS, EngineConfig};
use crate::dom::{Document, NodeId, Selector};
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An element selected for transformation, with its text captured at selection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub node: NodeId,
    /// Full text content, restored verbatim on revert
    pub original: String,
    /// Trimmed text, the part sent to a backend
    pub trimmed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub title: String,
    pub main_text: String,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub alt: String,
    pub src: String,
}

#[derive(Debug, Clone)]
pub struct FragmentSelector {
    content: Selector,
    excluded: Selector,
    main_content: Vec<Selector>,
    links: Selector,
    images: Selector,
    min_chars: usize,
    max_chars: usize,
    main_content_threshold: usize,
}

impl FragmentSelector {
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let excluded: Vec<&str> = BUILTIN_EXCLUDED_SELECTORS
            .iter()
            .copied()
            .chain(config.excluded_selectors.iter().map(String::as_str))
            .collect();
        let main_content = config
            .main_content_selectors
            .iter()
            .map(|s| Selector::parse(s))
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self {
            content: Selector::parse_list(&config.content_selectors)?,
            excluded: Selector::parse_list(&excluded)?,
            main_content,
            links: Selector::parse("a")?,
            images: Selector::parse("img")?,
            min_chars: config.min_fragment_chars,
            max_chars: config.max_fragment_chars,
            main_content_threshold: config.main_content_threshold,
        })
    }

    /// Whether the node sits in (or is) a script, style or hidden region
    pub fn is_excluded(&self, doc: &Document, node: NodeId) -> bool {
        doc.closest(node, &self.excluded).is_some()
    }

    /// Capture the node as a fragment if its text length is in range and it is not excluded
    pub fn qualify(&self, doc: &Document, node: NodeId) -> Option<Fragment> {
        doc.element(node)?;
        let original = doc.text_content(node);
        let trimmed = original.trim();
        let length = trimmed.chars().count();
        if length <= self.min_chars || length >= self.max_chars {
            return None;
        }
        if self.is_excluded(doc, node) {
            return None;
        }
        Some(Fragment {
            node,
            trimmed: trimmed.to_string(),
            original,
        })
    }

    /// All qualifying leaf-ish elements in document order
    ///
    /// A qualifying element that contains another qualifying element is left
    /// out, so replacing its text can never detach a nested fragment.
    pub fn select(&self, doc: &Document) -> Vec<Fragment> {
        let candidates: Vec<Fragment> = doc
            .query_selector_all(&self.content)
            .into_iter()
            .filter_map(|node| self.qualify(doc, node))
            .collect();

        let containers: HashSet<NodeId> = candidates
            .iter()
            .flat_map(|fragment| doc.ancestors(fragment.node))
            .collect();

        candidates
            .into_iter()
            .filter(|fragment| !containers.contains(&fragment.node))
            .collect()
    }

    /// Text of the main content region
    ///
    /// Regions are tried in configured priority order; the first whose
    /// normalized text is longer than the threshold wins. Falls back to the
    /// whole body.
    pub fn main_content(&self, doc: &Document) -> String {
        self.main_content
            .iter()
            .filter_map(|selector| doc.query_selector(selector))
            .map(|region| normalize_whitespace(&doc.text_content(region)))
            .find(|text| text.chars().count() > self.main_content_threshold)
            .unwrap_or_else(|| normalize_whitespace(&doc.text_content(doc.body())))
    }

    pub fn extract(&self, doc: &Document) -> PageContent {
        let links = doc
            .query_selector_all(&self.links)
            .into_iter()
            .filter_map(|a| {
                let href = doc.attribute(a, "href").filter(|h| !h.is_empty())?;
                let text = doc.text_content(a).trim().to_string();
                (!text.is_empty()).then(|| PageLink {
                    text,
                    href: href.to_string(),
                })
            })
            .collect();

        let images = doc
            .query_selector_all(&self.images)
            .into_iter()
            .filter_map(|img| {
                let alt = doc.attribute(img, "alt").filter(|a| !a.is_empty())?;
                Some(PageImage {
                    alt: alt.to_string(),
                    src: doc.attribute(img, "src").unwrap_or_default().to_string(),
                })
            })
            .collect();

        PageContent {
            title: doc.title().to_string(),
            main_text: self.main_content(doc),
            links,
            images,
        }
    }
}

/// Collapse whitespace runs to a single space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
