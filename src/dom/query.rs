//! A small CSS selector subset for querying a [`Document`]
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`
//! (value bare or quoted), compound selectors, the descendant (whitespace)
//! and child (`>`) combinators, and comma-separated selector lists.

use super::{Document, ElementData, NodeId};
use crate::error::{EngineError, EngineResult};
use std::iter::Peekable;
use std::str::{Chars, FromStr};

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeSelector {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> EngineResult<Self> {
        let mut parser = SelectorParser {
            chars: input.chars().peekable(),
            source: input,
        };
        let mut alternatives = Vec::new();
        loop {
            parser.skip_whitespace();
            alternatives.push(parser.parse_complex()?);
            parser.skip_whitespace();
            match parser.chars.next() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(parser.error(&format!("unexpected '{}'", c))),
            }
        }
        Ok(Self {
            source: input.trim().to_string(),
            alternatives,
        })
    }

    /// Join several selectors into one selector list
    pub fn parse_list<S: AsRef<str>>(selectors: &[S]) -> EngineResult<Self> {
        let joined = selectors
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` is an element matching any alternative of this selector
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches_at(doc, node, complex.compounds.len() - 1))
    }
}

impl FromStr for Selector {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl ComplexSelector {
    fn matches_at(&self, doc: &Document, node: NodeId, index: usize) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        if !self.compounds[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent(node)
                .is_some_and(|p| self.matches_at(doc, p, index - 1)),
            Combinator::Descendant => doc
                .ancestors(node)
                .any(|a| self.matches_at(doc, a, index - 1)),
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, element: &ElementData) -> bool {
        if self.tag.as_ref().is_some_and(|t| *t != element.tag) {
            return false;
        }
        if self.id.as_ref().is_some_and(|id| element.id() != Some(id.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attributes.iter().all(|attr| match (&attr.value, element.attribute(&attr.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

struct SelectorParser<'a> {
    chars: Peekable<Chars<'a>>,
    source: &'a str,
}

impl SelectorParser<'_> {
    fn error(&self, reason: &str) -> EngineError {
        EngineError::InvalidRequest(format!("Invalid selector '{}': {}", self.source, reason))
    }

    /// Returns whether any whitespace was consumed
    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    fn is_ident_char(c: char) -> bool {
        c.is_alphanumeric() || c == '-' || c == '_'
    }

    fn parse_ident(&mut self) -> EngineResult<String> {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if !Self::is_ident_char(c) {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        if ident.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(ident)
    }

    fn parse_complex(&mut self) -> EngineResult<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_whitespace = self.skip_whitespace();
            match self.chars.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.chars.next();
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                    compounds.push(self.parse_compound()?);
                }
                Some(_) if had_whitespace => {
                    combinators.push(Combinator::Descendant);
                    compounds.push(self.parse_compound()?);
                }
                Some(&c) => return Err(self.error(&format!("unexpected '{}'", c))),
            }
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> EngineResult<Compound> {
        let mut compound = Compound::default();
        let mut universal = false;
        match self.chars.peek() {
            Some('*') => {
                self.chars.next();
                universal = true;
            }
            Some(&c) if Self::is_ident_char(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.chars.peek() {
                Some('#') => {
                    self.chars.next();
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.chars.next();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.chars.next();
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() && !universal {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> EngineResult<AttributeSelector> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let value = match self.chars.next() {
            Some(']') => return Ok(AttributeSelector { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.chars.peek() {
                    Some(&quote) if quote == '"' || quote == '\'' => {
                        self.chars.next();
                        let mut value = String::new();
                        loop {
                            match self.chars.next() {
                                Some(c) if c == quote => break,
                                Some(c) => value.push(c),
                                None => return Err(self.error("unterminated string")),
                            }
                        }
                        value
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_whitespace();
                value
            }
            _ => return Err(self.error("malformed attribute selector")),
        };
        match self.chars.next() {
            Some(']') => Ok(AttributeSelector {
                name,
                value: Some(value),
            }),
            _ => Err(self.error("expected ']'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new("Query");
        let body = doc.body();
        let main = doc.append_element(body, "main", &[("role", "main")]);
        let article = doc.append_element(main, "article", &[("class", "post content")]);
        let p = doc.append_element(article, "p", &[("id", "first"), ("translate", "yes")]);
        doc.append_text(p, "Paragraph");
        let aside = doc.append_element(body, "aside", &[("aria-hidden", "true")]);
        let span = doc.append_element(aside, "span", &[]);
        (doc, vec![main, article, p, aside, span])
    }

    #[test]
    fn test_type_id_class_and_attribute() {
        let (doc, nodes) = page();
        let [main, article, p, aside, _] = nodes[..] else { panic!() };

        assert_eq!(doc.query_selector(&Selector::parse("main").unwrap()), Some(main));
        assert_eq!(doc.query_selector(&Selector::parse("#first").unwrap()), Some(p));
        assert_eq!(doc.query_selector(&Selector::parse(".content").unwrap()), Some(article));
        assert_eq!(
            doc.query_selector(&Selector::parse("[role=\"main\"]").unwrap()),
            Some(main)
        );
        assert_eq!(
            doc.query_selector(&Selector::parse("[aria-hidden='true']").unwrap()),
            Some(aside)
        );
        assert_eq!(doc.query_selector(&Selector::parse("[translate=yes]").unwrap()), Some(p));
    }

    #[test]
    fn test_compound_requires_all_parts() {
        let (doc, nodes) = page();
        let article = nodes[1];
        assert_eq!(
            doc.query_selector(&Selector::parse("article.post.content").unwrap()),
            Some(article)
        );
        assert_eq!(doc.query_selector(&Selector::parse("article.missing").unwrap()), None);
    }

    #[test]
    fn test_combinators() {
        let (doc, nodes) = page();
        let p = nodes[2];
        assert_eq!(doc.query_selector(&Selector::parse("main p").unwrap()), Some(p));
        assert_eq!(doc.query_selector(&Selector::parse("article > p").unwrap()), Some(p));
        assert_eq!(doc.query_selector(&Selector::parse("main > p").unwrap()), None);
    }

    #[test]
    fn test_selector_list_in_document_order() {
        let (doc, nodes) = page();
        let found = doc.query_selector_all(&Selector::parse("span, p, article").unwrap());
        assert_eq!(found, vec![nodes[1], nodes[2], nodes[4]]);
    }

    #[test]
    fn test_universal_matches_elements_only() {
        let (doc, _) = page();
        let all = doc.query_selector_all(&Selector::parse("*").unwrap());
        // body, main, article, p, aside, span
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_closest_is_inclusive() {
        let (doc, nodes) = page();
        let hidden = Selector::parse("[aria-hidden=\"true\"]").unwrap();
        assert_eq!(doc.closest(nodes[4], &hidden), Some(nodes[3]));
        assert_eq!(doc.closest(nodes[3], &hidden), Some(nodes[3]));
        assert_eq!(doc.closest(nodes[2], &hidden), None);
    }

    #[test]
    fn test_parse_list() {
        let selector = Selector::parse_list(&["p", ".translatable"]).unwrap();
        assert_eq!(selector.as_str(), "p, .translatable");
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "#", "p[", "p[id=\"x]", "a,,b", "p >", "[=x]", "p!"] {
            assert!(
                matches!(Selector::parse(bad), Err(EngineError::InvalidRequest(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_from_str() {
        let selector: Selector = "h1".parse().unwrap();
        assert_eq!(selector.as_str(), "h1");
    }
}
