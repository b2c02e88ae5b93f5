//! Proofreading corrections and the local proofreader
//!
//! Backends describe edits as [`CorrectionSpan`]s over the original text.
//! Producers are not trusted to send them sorted or non-overlapping, so
//! everything here goes through [`sort_corrections`] first. All indices are
//! char offsets.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static LONE_I: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bi\b").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static SENTENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[.!?]\s+)([a-z])").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionSpan {
    pub start_index: usize,
    pub end_index: usize,
    #[serde(rename = "replacementText")]
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl CorrectionSpan {
    pub fn new(start_index: usize, end_index: usize, replacement: &str) -> Self {
        Self {
            start_index,
            end_index,
            replacement: replacement.to_string(),
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: &str) -> Self {
        self.explanation = Some(explanation.to_string());
        self
    }

    /// Read one span from whatever shape a backend produced
    ///
    /// A missing end index means an insertion at `startIndex`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let start_index = value
            .get("startIndex")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let end_index = value
            .get("endIndex")
            .and_then(Value::as_u64)
            .map(|end| end as usize)
            .unwrap_or(start_index)
            .max(start_index);
        Some(Self {
            start_index,
            end_index,
            replacement: first_string(
                value,
                &["replacementText", "correction", "replacement", "suggestion"],
            )
            .unwrap_or_default(),
            explanation: first_string(value, &["explanation", "message"]),
        })
    }
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Spans from a raw `{corrections: [...]}` answer; malformed entries are dropped
pub fn parse_corrections(raw: &Value) -> Vec<CorrectionSpan> {
    raw.get("corrections")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(CorrectionSpan::from_value).collect())
        .unwrap_or_default()
}

/// Sort by start, clamp to the text and drop spans overlapping an earlier one
pub fn sort_corrections(spans: &[CorrectionSpan], text: &str) -> Vec<CorrectionSpan> {
    let len = text.chars().count();
    let mut sorted: Vec<CorrectionSpan> = spans
        .iter()
        .map(|span| {
            let start_index = span.start_index.min(len);
            CorrectionSpan {
                start_index,
                end_index: span.end_index.clamp(start_index, len),
                ..span.clone()
            }
        })
        .collect();
    sorted.sort_by_key(|span| (span.start_index, span.end_index));

    let mut kept: Vec<CorrectionSpan> = Vec::with_capacity(sorted.len());
    for span in sorted {
        if kept.last().is_some_and(|prev| span.start_index < prev.end_index) {
            continue;
        }
        kept.push(span);
    }
    kept
}

/// A run of text for display: untouched, or replaced by a correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Segment {
    Unchanged {
        text: String,
    },
    Corrected {
        original: String,
        replacement: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
}

/// Split `original` into alternating unchanged and corrected runs
pub fn segments(original: &str, spans: &[CorrectionSpan]) -> Vec<Segment> {
    let chars: Vec<char> = original.chars().collect();
    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    let mut out = Vec::new();
    let mut cursor = 0;
    for span in sort_corrections(spans, original) {
        if span.start_index > cursor {
            out.push(Segment::Unchanged {
                text: slice(cursor, span.start_index),
            });
        }
        out.push(Segment::Corrected {
            original: slice(span.start_index, span.end_index),
            replacement: span.replacement,
            explanation: span.explanation,
        });
        cursor = span.end_index;
    }
    if cursor < chars.len() {
        out.push(Segment::Unchanged {
            text: slice(cursor, chars.len()),
        });
    }
    out
}

/// Rebuild the corrected text from the original and its spans
pub fn apply_corrections(original: &str, spans: &[CorrectionSpan]) -> String {
    segments(original, spans)
        .into_iter()
        .map(|segment| match segment {
            Segment::Unchanged { text } => text,
            Segment::Corrected { replacement, .. } => replacement,
        })
        .collect()
}

/// One "before → after" line per correction
pub fn highlights(original: &str, spans: &[CorrectionSpan]) -> Vec<String> {
    segments(original, spans)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Corrected {
                original,
                replacement,
                ..
            } => {
                let before = if original.is_empty() { "(empty)".to_string() } else { original };
                let after = if replacement.is_empty() { "(none)".to_string() } else { replacement };
                Some(format!("{} → {}", before, after))
            }
            Segment::Unchanged { .. } => None,
        })
        .collect()
}

/// Deterministic proofreading used when no backend is ready
///
/// Capitalizes a lone "i", collapses whitespace runs and capitalizes sentence
/// starts. Never reports corrections.
pub fn local_proofread(text: &str) -> String {
    let fixed = LONE_I.replace_all(text, "I");
    let fixed = WHITESPACE_RUN.replace_all(&fixed, " ");
    SENTENCE_START
        .replace_all(&fixed, |caps: &Captures| {
            format!("{}{}", &caps[1], caps[2].to_uppercase())
        })
        .into_owned()
}
