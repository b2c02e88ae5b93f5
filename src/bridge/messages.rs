//! Wire shapes of the bridge
//!
//! Requests are internally tagged by `action`, with camelCase payload
//! fields, so they read the same as the JSON the panel sends.

use crate::engine::{TextTranslation, TransformSummary};
use serde::{Deserialize, Serialize};

/// Requests answered by the page's content context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentRequest {
    ExtractPageContent,
    TranslatePage {
        #[serde(alias = "target")]
        target_language: String,
        /// Translate this text instead of the page
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    TranslateElement {
        element: String,
        target_language: String,
    },
    RevertTranslation,
}

impl ContentRequest {
    pub const ACTIONS: &'static [&'static str] = &[
        "extractPageContent",
        "translatePage",
        "translateElement",
        "revertTranslation",
    ];
}

/// Requests answered by the page's editor integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EditorRequest {
    InsertText { text: String },
}

impl EditorRequest {
    pub const ACTIONS: &'static [&'static str] = &["insertText"];
}

/// Notices the page sends to the panel; none of them is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PanelNotice {
    UserWritingDetected,
}

impl PanelNotice {
    pub const ACTIONS: &'static [&'static str] = &["userWritingDetected"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertResponse {
    pub success: bool,
    pub reverted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InsertResponse {
    pub fn inserted() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn refused(reason: &str) -> Self {
        Self {
            ok: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Reply to `translatePage`: a page summary, or the translated `content`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslatePageResponse {
    Page(TransformSummary),
    Text(TextTranslation),
}
