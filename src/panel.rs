//! Panel-side orchestration
//!
//! The panel owns one fallback chain per capability (proofreading,
//! translation, prompting) and reaches the page only through a
//! [`BridgeClient`].

use crate::backend::BackendRequest;
use crate::bridge::messages::{
    ContentRequest, EditorRequest, InsertResponse, RevertResponse, TranslatePageResponse,
};
use crate::bridge::BridgeClient;
use crate::engine::{ElementTranslation, TextTranslation, TransformSummary};
use crate::error::{EngineError, EngineResult};
use crate::fallback::{FallbackChain, TransformResult};
use crate::fragment::PageContent;
use crate::locale::{AUTO_DETECT, validate_locale};
use crate::proofread::{self, CorrectionSpan, Segment};
use crate::session::{ProgressFn, SessionState};
use serde::Serialize;
use tracing::info;

/// Everything the panel shows after proofreading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofreadReport {
    pub original: String,
    pub corrected: String,
    pub corrections: Vec<CorrectionSpan>,
    pub segments: Vec<Segment>,
    pub highlights: Vec<String>,
    pub backend: Option<String>,
    pub fallback_used: bool,
}

/// Availability of one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub capability: String,
    pub backend: Option<String>,
    pub state: Option<SessionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

pub struct PanelController {
    page: Option<BridgeClient>,
    proofreader: FallbackChain,
    translator: FallbackChain,
    assistant: FallbackChain,
}

impl PanelController {
    pub fn new(proofreader: FallbackChain, translator: FallbackChain, assistant: FallbackChain) -> Self {
        Self {
            page: None,
            proofreader,
            translator,
            assistant,
        }
    }

    /// Connect the panel to a page
    pub fn with_page(mut self, page: BridgeClient) -> Self {
        self.page = Some(page);
        self
    }

    fn page(&self) -> EngineResult<&BridgeClient> {
        self.page
            .as_ref()
            .ok_or_else(|| EngineError::ChannelError("no page connected".to_string()))
    }

    /// Proofread `text`; blank input yields `None`
    pub async fn proofread(
        &self,
        text: &str,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Option<ProofreadReport> {
        if text.trim().is_empty() {
            return None;
        }
        let request = BackendRequest::Proofread {
            text: text.to_string(),
        };
        let TransformResult::Success { output, metadata } =
            self.proofreader.run(&request, on_progress).await
        else {
            return None;
        };

        let corrections = proofread::sort_corrections(&metadata.corrections, text);
        info!(
            corrections = corrections.len(),
            fallback = metadata.fallback_used,
            "proofread finished"
        );
        Some(ProofreadReport {
            original: text.to_string(),
            corrected: output,
            segments: proofread::segments(text, &corrections),
            highlights: proofread::highlights(text, &corrections),
            corrections,
            backend: metadata.backend,
            fallback_used: metadata.fallback_used,
        })
    }

    /// Translate a string with the translation chain
    pub async fn translate_text(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> EngineResult<TransformResult> {
        validate_locale(target)?;
        let request = BackendRequest::translate(text, source.unwrap_or(AUTO_DETECT), target);
        Ok(self.translator.run(&request, None).await)
    }

    /// Ask the prompt backend; never fails
    pub async fn ask(&self, prompt: &str) -> String {
        let request = BackendRequest::Prompt {
            text: prompt.to_string(),
        };
        match self.assistant.run(&request, None).await {
            TransformResult::Success { output, .. } => output,
            TransformResult::Failure { message, .. } => message,
        }
    }

    pub async fn translate_page(&self, target: &str) -> EngineResult<TransformSummary> {
        let request = ContentRequest::TranslatePage {
            target_language: target.to_string(),
            content: None,
        };
        match self.page()?.call(&request).await? {
            TranslatePageResponse::Page(summary) => Ok(summary),
            TranslatePageResponse::Text(_) => Err(EngineError::ChannelError(
                "page answered with a text translation".to_string(),
            )),
        }
    }

    /// Have the page translate `content` without touching its tree
    pub async fn translate_content(&self, content: &str, target: &str) -> EngineResult<TextTranslation> {
        let request = ContentRequest::TranslatePage {
            target_language: target.to_string(),
            content: Some(content.to_string()),
        };
        match self.page()?.call(&request).await? {
            TranslatePageResponse::Text(translation) => Ok(translation),
            TranslatePageResponse::Page(_) => Err(EngineError::ChannelError(
                "page answered with a page summary".to_string(),
            )),
        }
    }

    pub async fn translate_element(&self, selector: &str, target: &str) -> EngineResult<ElementTranslation> {
        let request = ContentRequest::TranslateElement {
            element: selector.to_string(),
            target_language: target.to_string(),
        };
        self.page()?.call(&request).await
    }

    /// Restore the page; returns how many elements were reverted
    pub async fn revert_page(&self) -> EngineResult<usize> {
        let response: RevertResponse = self.page()?.call(&ContentRequest::RevertTranslation).await?;
        Ok(response.reverted)
    }

    pub async fn extract_page(&self) -> EngineResult<PageContent> {
        self.page()?.call(&ContentRequest::ExtractPageContent).await
    }

    pub async fn insert_text(&self, text: &str) -> EngineResult<InsertResponse> {
        let request = EditorRequest::InsertText {
            text: text.to_string(),
        };
        self.page()?.call(&request).await
    }

    /// Check every capability once and report where it stands
    pub async fn status(&self) -> Vec<BackendStatus> {
        let mut statuses = Vec::new();
        for (capability, chain) in [
            ("proofread", &self.proofreader),
            ("translate", &self.translator),
            ("prompt", &self.assistant),
        ] {
            let status = match chain.check().await {
                Some((backend, state, diagnostic)) => BackendStatus {
                    capability: capability.to_string(),
                    backend: Some(backend),
                    state: Some(state),
                    diagnostic,
                },
                None => BackendStatus {
                    capability: capability.to_string(),
                    backend: None,
                    state: None,
                    diagnostic: None,
                },
            };
            statuses.push(status);
        }
        statuses
    }

    /// Release every backend session
    pub async fn shutdown(&self) {
        self.proofreader.destroy().await;
        self.translator.destroy().await;
        self.assistant.destroy().await;
    }
}
