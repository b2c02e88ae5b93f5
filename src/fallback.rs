//! Primary backend with a deterministic local substitute
//!
//! [`FallbackChain::run`] always produces a result: it tries the backend
//! (opening it and streaming install progress if needed) and degrades to a
//! local transform when the backend is missing, unavailable or failing.
//! Backend answers are normalized here, since providers disagree on field
//! names.

use crate::backend::{Backend, BackendRequest, SessionOptions};
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::proofread::{self, CorrectionSpan};
use crate::session::{ProgressFn, SessionState, TransformationSession};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Answer of the local prompt substitute
pub const ASSISTANT_UNAVAILABLE: &str = "AI system is initializing. Please wait a moment...";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformMetadata {
    /// Backend that produced the output; `None` for the local substitute
    pub backend: Option<String>,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<CorrectionSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransformResult {
    Success {
        output: String,
        metadata: TransformMetadata,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl TransformResult {
    pub fn failure(error: &EngineError) -> Self {
        TransformResult::Failure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransformResult::Success { .. })
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            TransformResult::Success { output, .. } => Some(output),
            TransformResult::Failure { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&TransformMetadata> {
        match self {
            TransformResult::Success { metadata, .. } => Some(metadata),
            TransformResult::Failure { .. } => None,
        }
    }
}

pub struct FallbackChain {
    session: Option<Mutex<TransformationSession>>,
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("primary", &self.session.is_some())
            .finish()
    }
}

impl FallbackChain {
    pub fn new(backend: Arc<dyn Backend>, options: SessionOptions) -> Self {
        Self {
            session: Some(Mutex::new(TransformationSession::new(backend, options))),
        }
    }

    /// A chain with no primary backend; every request uses the local substitute
    pub fn local_only() -> Self {
        Self { session: None }
    }

    /// Transform `input`, falling back to the local substitute on any primary failure
    pub async fn run(&self, input: &BackendRequest, on_progress: Option<&ProgressFn<'_>>) -> TransformResult {
        match self.try_primary(input, on_progress).await {
            TransformResult::Failure { kind, message } => {
                if kind == ErrorKind::BackendUnavailable {
                    debug!(kind = input.kind(), %message, "using local fallback");
                } else {
                    warn!(kind = input.kind(), %message, "primary backend failed, using local fallback");
                }
                local_transform(input)
            }
            success => success,
        }
    }

    /// Transform `input` with the primary backend only
    pub async fn try_primary(
        &self,
        input: &BackendRequest,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> TransformResult {
        match self.primary(input, on_progress).await {
            Ok((output, metadata)) => TransformResult::Success { output, metadata },
            Err(e) => TransformResult::failure(&e),
        }
    }

    /// Like [`try_primary`](Self::try_primary), but keeps the error
    pub async fn primary(
        &self,
        input: &BackendRequest,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<(String, TransformMetadata)> {
        let Some(session) = &self.session else {
            return Err(EngineError::BackendUnavailable(
                "no backend registered".to_string(),
            ));
        };

        let mut session = session.lock().await;
        session.ensure_ready(on_progress).await?;
        let raw = session.invoke(input).await?;
        Ok(normalize(input, &raw, session.backend_name()))
    }

    /// Current primary state without probing; `None` when there is no primary
    pub async fn state(&self) -> Option<SessionState> {
        match &self.session {
            Some(session) => Some(session.lock().await.state()),
            None => None,
        }
    }

    /// Check the primary once and report its state and diagnostic
    pub async fn check(&self) -> Option<(String, SessionState, Option<String>)> {
        let session = self.session.as_ref()?;
        let mut session = session.lock().await;
        let state = session.check_availability().await.unwrap_or(SessionState::Destroyed);
        Some((
            session.backend_name().to_string(),
            state,
            session.diagnostic().map(str::to_string),
        ))
    }

    pub async fn destroy(&self) {
        if let Some(session) = &self.session {
            session.lock().await.destroy().await;
        }
    }
}

/// The deterministic substitute for each request kind
pub fn local_transform(input: &BackendRequest) -> TransformResult {
    let output = match input {
        BackendRequest::Proofread { text } => proofread::local_proofread(text),
        BackendRequest::Translate {
            text,
            target_language,
            ..
        } => local_translate(text, target_language),
        BackendRequest::Prompt { .. } => ASSISTANT_UNAVAILABLE.to_string(),
    };
    TransformResult::Success {
        output,
        metadata: TransformMetadata {
            backend: None,
            fallback_used: true,
            corrections: Vec::new(),
        },
    }
}

pub fn local_translate(text: &str, target: &str) -> String {
    format!("[Translated({})]: {}", target, text)
}

fn normalize(input: &BackendRequest, raw: &Value, backend: &str) -> (String, TransformMetadata) {
    let (output, corrections) = match input {
        BackendRequest::Translate { text, .. } => (normalize_translation(raw, text), Vec::new()),
        BackendRequest::Proofread { text } => normalize_proofread(raw, text),
        BackendRequest::Prompt { .. } => (normalize_prompt(raw), Vec::new()),
    };
    let metadata = TransformMetadata {
        backend: Some(backend.to_string()),
        fallback_used: false,
        corrections,
    };
    (output, metadata)
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    if let Some(s) = raw.as_str() {
        return Some(s.to_string());
    }
    keys.iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Translated text from a raw answer; an empty answer keeps the input
pub fn normalize_translation(raw: &Value, original: &str) -> String {
    string_field(raw, &["translation", "translatedText", "result"])
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| original.to_string())
}

/// Corrected text and corrections from a raw answer
///
/// When spans are present the corrected text is rebuilt from them so both
/// always agree.
pub fn normalize_proofread(raw: &Value, original: &str) -> (String, Vec<CorrectionSpan>) {
    let corrections = proofread::sort_corrections(&proofread::parse_corrections(raw), original);
    if !corrections.is_empty() {
        return (proofread::apply_corrections(original, &corrections), corrections);
    }
    let corrected = string_field(raw, &["correctedInput", "correctedText", "transformed", "text"])
        .unwrap_or_else(|| original.to_string());
    (corrected, corrections)
}

pub fn normalize_prompt(raw: &Value) -> String {
    string_field(raw, &["response", "text", "output"]).unwrap_or_else(|| raw.to_string())
}
