//! Backend capability surface
//!
//! A backend is an external transformation capability (translation,
//! proofreading, prompting) that may be absent, downloadable, or ready. This
//! module defines the seam the engine talks through, without coupling the
//! library to any concrete provider:
//!
//! - [`Backend`] checks availability and opens sessions, streaming install
//!   progress through a [`ProgressSink`].
//! - [`BackendSession`] handles requests and returns the provider's raw JSON
//!   answer, which the fallback chain normalizes.
//!
//! # Example
//!
//! ```ignore
//! use glossa::backend::{Backend, BackendRequest, MockBackend, MockMode, ProgressSink};
//!
//! let backend = MockBackend::new(MockMode::Suffix);
//! let (sink, _events) = ProgressSink::channel();
//! let session = backend.create(&Default::default(), sink).await?;
//! let raw = session.invoke(&BackendRequest::translate("hello", "auto", "fr")).await?;
//! ```

pub mod mock;

pub use mock::{MockAvailability, MockBackend, MockMode};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by backend providers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend failed: {0}")]
    Failed(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// What a availability check reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Unavailable,
    /// The model must be downloaded before a session can be opened
    Downloadable,
    /// A download is already running; opening a session waits for it
    Downloading,
    #[serde(alias = "readily", alias = "readable")]
    Available,
}

impl Availability {
    /// Parse an availability answer, accepting the older "readily"/"readable" spellings
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unavailable" | "no" => Some(Availability::Unavailable),
            "downloadable" | "after-download" => Some(Availability::Downloadable),
            "downloading" => Some(Availability::Downloading),
            "available" | "readily" | "readable" => Some(Availability::Available),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unavailable => "unavailable",
            Availability::Downloadable => "downloadable",
            Availability::Downloading => "downloading",
            Availability::Available => "available",
        }
    }
}

/// Options used when opening a backend session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    pub expected_input_languages: Vec<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub system_prompt: Option<String>,
}

/// A single request to a backend session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BackendRequest {
    Prompt {
        text: String,
    },
    Proofread {
        text: String,
    },
    Translate {
        text: String,
        source_language: String,
        target_language: String,
    },
}

impl BackendRequest {
    pub fn translate(text: &str, source_language: &str, target_language: &str) -> Self {
        BackendRequest::Translate {
            text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            BackendRequest::Prompt { text }
            | BackendRequest::Proofread { text }
            | BackendRequest::Translate { text, .. } => text,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendRequest::Prompt { .. } => "prompt",
            BackendRequest::Proofread { .. } => "proofread",
            BackendRequest::Translate { .. } => "translate",
        }
    }
}

/// Receives install progress from a backend while a session is being opened
///
/// Values are the loaded fraction in `0.0..=1.0`. Reporting is best-effort:
/// a dropped receiver is not an error.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<f64>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<f64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards every report
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, loaded: f64) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(loaded);
        }
    }
}

/// A capability that can be checked and opened
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in logs and in result metadata
    fn name(&self) -> &str;

    /// Check whether the capability can be used
    async fn availability(&self) -> BackendResult<Availability>;

    /// Open a session, downloading whatever is missing first
    async fn create(
        &self,
        options: &SessionOptions,
        progress: ProgressSink,
    ) -> BackendResult<Arc<dyn BackendSession>>;
}

/// An open backend session
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Handle one request and return the provider's raw answer
    async fn invoke(&self, request: &BackendRequest) -> BackendResult<serde_json::Value>;

    /// Release provider resources
    async fn destroy(&self) {}
}
