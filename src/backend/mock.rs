//! Mock backend for testing
//!
//! A deterministic, network-free [`Backend`] for exercising sessions, the
//! fallback chain and the engine. Availability, download progress, per-call
//! behavior and latency are all scripted.
//!
//! # Example
//!
//! ```ignore
//! use glossa::backend::{MockBackend, MockMode, MockAvailability};
//!
//! let backend = MockBackend::new(MockMode::Suffix)
//!     .with_availability(MockAvailability::Downloadable(vec![0.1, 0.5, 1.0]))
//!     .with_delay(20);
//! ```

use super::{
    Availability, Backend, BackendError, BackendRequest, BackendResult, BackendSession,
    ProgressSink, SessionOptions,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// How a mock session answers requests
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append a suffix: "hello" → "hello_fr" (translate), "hello_proofread", "hello_prompt"
    Suffix,

    /// Predefined answers keyed by (text, target); unknown keys fall back to `Suffix`.
    /// Proofread requests use the target "proofread", prompts use "prompt".
    Mappings(HashMap<(String, String), String>),

    /// Reverse the word order
    Reorder,

    /// Every request fails
    Error(String),

    /// Requests whose text contains the pattern fail, others behave like `Suffix`
    FailOn(String),

    /// Return input unchanged
    NoOp,

    /// Return this raw answer for every request, whatever its shape
    Scripted(Value),
}

/// What the availability check and session creation do
#[derive(Debug, Clone)]
pub enum MockAvailability {
    /// Ready without any download
    Available,

    /// Needs a download; `create` reports each loaded fraction in order
    Downloadable(Vec<f64>),

    /// Download starts, reports the given fractions, then fails
    DownloadFails { steps: Vec<f64>, reason: String },

    Unavailable,

    /// The check itself throws
    CheckError(String),
}

#[derive(Debug, Default)]
struct MockLog {
    invocations: Mutex<Vec<(Instant, BackendRequest)>>,
    availability_checks: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl MockLog {
    fn record(&self, request: &BackendRequest) {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), request.clone()));
    }
}

/// Mock backend that simulates various availability and translation scenarios
#[derive(Debug, Clone)]
pub struct MockBackend {
    name: String,
    mode: MockMode,
    availability: MockAvailability,
    /// Simulated latency per invocation, in milliseconds
    delay_ms: u64,
    log: Arc<MockLog>,
}

impl MockBackend {
    pub fn new(mode: MockMode) -> Self {
        Self {
            name: "Mock Backend".to_string(),
            mode,
            availability: MockAvailability::Available,
            delay_ms: 0,
            log: Arc::new(MockLog::default()),
        }
    }

    pub fn with_availability(mut self, availability: MockAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Requests handled so far, in order
    pub fn invocations(&self) -> Vec<BackendRequest> {
        self.log
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// When each request started
    pub fn invocation_times(&self) -> Vec<Instant> {
        self.log
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn availability_checks(&self) -> usize {
        self.log.availability_checks.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> usize {
        self.log.created.load(Ordering::SeqCst)
    }

    pub fn sessions_destroyed(&self) -> usize {
        self.log.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn availability(&self) -> BackendResult<Availability> {
        self.log.availability_checks.fetch_add(1, Ordering::SeqCst);
        match &self.availability {
            MockAvailability::Available => Ok(Availability::Available),
            MockAvailability::Downloadable(_) | MockAvailability::DownloadFails { .. } => {
                Ok(Availability::Downloadable)
            }
            MockAvailability::Unavailable => Ok(Availability::Unavailable),
            MockAvailability::CheckError(msg) => Err(BackendError::Failed(msg.clone())),
        }
    }

    async fn create(
        &self,
        _options: &SessionOptions,
        progress: ProgressSink,
    ) -> BackendResult<Arc<dyn BackendSession>> {
        match &self.availability {
            MockAvailability::Available => {}
            MockAvailability::Downloadable(steps) => {
                for step in steps {
                    progress.report(*step);
                    tokio::task::yield_now().await;
                }
            }
            MockAvailability::DownloadFails { steps, reason } => {
                for step in steps {
                    progress.report(*step);
                    tokio::task::yield_now().await;
                }
                return Err(BackendError::Failed(reason.clone()));
            }
            MockAvailability::Unavailable => {
                return Err(BackendError::NotAvailable(self.name.clone()));
            }
            MockAvailability::CheckError(msg) => return Err(BackendError::Failed(msg.clone())),
        }

        self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            mode: self.mode.clone(),
            delay_ms: self.delay_ms,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockSession {
    mode: MockMode,
    delay_ms: u64,
    log: Arc<MockLog>,
}

impl MockSession {
    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_mode(&self, text: &str, target: &str) -> BackendResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => Ok(map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target))),
            MockMode::Reorder => Ok(text.split_whitespace().rev().collect::<Vec<_>>().join(" ")),
            MockMode::Error(msg) => Err(BackendError::Failed(msg.clone())),
            MockMode::FailOn(pattern) if text.contains(pattern.as_str()) => Err(BackendError::Failed(
                format!("refusing to handle text containing '{}'", pattern),
            )),
            MockMode::FailOn(_) => Ok(format!("{}_{}", text, target)),
            MockMode::NoOp => Ok(text.to_string()),
            MockMode::Scripted(_) => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl BackendSession for MockSession {
    async fn invoke(&self, request: &BackendRequest) -> BackendResult<Value> {
        self.log.record(request);
        self.apply_delay().await;

        if let MockMode::Scripted(raw) = &self.mode {
            return Ok(raw.clone());
        }

        match request {
            BackendRequest::Translate {
                text,
                target_language,
                ..
            } => Ok(json!({ "translation": self.apply_mode(text, target_language)? })),
            BackendRequest::Proofread { text } => Ok(json!({
                "correctedInput": self.apply_mode(text, "proofread")?,
                "corrections": []
            })),
            BackendRequest::Prompt { text } => Ok(Value::String(self.apply_mode(text, "prompt")?)),
        }
    }

    async fn destroy(&self) {
        self.log.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(backend: &MockBackend) -> Arc<dyn BackendSession> {
        backend
            .create(&SessionOptions::default(), ProgressSink::disabled())
            .await
            .unwrap()
    }

    // ========== Mode Tests ==========

    #[tokio::test]
    async fn test_suffix_translation() {
        let backend = MockBackend::new(MockMode::Suffix);
        let session = open(&backend).await;
        let raw = session
            .invoke(&BackendRequest::translate("hello", "auto", "fr"))
            .await
            .unwrap();
        assert_eq!(raw, json!({ "translation": "hello_fr" }));
    }

    #[tokio::test]
    async fn test_mapping_with_fallback_to_suffix() {
        let mut map = HashMap::new();
        map.insert(("hello".to_string(), "fr".to_string()), "bonjour".to_string());
        let backend = MockBackend::new(MockMode::Mappings(map));
        let session = open(&backend).await;

        let known = session
            .invoke(&BackendRequest::translate("hello", "auto", "fr"))
            .await
            .unwrap();
        assert_eq!(known["translation"], "bonjour");
        let unknown = session
            .invoke(&BackendRequest::translate("bye", "auto", "fr"))
            .await
            .unwrap();
        assert_eq!(unknown["translation"], "bye_fr");
    }

    #[tokio::test]
    async fn test_reorder_reverses_words() {
        let backend = MockBackend::new(MockMode::Reorder);
        let session = open(&backend).await;
        let raw = session
            .invoke(&BackendRequest::translate("one two three", "en", "ja"))
            .await
            .unwrap();
        assert_eq!(raw["translation"], "three two one");
    }

    #[tokio::test]
    async fn test_proofread_and_prompt_shapes() {
        let backend = MockBackend::new(MockMode::NoOp);
        let session = open(&backend).await;
        let proofread = session
            .invoke(&BackendRequest::Proofread {
                text: "fine".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(proofread, json!({ "correctedInput": "fine", "corrections": [] }));
        let prompt = session
            .invoke(&BackendRequest::Prompt {
                text: "hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(prompt, Value::String("hi".to_string()));
    }

    #[tokio::test]
    async fn test_error_and_fail_on() {
        let failing = MockBackend::new(MockMode::Error("API unavailable".to_string()));
        let session = open(&failing).await;
        let result = session
            .invoke(&BackendRequest::translate("hello", "auto", "fr"))
            .await;
        assert_eq!(result, Err(BackendError::Failed("API unavailable".to_string())));

        let picky = MockBackend::new(MockMode::FailOn("bad".to_string()));
        let session = open(&picky).await;
        assert!(session
            .invoke(&BackendRequest::translate("a bad one", "auto", "fr"))
            .await
            .is_err());
        assert!(session
            .invoke(&BackendRequest::translate("a good one", "auto", "fr"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_scripted_returns_raw_answer() {
        let raw = json!({ "translatedText": "salut" });
        let backend = MockBackend::new(MockMode::Scripted(raw.clone()));
        let session = open(&backend).await;
        let answer = session
            .invoke(&BackendRequest::translate("hi", "auto", "fr"))
            .await
            .unwrap();
        assert_eq!(answer, raw);
    }

    // ========== Availability Tests ==========

    #[tokio::test]
    async fn test_downloadable_reports_steps() {
        let backend = MockBackend::new(MockMode::Suffix)
            .with_availability(MockAvailability::Downloadable(vec![0.2, 0.6, 1.0]));
        assert_eq!(backend.availability().await, Ok(Availability::Downloadable));

        let (sink, mut rx) = ProgressSink::channel();
        backend.create(&SessionOptions::default(), sink).await.unwrap();
        let mut seen = Vec::new();
        while let Some(step) = rx.recv().await {
            seen.push(step);
        }
        assert_eq!(seen, vec![0.2, 0.6, 1.0]);
        assert_eq!(backend.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_check_error_and_unavailable() {
        let broken = MockBackend::new(MockMode::Suffix)
            .with_availability(MockAvailability::CheckError("boom".to_string()));
        assert!(broken.availability().await.is_err());
        assert_eq!(broken.availability_checks(), 1);

        let absent =
            MockBackend::new(MockMode::Suffix).with_availability(MockAvailability::Unavailable);
        assert_eq!(absent.availability().await, Ok(Availability::Unavailable));
        assert!(absent
            .create(&SessionOptions::default(), ProgressSink::disabled())
            .await
            .is_err());
    }

    // ========== Log Tests ==========

    #[tokio::test]
    async fn test_log_records_invocations_and_destroy() {
        let backend = MockBackend::new(MockMode::Suffix).with_delay(5);
        let session = open(&backend).await;
        session
            .invoke(&BackendRequest::translate("a", "auto", "de"))
            .await
            .unwrap();
        session
            .invoke(&BackendRequest::translate("b", "auto", "de"))
            .await
            .unwrap();
        session.destroy().await;

        let texts: Vec<String> = backend
            .invocations()
            .iter()
            .map(|r| r.text().to_string())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
        let times = backend.invocation_times();
        assert!(times[1] - times[0] >= Duration::from_millis(5));
        assert_eq!(backend.sessions_destroyed(), 1);
    }

    #[test]
    fn test_backend_name() {
        let backend = MockBackend::new(MockMode::Suffix).with_name("Proofreader");
        assert_eq!(backend.name(), "Proofreader");
    }
}
