//! LibreTranslate backend
//!
//! Talks to a LibreTranslate server over HTTP. Availability is checked with
//! `GET /languages`; translation requests go to `POST /translate`. Only
//! translation is supported; proofreading and prompts are refused so the
//! fallback chain substitutes its local transforms.
//!
//! # Configuration
//!
//! [`LibreTranslateBackend::from_env`] reads the server URL from
//! `GLOSSA_LIBRETRANSLATE_URL` and an optional key from
//! `GLOSSA_LIBRETRANSLATE_API_KEY`.
//!
//! # Example
//!
//! ```ignore
//! use glossa::{FallbackChain, SessionOptions};
//! use glossa_mt::LibreTranslateBackend;
//! use std::sync::Arc;
//!
//! let backend = LibreTranslateBackend::from_env()?;
//! let chain = FallbackChain::new(Arc::new(backend), SessionOptions::default());
//! ```

use async_trait::async_trait;
use glossa::backend::{
    Availability, Backend, BackendError, BackendRequest, BackendResult, BackendSession,
    ProgressSink, SessionOptions,
};
use glossa::locale::{AUTO_DETECT, normalize_locale, validate_locale};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub const URL_VAR: &str = "GLOSSA_LIBRETRANSLATE_URL";
pub const API_KEY_VAR: &str = "GLOSSA_LIBRETRANSLATE_API_KEY";

/// One entry of `GET /languages`
#[derive(Debug, Clone, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

#[derive(Clone)]
pub struct LibreTranslateBackend {
    /// Server root, without a trailing slash
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LibreTranslateBackend {
    /// Longest text sent in one request, in chars
    const MAX_CHARS_PER_STRING: usize = 10_000;

    pub fn new(base_url: &str, api_key: Option<String>) -> BackendResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(BackendError::NotAvailable(
                "LibreTranslate URL cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    /// Build from `GLOSSA_LIBRETRANSLATE_URL` and `GLOSSA_LIBRETRANSLATE_API_KEY`
    pub fn from_env() -> BackendResult<Self> {
        let url = std::env::var(URL_VAR).map_err(|_| {
            BackendError::NotAvailable(format!("{} environment variable not set", URL_VAR))
        })?;
        Self::new(&url, std::env::var(API_KEY_VAR).ok())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Languages the server can translate
    pub async fn languages(&self) -> BackendResult<Vec<Language>> {
        let response = self
            .client
            .get(self.endpoint("languages"))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Failed(format!(
                "language listing answered {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| BackendError::Failed(format!("Failed to parse language list: {}", e)))
    }

    fn translation_body(&self, text: &str, source: &str, target: &str) -> Value {
        let source = if source == AUTO_DETECT {
            AUTO_DETECT.to_string()
        } else {
            normalize_locale(source)
        };
        let mut body = json!({
            "q": text,
            "source": source,
            "target": normalize_locale(target),
            "format": "text"
        });
        if let Some(key) = &self.api_key {
            body["api_key"] = Value::String(key.clone());
        }
        body
    }

    /// Translate one string; returns the server's raw JSON answer
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> BackendResult<Value> {
        validate_locale(source).map_err(|e| BackendError::Unsupported(e.to_string()))?;
        validate_locale(target).map_err(|e| BackendError::Unsupported(e.to_string()))?;

        if text.is_empty() {
            return Ok(json!({ "translatedText": "" }));
        }
        if text.chars().count() > Self::MAX_CHARS_PER_STRING {
            return Err(BackendError::Unsupported(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }

        debug!(source, target, chars = text.chars().count(), "LibreTranslate request");
        let response = self
            .client
            .post(self.endpoint("translate"))
            .json(&self.translation_body(text, source, target))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Failed(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Failed(format!("Failed to parse API response: {}", e)))?;
        if raw.get("translatedText").and_then(Value::as_str).is_none() {
            return Err(BackendError::Failed(
                "Invalid API response: missing 'translatedText' field".to_string(),
            ));
        }
        Ok(raw)
    }
}

impl std::fmt::Debug for LibreTranslateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreTranslateBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait]
impl Backend for LibreTranslateBackend {
    fn name(&self) -> &str {
        "LibreTranslate"
    }

    async fn availability(&self) -> BackendResult<Availability> {
        let languages = self.languages().await?;
        if languages.is_empty() {
            Ok(Availability::Unavailable)
        } else {
            Ok(Availability::Available)
        }
    }

    /// Nothing to download; the session is the HTTP client itself
    async fn create(
        &self,
        _options: &SessionOptions,
        _progress: ProgressSink,
    ) -> BackendResult<Arc<dyn BackendSession>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BackendSession for LibreTranslateBackend {
    async fn invoke(&self, request: &BackendRequest) -> BackendResult<Value> {
        match request {
            BackendRequest::Translate {
                text,
                source_language,
                target_language,
            } => self.translate(text, source_language, target_language).await,
            other => Err(BackendError::Unsupported(format!(
                "LibreTranslate cannot handle {} requests",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LibreTranslateBackend {
        LibreTranslateBackend::new("http://localhost:5000/", Some("secret-key".to_string())).unwrap()
    }

    // ========== Initialization Tests ==========

    #[test]
    fn test_new_with_empty_url() {
        let result = LibreTranslateBackend::new("   ", None);
        match result {
            Err(BackendError::NotAvailable(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected NotAvailable"),
        }
    }

    #[test]
    fn test_from_env_without_url() {
        unsafe {
            std::env::remove_var(URL_VAR);
        }
        match LibreTranslateBackend::from_env() {
            Err(BackendError::NotAvailable(msg)) => assert!(msg.contains("not set")),
            _ => panic!("Expected NotAvailable"),
        }
    }

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(backend().endpoint("translate"), "http://localhost:5000/translate");
        assert_eq!(backend().endpoint("/languages"), "http://localhost:5000/languages");
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let backend = LibreTranslateBackend::new("http://x", Some("  ".to_string())).unwrap();
        let body = backend.translation_body("hi", "auto", "fr");
        assert!(body.get("api_key").is_none());
    }

    #[test]
    fn test_translation_body() {
        let body = backend().translation_body("Hello", "en-US", "pt_BR");
        assert_eq!(
            body,
            json!({
                "q": "Hello",
                "source": "en",
                "target": "pt",
                "format": "text",
                "api_key": "secret-key"
            })
        );
        assert_eq!(backend().translation_body("Hello", "auto", "fr")["source"], "auto");
    }

    // ========== Validation Tests ==========

    #[tokio::test]
    async fn test_translate_empty_text() {
        let raw = backend().translate("", "auto", "fr").await.unwrap();
        assert_eq!(raw["translatedText"], "");
    }

    #[tokio::test]
    async fn test_translate_invalid_locale() {
        assert!(matches!(
            backend().translate("hello", "auto", "bad#code").await,
            Err(BackendError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_translate_text_too_long() {
        let long_text = "x".repeat(LibreTranslateBackend::MAX_CHARS_PER_STRING + 1);
        match backend().translate(&long_text, "en", "fr").await {
            Err(BackendError::Unsupported(msg)) => assert!(msg.contains("exceeds maximum")),
            _ => panic!("Expected Unsupported"),
        }
    }

    #[tokio::test]
    async fn test_proofread_is_unsupported() {
        let result = backend()
            .invoke(&BackendRequest::Proofread {
                text: "hi".to_string(),
            })
            .await;
        assert!(matches!(result, Err(BackendError::Unsupported(_))));
    }

    #[test]
    fn test_debug_masks_key() {
        let debug_str = format!("{:?}", backend());
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("secret-key"));
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(Backend::name(&backend()), "LibreTranslate");
    }

    // ========== Integration Tests (require a running server) ==========

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_server_languages() {
        if std::env::var(URL_VAR).is_err() {
            eprintln!("Skipping: {} not set", URL_VAR);
            return;
        }
        let backend = LibreTranslateBackend::from_env().unwrap();
        let languages = backend.languages().await.unwrap();
        assert!(!languages.is_empty());
        assert_eq!(backend.availability().await.unwrap(), Availability::Available);
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_server_translation() {
        if std::env::var(URL_VAR).is_err() {
            eprintln!("Skipping: {} not set", URL_VAR);
            return;
        }
        let backend = LibreTranslateBackend::from_env().unwrap();
        let raw = backend.translate("Hello", "en", "fr").await.unwrap();
        println!("Translation: Hello → {}", raw["translatedText"]);
        assert!(!raw["translatedText"].as_str().unwrap().is_empty());
    }
}
