//! The transformation engine
//!
//! Owns the original store and drives fragments of a shared document through
//! a [`FallbackChain`], one at a time, with a minimum spacing between
//! backend calls. Tree-wide work is guarded so a second request fails fast
//! instead of interleaving with the first.

use crate::backend::{Backend, BackendRequest, SessionOptions};
use crate::config::EngineConfig;
use crate::dom::{SharedDocument, Selector};
use crate::error::{EngineError, EngineResult};
use crate::fallback::{FallbackChain, TransformResult};
use crate::fragment::{FragmentSelector, PageContent};
use crate::limiter::RateLimiter;
use crate::locale::validate_locale;
use crate::store::OriginalStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a tree-wide transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSummary {
    pub translated_elements: usize,
    pub skipped: usize,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of translating a string that is not part of the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTranslation {
    pub original: String,
    pub translated: String,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of translating one element picked by selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTranslation {
    pub original: String,
    pub translated: String,
    /// The selector the element was found with
    pub element: String,
}

/// Clears the in-flight flag when the guarded operation ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransformEngine {
    document: SharedDocument,
    selector: FragmentSelector,
    chain: FallbackChain,
    limiter: RateLimiter,
    store: Mutex<OriginalStore>,
    in_flight: AtomicBool,
    config: EngineConfig,
}

impl TransformEngine {
    pub fn new(document: SharedDocument, chain: FallbackChain, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            document,
            selector: FragmentSelector::new(&config)?,
            chain,
            limiter: RateLimiter::new(config.rate_limit()),
            store: Mutex::new(OriginalStore::new()),
            in_flight: AtomicBool::new(false),
            config,
        })
    }

    /// An engine whose chain uses `backend` as primary, opened with the configured languages
    pub fn with_backend(
        document: SharedDocument,
        backend: Arc<dyn Backend>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let options = SessionOptions {
            expected_input_languages: config.expected_input_languages.clone(),
            source_language: Some(config.source_language.clone()),
            ..Default::default()
        };
        let chain = FallbackChain::new(backend, options);
        Self::new(document, chain, config)
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a guarded transform is running
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of originals currently restorable
    pub async fn originals(&self) -> usize {
        self.store.lock().await.len()
    }

    fn begin(&self) -> EngineResult<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::AlreadyInProgress)?;
        Ok(InFlight(&self.in_flight))
    }

    fn request(&self, text: &str, target: &str) -> BackendRequest {
        BackendRequest::translate(text, &self.config.source_language, target)
    }

    async fn transform(&self, request: &BackendRequest) -> TransformResult {
        if self.config.fallback_enabled {
            self.chain.run(request, None).await
        } else {
            self.chain.try_primary(request, None).await
        }
    }

    /// Translate every selected fragment of the document in place
    ///
    /// Originals from any earlier run are forgotten first. A fragment that
    /// fails is logged and counted as skipped; the run goes on.
    pub async fn transform_tree(&self, target: &str) -> EngineResult<TransformSummary> {
        validate_locale(target)?;
        let _guard = self.begin()?;
        let target = target.to_string();

        self.store.lock().await.clear();
        let fragments = {
            let doc = self.document.lock().await;
            self.selector.select(&doc)
        };
        info!(fragments = fragments.len(), target = %target, "translating page");

        let mut translated = 0;
        let mut skipped = 0;
        for fragment in fragments {
            self.limiter.acquire().await;

            match self.transform(&self.request(&fragment.trimmed, &target)).await {
                TransformResult::Success { output, .. } => {
                    let mut store = self.store.lock().await;
                    let mut doc = self.document.lock().await;
                    if doc.is_connected(fragment.node) {
                        // only text actually replaced is restorable
                        store.record(fragment.node, fragment.original.as_str());
                        doc.set_text_content(fragment.node, &output);
                        translated += 1;
                        debug!(node = fragment.node.0, "fragment translated");
                    } else {
                        skipped += 1;
                        debug!(node = fragment.node.0, "fragment detached during translation");
                    }
                }
                TransformResult::Failure { message, .. } => {
                    skipped += 1;
                    warn!(node = fragment.node.0, %message, "failed to translate fragment");
                }
            }
        }

        info!(translated, skipped, target = %target, "page translated");
        Ok(TransformSummary {
            translated_elements: translated,
            skipped,
            language: target,
            timestamp: Utc::now(),
        })
    }

    /// Translate a string supplied by the caller, leaving the tree alone
    pub async fn transform_text(&self, text: &str, target: &str) -> EngineResult<TextTranslation> {
        validate_locale(target)?;
        let _guard = self.begin()?;
        let target = target.to_string();

        self.limiter.acquire().await;
        let translated = match self.transform(&self.request(text, &target)).await {
            TransformResult::Success { output, .. } => output,
            TransformResult::Failure { message, .. } => {
                return Err(EngineError::InvocationFailure(message));
            }
        };
        Ok(TextTranslation {
            original: text.to_string(),
            translated,
            language: target,
            timestamp: Utc::now(),
        })
    }

    /// Translate the first element matching `selector` with the primary backend
    ///
    /// Unlike the tree-wide path, a backend failure is returned to the caller.
    pub async fn transform_fragment(&self, selector: &str, target: &str) -> EngineResult<ElementTranslation> {
        validate_locale(target)?;
        let parsed = Selector::parse(selector)?;

        let (node, original) = {
            let doc = self.document.lock().await;
            let node = doc
                .query_selector(&parsed)
                .ok_or_else(|| EngineError::NotFound(selector.to_string()))?;
            (node, doc.text_content(node))
        };
        let trimmed = original.trim();
        if trimmed.is_empty() {
            return Err(EngineError::EmptyContent(selector.to_string()));
        }

        self.limiter.acquire().await;
        let (translated, _) = self.chain.primary(&self.request(trimmed, target), None).await?;

        let mut store = self.store.lock().await;
        let mut doc = self.document.lock().await;
        if doc.is_connected(node) {
            store.record(node, original.as_str());
            doc.set_text_content(node, &translated);
        }
        debug!(selector, target, "element translated");

        Ok(ElementTranslation {
            original: trimmed.to_string(),
            translated,
            element: selector.to_string(),
        })
    }

    /// Restore every recorded original that is still in the document
    pub async fn revert(&self) -> usize {
        let mut store = self.store.lock().await;
        let mut doc = self.document.lock().await;
        let recorded = store.len();
        let restored = store.restore_into(&mut doc);
        info!(restored, dropped = recorded - restored, "translation reverted");
        restored
    }

    pub async fn extract_page_content(&self) -> PageContent {
        let doc = self.document.lock().await;
        self.selector.extract(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockMode};
    use crate::dom::Document;
    use std::time::Duration;

    fn page() -> Document {
        let mut doc = Document::new("Test page");
        let body = doc.body();
        let h1 = doc.append_element(body, "h1", &[("id", "title")]);
        doc.append_text(h1, "Hello world");
        let p = doc.append_element(body, "p", &[("class", "intro")]);
        doc.append_text(p, "  Good morning  ");
        let empty = doc.append_element(body, "p", &[("id", "empty")]);
        doc.append_text(empty, "   ");
        let script = doc.append_element(body, "script", &[]);
        doc.append_text(script, "var x = 1;");
        doc
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            rate_limit_ms: 0,
            ..EngineConfig::default()
        }
    }

    fn engine_with(backend: MockBackend, config: EngineConfig) -> TransformEngine {
        let doc = Arc::new(Mutex::new(page()));
        TransformEngine::with_backend(doc, Arc::new(backend), config).unwrap()
    }

    async fn text_of(engine: &TransformEngine, selector: &str) -> String {
        let doc = engine.document().lock().await;
        let node = doc.query_selector(&Selector::parse(selector).unwrap()).unwrap();
        doc.text_content(node)
    }

    #[tokio::test]
    async fn test_transform_then_revert_restores_originals() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        let summary = engine.transform_tree("fr").await.unwrap();
        assert_eq!(summary.translated_elements, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.language, "fr");
        assert_eq!(text_of(&engine, "#title").await, "Hello world_fr");
        assert_eq!(text_of(&engine, ".intro").await, "Good morning_fr");

        assert_eq!(engine.revert().await, 2);
        assert_eq!(text_of(&engine, "#title").await, "Hello world");
        assert_eq!(text_of(&engine, ".intro").await, "  Good morning  ");
        assert_eq!(engine.originals().await, 0);
    }

    #[tokio::test]
    async fn test_failed_fragments_are_skipped() {
        let engine = engine_with(
            MockBackend::new(MockMode::FailOn("morning".to_string())),
            EngineConfig {
                fallback_enabled: false,
                ..fast_config()
            },
        );
        let summary = engine.transform_tree("de").await.unwrap();
        assert_eq!(summary.translated_elements, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(text_of(&engine, ".intro").await, "  Good morning  ");
    }

    #[tokio::test]
    async fn test_revert_counts_only_translated_fragments() {
        let engine = engine_with(
            MockBackend::new(MockMode::FailOn("morning".to_string())),
            EngineConfig {
                fallback_enabled: false,
                ..fast_config()
            },
        );
        let summary = engine.transform_tree("de").await.unwrap();
        assert_eq!(engine.originals().await, 1);

        let reverted = engine.revert().await;
        assert_eq!(reverted, summary.translated_elements);
        assert_eq!(text_of(&engine, "#title").await, "Hello world");
        assert_eq!(text_of(&engine, ".intro").await, "  Good morning  ");
    }

    #[tokio::test]
    async fn test_fallback_substitutes_failed_fragments() {
        let engine = engine_with(
            MockBackend::new(MockMode::FailOn("morning".to_string())),
            fast_config(),
        );
        let summary = engine.transform_tree("de").await.unwrap();
        assert_eq!(summary.translated_elements, 2);
        assert_eq!(text_of(&engine, ".intro").await, "[Translated(de)]: Good morning");
    }

    #[tokio::test]
    async fn test_second_run_keeps_only_latest_originals() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        engine.transform_tree("fr").await.unwrap();
        engine.transform_tree("es").await.unwrap();
        assert_eq!(text_of(&engine, "#title").await, "Hello world_fr_es");

        engine.revert().await;
        assert_eq!(text_of(&engine, "#title").await, "Hello world_fr");
    }

    #[tokio::test]
    async fn test_revert_skips_detached_nodes() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        engine.transform_tree("fr").await.unwrap();
        {
            let mut doc = engine.document().lock().await;
            let intro = doc.query_selector(&Selector::parse(".intro").unwrap()).unwrap();
            doc.detach(intro);
        }
        assert_eq!(engine.revert().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_transform_is_rejected() {
        let engine = Arc::new(engine_with(
            MockBackend::new(MockMode::Suffix).with_delay(50),
            fast_config(),
        ));
        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.transform_tree("fr").await })
        };
        while !engine.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(
            engine.transform_tree("es").await.unwrap_err(),
            EngineError::AlreadyInProgress
        );
        assert_eq!(
            engine.transform_text("hi", "es").await.unwrap_err(),
            EngineError::AlreadyInProgress
        );

        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.translated_elements, 2);
        assert!(!engine.is_busy());
        assert!(engine.transform_tree("es").await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_spaces_invocations() {
        let backend = MockBackend::new(MockMode::Suffix);
        let log = backend.clone();
        let engine = engine_with(
            backend,
            EngineConfig {
                rate_limit_ms: 40,
                ..EngineConfig::default()
            },
        );
        engine.transform_tree("fr").await.unwrap();
        let times = log.invocation_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_millis(35));
    }

    #[tokio::test]
    async fn test_transform_text_leaves_tree_alone() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        let result = engine.transform_text("Some text", "it").await.unwrap();
        assert_eq!(result.translated, "Some text_it");
        assert_eq!(result.original, "Some text");
        assert_eq!(text_of(&engine, "#title").await, "Hello world");
        assert_eq!(engine.originals().await, 0);
    }

    #[tokio::test]
    async fn test_transform_fragment() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        let result = engine.transform_fragment(".intro", "fr").await.unwrap();
        assert_eq!(
            result,
            ElementTranslation {
                original: "Good morning".to_string(),
                translated: "Good morning_fr".to_string(),
                element: ".intro".to_string(),
            }
        );
        assert_eq!(engine.revert().await, 1);
        assert_eq!(text_of(&engine, ".intro").await, "  Good morning  ");
    }

    #[tokio::test]
    async fn test_transform_fragment_errors() {
        let engine = engine_with(MockBackend::new(MockMode::Suffix), fast_config());
        assert_eq!(
            engine.transform_fragment("#missing", "fr").await.unwrap_err(),
            EngineError::NotFound("#missing".to_string())
        );
        assert_eq!(
            engine.transform_fragment("#empty", "fr").await.unwrap_err(),
            EngineError::EmptyContent("#empty".to_string())
        );
        assert!(matches!(
            engine.transform_fragment("#title", "").await,
            Err(EngineError::InvalidRequest(_))
        ));

        let failing = engine_with(MockBackend::new(MockMode::Error("down".to_string())), fast_config());
        assert!(matches!(
            failing.transform_fragment("#title", "fr").await,
            Err(EngineError::InvocationFailure(_))
        ));
        assert_eq!(text_of(&failing, "#title").await, "Hello world");
    }

    #[tokio::test]
    async fn test_summary_serializes_camel_case() {
        let engine = engine_with(MockBackend::new(MockMode::NoOp), fast_config());
        let summary = engine.transform_tree("en-US").await.unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["translatedElements"], 2);
        assert_eq!(json["language"], "en-US");
        assert!(json["timestamp"].is_string());
    }
}
