//! End-to-end flows: panel → bridge → engine → document, and back.

use crate::backend::{MockBackend, MockMode};
use crate::bridge::{ContentListener, EditorListener, Endpoint, WritingListener};
use crate::bridge::messages::PanelNotice;
use crate::config::EngineConfig;
use crate::dom::{Document, Selector, SharedDocument};
use crate::engine::TransformEngine;
use crate::error::EngineError;
use crate::fallback::FallbackChain;
use crate::panel::PanelController;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PAGE: &str = r#"{
    "title": "Garden news",
    "body": [
        { "tag": "nav", "children": [
            { "tag": "a", "attrs": { "href": "/" }, "children": ["Home"] }
        ]},
        { "tag": "article", "children": [
            { "tag": "h1", "attrs": { "id": "headline" }, "children": ["Spring is here"] },
            { "tag": "p", "attrs": { "class": "lead" }, "children": ["The tulips are blooming early this year, and the gardeners are delighted."] },
            { "tag": "p", "children": ["Visitors can walk the new path along the pond every weekend until June."] },
            { "tag": "img", "attrs": { "alt": "Tulips", "src": "tulips.jpg" } }
        ]},
        { "tag": "script", "children": ["track('visit');"] },
        { "tag": "div", "attrs": { "aria-hidden": "true" }, "children": ["Decoration"] },
        { "tag": "textarea", "attrs": { "id": "comment" } }
    ],
    "focused": "comment"
}"#;

struct Harness {
    document: SharedDocument,
    backend: MockBackend,
    engine: Arc<TransformEngine>,
    panel: PanelController,
}

fn harness(backend: MockBackend, config: EngineConfig) -> Harness {
    let document: SharedDocument = Arc::new(Mutex::new(Document::from_json(PAGE).unwrap()));
    let engine = Arc::new(
        TransformEngine::with_backend(Arc::clone(&document), Arc::new(backend.clone()), config)
            .unwrap(),
    );
    let page = Endpoint::new()
        .with_listener(Arc::new(ContentListener::new(Arc::clone(&engine))))
        .with_listener(Arc::new(EditorListener::new(Arc::clone(&document))))
        .spawn();
    let panel = PanelController::new(
        FallbackChain::local_only(),
        FallbackChain::local_only(),
        FallbackChain::local_only(),
    )
    .with_page(page);
    Harness {
        document,
        backend,
        engine,
        panel,
    }
}

fn fast() -> EngineConfig {
    EngineConfig {
        rate_limit_ms: 0,
        ..EngineConfig::default()
    }
}

async fn text_of(document: &SharedDocument, selector: &str) -> String {
    let doc = document.lock().await;
    let node = doc.query_selector(&Selector::parse(selector).unwrap()).unwrap();
    doc.text_content(node)
}

#[tokio::test]
async fn test_translate_then_revert_over_bridge() {
    let h = harness(MockBackend::new(MockMode::Suffix), fast());
    let before = h.document.lock().await.to_spec();

    let summary = h.panel.translate_page("fr").await.unwrap();
    assert_eq!(summary.translated_elements, 4);
    assert_eq!(summary.language, "fr");
    assert_eq!(text_of(&h.document, "#headline").await, "Spring is here_fr");
    assert_eq!(text_of(&h.document, "script").await, "track('visit');");

    assert_eq!(h.panel.revert_page().await.unwrap(), 4);
    assert_eq!(h.document.lock().await.to_spec(), before);
}

#[tokio::test]
async fn test_revert_skips_removed_elements() {
    let h = harness(MockBackend::new(MockMode::Suffix), fast());
    h.panel.translate_page("de").await.unwrap();
    {
        let mut doc = h.document.lock().await;
        let lead = doc.query_selector(&Selector::parse(".lead").unwrap()).unwrap();
        doc.detach(lead);
    }
    assert_eq!(h.panel.revert_page().await.unwrap(), 3);
    assert_eq!(h.panel.revert_page().await.unwrap(), 0);
}

#[tokio::test]
async fn test_second_translation_replaces_originals() {
    let h = harness(MockBackend::new(MockMode::Suffix), fast());
    h.panel.translate_page("fr").await.unwrap();
    h.panel.translate_page("es").await.unwrap();
    h.panel.revert_page().await.unwrap();
    assert_eq!(text_of(&h.document, "#headline").await, "Spring is here_fr");
}

#[tokio::test]
async fn test_concurrent_page_translation_is_rejected() {
    let h = harness(MockBackend::new(MockMode::Suffix).with_delay(40), fast());
    let page = h.panel.translate_page("fr");
    let second = async {
        while !h.engine.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        h.panel.translate_page("es").await
    };
    let (first, second) = tokio::join!(page, second);

    assert_eq!(first.unwrap().translated_elements, 4);
    assert_eq!(
        second.unwrap_err(),
        EngineError::Remote("Translation already in progress".to_string())
    );
    assert_eq!(text_of(&h.document, "#headline").await, "Spring is here_fr");
}

#[tokio::test]
async fn test_translate_content_leaves_page_alone() {
    let h = harness(MockBackend::new(MockMode::Suffix), fast());
    let result = h.panel.translate_content("Good evening", "it").await.unwrap();
    assert_eq!(result.translated, "Good evening_it");
    assert_eq!(text_of(&h.document, "#headline").await, "Spring is here");
}

#[tokio::test]
async fn test_translate_element_and_missing_element() {
    let h = harness(MockBackend::new(MockMode::Suffix), fast());
    let result = h.panel.translate_element("#headline", "nl").await.unwrap();
    assert_eq!(result.original, "Spring is here");
    assert_eq!(result.translated, "Spring is here_nl");
    assert_eq!(result.element, "#headline");

    let missing = h.panel.translate_element("#missing", "nl").await.unwrap_err();
    assert_eq!(missing, EngineError::Remote("Element not found: #missing".to_string()));
}

#[tokio::test]
async fn test_unavailable_backend_falls_back_per_fragment() {
    let h = harness(MockBackend::new(MockMode::Error("model crashed".to_string())), fast());
    let summary = h.panel.translate_page("fr").await.unwrap();
    assert_eq!(summary.translated_elements, 4);
    assert_eq!(
        text_of(&h.document, "#headline").await,
        "[Translated(fr)]: Spring is here"
    );
    assert_eq!(h.backend.invocations().len(), 4);
}

#[tokio::test]
async fn test_rate_limit_between_fragments() {
    let h = harness(
        MockBackend::new(MockMode::Suffix),
        EngineConfig {
            rate_limit_ms: 25,
            ..EngineConfig::default()
        },
    );
    h.panel.translate_page("fr").await.unwrap();
    let times = h.backend.invocation_times();
    assert_eq!(times.len(), 4);
    let total = times[3] - times[0];
    assert!(total >= Duration::from_millis(70), "took only {:?}", total);
}

#[tokio::test]
async fn test_extract_page_content_prefers_article() {
    let h = harness(MockBackend::new(MockMode::NoOp), fast());
    let content = h.panel.extract_page().await.unwrap();
    assert_eq!(content.title, "Garden news");
    assert!(content.main_text.starts_with("Spring is here"));
    assert!(!content.main_text.contains("Home"));
    assert_eq!(content.links.len(), 1);
    assert_eq!(content.images[0].alt, "Tulips");
}

#[tokio::test]
async fn test_insert_text_into_focused_textarea() {
    let h = harness(MockBackend::new(MockMode::NoOp), fast());
    let response = h.panel.insert_text("Lovely photos!").await.unwrap();
    assert!(response.ok);
    let doc = h.document.lock().await;
    let comment = doc.query_selector(&Selector::parse("#comment").unwrap()).unwrap();
    assert_eq!(doc.attribute(comment, "value"), Some("Lovely photos!"));
}

#[tokio::test]
async fn test_unknown_and_malformed_actions() {
    let document: SharedDocument = Arc::new(Mutex::new(Document::from_json(PAGE).unwrap()));
    let engine = Arc::new(
        TransformEngine::new(Arc::clone(&document), FallbackChain::local_only(), fast()).unwrap(),
    );
    let client = Endpoint::new()
        .with_listener(Arc::new(ContentListener::new(engine)))
        .spawn();

    let unknown = client.request(json!({ "action": "danceParty" })).await;
    assert!(matches!(unknown, Err(EngineError::ChannelError(_))));

    let malformed = client
        .request(json!({ "action": "translateElement", "element": 42 }))
        .await
        .unwrap();
    assert!(malformed["error"].as_str().unwrap().contains("translateElement"));

    let no_target = client
        .request(json!({ "action": "translatePage", "targetLanguage": "" }))
        .await
        .unwrap();
    assert_eq!(no_target, json!({ "error": "Invalid request: Target language is required" }));

    let reverted = client
        .request(json!({ "action": "revertTranslation" }))
        .await
        .unwrap();
    assert_eq!(reverted, json!({ "success": true, "reverted": 0 }));
}

#[tokio::test]
async fn test_writing_notice_reaches_panel() {
    let (listener, mut notices) = WritingListener::new();
    let panel_endpoint = Endpoint::new().with_listener(Arc::new(listener)).spawn();
    panel_endpoint
        .notify(&PanelNotice::UserWritingDetected)
        .await
        .unwrap();
    assert!(notices.recv().await.is_some());
}

#[tokio::test]
async fn test_page_summary_wire_shape() {
    let h = harness(MockBackend::new(MockMode::NoOp), fast());
    let page = Endpoint::new()
        .with_listener(Arc::new(ContentListener::new(Arc::clone(&h.engine))))
        .spawn();
    let reply: Value = page
        .request(json!({ "action": "translatePage", "target": "fr" }))
        .await
        .unwrap();
    assert_eq!(reply["translatedElements"], 4);
    assert_eq!(reply["skipped"], 0);
    assert_eq!(reply["language"], "fr");
    assert!(reply["timestamp"].is_string());
}
