use glossa::{
    ContentListener, Document, EditorListener, EngineConfig, Endpoint, FallbackChain,
    MockAvailability, MockBackend, MockMode, PanelController, ProgressFn, SessionOptions,
    SharedDocument, TransformEngine,
};
use std::sync::Arc;
use tokio::sync::Mutex;

const PAGE: &str = r#"{
    "title": "Trail report",
    "body": [
        { "tag": "h1", "children": ["Ridge trail reopened"] },
        { "tag": "p", "children": ["The washed-out bridge was replaced over the winter."] },
        { "tag": "p", "children": ["Expect mud near the lake until late May."] },
        { "tag": "textarea", "attrs": { "id": "notes" } }
    ],
    "focused": "notes"
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let document: SharedDocument = Arc::new(Mutex::new(Document::from_json(PAGE)?));
    let translator = MockBackend::new(MockMode::Suffix)
        .with_availability(MockAvailability::Downloadable(vec![0.25, 0.5, 1.0]));
    let engine = Arc::new(TransformEngine::with_backend(
        Arc::clone(&document),
        Arc::new(translator),
        EngineConfig::default(),
    )?);

    let page = Endpoint::new()
        .with_listener(Arc::new(ContentListener::new(Arc::clone(&engine))))
        .with_listener(Arc::new(EditorListener::new(Arc::clone(&document))))
        .spawn();
    let proofreader = MockBackend::new(MockMode::Scripted(serde_json::json!({
        "corrections": [{ "startIndex": 0, "endIndex": 3, "correction": "The", "explanation": "spelling" }]
    })))
    .with_name("Demo proofreader");
    let panel = PanelController::new(
        FallbackChain::new(Arc::new(proofreader), SessionOptions::default()),
        FallbackChain::local_only(),
        FallbackChain::local_only(),
    )
    .with_page(page);

    // Translate the page
    let summary = panel.translate_page("fr").await?;
    println!(
        "Translated {} elements to {}",
        summary.translated_elements, summary.language
    );
    println!("{}", serde_json::to_string_pretty(&document.lock().await.to_spec())?);

    // Revert
    let reverted = panel.revert_page().await?;
    println!("Reverted {} elements", reverted);

    // Proofread and insert the result
    let on_progress: &ProgressFn<'_> = &|percent| println!("Loading proofreader: {}%", percent);
    if let Some(report) = panel.proofread("teh trail is open", Some(on_progress)).await {
        for highlight in &report.highlights {
            println!("Correction: {}", highlight);
        }
        let inserted = panel.insert_text(&report.corrected).await?;
        println!("Inserted: {}", inserted.ok);
    }

    println!("Assistant: {}", panel.ask("Summarize this page").await);
    panel.shutdown().await;
    Ok(())
}
