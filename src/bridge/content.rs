//! Listeners of the page context

use super::messages::{ContentRequest, EditorRequest, InsertResponse, RevertResponse};
use super::{Dispatch, Listener, decode_known, error_reply, reply_with};
use crate::dom::{Document, Selector, SharedDocument};
use crate::engine::TransformEngine;
use futures::FutureExt;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static CONTENT_EDITABLE: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"[contenteditable="true"]"#).ok());

/// Serves page extraction, translation and revert over the bridge
pub struct ContentListener {
    engine: Arc<TransformEngine>,
}

impl ContentListener {
    pub fn new(engine: Arc<TransformEngine>) -> Self {
        Self { engine }
    }
}

impl Listener for ContentListener {
    fn handle(&self, message: &Value) -> Dispatch {
        let request = match decode_known::<ContentRequest>(message, ContentRequest::ACTIONS) {
            None => return Dispatch::Ignored,
            Some(Err(e)) => return Dispatch::Reply(error_reply(&e)),
            Some(Ok(request)) => request,
        };
        debug!(?request, "content request");

        let engine = Arc::clone(&self.engine);
        let work = async move {
            match request {
                ContentRequest::ExtractPageContent => {
                    reply_with(Ok(engine.extract_page_content().await))
                }
                ContentRequest::TranslatePage {
                    target_language,
                    content: Some(content),
                } if !content.is_empty() => {
                    reply_with(engine.transform_text(&content, &target_language).await)
                }
                ContentRequest::TranslatePage {
                    target_language, ..
                } => reply_with(engine.transform_tree(&target_language).await),
                ContentRequest::TranslateElement {
                    element,
                    target_language,
                } => reply_with(engine.transform_fragment(&element, &target_language).await),
                ContentRequest::RevertTranslation => reply_with(Ok(RevertResponse {
                    success: true,
                    reverted: engine.revert().await,
                })),
            }
        };
        Dispatch::Deferred(work.boxed())
    }
}

/// Put `text` into the focused input or textarea, or else the first content-editable element
pub fn insert_text(doc: &mut Document, text: &str) -> InsertResponse {
    if let Some(focused) = doc.focused() {
        if matches!(doc.tag(focused), Some("input") | Some("textarea")) {
            doc.set_attribute(focused, "value", text);
            return InsertResponse::inserted();
        }
    }

    let editable = CONTENT_EDITABLE
        .as_ref()
        .and_then(|selector| doc.query_selector(selector));
    match editable {
        Some(node) => {
            doc.set_text_content(node, text);
            InsertResponse::inserted()
        }
        None => InsertResponse::refused("no focused editable"),
    }
}

/// Serves `insertText`
pub struct EditorListener {
    document: SharedDocument,
}

impl EditorListener {
    pub fn new(document: SharedDocument) -> Self {
        Self { document }
    }
}

impl Listener for EditorListener {
    fn handle(&self, message: &Value) -> Dispatch {
        let request = match decode_known::<EditorRequest>(message, EditorRequest::ACTIONS) {
            None => return Dispatch::Ignored,
            Some(Err(e)) => return Dispatch::Reply(error_reply(&e)),
            Some(Ok(request)) => request,
        };

        let document = Arc::clone(&self.document);
        Dispatch::Deferred(
            async move {
                let EditorRequest::InsertText { text } = request;
                let mut doc = document.lock().await;
                reply_with(Ok(insert_text(&mut doc, &text)))
            }
            .boxed(),
        )
    }
}
