use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use glossa::{
    BackendStatus, BridgeClient, ContentListener, Document, EditorListener, EngineConfig,
    EngineError, Endpoint, PanelController, ProofreadReport, SharedDocument, TransformEngine,
    TransformResult, WritingListener,
};
use glossa_mt::{BackendChoice, build_panel, translation_chain};

const DEMO_PAGE: &str = include_str!("static/demo-page.json");

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
    #[serde(default)]
    pub source_language: Option<String>,
}

#[derive(Deserialize)]
pub struct ProofreadRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub prompt: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &EngineError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub panel: Arc<PanelController>,
    pub page: BridgeClient,
    pub document: SharedDocument,
}

/// Wire a document, its page endpoint and a panel around `choice`
pub fn build_state(
    choice: &BackendChoice,
    config: EngineConfig,
    document: Document,
) -> Result<AppState, EngineError> {
    let document: SharedDocument = Arc::new(Mutex::new(document));
    let engine = Arc::new(TransformEngine::new(
        Arc::clone(&document),
        translation_chain(choice, &config),
        config.clone(),
    )?);

    let (writing, mut notices) = WritingListener::new();
    tokio::spawn(async move {
        while let Some(at) = notices.recv().await {
            info!(%at, "user started writing on the page");
        }
    });

    let page = Endpoint::new()
        .with_listener(Arc::new(ContentListener::new(engine)))
        .with_listener(Arc::new(EditorListener::new(Arc::clone(&document))))
        .with_listener(Arc::new(writing))
        .spawn();
    let panel = build_panel(choice, &config).with_page(page.clone());

    Ok(AppState {
        panel: Arc::new(panel),
        page,
        document,
    })
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/document", get(get_document))
        .route("/api/message", post(relay_message))
        .route("/api/translate", post(translate_text))
        .route("/api/proofread", post(proofread_text))
        .route("/api/ask", post(ask))
        .route("/api/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("GLOSSA_CONFIG") {
        Ok(path) => EngineConfig::from_json_file(path)?,
        Err(_) => EngineConfig::default(),
    };
    let page = match std::env::var("GLOSSA_DOCUMENT") {
        Ok(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Cannot read document {}: {}", path, e))?,
        Err(_) => DEMO_PAGE.to_string(),
    };
    let choice = BackendChoice::from_flags(std::env::var("GLOSSA_MOCK").is_ok(), None)
        .map_err(|e| format!("Failed to initialize translator: {}", e))?;
    let state = build_state(&choice, config, Document::from_json(&page)?)?;

    info!(backend = choice.label(), "Starting glossa web server");

    let addr = std::env::var("GLOSSA_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn serve_index() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        include_str!("static/index.html"),
    )
}

async fn get_document(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.document.lock().await.to_spec())
}

/// Relay a raw bridge message to the page; no reply maps to 204
async fn relay_message(
    State(state): State<AppState>,
    Json(message): Json<Value>,
) -> Result<Response, ApiError> {
    match state.page.request(message).await {
        Ok(reply) => Ok(Json(reply).into_response()),
        Err(EngineError::ChannelError(_)) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e)),
    }
}

async fn translate_text(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TransformResult>, ApiError> {
    info!(
        target_language = %request.target_language,
        chars = request.text.chars().count(),
        "translating text"
    );
    state
        .panel
        .translate_text(
            &request.text,
            request.source_language.as_deref(),
            &request.target_language,
        )
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e))
}

async fn proofread_text(
    State(state): State<AppState>,
    Json(request): Json<ProofreadRequest>,
) -> Json<Option<ProofreadReport>> {
    Json(state.panel.proofread(&request.text, None).await)
}

async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Json<AskResponse> {
    Json(AskResponse {
        answer: state.panel.ask(&request.prompt).await,
    })
}

async fn status(State(state): State<AppState>) -> Json<Vec<BackendStatus>> {
    Json(state.panel.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = EngineConfig {
            rate_limit_ms: 0,
            ..EngineConfig::default()
        };
        build_state(
            &BackendChoice::Mock,
            config,
            Document::from_json(DEMO_PAGE).unwrap(),
        )
        .unwrap()
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Option<Value>) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).ok();
        (status, value)
    }

    #[tokio::test]
    async fn test_message_translates_and_reverts_page() {
        let state = state();
        let (status, reply) = post_json(
            app(state.clone()),
            "/api/message",
            json!({ "action": "translatePage", "targetLanguage": "fr" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply.unwrap()["translatedElements"].as_u64().unwrap() > 0);

        let (_, reply) = post_json(
            app(state.clone()),
            "/api/message",
            json!({ "action": "revertTranslation" }),
        )
        .await;
        assert_eq!(reply.unwrap()["success"], true);
        let spec = state.document.lock().await.to_spec();
        assert_eq!(spec, Document::from_json(DEMO_PAGE).unwrap().to_spec());
    }

    #[tokio::test]
    async fn test_unknown_action_has_no_content() {
        let (status, reply) =
            post_json(app(state()), "/api/message", json!({ "action": "nope" })).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_translate_endpoint() {
        let (status, reply) = post_json(
            app(state()),
            "/api/translate",
            json!({ "text": "Hello", "targetLanguage": "de" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply = reply.unwrap();
        assert_eq!(reply["status"], "success");
        assert_eq!(reply["output"], "Hello_de");

        let (status, reply) = post_json(
            app(state()),
            "/api/translate",
            json!({ "text": "Hello", "targetLanguage": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(reply.unwrap()["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn test_proofread_endpoint_uses_local_fallback() {
        let (_, reply) = post_json(
            app(state()),
            "/api/proofread",
            json!({ "text": "hello  world" }),
        )
        .await;
        let reply = reply.unwrap();
        assert_eq!(reply["corrected"], "Hello world");
        assert_eq!(reply["fallbackUsed"], true);

        let (_, reply) = post_json(app(state()), "/api/proofread", json!({ "text": "  " })).await;
        assert_eq!(reply, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_status_lists_capabilities() {
        let response = app(state())
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let statuses: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(statuses.as_array().unwrap().len(), 3);
        assert_eq!(statuses[1]["capability"], "translate");
        assert_eq!(statuses[1]["state"]["state"], "ready");
    }
}
