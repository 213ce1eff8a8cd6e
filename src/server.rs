//! HTTP surface: router, handlers and shared application state.
//!
//! Two summarisation endpoints (JSON text and multipart PDF upload) share one
//! pipeline: validate input, append the query to the session history, run the
//! agent, persist, respond. Status and session endpoints carry no business
//! logic.

use crate::agent::{AgentError, AgentOutcome, SummaryAgent};
use crate::error::ApiError;
use crate::extract;
use crate::schema::{SummaryFileInfo, SummaryRequest, SummaryResponse};
use crate::session::{ConversationTurn, SessionHistory};
use crate::store::SummaryStore;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Maximum accepted PDF upload size.
pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

/// Request body limit, set above `MAX_PDF_BYTES` so the size violation is
/// reported by this service rather than by the framework.
const BODY_LIMIT_BYTES: usize = 12 * 1024 * 1024;

/// State shared by all handlers.
///
/// `agent` is `None` when the service started without a usable API key; the
/// service stays reachable and summarisation requests answer 503.
pub struct AppState {
    pub agent: Option<SummaryAgent>,
    pub store: Arc<dyn SummaryStore>,
    pub history: RwLock<SessionHistory>,
    pub model_name: String,
}

#[derive(Debug, Serialize)]
struct SummariesResponse {
    summaries: Vec<SummaryFileInfo>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/summarize/text", post(summarize_text))
        .route("/summarize/pdf", post(summarize_pdf))
        .route("/summaries", get(list_summaries))
        .route("/history", get(get_history))
        .route("/clear-history", post(clear_history))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "precis summarisation API is running",
        "status": "healthy",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "precis",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
        "agent_ready": state.agent.is_some(),
    }))
}

async fn summarize_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Text content is required".to_string(),
        ));
    }
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Text Summary".to_string());
    let response = run_summary(
        &state,
        &request.text,
        request.additional_context.as_deref(),
        &title,
        None,
    )
    .await?;
    Ok(Json(response))
}

async fn summarize_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SummaryResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut additional_context: Option<String> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Failed to read upload: {}", e)))?;
                file = Some((filename, data.to_vec()));
            }
            Some("additional_context") => {
                additional_context = Some(field.text().await.map_err(|e| {
                    ApiError::InvalidInput(format!("Invalid additional_context field: {}", e))
                })?);
            }
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("Invalid title field: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::InvalidInput("A PDF file is required".to_string()))?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::InvalidInput(
            "Only PDF files are supported".to_string(),
        ));
    }
    if data.len() > MAX_PDF_BYTES {
        return Err(ApiError::InvalidInput(
            "File size too large. Maximum 10MB allowed.".to_string(),
        ));
    }

    let pdf_text = extract::extract_pdf_text(&data)?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| filename[..filename.len() - 4].to_string());

    let response = run_summary(
        &state,
        &pdf_text,
        additional_context.as_deref(),
        &title,
        Some(filename),
    )
    .await?;
    Ok(Json(response))
}

/// Shared summarisation pipeline behind both endpoints.
async fn run_summary(
    state: &AppState,
    text: &str,
    additional_context: Option<&str>,
    title: &str,
    original_filename: Option<String>,
) -> Result<SummaryResponse, ApiError> {
    let agent = state.agent.as_ref().ok_or(ApiError::NotInitialized)?;
    let started = Instant::now();

    let mut query = text.to_string();
    if let Some(ctx) = additional_context {
        if !ctx.trim().is_empty() {
            query.push_str("\n\nAdditional context: ");
            query.push_str(ctx);
        }
    }

    // Snapshot before appending, so the query appears in the prompt once.
    // The lock is not held across the model call.
    let history_prompt = {
        let mut history = state.history.write().await;
        let rendered = history.render();
        history.push_user(query.clone());
        rendered
    };

    let outcome = match agent.run(&query, &history_prompt, title).await {
        Ok(outcome) => outcome,
        Err(err) => {
            persist_error(state, &err, title);
            return Err(err.into());
        }
    };

    let word_count = text.split_whitespace().count();
    let processing_time = started.elapsed().as_secs_f64();

    let (title, summary, saved_path) = match outcome {
        AgentOutcome::Structured(record) => (record.title, record.summary, record.saved_path),
        AgentOutcome::Fallback {
            summary,
            saved_path,
            ..
        } => (title.to_string(), summary, saved_path),
    };

    state.history.write().await.push_assistant(summary.clone());

    Ok(SummaryResponse {
        success: true,
        summary,
        title,
        word_count,
        processing_time,
        saved_path,
        original_filename,
    })
}

/// Keep the raw upstream error on disk for offline debugging
fn persist_error(state: &AppState, err: &AgentError, title: &str) {
    match state.store.save(&err.to_string(), &format!("error_{}", title)) {
        Ok(path) => {
            tracing::error!(path = %path.display(), error = %err, "model call failed, error persisted")
        }
        Err(save_err) => {
            tracing::error!(error = %err, save_error = %save_err, "model call failed and the error could not be persisted")
        }
    }
}

async fn list_summaries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummariesResponse>, ApiError> {
    let summaries = state.store.list()?;
    Ok(Json(SummariesResponse { summaries }))
}

async fn get_history(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.history.read().await.turns(),
    })
}

async fn clear_history(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.history.write().await.clear();
    Json(MessageResponse {
        message: "Chat history cleared successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ModelClient;
    use crate::store::FsSummaryStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    /// Always replies with the same text and counts invocations.
    struct CannedModel {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ModelClient for CannedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn test_state(reply: &str, dir: &Path) -> (Arc<AppState>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(FsSummaryStore::new(dir));
        let model = Arc::new(CannedModel {
            reply: reply.to_string(),
            calls: calls.clone(),
        });
        let agent = SummaryAgent::new(
            model,
            store.clone(),
            "You summarise things.",
            Duration::from_secs(5),
        );
        let state = Arc::new(AppState {
            agent: Some(agent),
            store,
            history: RwLock::new(SessionHistory::default()),
            model_name: "gemini-2.0-flash".to_string(),
        });
        (state, calls)
    }

    fn uninitialized_state(dir: &Path) -> Arc<AppState> {
        Arc::new(AppState {
            agent: None,
            store: Arc::new(FsSummaryStore::new(dir)),
            history: RwLock::new(SessionHistory::default()),
            model_name: "gemini-2.0-flash".to_string(),
        })
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(uri: &str, filename: &str, content: Vec<u8>) -> Request<Body> {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                boundary, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn text_summary_counts_words_and_saves_a_file() {
        let dir = tempdir().unwrap();
        let (state, _) = test_state(
            r#"{"title": "Fox", "summary": "A fox jumps over a dog.", "saved_path": "x"}"#,
            dir.path(),
        );
        let response = router(state)
            .oneshot(json_request(
                "/summarize/text",
                r#"{"text": "The quick brown fox jumps over the lazy dog."}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["word_count"], 9);
        assert!(!body["summary"].as_str().unwrap().is_empty());
        let saved_path = body["saved_path"].as_str().unwrap();
        assert!(saved_path.ends_with(".txt"));
        let content = std::fs::read_to_string(saved_path).unwrap();
        assert!(!content.is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_model_call() {
        let dir = tempdir().unwrap();
        let (state, calls) = test_state("irrelevant", dir.path());
        let response = router(state)
            .oneshot(json_request("/summarize/text", r#"{"text": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("required"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_json_model_output_still_succeeds_via_fallback() {
        let dir = tempdir().unwrap();
        let (state, _) = test_state("Here is the gist, in plain prose.", dir.path());
        let response = router(state)
            .oneshot(json_request(
                "/summarize/text",
                r#"{"text": "some long document"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["title"], "Text Summary");
        let summary = body["summary"].as_str().unwrap();
        let content = std::fs::read_to_string(body["saved_path"].as_str().unwrap()).unwrap();
        assert_eq!(content, summary.trim());
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_without_model_call() {
        let dir = tempdir().unwrap();
        let (state, calls) = test_state("irrelevant", dir.path());
        let response = router(state)
            .oneshot(multipart_request(
                "/summarize/pdf",
                "notes.txt",
                b"just some notes".to_vec(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("PDF"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_pdf_is_rejected_without_model_call() {
        let dir = tempdir().unwrap();
        let (state, calls) = test_state("irrelevant", dir.path());
        let response = router(state)
            .oneshot(multipart_request(
                "/summarize/pdf",
                "big.pdf",
                vec![0u8; MAX_PDF_BYTES + 1],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("10MB"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Fails every invocation with the same upstream error.
    struct FailingModel;

    #[async_trait]
    impl ModelClient for FailingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, AgentError> {
            Err(AgentError::RequestFailed(
                "connection reset by peer".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn upstream_failure_answers_bad_gateway_and_persists_the_error() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FsSummaryStore::new(dir.path()));
        let agent = SummaryAgent::new(
            Arc::new(FailingModel),
            store.clone(),
            "You summarise things.",
            Duration::from_secs(5),
        );
        let state = Arc::new(AppState {
            agent: Some(agent),
            store,
            history: RwLock::new(SessionHistory::default()),
            model_name: "gemini-2.0-flash".to_string(),
        });

        let response = router(state)
            .oneshot(json_request("/summarize/text", r#"{"text": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("connection reset by peer"));

        // The raw error text lands on disk for offline debugging
        let error_files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("error_") && name.ends_with(".txt"))
            .collect();
        assert_eq!(error_files.len(), 1);
        let content = std::fs::read_to_string(dir.path().join(&error_files[0])).unwrap();
        assert!(content.contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn missing_api_key_answers_service_unavailable() {
        let dir = tempdir().unwrap();
        let state = uninitialized_state(dir.path());
        let response = router(state)
            .oneshot(json_request("/summarize/text", r#"{"text": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("not initialized"));
    }

    #[tokio::test]
    async fn health_is_idempotent() {
        let dir = tempdir().unwrap();
        let (state, _) = test_state("irrelevant", dir.path());
        let first = router(state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first_body = body_json(first).await;
        let second = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let second_body = body_json(second).await;
        assert_eq!(first_body, second_body);
        assert_eq!(first_body["agent_ready"], true);
    }

    #[tokio::test]
    async fn history_records_turns_and_clears() {
        let dir = tempdir().unwrap();
        let (state, _) = test_state(
            r#"{"title": "T", "summary": "S", "saved_path": "x"}"#,
            dir.path(),
        );
        router(state.clone())
            .oneshot(json_request(
                "/summarize/text",
                r#"{"text": "please summarise this"}"#,
            ))
            .await
            .unwrap();

        let history = router(state.clone())
            .oneshot(Request::builder().uri("/history").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(history).await;
        let turns = body["history"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[1]["role"], "assistant");

        let cleared = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/clear-history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::OK);

        let history = router(state)
            .oneshot(Request::builder().uri("/history").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(history).await;
        assert!(body["history"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summaries_endpoint_lists_saved_files() {
        let dir = tempdir().unwrap();
        let (state, _) = test_state(
            r#"{"title": "Listed", "summary": "S", "saved_path": "x"}"#,
            dir.path(),
        );
        router(state.clone())
            .oneshot(json_request("/summarize/text", r#"{"text": "content"}"#))
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/summaries")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let summaries = body["summaries"].as_array().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0]["filename"]
            .as_str()
            .unwrap()
            .starts_with("Listed_"));
        assert!(summaries[0]["size"].as_u64().unwrap() > 0);
    }
}
