//! HTTP shell around the [`Engine`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Question form; `?q=` renders the answer and its source |
//! | `POST` | `/ask` | `{ "question" }` → answer with status and sources |
//! | `POST` | `/search` | `{ "query", "top_k"? }` → ranked fragments, no model call |
//! | `GET`  | `/documents` | Stored documents with fragment counts |
//! | `PUT`  | `/documents/{name}` | Upload raw PDF or text bytes and ingest them |
//! | `DELETE` | `/documents/{name}` | Forget a document |
//! | `GET`  | `/health` | Health check (version, strategy, document count) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unsupported_media_type` (415),
//! `ingestion_failed` (422), `internal` (500).
//!
//! Answers with status `no_documents`, `no_relevant_info` or `provider_error`
//! are ordinary `200` responses; the status field carries the outcome.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use pv_harness_core::compose::Language;
use pv_harness_core::models::ScoredFragment;
use pv_harness_core::{Answer, AnswerStatus, DocumentSummary, Engine, Error, LanguageModel};

use crate::app::open_engine;
use crate::config::Config;
use crate::extract::content_type_for;
use crate::ingest::ingest_bytes;
use crate::llm::create_model;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    model: Arc<dyn LanguageModel>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, model: Arc<dyn LanguageModel>) -> Self {
        Self { engine, model }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_page))
        .route("/ask", post(handle_ask))
        .route("/search", post(handle_search))
        .route("/documents", get(handle_list_documents))
        .route(
            "/documents/{name}",
            put(handle_upload).delete(handle_delete),
        )
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(open_engine(config).await?);
    let model = create_model(&config.llm)?;

    // Build (or restore) the index before accepting requests.
    engine.ensure_built().await?;

    let app = router(AppState::new(engine, model));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("Listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Ingestion { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "ingestion_failed", err.to_string())
            }
            other => {
                error!(error = %other, "request failed");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    other.to_string(),
                )
            }
        }
    }
}

// ============ GET /health ============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub strategy: String,
    pub documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        strategy: state.engine.index().strategy().to_string(),
        documents: state.engine.store().len(),
    })
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let answer = state
        .engine
        .ask(&req.question, state.model.as_ref())
        .await?;
    Ok(Json(answer))
}

// ============ POST /search ============

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredFragment>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let engine = &state.engine;
    if !engine.has_documents() {
        return Ok(Json(SearchResponse {
            results: Vec::new(),
        }));
    }

    let mut retriever = *engine.retriever();
    if let Some(k) = req.top_k {
        if k == 0 {
            return Err(bad_request("top_k must be at least 1"));
        }
        retriever.top_k = k;
    }
    engine.ensure_built().await?;
    let results = retriever.retrieve(engine.index(), &req.query).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ /documents ============

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentSummary>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state.engine.documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document: String,
    pub fragments: usize,
}

/// The file extension picks the extractor; the `Content-Type` header is the
/// fallback for names without one.
async fn handle_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
        return Err(bad_request("document name must be a plain file name"));
    }
    let content_type = content_type_for(&name)
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        })
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                format!("cannot tell the content type of {}", name),
            )
        })?;

    let fragments = ingest_bytes(&state.engine, &name, body.to_vec(), &content_type).await?;
    info!(document = %name, fragments, "document uploaded");
    Ok(Json(UploadResponse {
        document: name,
        fragments,
    }))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.engine.remove(&name).await? {
        return Err(not_found(format!("document not found: {}", name)));
    }
    Ok(Json(serde_json::json!({ "removed": name })))
}

// ============ GET / ============

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub q: Option<String>,
}

struct PageText {
    lang: &'static str,
    title: &'static str,
    intro: &'static str,
    placeholder: &'static str,
    submit: &'static str,
    source: &'static str,
    answer: &'static str,
}

const PAGE_ES: PageText = PageText {
    lang: "es",
    title: "Consulta sobre Energía Fotovoltaica",
    intro: "Pregunta sobre los documentos cargados.",
    placeholder: "Escribe tu pregunta aquí",
    submit: "Preguntar",
    source: "Fuente del documento",
    answer: "Respuesta",
};

const PAGE_EN: PageText = PageText {
    lang: "en",
    title: "Photovoltaic Energy Q&A",
    intro: "Ask about the loaded documents.",
    placeholder: "Type your question here",
    submit: "Ask",
    source: "Source document",
    answer: "Answer",
};

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_page(text: &PageText, question: &str, answer: Option<&Answer>) -> String {
    let mut result = String::new();
    if let Some(answer) = answer {
        let class = match answer.status {
            AnswerStatus::Answered => "answered",
            AnswerStatus::ProviderError => "error",
            _ => "notice",
        };
        if answer.status == AnswerStatus::Answered {
            if let Some(source) = answer.source() {
                result.push_str(&format!(
                    "<p><strong>{}:</strong> {}</p>\n",
                    text.source,
                    escape_html(source)
                ));
            }
            result.push_str(&format!(
                "<p class=\"{}\"><strong>{}:</strong> {}</p>\n",
                class,
                text.answer,
                escape_html(&answer.display_text)
            ));
        } else {
            result.push_str(&format!(
                "<p class=\"{}\">{}</p>\n",
                class,
                escape_html(&answer.display_text)
            ));
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
input[type=text] {{ width: 70%; padding: .4rem; }}
.notice {{ color: #8a6d00; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{intro}</p>
<form method="get" action="/">
<input type="text" name="q" value="{question}" placeholder="{placeholder}" autofocus>
<button type="submit">{submit}</button>
</form>
{result}</body>
</html>
"#,
        lang = text.lang,
        title = text.title,
        intro = text.intro,
        question = escape_html(question),
        placeholder = text.placeholder,
        submit = text.submit,
        result = result,
    )
}

async fn handle_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let text = match state.engine.composer().language() {
        Language::Es => &PAGE_ES,
        Language::En => &PAGE_EN,
    };
    let question = query.q.unwrap_or_default();
    let answer = if question.trim().is_empty() {
        None
    } else {
        Some(state.engine.ask(&question, state.model.as_ref()).await?)
    };
    Ok(Html(render_page(text, &question, answer.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_harness_core::index::LexicalIndex;
    use pv_harness_core::store::InMemoryStore;
    use pv_harness_core::DisabledModel;

    fn state() -> AppState {
        let engine = Engine::new(Arc::new(InMemoryStore::new()), Arc::new(LexicalIndex::new()));
        AppState::new(Arc::new(engine), Arc::new(DisabledModel))
    }

    async fn upload(state: &AppState, name: &str, body: &str) -> Result<Json<UploadResponse>, AppError> {
        handle_upload(
            State(state.clone()),
            Path(name.to_string()),
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
        .await
    }

    #[tokio::test]
    async fn test_ask_without_documents() {
        let Json(answer) = handle_ask(
            State(state()),
            Json(AskRequest {
                question: "¿Qué es un panel solar?".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(answer.status, AnswerStatus::NoDocuments);
    }

    #[tokio::test]
    async fn test_empty_question_is_bad_request() {
        let err = handle_ask(
            State(state()),
            Json(AskRequest {
                question: "  ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_search_delete() {
        let s = state();
        let Json(up) = upload(&s, "paneles.txt", "Los paneles solares convierten la luz en electricidad.")
            .await
            .unwrap();
        assert_eq!(up.fragments, 1);

        let Json(found) = handle_search(
            State(s.clone()),
            Json(SearchRequest {
                query: "paneles solares".to_string(),
                top_k: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].document, "paneles.txt");

        handle_delete(State(s.clone()), Path("paneles.txt".to_string()))
            .await
            .unwrap();
        let err = handle_delete(State(s.clone()), Path("paneles.txt".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_upload_unknown_type_is_rejected() {
        let err = upload(&state(), "datos.bin", "xx").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = upload(&state(), "roto.pdf", "not a pdf").await.unwrap_err();
        assert_eq!(err.code(), "ingestion_failed");
    }

    #[tokio::test]
    async fn test_page_shows_provider_error_notice() {
        let s = state();
        upload(&s, "paneles.txt", "Los paneles solares convierten la luz en electricidad.")
            .await
            .unwrap();
        let Html(page) = handle_page(
            State(s),
            Query(PageQuery {
                q: Some("paneles <solares>".to_string()),
            }),
        )
        .await
        .unwrap();
        assert!(page.contains("paneles &lt;solares&gt;"));
        assert!(page.contains("class=\"error\""));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
