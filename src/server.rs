//! HTTP API.
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `POST` | `/api/documents/upload` | Multipart upload (field `file`), ingested before responding |
//! | `GET` | `/api/documents` | All document records |
//! | `GET` | `/api/documents/{id}` | One document record |
//! | `DELETE` | `/api/documents/{id}` | Delete index entries, file, and record |
//! | `POST` | `/api/queries` | Ask a question |
//! | `GET` | `/api/health` | Liveness and version |
//! | `GET` | `/` | Service banner |
//!
//! Errors are returned as `{"error": {"code", "message"}}` using the stable
//! [`RagError::code`] values.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::app::App;
use crate::error::RagError;
use crate::models::{Document, Query, Source};
use crate::service::DeleteReport;

/// Extra room above the file size limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub async fn run_server(app: App) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let router = build_router(Arc::new(app));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "server listening");
    println!("docqa listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}

pub fn build_router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = app.config.max_file_size_bytes() as usize + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handle_root))
        .route("/api/health", get(handle_health))
        .route(
            "/api/documents/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/documents", get(handle_list))
        .route("/api/documents/{id}", get(handle_get).delete(handle_delete))
        .route("/api/queries", post(handle_query))
        .layer(cors)
        .with_state(app)
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::NotFound { .. } => StatusCode::NOT_FOUND,
            RagError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RagError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Generation(_) | RagError::Embedding(_) => StatusCode::BAD_GATEWAY,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET / and /api/health ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    docs: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "RAG Document Q&A API",
        version: env!("CARGO_PKG_VERSION"),
        docs: "/api/health",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Documents ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    filename: String,
    status: String,
    page_count: usize,
    chunk_count: usize,
    message: &'static str,
}

async fn handle_upload(
    State(app): State<Arc<App>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let doc = app.service.upload(&filename, &bytes).await?;
        return Ok(Json(UploadResponse {
            document_id: doc.id,
            filename: doc.filename,
            status: doc.status.to_string(),
            page_count: doc.page_count,
            chunk_count: doc.chunk_count,
            message: "Document processed successfully",
        }));
    }
    Err(bad_request("missing multipart field 'file'"))
}

async fn handle_list(State(app): State<Arc<App>>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(app.service.list().await?))
}

async fn handle_get(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(app.service.get(&id).await?))
}

#[derive(Serialize)]
struct DeleteResponse {
    document_id: String,
    message: &'static str,
    deleted: DeleteReport,
}

async fn handle_delete(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let report = app.service.delete(&id).await?;
    let message = if report.is_complete() {
        "Document deleted successfully"
    } else {
        "Document partially deleted"
    };
    Ok(Json(DeleteResponse {
        document_id: id,
        message,
        deleted: report,
    }))
}

// ============ POST /api/queries ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    document_ids: Option<Vec<String>>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    query: String,
    answer: String,
    sources: Vec<Source>,
}

async fn handle_query(
    State(app): State<Arc<App>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let mut query = Query::new(req.query)
        .with_top_k(req.top_k.unwrap_or(app.config.retrieval.default_top_k));
    if let Some(ids) = req.document_ids {
        query = query.with_documents(ids);
    }

    let answer = app.engine.answer(&query).await?;
    Ok(Json(QueryResponse {
        query: query.query,
        answer: answer.answer,
        sources: answer.sources,
    }))
}
