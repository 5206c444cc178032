// HTTP server with API routes for project management and image analysis

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use terrascope_core::error::Error;
use terrascope_core::types::ProjectId;
use terrascope_storage::Storage;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::analysis::{AnalysisPipeline, AnalyzeRequest};
use crate::upload::TempUpload;

#[derive(Clone)]
pub struct ApiState {
    pub storage: Storage,
    pub pipeline: Arc<AnalysisPipeline>,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Create HTTP router with all API routes
pub fn create_router(state: ApiState) -> Router {
    // The analysis route accepts arbitrarily large images; no body ceiling.
    let analysis_routes = Router::new()
        .route("/api/v1/analysis", post(analyze_handler))
        .layer(DefaultBodyLimit::disable());

    let project_routes = Router::new()
        .route("/api/v1/projects", post(create_project_handler))
        .route("/api/v1/projects/:id/summary", get(get_summary_handler))
        .route("/api/v1/projects/:id/detections", get(get_detections_handler));

    let public_routes = Router::new().route("/health", get(health_handler));

    public_routes
        .merge(analysis_routes)
        .merge(project_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Analyze an uploaded image: multipart form with `project_id`, `model`,
/// optional `confidence`/`iou`, and one file part.
async fn analyze_handler(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Response {
    let request = match read_analyze_request(&state, multipart).await {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.pipeline.analyze(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Pull the analysis fields out of the multipart form. The file part is
/// spooled to the upload directory and owned by the returned request, so it
/// is cleaned up even when a later field fails to parse.
async fn read_analyze_request(
    state: &ApiState,
    mut multipart: Multipart,
) -> Result<AnalyzeRequest, Response> {
    let mut request = AnalyzeRequest {
        upload: None,
        project_id: None,
        model: None,
        confidence: None,
        iou: None,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return Err(bad_request("Invalid multipart form data.")),
        };
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|n| n.to_string());

        if name == "file" || file_name.is_some() {
            let original = file_name.unwrap_or_else(|| "upload".to_string());
            let bytes = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(_) => return Err(bad_request("Invalid multipart form data.")),
            };
            match TempUpload::spool(&state.upload_dir, &original, &bytes).await {
                Ok(upload) => request.upload = Some(upload),
                Err(err) => return Err(error_response(err)),
            }
            continue;
        }

        let text = match field.text().await {
            Ok(text) => text,
            Err(_) => return Err(bad_request("Invalid multipart form data.")),
        };
        match name.as_str() {
            "project_id" => request.project_id = Some(text),
            "model" => request.model = Some(text),
            "confidence" => request.confidence = text.trim().parse().ok(),
            "iou" => request.iou = text.trim().parse().ok(),
            _ => {}
        }
    }

    Ok(request)
}

async fn create_project_handler(
    State(state): State<ApiState>,
    Json(request): Json<CreateProjectRequest>,
) -> Response {
    if request.name.trim().is_empty() {
        return bad_request("name is required");
    }
    match state.storage.create_project(request.name.trim()).await {
        Ok(project) => (StatusCode::OK, Json(project)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_summary_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    let project_id = match ProjectId::parse(&id) {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    match state.storage.project_exists(project_id).await {
        Ok(true) => {}
        Ok(false) => return error_response(Error::ProjectNotFound),
        Err(err) => return error_response(err),
    }
    match state.storage.get_summary(project_id).await {
        Ok(Some(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No summary recorded for this project.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_detections_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    let project_id = match ProjectId::parse(&id) {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    match state.storage.project_exists(project_id).await {
        Ok(true) => {}
        Ok(false) => return error_response(Error::ProjectNotFound),
        Err(err) => return error_response(err),
    }
    match state.storage.detections_for_project(project_id).await {
        Ok(detections) => (StatusCode::OK, Json(detections)).into_response(),
        Err(err) => error_response(err),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Translate a pipeline error into its response category. Every failure is
/// handled here; nothing propagates to the caller as an unhandled fault.
fn error_response(err: Error) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Error in analysis pipeline: {}", err);
    }

    // Internal faults get a generic message; the detail stays in the logs.
    let message = match &err {
        Error::Io(_)
        | Error::Storage(_)
        | Error::Serialization(_)
        | Error::InferenceRequest(_) => "Error processing image.".to_string(),
        other => other.to_string(),
    };

    (status, Json(ErrorResponse { error: message })).into_response()
}
