use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use hemo_flow::client::UPLOAD_FIELD;
use hemo_flow::{
    ConfigError, ConfigStore, DocumentResult, DocumentUpload, DocumentWorkflow, EndpointSettings,
    SubmissionError,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    models::{AnalysisResponse, ConfigResponse, TriggerResponse},
    settings::ServiceSettings,
    workflow::create_app_state,
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: &str, details: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn bad_request_error(message: &str, details: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message, details)
}

fn not_found_error(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message, details)
}

fn multipart_error(message: &str, err: MultipartError) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Rejected oversized upload: {}", err.body_text());
        return error_response(status, "Uploaded file is too large", &err.body_text());
    }
    error_response(status, message, &err.body_text())
}

fn submission_error(err: SubmissionError) -> ApiError {
    let (status, message) = match &err {
        SubmissionError::InvalidFileType(_) => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported file type")
        }
        SubmissionError::ConfigurationMissing(_) => {
            (StatusCode::PRECONDITION_FAILED, "Service not configured")
        }
        SubmissionError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Failed to process document"),
        SubmissionError::Superseded => (StatusCode::CONFLICT, "Superseded by a newer upload"),
        SubmissionError::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read endpoint configuration",
        ),
    };
    let (status, Json(mut body)) = error_response(status, message, &err.to_string());
    if let SubmissionError::Upstream(upstream) = &err {
        if let Some(code) = upstream.status_code() {
            body["upstream_status"] = json!(code);
        }
    }
    (status, Json(body))
}

fn config_error(err: ConfigError) -> ApiError {
    match &err {
        ConfigError::Validation(_) => bad_request_error("Invalid configuration", &err.to_string()),
        _ => {
            error!("Configuration store failure: {}", err);
            internal_error("Failed to access configuration", &err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<dyn ConfigStore>,
    /// Displayed result set and the analysis that describes it.
    pub documents: Arc<DocumentWorkflow>,
    pub max_upload_bytes: usize,
}

pub fn create_app(settings: &ServiceSettings) -> anyhow::Result<Router> {
    let app_state = create_app_state(settings)?;
    Ok(build_router(app_state))
}

pub fn build_router(app_state: AppState) -> Router {
    let upload_limit = app_state.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/documents", post(upload_document))
        .route(
            "/documents/current",
            get(get_current_document).delete(reset_document),
        )
        .route("/documents/current/json", get(download_current_document))
        .route("/analysis", get(get_analysis).post(start_analysis))
        .route(
            "/admin/config",
            get(get_config).put(update_config).delete(reset_config),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "HemoLogic Blood Test Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Blood test OCR normalization with incrementally revealed analysis",
        "endpoints": {
            "POST /documents": "Upload a lab report (multipart field 'file': PDF, JPG or PNG)",
            "GET /documents/current": "Currently displayed measurements",
            "GET /documents/current/json": "Download the displayed result as JSON",
            "DELETE /documents/current": "Clear the upload and its analysis",
            "POST /analysis": "Request an analysis of the displayed result",
            "GET /analysis": "Analysis progress and visible text",
            "GET /admin/config": "Endpoint configuration",
            "PUT /admin/config": "Save endpoint configuration",
            "DELETE /admin/config": "Reset endpoint configuration to defaults",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<DocumentResult> {
    let upload = read_upload(&mut multipart).await?;
    info!(
        "Received {} ({}, {} bytes)",
        upload.file_name,
        upload.content_type,
        upload.bytes.len()
    );

    let result = state
        .documents
        .submit(upload)
        .await
        .map_err(submission_error)?;
    Ok(Json(result))
}

async fn read_upload(multipart: &mut Multipart) -> Result<DocumentUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = declared_content_type(field.content_type()).unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string()
        });
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read uploaded file", e))?;

        return Ok(DocumentUpload::new(file_name, content_type, bytes.to_vec()));
    }

    Err(bad_request_error(
        "No file uploaded",
        &format!("expected a multipart field named '{}'", UPLOAD_FIELD),
    ))
}

/// Browsers fall back to octet-stream when they do not know the type.
fn declared_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .filter(|ct| !ct.trim().is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
}

async fn current_document(state: &AppState) -> Result<DocumentResult, ApiError> {
    state
        .documents
        .current()
        .await
        .ok_or_else(|| not_found_error("No document has been processed"))
}

async fn get_current_document(State(state): State<AppState>) -> ApiResult<DocumentResult> {
    Ok(Json(current_document(&state).await?))
}

async fn download_current_document(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let document = current_document(&state).await?;
    let body = serde_json::to_string_pretty(&document)
        .map_err(|e| internal_error("Failed to serialize document", &e.to_string()))?;
    let disposition = format!(
        "attachment; filename=\"blood-test-{}.json\"",
        document.document_id
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn reset_document(State(state): State<AppState>) -> Json<Value> {
    state.documents.reset().await;
    Json(json!({
        "status": "reset",
        "message": "Upload cleared"
    }))
}

async fn start_analysis(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let response = TriggerResponse::from(state.documents.request_analysis().await);
    if response.accepted {
        (StatusCode::ACCEPTED, Json(response))
    } else {
        warn!(session_id = %response.session_id, "Analysis trigger ignored while busy");
        (StatusCode::OK, Json(response))
    }
}

async fn get_analysis(State(state): State<AppState>) -> Json<AnalysisResponse> {
    Json(AnalysisResponse::from(state.documents.analysis().view().await))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<ConfigResponse> {
    let settings = EndpointSettings::load(state.config.as_ref())
        .await
        .map_err(config_error)?;
    Ok(Json(ConfigResponse::from(&settings)))
}

async fn update_config(
    State(state): State<AppState>,
    Json(settings): Json<EndpointSettings>,
) -> ApiResult<ConfigResponse> {
    settings
        .save(state.config.as_ref())
        .await
        .map_err(config_error)?;
    get_config(State(state)).await
}

async fn reset_config(State(state): State<AppState>) -> ApiResult<ConfigResponse> {
    EndpointSettings::reset(state.config.as_ref())
        .await
        .map_err(config_error)?;
    get_config(State(state)).await
}
