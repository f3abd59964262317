//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Multipart, Path, State},
  http::{header::CONTENT_TYPE, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::{AppError, ExtractionError, SessionError};
use crate::extraction::UploadedFile;
use crate::logic::*;
use crate::protocol::*;
use crate::session::Event;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorOut>);
type ApiResult<T> = Result<T, ApiError>;

fn status_for(e: &AppError) -> StatusCode {
  match e {
    AppError::Session(SessionError::UnknownExercise(_) | SessionError::UnknownQuestion(_)) => StatusCode::NOT_FOUND,
    AppError::Session(_) => StatusCode::CONFLICT,
    AppError::Extraction(ExtractionError::UnsupportedFile { .. }) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
    AppError::Extraction(_) => StatusCode::BAD_GATEWAY,
    AppError::ExtractionAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    AppError::MissingFile => StatusCode::BAD_REQUEST,
    AppError::FileNotFound(_) => StatusCode::NOT_FOUND,
    AppError::CorruptFile(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn api_error(e: AppError) -> ApiError {
  let status = status_for(&e);
  // Extraction failures carry the user-facing text; the cause is already logged.
  let error = match &e {
    AppError::Extraction(x) => x.user_message().to_string(),
    other => other.to_string(),
  };
  (status, Json(ErrorOut { error }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, ai_enabled: state.gemini.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.snapshot().await)
}

#[instrument(level = "info", skip(state, body), fields(event = ?body))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ClientEvent>,
) -> ApiResult<Json<SessionOut>> {
  let out = state
    .dispatch(Event::from(body))
    .await
    .map_err(|e| api_error(e.into()))?;
  info!(target: "exercise", view = ?out.view, "HTTP session event applied");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_post_exercise(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> ApiResult<Json<SessionOut>> {
  let mut upload = None;
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| (e.status(), Json(ErrorOut { error: e.body_text() })))?
  {
    if field.name() != Some("file") {
      continue;
    }
    let name = field.file_name().unwrap_or("upload").to_string();
    let mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
    let bytes = field
      .bytes()
      .await
      .map_err(|e| (e.status(), Json(ErrorOut { error: e.body_text() })))?;
    if !bytes.is_empty() {
      upload = Some(UploadedFile { name, mime_type, bytes: bytes.to_vec() });
      break;
    }
  }

  let upload = upload.ok_or_else(|| api_error(AppError::MissingFile))?;
  info!(target: "exercise", name = %upload.name, mime = %upload.mime_type, size = upload.bytes.len(), "HTTP upload received");
  create_exercise(&state, upload).await.map(Json).map_err(api_error)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_original_file(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let (mime, bytes) = original_file(&state, &id).await.map_err(api_error)?;
  Ok(([(CONTENT_TYPE, mime)], bytes))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_encouragement(State(state): State<Arc<AppState>>) -> ApiResult<Json<EncouragementOut>> {
  let e = current_encouragement(&state).await.map_err(api_error)?;
  Ok(Json(EncouragementOut {
    text: e.text,
    image_url: e.image.map(|img| img.to_data_url()),
  }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_review(State(state): State<Arc<AppState>>) -> ApiResult<Json<ReviewOut>> {
  current_review(&state).await.map(Json).map_err(api_error)
}
