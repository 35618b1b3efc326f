//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info (never keys).

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{info, instrument};

use crate::domain::{Subject, Topic};
use crate::error::WizardError;
use crate::logic::{handle_message, one_shot_lesson, one_shot_quiz};
use crate::protocol::*;
use crate::providers::validate_api_key;
use crate::scoring::{score_quiz, QuizResult};
use crate::state::AppState;

/// Wizard failures as `{error}` with 404 for unknown ids and 400 otherwise.
pub struct ApiError(WizardError);

impl From<WizardError> for ApiError {
  fn from(e: WizardError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self.0 {
      WizardError::UnknownSession(_) | WizardError::UnknownSubject(_) | WizardError::UnknownTopic { .. } => StatusCode::NOT_FOUND,
      _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorOut { error: self.0.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_subjects(State(state): State<Arc<AppState>>) -> Json<Vec<Subject>> {
  Json(state.catalog.subjects().to_vec())
}

#[instrument(level = "info", skip(state), fields(%subject_id))]
pub async fn http_get_topics(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
) -> Result<Json<Vec<Topic>>, ApiError> {
  if state.catalog.subject(&subject_id).is_none() {
    return Err(WizardError::UnknownSubject(subject_id).into());
  }
  Ok(Json(state.catalog.topics_for(&subject_id).to_vec()))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, key_len = body.api_key.len()))]
pub async fn http_post_validate_key(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ValidateKeyIn>,
) -> impl IntoResponse {
  let valid = validate_api_key(&state.http, &state.config, body.provider, &body.api_key).await;
  info!(target: "content", provider = %body.provider, %valid, "HTTP key validation");
  Json(ValidateKeyOut { valid })
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, subject = %body.subject_id))]
pub async fn http_post_lesson(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ContentIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = one_shot_lesson(&state, body).await?;
  info!(target: "content", ok = out.error.is_none(), source = ?out.source, "HTTP lesson served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, subject = %body.subject_id))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ContentIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = one_shot_quiz(&state, body).await?;
  info!(target: "content", ok = out.error.is_none(), questions = out.content.len(), "HTTP quiz served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(body), fields(questions = body.questions.len(), answers = body.answers.len()))]
pub async fn http_post_score(Json(body): Json<ScoreIn>) -> Json<QuizResult> {
  let result = score_quiz(&body.questions, &body.answers);
  info!(target: "wizard", score = result.score, "HTTP quiz scored");
  Json(result)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_session(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  let session_id = state.create_session().await;
  let snapshot = state.snapshot(&session_id).await?;
  Ok((StatusCode::CREATED, Json(SessionOut { session_id, state: snapshot })))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let snapshot = state.snapshot(&id).await?;
  Ok(Json(SessionOut { session_id: id, state: snapshot }))
}

#[instrument(level = "info", skip(state, msg), fields(%id, kind = msg.kind()))]
pub async fn http_post_session_message(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(msg): Json<ClientMessage>,
) -> Result<impl IntoResponse, ApiError> {
  // Unknown ids are a 404 here rather than an `error` message in a 200.
  state.snapshot(&id).await?;
  Ok(Json(handle_message(&state, &id, msg).await))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  if state.remove_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(WizardError::UnknownSession(id).into())
  }
}
