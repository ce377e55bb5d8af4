//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the account and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{DailyStats, GeneratedPassage, Session, Settings};
use crate::error::AppError;
use crate::logic::{self, local_today};
use crate::progress::ProgressReport;
use crate::protocol::*;
use crate::routes::account::AccountId;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, ai_enabled: state.openai.is_some() })
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_list_sessions(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> Result<Json<Vec<Session>>, AppError> {
  let sessions = logic::list_sessions(&state, &account.0).await?;
  Ok(Json(sessions))
}

#[instrument(level = "info", skip(state, body), fields(account = %account.0))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  body: Option<Json<StartSessionIn>>,
) -> Result<(StatusCode, Json<StartSessionOut>), AppError> {
  let difficulty = body.map(|Json(b)| b.difficulty).unwrap_or_default();
  let out = logic::start_session(&state, &account.0, difficulty, Utc::now()).await?;
  info!(target: "session", id = %out.session.id, origin = ?out.session.origin, "HTTP session started");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state), fields(account = %account.0, %id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Path(id): Path<String>,
) -> Result<Json<SessionDetailsOut>, AppError> {
  Ok(Json(logic::session_details(&state, &account.0, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(account = %account.0, %id, question_id = %body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, AppError> {
  let out = logic::submit_answer(&state, &account.0, &id, body, Utc::now()).await?;
  info!(target: "session", %id, correct = out.correct, partial = out.partial, method = ?out.method, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(account = %account.0, %id))]
pub async fn http_complete_session(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Path(id): Path<String>,
) -> Result<Json<CompleteOut>, AppError> {
  Ok(Json(logic::complete_session(&state, &account.0, &id, Utc::now(), local_today()).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0, %id, question = q.question))]
pub async fn http_get_evidence(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Path(id): Path<String>,
  Query(q): Query<EvidenceQuery>,
) -> Result<Json<EvidenceOut>, AppError> {
  Ok(Json(logic::evidence(&state, &account.0, &id, q.question).await?))
}

#[instrument(level = "info", skip(state, body), fields(account = %account.0, %id, item = body.item))]
pub async fn http_post_word_detective(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Path(id): Path<String>,
  Json(body): Json<WordPickIn>,
) -> Result<Json<WordPickOut>, AppError> {
  Ok(Json(logic::check_word_detective(&state, &account.0, &id, body).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_get_settings(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> Result<Json<Settings>, AppError> {
  Ok(Json(logic::get_settings(&state, &account.0, Utc::now()).await?))
}

#[instrument(level = "info", skip(state, patch), fields(account = %account.0))]
pub async fn http_put_settings(
  State(state): State<Arc<AppState>>,
  account: AccountId,
  Json(patch): Json<SettingsPatch>,
) -> Result<Json<Settings>, AppError> {
  Ok(Json(logic::update_settings(&state, &account.0, patch, Utc::now()).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_today_stats(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> Result<Json<DailyStats>, AppError> {
  Ok(Json(logic::today_stats(&state, &account.0, local_today()).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_week_stats(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> Result<Json<WeekOut>, AppError> {
  Ok(Json(logic::week_stats(&state, &account.0, local_today()).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_progress(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> Result<Json<ProgressReport>, AppError> {
  Ok(Json(logic::progress_report(&state, &account.0, local_today()).await?))
}

#[instrument(level = "info", skip(state), fields(account = %account.0))]
pub async fn http_reset_account(
  State(state): State<Arc<AppState>>,
  account: AccountId,
) -> impl IntoResponse {
  let deleted = logic::reset_account(&state, &account.0).await;
  Json(ResetOut { deleted })
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.child_answer.len()))]
pub async fn http_post_grade(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GradeIn>,
) -> Result<Json<GradeOut>, AppError> {
  let out = logic::grade_answer(&state, body).await?;
  info!(target: "grading", grade = ?out.grade, method = ?out.method, "HTTP grade served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_generate_passage(
  State(state): State<Arc<AppState>>,
  body: Option<Json<GenerateIn>>,
) -> Result<Json<GeneratedPassage>, AppError> {
  let difficulty = body.map(|Json(b)| b.difficulty).unwrap_or_default();
  let passage = logic::generate_passage(&state, difficulty).await?;
  info!(target: "passages", %difficulty, title = %passage.passage_title, "HTTP passage generated");
  Ok(Json(passage))
}
