//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - starting a session (AI passage or seeded fallback) and persisting it
//!   - submitting answers (exact match for choices, graded short answers)
//!   - completing a session and folding it into today's stats
//!   - settings, stats, progress and the full reset
//!
//! Reads go through the query cache; every write invalidates the tags it
//! touches.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{account_tag, daily_stats_tag, session_tag, sessions_tag, settings_tag};
use crate::detective;
use crate::domain::{
  Attempt, DailyStats, Difficulty, GeneratedPassage, PassageOrigin, Question, Session, Settings,
};
use crate::error::AppError;
use crate::evidence::segments;
use crate::grading::{choice_matches, grade_with_fallback, Grade, GradeMethod, GradeOutcome, GradeRequest};
use crate::passages::{choose_passage, SourcedPassage};
use crate::progress::{build_report, summarize_results, ProgressReport};
use crate::protocol::*;
use crate::state::AppState;
use crate::stats;
use crate::store::{Completion, ResetCounts, StoreError};

fn not_found(entity: &'static str, id: impl Into<String>) -> AppError {
  AppError::Store(StoreError::NotFound { entity, id: id.into() })
}

/// Turn a chosen passage into session + question records.
fn build_records(account_id: &str, sourced: SourcedPassage, estimated_minutes: u32, now: DateTime<Utc>) -> (Session, Vec<Question>) {
  let SourcedPassage { passage, origin } = sourced;
  let session_id = Uuid::new_v4().to_string();
  let questions: Vec<Question> = passage
    .questions
    .into_iter()
    .map(|q| Question {
      id: Uuid::new_v4().to_string(),
      session_id: session_id.clone(),
      order_index: q.order_index,
      question_type: q.question_type,
      prompt: q.prompt,
      choices: q.choices,
      correct_answer: q.correct_answer,
      explanation: q.explanation,
      hint: q.hint,
      evidence_spans: q.evidence_spans,
    })
    .collect();
  let session = Session {
    id: session_id,
    account_id: account_id.to_string(),
    created_at: now,
    passage_type: passage.passage_type,
    primary_skill_category: passage.primary_skill_category,
    passage_title: passage.passage_title,
    passage_text: passage.passage_text,
    reading_level: passage.reading_level,
    estimated_minutes,
    total_questions: questions.len() as u32,
    correct_count: 0,
    completed_at: None,
    is_seeded: origin != PassageOrigin::Generated,
    origin,
    word_detective: passage.word_detective,
  };
  (session, questions)
}

#[instrument(level = "info", skip(state), fields(%difficulty))]
pub async fn start_session(
  state: &AppState,
  account_id: &str,
  difficulty: Difficulty,
  now: DateTime<Utc>,
) -> Result<StartSessionOut, AppError> {
  let used: HashSet<String> = state
    .store
    .list_sessions(account_id)
    .await
    .into_iter()
    .map(|s| s.passage_title)
    .collect();

  let sourced = choose_passage(state.remote_passages.as_ref(), &state.seeded, difficulty, &used).await?;
  let (session, questions) = build_records(account_id, sourced, state.practice.estimated_minutes, now);
  let (session, questions) = state.store.insert_session_with_questions(session, questions).await?;
  state.cache.invalidate(&sessions_tag(account_id)).await;

  info!(target: "session", id = %session.id, title = %session.passage_title, origin = ?session.origin, "Session started");
  Ok(StartSessionOut {
    questions: questions.iter().map(|q| question_out(q, false)).collect(),
    session,
  })
}

/// Newest first.
pub async fn list_sessions(state: &AppState, account_id: &str) -> Result<Vec<Session>, AppError> {
  let key = format!("sessions:list:{account_id}");
  let tags = vec![sessions_tag(account_id), account_tag(account_id)];
  state
    .cache
    .get_or_try_load(&key, tags, move || async move {
      Ok::<_, AppError>(state.store.list_sessions(account_id).await)
    })
    .await
}

#[instrument(level = "debug", skip(state))]
pub async fn session_details(state: &AppState, account_id: &str, session_id: &str) -> Result<SessionDetailsOut, AppError> {
  let key = format!("session:details:{account_id}:{session_id}");
  let tags = vec![session_tag(session_id), account_tag(account_id)];
  state
    .cache
    .get_or_try_load(&key, tags, move || async move {
      let (session, questions, attempts) = state.store.session_bundle(account_id, session_id).await?;
      let done = session.is_completed();
      let questions = questions
        .iter()
        .map(|q| question_out(q, done || attempts.iter().any(|a| a.question_id == q.id)))
        .collect();
      let summary = done.then(|| summarize_results(&attempts, session.total_questions));
      Ok::<_, AppError>(SessionDetailsOut { session, questions, attempts, summary })
    })
    .await
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id, answer_len = body.answer.len()))]
pub async fn submit_answer(
  state: &AppState,
  account_id: &str,
  session_id: &str,
  body: AnswerIn,
  now: DateTime<Utc>,
) -> Result<AnswerOut, AppError> {
  if body.answer.trim().is_empty() {
    return Err(AppError::BadRequest("answer must not be empty".into()));
  }
  let questions = state.store.questions_for(account_id, session_id).await?;
  let question = questions
    .into_iter()
    .find(|q| q.id == body.question_id)
    .ok_or_else(|| not_found("question", body.question_id.clone()))?;

  let outcome = if question.question_type.is_multiple_choice() {
    let grade = if choice_matches(&body.answer, &question.correct_answer) { Grade::Full } else { Grade::Incorrect };
    GradeOutcome { grade, method: GradeMethod::Exact }
  } else {
    let req = GradeRequest {
      question: question.prompt.clone(),
      correct_answer: question.correct_answer.clone(),
      child_answer: body.answer.clone(),
    };
    grade_with_fallback(state.remote_grader.as_ref(), &state.keyword_grader, &req).await
  };

  let attempt = Attempt {
    id: Uuid::new_v4().to_string(),
    session_id: session_id.to_string(),
    question_id: question.id.clone(),
    child_answer: body.answer,
    is_correct: outcome.grade.is_correct(),
    is_partial: outcome.grade.is_partial(),
    seconds_spent: body.seconds_spent,
    created_at: now,
  };
  let attempt = state.store.insert_attempt(account_id, attempt).await?;
  state.cache.invalidate(&session_tag(session_id)).await;

  info!(target: "session", %session_id, question_id = %question.id, grade = ?outcome.grade, method = ?outcome.method, "Answer recorded");
  Ok(AnswerOut {
    attempt_id: attempt.id,
    correct: attempt.is_correct,
    partial: attempt.is_partial,
    grade: outcome.grade,
    method: outcome.method,
    expected: question.correct_answer,
    explanation: question.explanation,
  })
}

#[instrument(level = "info", skip(state))]
pub async fn complete_session(
  state: &AppState,
  account_id: &str,
  session_id: &str,
  now: DateTime<Utc>,
  today: NaiveDate,
) -> Result<CompleteOut, AppError> {
  let Completion { session, attempts, today: today_row } =
    state.store.complete_session(account_id, session_id, now, today).await?;

  state.cache.invalidate(&sessions_tag(account_id)).await;
  state.cache.invalidate(&session_tag(session_id)).await;
  state.cache.invalidate(&daily_stats_tag(account_id, today)).await;

  let summary = summarize_results(&attempts, session.total_questions);
  info!(target: "session", %session_id, correct = session.correct_count, total = session.total_questions, minutes = today_row.minutes_spent, streak = today_row.streak, "Session completed");
  info!(target: "stats", %account_id, %today, sessions = today_row.sessions_completed, streak = today_row.streak, "Daily stats updated");
  Ok(CompleteOut { session, summary, today: today_row })
}

/// Grade one short answer without recording anything.
#[instrument(level = "info", skip(state, body), fields(answer_len = body.child_answer.len()))]
pub async fn grade_answer(state: &AppState, body: GradeIn) -> Result<GradeOut, AppError> {
  if body.correct_answer.trim().is_empty() {
    return Err(AppError::BadRequest("correctAnswer must not be empty".into()));
  }
  let req = GradeRequest {
    question: body.question,
    correct_answer: body.correct_answer,
    child_answer: body.child_answer,
  };
  let out = grade_with_fallback(state.remote_grader.as_ref(), &state.keyword_grader, &req).await;
  Ok(GradeOut {
    grade: out.grade,
    is_correct: out.grade.is_correct(),
    is_partial: out.grade.is_partial(),
    method: out.method,
  })
}

/// Ask the remote source for a passage. No fallback here: callers of this
/// endpoint want a generated passage or an error.
#[instrument(level = "info", skip(state), fields(%difficulty))]
pub async fn generate_passage(state: &AppState, difficulty: Difficulty) -> Result<GeneratedPassage, AppError> {
  let remote = state.remote_passages.as_ref().ok_or(AppError::AiUnavailable)?;
  let sourced = remote.passage(difficulty, &HashSet::new()).await?;
  Ok(sourced.passage)
}

/// Settings row, created with defaults on first read.
pub async fn get_settings(state: &AppState, account_id: &str, now: DateTime<Utc>) -> Result<Settings, AppError> {
  let key = format!("settings:{account_id}");
  let tags = vec![settings_tag(account_id), account_tag(account_id)];
  state
    .cache
    .get_or_try_load(&key, tags, move || async move {
      if let Some(s) = state.store.get_settings(account_id).await {
        return Ok::<_, AppError>(s);
      }
      debug!(target: "settings", %account_id, "Creating default settings");
      let row = Settings {
        account_id: account_id.to_string(),
        child_name: state.practice.default_child_name.clone(),
        grade_level: state.practice.default_grade_level,
        created_at: now,
        updated_at: now,
      };
      Ok(state.store.insert_settings_if_absent(row).await)
    })
    .await
}

#[instrument(level = "info", skip(state, patch))]
pub async fn update_settings(
  state: &AppState,
  account_id: &str,
  patch: SettingsPatch,
  now: DateTime<Utc>,
) -> Result<Settings, AppError> {
  let name = match patch.child_name {
    Some(n) if n.trim().is_empty() => return Err(AppError::BadRequest("child_name must not be empty".into())),
    Some(n) => Some(n.trim().to_string()),
    None => None,
  };
  if let Some(g) = patch.grade_level {
    if !(1..=12).contains(&g) {
      return Err(AppError::BadRequest(format!("grade_level must be 1..=12, got {g}")));
    }
  }

  get_settings(state, account_id, now).await?;
  let updated = state
    .store
    .modify_settings(account_id, |s| {
      if let Some(n) = name {
        s.child_name = n;
      }
      if let Some(g) = patch.grade_level {
        s.grade_level = g;
      }
      s.updated_at = now;
    })
    .await?;
  state.cache.invalidate(&settings_tag(account_id)).await;
  Ok(updated)
}

pub async fn today_stats(state: &AppState, account_id: &str, today: NaiveDate) -> Result<DailyStats, AppError> {
  let key = format!("daily-stats:today:{account_id}:{today}");
  let tags = vec![daily_stats_tag(account_id, today), account_tag(account_id)];
  state
    .cache
    .get_or_try_load(&key, tags, move || async move {
      Ok::<_, AppError>(stats::today_stats(&state.store, account_id, today).await)
    })
    .await
}

fn range_tags(account_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<String> {
  let mut tags: Vec<String> = from
    .iter_days()
    .take_while(|d| *d <= to)
    .map(|d| daily_stats_tag(account_id, d))
    .collect();
  tags.push(account_tag(account_id));
  tags
}

pub async fn week_stats(state: &AppState, account_id: &str, today: NaiveDate) -> Result<WeekOut, AppError> {
  let (from, to) = stats::week_bounds(today);
  let key = format!("daily-stats:week:{account_id}:{from}");
  state
    .cache
    .get_or_try_load(&key, range_tags(account_id, from, to), move || async move {
      let days = stats::week_stats(&state.store, account_id, today).await;
      Ok::<_, AppError>(WeekOut { from, to, days })
    })
    .await
}

#[instrument(level = "debug", skip(state))]
pub async fn progress_report(state: &AppState, account_id: &str, today: NaiveDate) -> Result<ProgressReport, AppError> {
  let sessions = list_sessions(state, account_id).await?;
  let today_row = today_stats(state, account_id, today).await?;
  let (from, to) = stats::last_seven_days(today);
  let key = format!("daily-stats:recent:{account_id}:{to}");
  let recent: Vec<DailyStats> = state
    .cache
    .get_or_try_load(&key, range_tags(account_id, from, to), move || async move {
      Ok::<_, AppError>(state.store.daily_stats_range(account_id, from, to).await)
    })
    .await?;
  Ok(build_report(&sessions, &recent, today_row, state.practice.daily_goal))
}

/// Evidence segments for the question at `order_index`. Like the answer
/// itself, evidence stays hidden until the question has an attempt or the
/// session is complete.
pub async fn evidence(state: &AppState, account_id: &str, session_id: &str, order_index: u32) -> Result<EvidenceOut, AppError> {
  let (session, questions, attempts) = state.store.session_bundle(account_id, session_id).await?;
  let q = questions
    .iter()
    .find(|q| q.order_index == order_index)
    .ok_or_else(|| not_found("question", format!("{session_id}#{order_index}")))?;
  if !session.is_completed() && !attempts.iter().any(|a| a.question_id == q.id) {
    return Err(AppError::Store(StoreError::Conflict(format!("question {} has not been answered yet", q.id))));
  }
  Ok(EvidenceOut {
    question_id: q.id.clone(),
    segments: segments(&session.passage_text, &q.evidence_spans),
  })
}

pub async fn check_word_detective(
  state: &AppState,
  account_id: &str,
  session_id: &str,
  pick: WordPickIn,
) -> Result<WordPickOut, AppError> {
  let session = state.store.get_session(account_id, session_id).await?;
  let item = session
    .word_detective
    .get(pick.item)
    .ok_or_else(|| not_found("word_detective item", format!("{session_id}#{}", pick.item)))?;
  let correct = detective::is_target(item, &pick.word);
  debug!(target: "session", %session_id, item = pick.item, correct, "Word detective pick");
  Ok(WordPickOut {
    correct,
    target_word: item.target_word.clone(),
    feedback: item.feedback.clone(),
  })
}

/// Delete the account's practice history. Settings are kept.
#[instrument(level = "info", skip(state))]
pub async fn reset_account(state: &AppState, account_id: &str) -> ResetCounts {
  let counts = state.store.reset_account(account_id).await;
  let dropped = state.cache.invalidate(&account_tag(account_id)).await;
  warn!(target: "session", %account_id, sessions = counts.sessions, attempts = counts.attempts, cache_dropped = dropped, "Account data reset");
  counts
}

/// Handlers use the local calendar day for stats.
pub fn local_today() -> NaiveDate {
  chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use async_trait::async_trait;

  use crate::domain::{QuestionType, WordDetectiveItem, WordType};
  use crate::grading::{GradeError, ShortAnswerGrader};
  use crate::passages::{PassageError, PassageSource};
  use crate::seeds::{hard_fallback_passage, seed_passages};

  const ACCT: &str = "acct-1";

  fn minutes_ago(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now - chrono::Duration::minutes(minutes)
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()
  }

  struct FixedSource(GeneratedPassage);

  #[async_trait]
  impl PassageSource for FixedSource {
    fn name(&self) -> &'static str { "fixed" }
    async fn passage(&self, _d: Difficulty, _u: &HashSet<String>) -> Result<SourcedPassage, PassageError> {
      Ok(SourcedPassage { passage: self.0.clone(), origin: PassageOrigin::Generated })
    }
  }

  struct DownSource;

  #[async_trait]
  impl PassageSource for DownSource {
    fn name(&self) -> &'static str { "down" }
    async fn passage(&self, _d: Difficulty, _u: &HashSet<String>) -> Result<SourcedPassage, PassageError> {
      Err(PassageError::Malformed("missing passage_title".into()))
    }
  }

  struct FixedGrader(Grade);

  #[async_trait]
  impl ShortAnswerGrader for FixedGrader {
    fn method(&self) -> GradeMethod { GradeMethod::Ai }
    async fn grade(&self, _req: &GradeRequest) -> Result<Grade, GradeError> {
      Ok(self.0)
    }
  }

  async fn stored_questions(state: &AppState, session_id: &str) -> Vec<Question> {
    state.store.questions_for(ACCT, session_id).await.unwrap()
  }

  async fn answer_all(state: &AppState, session_id: &str, right: usize) {
    for (i, q) in stored_questions(state, session_id).await.iter().enumerate() {
      let answer = if i < right { q.correct_answer.clone() } else { "no idea at all".into() };
      let body = AnswerIn { question_id: q.id.clone(), answer, seconds_spent: 20 };
      submit_answer(state, ACCT, session_id, body, Utc::now()).await.unwrap();
    }
  }

  #[tokio::test]
  async fn session_without_ai_comes_from_seeds() {
    let state = AppState::default();
    let out = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap();
    assert_eq!(out.session.origin, PassageOrigin::Seed);
    assert!(out.session.is_seeded);
    assert_eq!(out.session.total_questions, 4);
    let types: Vec<QuestionType> = out.questions.iter().map(|q| q.question_type).collect();
    assert_eq!(types, QuestionType::SESSION_SET.to_vec());
    assert!(out.questions.iter().all(|q| q.reveal.is_none()));
  }

  #[tokio::test]
  async fn generated_session_is_not_marked_seeded() {
    let mut passage = hard_fallback_passage();
    passage.passage_title = "Fresh From The Model".into();
    let state = AppState::default().with_remote_passages(Arc::new(FixedSource(passage)));
    let out = start_session(&state, ACCT, Difficulty::Hard, Utc::now()).await.unwrap();
    assert_eq!(out.session.origin, PassageOrigin::Generated);
    assert!(!out.session.is_seeded);
    assert_eq!(out.session.passage_title, "Fresh From The Model");
  }

  #[tokio::test]
  async fn failing_ai_falls_back_without_repeating_titles() {
    let state = AppState::default().with_remote_passages(Arc::new(DownSource));
    let n = seed_passages().len();
    let mut titles = HashSet::new();
    for _ in 0..n {
      let out = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap();
      assert_eq!(out.session.origin, PassageOrigin::Seed);
      titles.insert(out.session.passage_title);
    }
    assert_eq!(titles.len(), n);
    // Pool exhausted: any seed may come back.
    let again = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap();
    assert!(titles.contains(&again.session.passage_title));
  }

  #[tokio::test]
  async fn session_list_is_refreshed_after_start() {
    let state = AppState::default();
    assert!(list_sessions(&state, ACCT).await.unwrap().is_empty());
    start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap();
    assert_eq!(list_sessions(&state, ACCT).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn choices_match_ignoring_case_and_spaces() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    let q = stored_questions(&state, &s.id).await.into_iter().find(|q| q.question_type.is_multiple_choice()).unwrap();
    let sloppy = format!("  {}  ", q.correct_answer.to_uppercase());
    let out = submit_answer(&state, ACCT, &s.id, AnswerIn { question_id: q.id.clone(), answer: sloppy, seconds_spent: 5 }, Utc::now())
      .await
      .unwrap();
    assert!(out.correct && !out.partial);
    assert_eq!(out.method, GradeMethod::Exact);
    assert_eq!(out.expected, q.correct_answer);

    let again = submit_answer(&state, ACCT, &s.id, AnswerIn { question_id: q.id, answer: "x".into(), seconds_spent: 1 }, Utc::now()).await;
    assert!(matches!(again, Err(AppError::Store(StoreError::Conflict(_)))));
  }

  #[tokio::test]
  async fn partial_short_answer_counts_as_correct() {
    let state = AppState::default().with_remote_grader(Arc::new(FixedGrader(Grade::Partial)));
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    let q = stored_questions(&state, &s.id).await.into_iter().find(|q| q.question_type == QuestionType::ShortAnswer).unwrap();
    let out = submit_answer(&state, ACCT, &s.id, AnswerIn { question_id: q.id, answer: "something".into(), seconds_spent: 30 }, Utc::now())
      .await
      .unwrap();
    assert!(out.correct && out.partial);
    assert_eq!(out.method, GradeMethod::Ai);
  }

  #[tokio::test]
  async fn empty_answer_is_a_bad_request() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    let q = &stored_questions(&state, &s.id).await[0];
    let r = submit_answer(&state, ACCT, &s.id, AnswerIn { question_id: q.id.clone(), answer: "  ".into(), seconds_spent: 0 }, Utc::now()).await;
    assert!(matches!(r, Err(AppError::BadRequest(_))));
  }

  #[tokio::test]
  async fn completion_tallies_attempts_and_updates_stats() {
    let state = AppState::default();
    let started = minutes_ago(Utc::now(), 7);
    let s = start_session(&state, ACCT, Difficulty::Normal, started).await.unwrap().session;

    let early = complete_session(&state, ACCT, &s.id, Utc::now(), today()).await;
    assert!(matches!(early, Err(AppError::Store(StoreError::Rejected(_)))));

    answer_all(&state, &s.id, 2).await;
    let before = today_stats(&state, ACCT, today()).await.unwrap();
    assert_eq!(before.sessions_completed, 0);

    let done = complete_session(&state, ACCT, &s.id, Utc::now(), today()).await.unwrap();
    let details = session_details(&state, ACCT, &s.id).await.unwrap();
    let flagged = details.attempts.iter().filter(|a| a.is_correct).count() as u32;
    assert_eq!(done.session.correct_count, flagged);
    assert_eq!(done.summary.correct, flagged);
    assert_eq!(done.today.sessions_completed, 1);
    assert_eq!(done.today.streak, 1);
    assert_eq!(done.today.minutes_spent, 7);
    assert!(details.summary.is_some());
    assert!(details.questions.iter().all(|q| q.reveal.is_some()));

    let after = today_stats(&state, ACCT, today()).await.unwrap();
    assert_eq!(after.sessions_completed, 1);

    let twice = complete_session(&state, ACCT, &s.id, Utc::now(), today()).await;
    assert!(matches!(twice, Err(AppError::Store(StoreError::Conflict(_)))));
  }

  #[tokio::test]
  async fn answering_a_completed_session_is_a_conflict() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    answer_all(&state, &s.id, 4).await;
    complete_session(&state, ACCT, &s.id, Utc::now(), today()).await.unwrap();
    let q = &stored_questions(&state, &s.id).await[0];
    let r = submit_answer(&state, ACCT, &s.id, AnswerIn { question_id: q.id.clone(), answer: "again".into(), seconds_spent: 1 }, Utc::now()).await;
    assert!(matches!(r, Err(AppError::Store(StoreError::Conflict(_)))));
  }

  #[tokio::test]
  async fn other_accounts_cannot_see_a_session() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    let r = session_details(&state, "someone-else", &s.id).await;
    assert!(matches!(r, Err(AppError::Store(StoreError::NotFound { .. }))));
  }

  #[tokio::test]
  async fn cached_details_stay_with_their_owner() {
    let state = AppState::default();
    let s = start_session(&state, "owner", Difficulty::Normal, Utc::now()).await.unwrap().session;
    let mine = session_details(&state, "owner", &s.id).await.unwrap();
    assert_eq!(mine.session.id, s.id);

    let r = session_details(&state, "intruder", &s.id).await;
    assert!(matches!(r, Err(AppError::Store(StoreError::NotFound { .. }))));
  }

  #[tokio::test]
  async fn completed_sessions_show_all_evidence() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    answer_all(&state, &s.id, 2).await;
    complete_session(&state, ACCT, &s.id, Utc::now(), today()).await.unwrap();
    for i in 0..s.total_questions {
      assert!(evidence(&state, ACCT, &s.id, i).await.is_ok());
    }
  }

  #[tokio::test]
  async fn settings_are_created_lazily_and_validated() {
    let state = AppState::default();
    let s = get_settings(&state, ACCT, Utc::now()).await.unwrap();
    assert_eq!((s.child_name.as_str(), s.grade_level), ("Reader", 3));

    let patch = SettingsPatch { child_name: Some(" Mia ".into()), grade_level: None };
    let s = update_settings(&state, ACCT, patch, Utc::now()).await.unwrap();
    assert_eq!((s.child_name.as_str(), s.grade_level), ("Mia", 3));
    assert_eq!(get_settings(&state, ACCT, Utc::now()).await.unwrap().child_name, "Mia");

    let bad = update_settings(&state, ACCT, SettingsPatch { child_name: None, grade_level: Some(13) }, Utc::now()).await;
    assert!(matches!(bad, Err(AppError::BadRequest(_))));
    let blank = update_settings(&state, ACCT, SettingsPatch { child_name: Some("".into()), grade_level: None }, Utc::now()).await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));
  }

  #[tokio::test]
  async fn reset_clears_history_but_keeps_settings() {
    let state = AppState::default();
    update_settings(&state, ACCT, SettingsPatch { child_name: Some("Leo".into()), grade_level: Some(2) }, Utc::now())
      .await
      .unwrap();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    answer_all(&state, &s.id, 3).await;
    complete_session(&state, ACCT, &s.id, Utc::now(), today()).await.unwrap();
    assert_eq!(list_sessions(&state, ACCT).await.unwrap().len(), 1);

    let counts = reset_account(&state, ACCT).await;
    assert_eq!((counts.sessions, counts.questions, counts.attempts, counts.daily_stats), (1, 4, 4, 1));
    assert!(list_sessions(&state, ACCT).await.unwrap().is_empty());
    assert_eq!(today_stats(&state, ACCT, today()).await.unwrap().sessions_completed, 0);
    assert_eq!(get_settings(&state, ACCT, Utc::now()).await.unwrap().child_name, "Leo");
  }

  #[tokio::test]
  async fn progress_reflects_completed_sessions() {
    let state = AppState::default();
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;
    answer_all(&state, &s.id, 4).await;
    complete_session(&state, ACCT, &s.id, Utc::now(), today()).await.unwrap();
    start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap();

    let report = progress_report(&state, ACCT, today()).await.unwrap();
    assert_eq!(report.overview.completed_sessions, 1);
    assert_eq!(report.last_seven_days.len(), 7);
    assert_eq!(report.last_seven_days[6].sessions, 1);
    assert_eq!(report.daily_goal_pct, 33);
    assert_eq!(report.today.streak, 1);

    let week = week_stats(&state, ACCT, today()).await.unwrap();
    assert_eq!(week.days.len(), 1);
  }

  #[tokio::test]
  async fn generate_requires_ai() {
    let state = AppState::default();
    assert!(matches!(generate_passage(&state, Difficulty::Easy).await, Err(AppError::AiUnavailable)));

    let state = AppState::default().with_remote_passages(Arc::new(DownSource));
    assert!(matches!(generate_passage(&state, Difficulty::Easy).await, Err(AppError::Passage(_))));
  }

  #[tokio::test]
  async fn evidence_and_word_detective_use_the_stored_session() {
    let mut passage = hard_fallback_passage();
    passage.passage_title = "Detective Story".into();
    passage.word_detective = vec![WordDetectiveItem {
      sentence: "Maya watered the plant.".into(),
      prompt: "Find the verb.".into(),
      target_word: "watered".into(),
      word_type: WordType::Verb,
      feedback: "Watered is what Maya did.".into(),
    }];
    let state = AppState::default().with_remote_passages(Arc::new(FixedSource(passage.clone())));
    let s = start_session(&state, ACCT, Difficulty::Normal, Utc::now()).await.unwrap().session;

    let hidden = evidence(&state, ACCT, &s.id, 0).await;
    assert!(matches!(hidden, Err(AppError::Store(StoreError::Conflict(_)))));
    let first = &stored_questions(&state, &s.id).await[0];
    let body = AnswerIn { question_id: first.id.clone(), answer: first.correct_answer.clone(), seconds_spent: 10 };
    submit_answer(&state, ACCT, &s.id, body, Utc::now()).await.unwrap();
    assert!(evidence(&state, ACCT, &s.id, 1).await.is_err(), "second question is still unanswered");

    let ev = evidence(&state, ACCT, &s.id, 0).await.unwrap();
    let joined: String = ev.segments.iter().map(|seg| seg.text.as_str()).collect();
    assert_eq!(joined, passage.passage_text);
    assert!(evidence(&state, ACCT, &s.id, 9).await.is_err());

    let pick = check_word_detective(&state, ACCT, &s.id, WordPickIn { item: 0, word: "Watered,".into() }).await.unwrap();
    assert!(pick.correct);
    let miss = check_word_detective(&state, ACCT, &s.id, WordPickIn { item: 0, word: "plant.".into() }).await.unwrap();
    assert!(!miss.correct);
    assert!(check_word_detective(&state, ACCT, &s.id, WordPickIn { item: 3, word: "x".into() }).await.is_err());
  }

  #[tokio::test]
  async fn grading_endpoint_logic_matches_keyword_rules() {
    let state = AppState::default();
    let out = grade_answer(
      &state,
      GradeIn {
        child_answer: "branches too high".into(),
        correct_answer: "The branches were too high for her to reach.".into(),
        question: "Why couldn't Ruby reach the apples?".into(),
      },
    )
    .await
    .unwrap();
    assert_eq!(out, GradeOut { grade: Grade::Partial, is_correct: true, is_partial: true, method: GradeMethod::Keyword });
  }
}
