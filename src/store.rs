//! Record store: sessions, questions, attempts, settings and daily stats.
//!
//! All tables live behind one `RwLock`, so every method is a single atomic
//! unit of work. Reads are filtered by account; sessions come back newest
//! first and questions by `order_index`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{Attempt, DailyStats, Question, Session, Settings};
use crate::stats;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("rejected: {0}")]
  Rejected(String),
}

impl StoreError {
  fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
    StoreError::NotFound { entity, id: id.into() }
  }
}

/// Row counts removed by a full reset.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ResetCounts {
  pub sessions: usize,
  pub questions: usize,
  pub attempts: usize,
  pub daily_stats: usize,
}

/// A completed session, its attempts and today's updated stats row.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
  pub session: Session,
  pub attempts: Vec<Attempt>,
  pub today: DailyStats,
}

#[derive(Default)]
struct Tables {
  sessions: HashMap<String, Session>,
  questions: HashMap<String, Question>,
  attempts: HashMap<String, Attempt>,
  settings: HashMap<String, Settings>,
  daily_stats: HashMap<(String, NaiveDate), DailyStats>,
}

impl Tables {
  fn owned_session(&self, account_id: &str, session_id: &str) -> Result<&Session, StoreError> {
    self.sessions
      .get(session_id)
      .filter(|s| s.account_id == account_id)
      .ok_or_else(|| StoreError::not_found("session", session_id))
  }

  fn questions_of(&self, session_id: &str) -> Vec<Question> {
    let mut qs: Vec<Question> = self.questions
      .values()
      .filter(|q| q.session_id == session_id)
      .cloned()
      .collect();
    qs.sort_by_key(|q| q.order_index);
    qs
  }

  fn attempts_of(&self, session_id: &str) -> Vec<Attempt> {
    let mut at: Vec<Attempt> = self.attempts
      .values()
      .filter(|a| a.session_id == session_id)
      .cloned()
      .collect();
    at.sort_by_key(|a| a.created_at);
    at
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  // --- sessions & questions ---

  /// Insert a session together with its questions; nothing is written if
  /// any check fails.
  #[instrument(level = "debug", skip(self, session, questions), fields(session_id = %session.id, n = questions.len()))]
  pub async fn insert_session_with_questions(
    &self,
    session: Session,
    questions: Vec<Question>,
  ) -> Result<(Session, Vec<Question>), StoreError> {
    if questions.is_empty() {
      return Err(StoreError::Rejected("a session needs at least one question".into()));
    }
    if session.total_questions as usize != questions.len() {
      return Err(StoreError::Rejected(format!(
        "total_questions is {} but {} questions were given",
        session.total_questions,
        questions.len()
      )));
    }
    let mut seen = std::collections::HashSet::new();
    for q in &questions {
      if q.session_id != session.id {
        return Err(StoreError::Rejected(format!("question {} belongs to another session", q.id)));
      }
      if !seen.insert(q.order_index) {
        return Err(StoreError::Rejected(format!("duplicate order_index {}", q.order_index)));
      }
    }

    let mut t = self.tables.write().await;
    if t.sessions.contains_key(&session.id) {
      return Err(StoreError::Conflict(format!("session {} already exists", session.id)));
    }
    if let Some(q) = questions.iter().find(|q| t.questions.contains_key(&q.id)) {
      return Err(StoreError::Conflict(format!("question {} already exists", q.id)));
    }
    for q in &questions {
      t.questions.insert(q.id.clone(), q.clone());
    }
    t.sessions.insert(session.id.clone(), session.clone());
    let mut qs = questions;
    qs.sort_by_key(|q| q.order_index);
    Ok((session, qs))
  }

  pub async fn list_sessions(&self, account_id: &str) -> Vec<Session> {
    let t = self.tables.read().await;
    let mut v: Vec<Session> = t.sessions
      .values()
      .filter(|s| s.account_id == account_id)
      .cloned()
      .collect();
    v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    v
  }

  pub async fn get_session(&self, account_id: &str, session_id: &str) -> Result<Session, StoreError> {
    let t = self.tables.read().await;
    t.owned_session(account_id, session_id).cloned()
  }

  pub async fn questions_for(&self, account_id: &str, session_id: &str) -> Result<Vec<Question>, StoreError> {
    let t = self.tables.read().await;
    t.owned_session(account_id, session_id)?;
    Ok(t.questions_of(session_id))
  }

  /// Session, ordered questions and attempts read under one lock.
  pub async fn session_bundle(
    &self,
    account_id: &str,
    session_id: &str,
  ) -> Result<(Session, Vec<Question>, Vec<Attempt>), StoreError> {
    let t = self.tables.read().await;
    let s = t.owned_session(account_id, session_id)?.clone();
    Ok((s, t.questions_of(session_id), t.attempts_of(session_id)))
  }

  // --- attempts ---

  #[instrument(level = "debug", skip(self, attempt), fields(session_id = %attempt.session_id, question_id = %attempt.question_id))]
  pub async fn insert_attempt(&self, account_id: &str, attempt: Attempt) -> Result<Attempt, StoreError> {
    let mut t = self.tables.write().await;
    let session = t.owned_session(account_id, &attempt.session_id)?;
    if session.is_completed() {
      return Err(StoreError::Conflict(format!("session {} is already completed", session.id)));
    }
    match t.questions.get(&attempt.question_id) {
      Some(q) if q.session_id == attempt.session_id => {}
      _ => return Err(StoreError::not_found("question", attempt.question_id.clone())),
    }
    if t.attempts.values().any(|a| a.question_id == attempt.question_id) {
      return Err(StoreError::Conflict(format!("question {} was already answered", attempt.question_id)));
    }
    t.attempts.insert(attempt.id.clone(), attempt.clone());
    Ok(attempt)
  }

  /// Mark a session completed and fold it into the account's stats row for
  /// `today`, all under one write lock. The correct count is tallied from
  /// the attempts; every question must have been answered.
  #[instrument(level = "debug", skip(self))]
  pub async fn complete_session(
    &self,
    account_id: &str,
    session_id: &str,
    completed_at: DateTime<Utc>,
    today: NaiveDate,
  ) -> Result<Completion, StoreError> {
    let mut t = self.tables.write().await;
    let session = t.owned_session(account_id, session_id)?;
    if session.is_completed() {
      return Err(StoreError::Conflict(format!("session {} is already completed", session_id)));
    }
    let created_at = session.created_at;
    let questions = t.questions_of(session_id);
    let attempts = t.attempts_of(session_id);
    let unanswered = questions
      .iter()
      .filter(|q| !attempts.iter().any(|a| a.question_id == q.id))
      .count();
    if unanswered > 0 {
      return Err(StoreError::Rejected(format!("{} question(s) still unanswered", unanswered)));
    }
    let correct = attempts.iter().filter(|a| a.is_correct).count() as u32;
    let minutes = stats::minutes_spent(created_at, completed_at);

    let session = t.sessions
      .get_mut(session_id)
      .ok_or_else(|| StoreError::not_found("session", session_id))?;
    session.correct_count = correct;
    session.completed_at = Some(completed_at);
    let session = session.clone();

    let key = (account_id.to_string(), today);
    if !t.daily_stats.contains_key(&key) {
      let yesterday = (account_id.to_string(), today - Duration::days(1));
      let row = stats::fresh_day(account_id, today, t.daily_stats.get(&yesterday));
      t.daily_stats.insert(key.clone(), row);
    }
    let today_row = t.daily_stats
      .get_mut(&key)
      .ok_or_else(|| StoreError::not_found("daily_stats", format!("{}@{}", account_id, today)))?;
    stats::apply_session_complete(today_row, correct, session.total_questions, minutes);
    let today_row = today_row.clone();

    debug!(%session_id, correct, minutes, streak = today_row.streak, "Session completed");
    Ok(Completion { session, attempts, today: today_row })
  }

  // --- settings ---

  pub async fn get_settings(&self, account_id: &str) -> Option<Settings> {
    self.tables.read().await.settings.get(account_id).cloned()
  }

  /// Insert unless a row exists; returns the stored row either way.
  pub async fn insert_settings_if_absent(&self, settings: Settings) -> Settings {
    let mut t = self.tables.write().await;
    t.settings
      .entry(settings.account_id.clone())
      .or_insert(settings)
      .clone()
  }

  pub async fn modify_settings<F>(&self, account_id: &str, f: F) -> Result<Settings, StoreError>
  where
    F: FnOnce(&mut Settings),
  {
    let mut t = self.tables.write().await;
    let s = t.settings
      .get_mut(account_id)
      .ok_or_else(|| StoreError::not_found("settings", account_id))?;
    f(s);
    Ok(s.clone())
  }

  // --- daily stats ---

  pub async fn get_daily_stats(&self, account_id: &str, date: NaiveDate) -> Option<DailyStats> {
    let t = self.tables.read().await;
    t.daily_stats.get(&(account_id.to_string(), date)).cloned()
  }

  /// Insert unless a row exists for that date; returns the stored row either way.
  pub async fn insert_daily_stats_if_absent(&self, stats: DailyStats) -> DailyStats {
    let mut t = self.tables.write().await;
    t.daily_stats
      .entry((stats.account_id.clone(), stats.date))
      .or_insert(stats)
      .clone()
  }

  pub async fn modify_daily_stats<F>(&self, account_id: &str, date: NaiveDate, f: F) -> Result<DailyStats, StoreError>
  where
    F: FnOnce(&mut DailyStats),
  {
    let mut t = self.tables.write().await;
    let s = t.daily_stats
      .get_mut(&(account_id.to_string(), date))
      .ok_or_else(|| StoreError::not_found("daily_stats", format!("{}@{}", account_id, date)))?;
    f(s);
    Ok(s.clone())
  }

  /// Inclusive date range, ordered by date.
  pub async fn daily_stats_range(&self, account_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<DailyStats> {
    let t = self.tables.read().await;
    let mut v: Vec<DailyStats> = t.daily_stats
      .values()
      .filter(|s| s.account_id == account_id && s.date >= from && s.date <= to)
      .cloned()
      .collect();
    v.sort_by_key(|s| s.date);
    v
  }

  // --- reset ---

  /// Delete the account's sessions, questions, attempts and daily stats.
  /// Settings survive.
  #[instrument(level = "info", skip(self))]
  pub async fn reset_account(&self, account_id: &str) -> ResetCounts {
    let mut t = self.tables.write().await;
    let session_ids: std::collections::HashSet<String> = t.sessions
      .values()
      .filter(|s| s.account_id == account_id)
      .map(|s| s.id.clone())
      .collect();

    let before = (t.sessions.len(), t.questions.len(), t.attempts.len(), t.daily_stats.len());
    t.sessions.retain(|id, _| !session_ids.contains(id));
    t.questions.retain(|_, q| !session_ids.contains(&q.session_id));
    t.attempts.retain(|_, a| !session_ids.contains(&a.session_id));
    t.daily_stats.retain(|(acct, _), _| acct != account_id);

    ResetCounts {
      sessions: before.0 - t.sessions.len(),
      questions: before.1 - t.questions.len(),
      attempts: before.2 - t.attempts.len(),
      daily_stats: before.3 - t.daily_stats.len(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{PassageOrigin, PassageType, QuestionType, SkillCategory};
  use chrono::TimeZone;

  fn at(min: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(min)
  }

  fn session(id: &str, account: &str, created: DateTime<Utc>, n: u32) -> Session {
    Session {
      id: id.into(),
      account_id: account.into(),
      created_at: created,
      passage_type: PassageType::Fiction,
      primary_skill_category: SkillCategory::B,
      passage_title: format!("Title {id}"),
      passage_text: "Once upon a time.".into(),
      reading_level: "grade3".into(),
      estimated_minutes: 5,
      total_questions: n,
      correct_count: 0,
      completed_at: None,
      is_seeded: true,
      origin: PassageOrigin::Seed,
      word_detective: Vec::new(),
    }
  }

  fn question(session_id: &str, idx: u32) -> Question {
    Question {
      id: format!("{session_id}-q{idx}"),
      session_id: session_id.into(),
      order_index: idx,
      question_type: QuestionType::McqDetail,
      prompt: format!("Q{idx}?"),
      choices: Some(vec!["yes".into(), "no".into()]),
      correct_answer: "yes".into(),
      explanation: String::new(),
      hint: None,
      evidence_spans: Vec::new(),
    }
  }

  fn attempt(session_id: &str, idx: u32, correct: bool, created: DateTime<Utc>) -> Attempt {
    Attempt {
      id: format!("{session_id}-a{idx}"),
      session_id: session_id.into(),
      question_id: format!("{session_id}-q{idx}"),
      child_answer: if correct { "yes".into() } else { "no".into() },
      is_correct: correct,
      is_partial: false,
      seconds_spent: 10,
      created_at: created,
    }
  }

  async fn seeded(store: &MemoryStore, id: &str, account: &str, created: DateTime<Utc>) {
    let qs = (0..2).rev().map(|i| question(id, i)).collect();
    store.insert_session_with_questions(session(id, account, created, 2), qs).await.unwrap();
  }

  #[tokio::test]
  async fn rejected_insert_leaves_nothing_behind() {
    let store = MemoryStore::new();
    let qs = vec![question("s1", 0), question("s1", 0)];
    let err = store.insert_session_with_questions(session("s1", "acct", at(0), 2), qs).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
    assert!(store.list_sessions("acct").await.is_empty());
    assert!(store.get_session("acct", "s1").await.is_err());
  }

  #[tokio::test]
  async fn question_count_must_match_session() {
    let store = MemoryStore::new();
    let err = store
      .insert_session_with_questions(session("s1", "acct", at(0), 4), vec![question("s1", 0)])
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
  }

  #[tokio::test]
  async fn sessions_are_listed_newest_first_and_scoped_by_account() {
    let store = MemoryStore::new();
    seeded(&store, "old", "acct", at(0)).await;
    seeded(&store, "new", "acct", at(10)).await;
    seeded(&store, "other", "someone-else", at(5)).await;
    let ids: Vec<String> = store.list_sessions("acct").await.into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert!(store.get_session("acct", "other").await.is_err());
  }

  #[tokio::test]
  async fn questions_come_back_in_order() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    let order: Vec<u32> = store.questions_for("acct", "s1").await.unwrap().iter().map(|q| q.order_index).collect();
    assert_eq!(order, vec![0, 1]);
  }

  #[tokio::test]
  async fn one_attempt_per_question() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();
    let mut again = attempt("s1", 0, false, at(2));
    again.id = "other".into();
    let err = store.insert_attempt("acct", again).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
  }

  #[tokio::test]
  async fn attempt_must_reference_a_question_of_the_session() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    seeded(&store, "s2", "acct", at(1)).await;
    let mut a = attempt("s1", 0, true, at(2));
    a.question_id = "s2-q0".into();
    let err = store.insert_attempt("acct", a).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "question", .. }));
  }

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
  }

  #[tokio::test]
  async fn completion_tallies_attempts_once() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();

    let err = store.complete_session("acct", "s1", at(3), day(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)), "unanswered question must block completion");

    store.insert_attempt("acct", attempt("s1", 1, false, at(2))).await.unwrap();
    let done = store.complete_session("acct", "s1", at(3), day(2)).await.unwrap();
    assert_eq!(done.session.correct_count, 1);
    assert_eq!(done.session.completed_at, Some(at(3)));
    assert_eq!(done.attempts.len(), 2);

    let err = store.complete_session("acct", "s1", at(4), day(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let err = store.insert_attempt("acct", attempt("s1", 1, true, at(5))).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
  }

  #[tokio::test]
  async fn completion_updates_todays_stats_in_the_same_write() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();
    store.insert_attempt("acct", attempt("s1", 1, true, at(2))).await.unwrap();

    let done = store.complete_session("acct", "s1", at(6), day(2)).await.unwrap();
    assert_eq!(done.today.sessions_completed, 1);
    assert_eq!(done.today.streak, 1);
    assert_eq!((done.today.correct_count, done.today.total_count, done.today.minutes_spent), (2, 2, 6));
    assert_eq!(store.get_daily_stats("acct", day(2)).await, Some(done.today));
  }

  #[tokio::test]
  async fn completion_carries_yesterdays_streak() {
    let store = MemoryStore::new();
    let mut yesterday = stats::fresh_day("acct", day(1), None);
    yesterday.streak = 4;
    store.insert_daily_stats_if_absent(yesterday).await;
    seeded(&store, "s1", "acct", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();
    store.insert_attempt("acct", attempt("s1", 1, false, at(2))).await.unwrap();

    let done = store.complete_session("acct", "s1", at(3), day(2)).await.unwrap();
    assert_eq!(done.today.streak, 5);
  }

  #[tokio::test]
  async fn rejected_completion_leaves_stats_untouched() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();

    assert!(store.complete_session("acct", "s1", at(3), day(2)).await.is_err());
    assert_eq!(store.get_daily_stats("acct", day(2)).await, None);
    assert!(!store.get_session("acct", "s1").await.unwrap().is_completed());
  }

  #[tokio::test]
  async fn daily_stats_insert_is_idempotent_and_range_ordered() {
    let store = MemoryStore::new();
    let d = day;
    for day in [4, 2, 3] {
      let s = DailyStats {
        account_id: "acct".into(),
        date: d(day),
        sessions_completed: 0,
        correct_count: 0,
        total_count: 0,
        minutes_spent: 0,
        streak: day,
      };
      store.insert_daily_stats_if_absent(s).await;
    }
    let mut dup = store.get_daily_stats("acct", d(2)).await.unwrap();
    dup.streak = 99;
    assert_eq!(store.insert_daily_stats_if_absent(dup).await.streak, 2);

    let dates: Vec<NaiveDate> = store.daily_stats_range("acct", d(2), d(3)).await.into_iter().map(|s| s.date).collect();
    assert_eq!(dates, vec![d(2), d(3)]);
  }

  #[tokio::test]
  async fn reset_removes_account_history_only() {
    let store = MemoryStore::new();
    seeded(&store, "s1", "acct", at(0)).await;
    seeded(&store, "s2", "other", at(0)).await;
    store.insert_attempt("acct", attempt("s1", 0, true, at(1))).await.unwrap();
    store
      .insert_daily_stats_if_absent(DailyStats {
        account_id: "acct".into(),
        date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        sessions_completed: 1,
        correct_count: 1,
        total_count: 2,
        minutes_spent: 3,
        streak: 1,
      })
      .await;

    let counts = store.reset_account("acct").await;
    assert_eq!(counts, ResetCounts { sessions: 1, questions: 2, attempts: 1, daily_stats: 1 });
    assert!(store.list_sessions("acct").await.is_empty());
    assert_eq!(store.list_sessions("other").await.len(), 1);
  }
}
