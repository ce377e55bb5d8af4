//! Answer grading.
//!
//! Multiple-choice answers are an exact (trimmed, case-insensitive) match.
//! Short answers go through a `ShortAnswerGrader`: the remote grader asks the
//! model for a semantic verdict, the keyword grader scores word overlap.
//! `grade_with_fallback` makes one attempt with the remote grader and falls
//! back to keywords on any error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::{GradingConfig, Prompts};
use crate::openai::{AiError, OpenAI};
use crate::util::normalize_answer;

/// Three-level verdict for a short answer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
  Full,
  Partial,
  Incorrect,
}

impl Grade {
  pub fn is_correct(self) -> bool { self != Grade::Incorrect }
  pub fn is_partial(self) -> bool { self == Grade::Partial }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradeRequest {
  pub question: String,
  pub correct_answer: String,
  pub child_answer: String,
}

#[derive(Debug, Error)]
pub enum GradeError {
  #[error(transparent)]
  Ai(#[from] AiError),
}

/// Which grader produced the verdict.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GradeMethod {
  Ai,
  Keyword,
  Exact,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct GradeOutcome {
  pub grade: Grade,
  pub method: GradeMethod,
}

#[async_trait]
pub trait ShortAnswerGrader: Send + Sync {
  fn method(&self) -> GradeMethod;
  async fn grade(&self, req: &GradeRequest) -> Result<Grade, GradeError>;
}

/// Model-backed semantic grading.
pub struct RemoteGrader {
  openai: OpenAI,
  prompts: Prompts,
}

impl RemoteGrader {
  pub fn new(openai: OpenAI, prompts: Prompts) -> Self {
    Self { openai, prompts }
  }
}

#[async_trait]
impl ShortAnswerGrader for RemoteGrader {
  fn method(&self) -> GradeMethod { GradeMethod::Ai }

  async fn grade(&self, req: &GradeRequest) -> Result<Grade, GradeError> {
    let g = self
      .openai
      .grade_short_answer(&self.prompts, &req.question, &req.correct_answer, &req.child_answer)
      .await?;
    Ok(g)
  }
}

/// Deterministic keyword-overlap grading. Never fails.
#[derive(Clone, Copy, Debug)]
pub struct KeywordGrader {
  bands: GradingConfig,
}

impl KeywordGrader {
  pub fn new(bands: GradingConfig) -> Self {
    Self { bands }
  }

  pub fn grade_now(&self, child_answer: &str, correct_answer: &str) -> Grade {
    grade_by_keywords(child_answer, correct_answer, &self.bands)
  }
}

impl Default for KeywordGrader {
  fn default() -> Self {
    Self::new(GradingConfig::default())
  }
}

#[async_trait]
impl ShortAnswerGrader for KeywordGrader {
  fn method(&self) -> GradeMethod { GradeMethod::Keyword }

  async fn grade(&self, req: &GradeRequest) -> Result<Grade, GradeError> {
    Ok(self.grade_now(&req.child_answer, &req.correct_answer))
  }
}

/// Model-answer tokens longer than three characters.
pub fn key_words(correct_answer: &str) -> Vec<String> {
  correct_answer
    .to_lowercase()
    .split_whitespace()
    .filter(|w| w.chars().count() > 3)
    .map(str::to_string)
    .collect()
}

/// Fraction of key words that contain, or are contained in, some child token.
pub fn keyword_overlap_ratio(child_answer: &str, correct_answer: &str) -> f32 {
  let keys = key_words(correct_answer);
  let child = child_answer.to_lowercase();
  let child_words: Vec<&str> = child.split_whitespace().collect();
  let matched = keys
    .iter()
    .filter(|k| child_words.iter().any(|c| c.contains(k.as_str()) || k.contains(c)))
    .count();
  matched as f32 / keys.len().max(1) as f32
}

pub fn grade_by_keywords(child_answer: &str, correct_answer: &str, bands: &GradingConfig) -> Grade {
  let ratio = keyword_overlap_ratio(child_answer, correct_answer);
  if ratio >= bands.full_threshold {
    Grade::Full
  } else if ratio >= bands.partial_threshold {
    Grade::Partial
  } else {
    Grade::Incorrect
  }
}

/// Exact-match rule for multiple-choice and vocabulary questions.
pub fn choice_matches(answer: &str, correct_answer: &str) -> bool {
  normalize_answer(answer) == normalize_answer(correct_answer)
}

/// One remote attempt (if configured), then keyword scoring. No retries.
#[instrument(level = "info", skip(remote, fallback, req), fields(has_remote = remote.is_some(), answer_len = req.child_answer.len()))]
pub async fn grade_with_fallback(
  remote: Option<&Arc<dyn ShortAnswerGrader>>,
  fallback: &KeywordGrader,
  req: &GradeRequest,
) -> GradeOutcome {
  if let Some(r) = remote {
    match r.grade(req).await {
      Ok(grade) => {
        debug!(target: "grading", ?grade, "Remote grade");
        return GradeOutcome { grade, method: r.method() };
      }
      Err(e) => {
        error!(target: "grading", error = %e, "Remote grading failed; using keyword overlap");
      }
    }
  }
  let grade = fallback.grade_now(&req.child_answer, &req.correct_answer);
  debug!(target: "grading", ?grade, "Keyword grade");
  GradeOutcome { grade, method: GradeMethod::Keyword }
}
