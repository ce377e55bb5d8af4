//! Passage sources.
//!
//! `RemotePassageSource` asks the model for a fresh passage; `SeededPassageSource`
//! draws from the built-in pool plus the config bank, avoiding titles the
//! account has already read. `choose_passage` makes one remote attempt and
//! falls back to the seeded pool on any error.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Difficulty, GeneratedPassage, PassageOrigin, QuestionType};
use crate::openai::{AiError, OpenAI};

#[derive(Debug, Error)]
pub enum PassageError {
  #[error(transparent)]
  Ai(#[from] AiError),

  #[error("malformed passage: {0}")]
  Malformed(String),

  #[error("passage pool is empty")]
  EmptyPool,
}

#[derive(Clone, Debug)]
pub struct SourcedPassage {
  pub passage: GeneratedPassage,
  pub origin: PassageOrigin,
}

#[async_trait]
pub trait PassageSource: Send + Sync {
  fn name(&self) -> &'static str;

  /// `used_titles` holds every title the account has already been given.
  async fn passage(
    &self,
    difficulty: Difficulty,
    used_titles: &HashSet<String>,
  ) -> Result<SourcedPassage, PassageError>;
}

/// Check the shape every session relies on and order the questions.
pub fn validate_passage(mut p: GeneratedPassage) -> Result<GeneratedPassage, PassageError> {
  if p.passage_title.trim().is_empty() {
    return Err(PassageError::Malformed("missing passage_title".into()));
  }
  if p.passage_text.trim().is_empty() {
    return Err(PassageError::Malformed("missing passage_text".into()));
  }
  if p.questions.len() != QuestionType::SESSION_SET.len() {
    return Err(PassageError::Malformed(format!("expected 4 questions, got {}", p.questions.len())));
  }
  for t in QuestionType::SESSION_SET {
    let n = p.questions.iter().filter(|q| q.question_type == t).count();
    if n != 1 {
      return Err(PassageError::Malformed(format!("expected one {:?} question, got {}", t, n)));
    }
  }
  for q in &p.questions {
    if q.prompt.trim().is_empty() || q.correct_answer.trim().is_empty() {
      return Err(PassageError::Malformed(format!("question {} lacks prompt or answer", q.order_index)));
    }
    if q.question_type.is_multiple_choice() {
      match &q.choices {
        Some(c) if c.len() >= 2 => {}
        _ => {
          return Err(PassageError::Malformed(format!("question {} needs at least two choices", q.order_index)));
        }
      }
    }
  }
  p.questions.sort_by_key(|q| q.order_index);
  Ok(p)
}

/// Model-generated passages.
pub struct RemotePassageSource {
  openai: OpenAI,
  prompts: Prompts,
}

impl RemotePassageSource {
  pub fn new(openai: OpenAI, prompts: Prompts) -> Self {
    Self { openai, prompts }
  }
}

#[async_trait]
impl PassageSource for RemotePassageSource {
  fn name(&self) -> &'static str { "openai" }

  async fn passage(
    &self,
    difficulty: Difficulty,
    _used_titles: &HashSet<String>,
  ) -> Result<SourcedPassage, PassageError> {
    let raw = self.openai.generate_passage(&self.prompts, difficulty).await?;
    let passage = validate_passage(raw)?;
    Ok(SourcedPassage { passage, origin: PassageOrigin::Generated })
  }
}

/// Pre-authored passages. Difficulty is ignored.
pub struct SeededPassageSource {
  pool: Vec<SourcedPassage>,
}

impl SeededPassageSource {
  /// Builds the pool; bank entries that fail validation or reuse a seed
  /// title are skipped.
  pub fn new(seeds: Vec<GeneratedPassage>, bank: Vec<GeneratedPassage>) -> Self {
    let mut pool: Vec<SourcedPassage> = Vec::new();
    let mut titles: HashSet<String> = HashSet::new();
    let tagged = seeds
      .into_iter()
      .map(|p| (p, PassageOrigin::Seed))
      .chain(bank.into_iter().map(|p| (p, PassageOrigin::LocalBank)));
    for (p, origin) in tagged {
      let title = p.passage_title.clone();
      if titles.contains(&title) {
        warn!(target: "passages", %title, ?origin, "Skipping pool passage: duplicate title");
        continue;
      }
      match validate_passage(p) {
        Ok(passage) => {
          titles.insert(title);
          pool.push(SourcedPassage { passage, origin });
        }
        Err(e) => error!(target: "passages", %title, ?origin, error = %e, "Skipping pool passage"),
      }
    }
    Self { pool }
  }

  pub fn len(&self) -> usize {
    self.pool.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pool.is_empty()
  }

  pub fn count_origin(&self, origin: PassageOrigin) -> usize {
    self.pool.iter().filter(|p| p.origin == origin).count()
  }

  pub fn pick<R: Rng + ?Sized>(&self, used_titles: &HashSet<String>, rng: &mut R) -> Option<&SourcedPassage> {
    pick_unused(&self.pool, |s| s.passage.passage_title.as_str(), used_titles, rng)
  }
}

#[async_trait]
impl PassageSource for SeededPassageSource {
  fn name(&self) -> &'static str { "seeded_pool" }

  async fn passage(
    &self,
    _difficulty: Difficulty,
    used_titles: &HashSet<String>,
  ) -> Result<SourcedPassage, PassageError> {
    let mut rng = rand::thread_rng();
    self.pick(used_titles, &mut rng).cloned().ok_or(PassageError::EmptyPool)
  }
}

/// Uniform choice among items whose title is unused; the whole pool once every
/// title has been used.
pub fn pick_unused<'a, T, R, F>(
  pool: &'a [T],
  title: F,
  used_titles: &HashSet<String>,
  rng: &mut R,
) -> Option<&'a T>
where
  R: Rng + ?Sized,
  F: Fn(&T) -> &str,
{
  let fresh: Vec<&T> = pool.iter().filter(|p| !used_titles.contains(title(*p))).collect();
  if fresh.is_empty() {
    pool.choose(rng)
  } else {
    fresh.choose(rng).copied()
  }
}

/// One remote attempt (if configured), then the fallback source. No retries.
#[instrument(level = "info", skip(remote, fallback, used_titles), fields(%difficulty, used = used_titles.len()))]
pub async fn choose_passage(
  remote: Option<&Arc<dyn PassageSource>>,
  fallback: &dyn PassageSource,
  difficulty: Difficulty,
  used_titles: &HashSet<String>,
) -> Result<SourcedPassage, PassageError> {
  if let Some(r) = remote {
    match r.passage(difficulty, used_titles).await {
      Ok(p) => {
        info!(target: "passages", source = r.name(), title = %p.passage.passage_title, "Passage from primary source");
        return Ok(p);
      }
      Err(e) => {
        error!(target: "passages", source = r.name(), error = %e, "Primary passage source failed; using fallback");
      }
    }
  } else {
    warn!(target: "passages", "No AI passage source configured; using fallback");
  }
  let p = fallback.passage(difficulty, used_titles).await?;
  info!(target: "passages", source = fallback.name(), title = %p.passage.passage_title, origin = ?p.origin, "Passage from fallback source");
  Ok(p)
}
