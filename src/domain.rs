//! Domain models: passages, sessions, questions, attempts, settings and daily stats.
//!
//! `GeneratedPassage` is the wire shape shared by the AI generator and the
//! seeded pool; `Session`/`Question`/`Attempt` are the persisted records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PassageType {
  Fiction,
  Nonfiction,
}

/// Comprehension skill tag attached to a session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillCategory {
  A,
  B,
  C,
  D,
}

impl SkillCategory {
  pub const ALL: [SkillCategory; 4] = [SkillCategory::A, SkillCategory::B, SkillCategory::C, SkillCategory::D];

  pub fn name(self) -> &'static str {
    match self {
      SkillCategory::A => "Fiction & Nonfiction",
      SkillCategory::B => "Main Idea & Structure",
      SkillCategory::C => "Key Ideas & Details",
      SkillCategory::D => "Knowledge & Ideas",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      SkillCategory::A => "Different types of stories",
      SkillCategory::B => "Understanding the big picture",
      SkillCategory::C => "Finding important information",
      SkillCategory::D => "Connecting what you learn",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  McqMainIdea,
  McqDetail,
  ShortAnswer,
  McqVocab,
}

impl QuestionType {
  /// The four question types every session carries, in presentation order.
  pub const SESSION_SET: [QuestionType; 4] = [
    QuestionType::McqMainIdea,
    QuestionType::McqDetail,
    QuestionType::ShortAnswer,
    QuestionType::McqVocab,
  ];

  pub fn is_multiple_choice(self) -> bool {
    !matches!(self, QuestionType::ShortAnswer)
  }
}

/// Requested generation difficulty.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  #[default]
  Normal,
  Hard,
}

impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Normal => "normal",
      Difficulty::Hard => "hard",
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where did the session's passage come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PassageOrigin {
  Generated,  // produced by the AI generator for this session
  Seed,       // built-in seeded passages
  LocalBank,  // passages declared in the TOML config
}

/// Character-offset range into the passage text.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceSpan {
  pub start: usize,
  pub end: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WordType {
  Noun,
  Verb,
  Adjective,
  Conjunction,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WordDetectiveItem {
  pub sentence: String,
  pub prompt: String,
  pub target_word: String,
  pub word_type: WordType,
  pub feedback: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuestion {
  pub order_index: u32,
  pub question_type: QuestionType,
  pub prompt: String,
  #[serde(default)] pub choices: Option<Vec<String>>,
  pub correct_answer: String,
  #[serde(default)] pub explanation: String,
  #[serde(default)] pub hint: Option<String>,
  #[serde(default)] pub evidence_spans: Vec<EvidenceSpan>,
}

/// A passage with its four questions, before it becomes a session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedPassage {
  #[serde(default)] pub passage_title: String,
  #[serde(default)] pub passage_text: String,
  pub passage_type: PassageType,
  pub primary_skill_category: SkillCategory,
  #[serde(default = "default_reading_level")] pub reading_level: String,
  #[serde(default)] pub questions: Vec<GeneratedQuestion>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")] pub word_detective: Vec<WordDetectiveItem>,
}

pub fn default_reading_level() -> String {
  "grade3".into()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
  pub id: String,
  pub account_id: String,
  pub created_at: DateTime<Utc>,
  pub passage_type: PassageType,
  pub primary_skill_category: SkillCategory,
  pub passage_title: String,
  pub passage_text: String,
  pub reading_level: String,
  pub estimated_minutes: u32,
  pub total_questions: u32,
  pub correct_count: u32,
  pub completed_at: Option<DateTime<Utc>>,
  pub is_seeded: bool,
  pub origin: PassageOrigin,
  #[serde(default)] pub word_detective: Vec<WordDetectiveItem>,
}

impl Session {
  pub fn is_completed(&self) -> bool {
    self.completed_at.is_some()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub id: String,
  pub session_id: String,
  pub order_index: u32,
  pub question_type: QuestionType,
  pub prompt: String,
  pub choices: Option<Vec<String>>,
  pub correct_answer: String,
  pub explanation: String,
  pub hint: Option<String>,
  pub evidence_spans: Vec<EvidenceSpan>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
  pub id: String,
  pub session_id: String,
  pub question_id: String,
  pub child_answer: String,
  pub is_correct: bool,
  pub is_partial: bool,
  pub seconds_spent: u32,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
  pub account_id: String,
  pub child_name: String,
  pub grade_level: u8,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
  pub account_id: String,
  pub date: NaiveDate,
  pub sessions_completed: u32,
  pub correct_count: u32,
  pub total_count: u32,
  pub minutes_spent: u32,
  pub streak: u32,
}
