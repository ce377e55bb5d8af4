//! Loading service configuration (prompts, grading bands, practice defaults and
//! an optional local passage bank) from TOML.
//!
//! See `AppConfig` for the expected schema. Every section is optional.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::GeneratedPassage;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub grading: GradingConfig,
  #[serde(default)]
  pub practice: PracticeConfig,
  /// Extra passages added to the seeded fallback pool.
  #[serde(default)]
  pub passages: Vec<GeneratedPassage>,
}

/// Keyword-overlap bands used when AI grading is unavailable.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct GradingConfig {
  #[serde(default = "default_full_threshold")]
  pub full_threshold: f32,
  #[serde(default = "default_partial_threshold")]
  pub partial_threshold: f32,
}

fn default_full_threshold() -> f32 { 0.7 }
fn default_partial_threshold() -> f32 { 0.4 }

impl Default for GradingConfig {
  fn default() -> Self {
    Self { full_threshold: default_full_threshold(), partial_threshold: default_partial_threshold() }
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PracticeConfig {
  #[serde(default = "default_daily_goal")]
  pub daily_goal: u32,
  #[serde(default = "default_estimated_minutes")]
  pub estimated_minutes: u32,
  #[serde(default = "default_child_name")]
  pub default_child_name: String,
  #[serde(default = "default_grade_level")]
  pub default_grade_level: u8,
}

fn default_daily_goal() -> u32 { 3 }
fn default_estimated_minutes() -> u32 { 5 }
fn default_child_name() -> String { "Reader".into() }
fn default_grade_level() -> u8 { 3 }

impl Default for PracticeConfig {
  fn default() -> Self {
    Self {
      daily_goal: default_daily_goal(),
      estimated_minutes: default_estimated_minutes(),
      default_child_name: default_child_name(),
      default_grade_level: default_grade_level(),
    }
  }
}

/// Prompts used by the OpenAI client. Override them in TOML to tune tone or
/// target grade.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_user: String,
  pub easy_note: String,
  pub normal_note: String,
  pub hard_note: String,
  pub grading_system: String,
  pub grading_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: r#"You write original Grade 3 reading-comprehension practice in the style of classroom workbooks.

Respond ONLY with one JSON object of this shape:
{
  "passage_title": string,
  "passage_text": string (120-220 words, grade 3 level),
  "passage_type": "fiction" | "nonfiction",
  "primary_skill_category": "A" | "B" | "C" | "D",
  "reading_level": "grade3",
  "questions": [
    {"order_index": 0, "question_type": "mcq_main_idea", "prompt": string, "choices": [4 strings], "correct_answer": exact copy of one choice, "explanation": string, "hint": null, "evidence_spans": [{"start": int, "end": int}]},
    {"order_index": 1, "question_type": "mcq_detail", ...same fields...},
    {"order_index": 2, "question_type": "short_answer", "choices": null, "correct_answer": model answer, "hint": string, ...},
    {"order_index": 3, "question_type": "mcq_vocab", "prompt": "What does '<word>' mean?", ...}
  ]
}

evidence_spans are character offsets into passage_text.
Skill categories: A = fiction/nonfiction, B = main idea/structure, C = key details, D = knowledge integration.
{difficulty_note}"#.into(),
      generation_user: "Write a new original passage with its 4 questions. Difficulty: {difficulty}. JSON only.".into(),
      easy_note: "Use simple vocabulary and short sentences. Make clues direct.".into(),
      normal_note: String::new(),
      hard_note: "Include mild inference and slightly richer vocabulary.".into(),
      grading_system: r#"You grade a Grade 3 child's short answer to a reading question.
Judge meaning, not wording. Spelling, grammar and capitalization mistakes do not matter.
- "full": the answer captures the key idea of the model answer.
- "partial": on the right track but incomplete, vague, or only a supporting detail.
- "incorrect": wrong, off-topic, or shows a misunderstanding.
Respond ONLY with JSON: {"grade": "full" | "partial" | "incorrect"}"#.into(),
      grading_user_template: "Question: {question}\n\nModel answer: {correct_answer}\n\nChild's answer: {child_answer}\n\nGrade the child's answer.".into(),
    }
  }
}

impl Prompts {
  pub fn difficulty_note(&self, difficulty: crate::domain::Difficulty) -> &str {
    use crate::domain::Difficulty;
    match difficulty {
      Difficulty::Easy => &self.easy_note,
      Difficulty::Normal => &self.normal_note,
      Difficulty::Hard => &self.hard_note,
    }
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from READING_COACH_CONFIG. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("READING_COACH_CONFIG").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "reading_coach", %path, bank_passages = cfg.passages.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "reading_coach", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "reading_coach", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
