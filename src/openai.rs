//! Minimal OpenAI-compatible client for passage generation and short-answer grading.
//!
//! We only call chat.completions. Replies are expected to contain one JSON
//! object; prose or code fences around it are tolerated.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Difficulty, GeneratedPassage};
use crate::grading::Grade;
use crate::util::{extract_json_object, fill_template, trunc_for_log};

const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum AiError {
  #[error("HTTP request error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("OpenAI HTTP {status}: {message}")]
  Status { status: StatusCode, message: String },

  #[error("model reply had no content")]
  EmptyContent,

  #[error("model reply contained no JSON object")]
  NoJsonObject,

  #[error("JSON parse error: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub generation_model: String,
  pub grading_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let generation_model =
      std::env::var("OPENAI_GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let grading_model =
      std::env::var("OPENAI_GRADING_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    match Self::new(api_key, base_url, generation_model, grading_model, Duration::from_secs(timeout)) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "reading_coach", error = %e, "Failed to build HTTP client; OpenAI disabled");
        None
      }
    }
  }

  pub fn new(
    api_key: String,
    base_url: String,
    generation_model: String,
    grading_model: String,
    timeout: Duration,
  ) -> Result<Self, AiError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, api_key, base_url, generation_model, grading_model })
  }

  /// Chat completion returning the raw assistant text.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_text(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, AiError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "reading-coach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(AiError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(AiError::EmptyContent);
    }
    Ok(text)
  }

  /// Chat completion whose reply must embed a JSON object of type T.
  async fn chat_json<T: DeserializeOwned>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, AiError> {
    let text = self.chat_text(model, system, user, temperature).await?;
    let obj = extract_json_object(&text).ok_or(AiError::NoJsonObject)?;
    Ok(serde_json::from_str::<T>(obj)?)
  }

  /// Generate a passage with four questions. Shape checks happen in the caller.
  #[instrument(level = "info", skip(self, prompts), fields(%difficulty, model = %self.generation_model))]
  pub async fn generate_passage(
    &self,
    prompts: &Prompts,
    difficulty: Difficulty,
  ) -> Result<GeneratedPassage, AiError> {
    let system = fill_template(
      &prompts.generation_system,
      &[("difficulty_note", prompts.difficulty_note(difficulty))],
    );
    let user = fill_template(&prompts.generation_user, &[("difficulty", difficulty.as_str())]);

    let start = Instant::now();
    let result = self.chat_json::<GeneratedPassage>(&self.generation_model, &system, &user, 0.8).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(p) => info!(
        ?elapsed,
        title = %p.passage_title,
        text_len = p.passage_text.len(),
        questions = p.questions.len(),
        "Passage generated"
      ),
      Err(e) => error!(?elapsed, error = %e, "Model call failed during passage generation"),
    }
    result
  }

  /// Semantic grading of one short answer.
  #[instrument(level = "info", skip(self, prompts, question, correct_answer, child_answer),
               fields(model = %self.grading_model, answer_len = child_answer.len()))]
  pub async fn grade_short_answer(
    &self,
    prompts: &Prompts,
    question: &str,
    correct_answer: &str,
    child_answer: &str,
  ) -> Result<Grade, AiError> {
    #[derive(Deserialize)]
    struct Verdict { grade: Grade }

    let user = fill_template(
      &prompts.grading_user_template,
      &[("question", question), ("correct_answer", correct_answer), ("child_answer", child_answer)],
    );
    let v: Verdict = self.chat_json(&self.grading_model, &prompts.grading_system, &user, 0.1).await?;
    Ok(v.grade)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
