//! Public protocol structs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Attempt, DailyStats, Difficulty, EvidenceSpan, Question, QuestionType, Session,
};
use crate::evidence::Segment;
use crate::grading::{Grade, GradeMethod};
use crate::progress::ResultsSummary;
use crate::store::ResetCounts;

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub ai_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionIn {
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// Answer-side fields of a question, shown once it has been attempted or the
/// session is complete.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RevealOut {
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub explanation: String,
    pub evidence_spans: Vec<EvidenceSpan>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionOut {
    pub id: String,
    pub order_index: u32,
    pub question_type: QuestionType,
    pub prompt: String,
    pub choices: Option<Vec<String>>,
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reveal: Option<RevealOut>,
}

pub fn question_out(q: &Question, revealed: bool) -> QuestionOut {
    QuestionOut {
        id: q.id.clone(),
        order_index: q.order_index,
        question_type: q.question_type,
        prompt: q.prompt.clone(),
        choices: q.choices.clone(),
        hint: q.hint.clone(),
        reveal: revealed.then(|| RevealOut {
            correct_answer: q.correct_answer.clone(),
            explanation: q.explanation.clone(),
            evidence_spans: q.evidence_spans.clone(),
        }),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StartSessionOut {
    pub session: Session,
    pub questions: Vec<QuestionOut>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionDetailsOut {
    pub session: Session,
    pub questions: Vec<QuestionOut>,
    pub attempts: Vec<Attempt>,
    /// Present once the session is completed.
    pub summary: Option<ResultsSummary>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub answer: String,
    #[serde(rename = "secondsSpent", default)]
    pub seconds_spent: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AnswerOut {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    pub correct: bool,
    pub partial: bool,
    pub grade: Grade,
    pub method: GradeMethod,
    pub expected: String,
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CompleteOut {
    pub session: Session,
    pub summary: ResultsSummary,
    pub today: DailyStats,
}

#[derive(Debug, Deserialize)]
pub struct GradeIn {
    #[serde(rename = "childAnswer")]
    pub child_answer: String,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GradeOut {
    pub grade: Grade,
    pub is_correct: bool,
    pub is_partial: bool,
    pub method: GradeMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceQuery {
    pub question: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EvidenceOut {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
pub struct WordPickIn {
    /// Index into the session's word-detective items.
    pub item: usize,
    pub word: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WordPickOut {
    pub correct: bool,
    pub target_word: String,
    pub feedback: String,
}

/// Partial settings update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatch {
    pub child_name: Option<String>,
    pub grade_level: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WeekOut {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailyStats>,
}

#[derive(Debug, Serialize)]
pub struct ResetOut {
    pub deleted: ResetCounts,
}
