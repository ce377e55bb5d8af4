//! Seed data: the built-in passage pool that guarantees a session can always
//! start, even without config or OpenAI.

use tracing::error;

use crate::domain::{
  EvidenceSpan, GeneratedPassage, GeneratedQuestion, PassageType, QuestionType, SkillCategory,
};

const SEEDED_PASSAGES_JSON: &str = include_str!("../data/seeded_passages.json");

/// Ten pre-authored passages in the generation wire format.
pub fn seed_passages() -> Vec<GeneratedPassage> {
  match serde_json::from_str::<Vec<GeneratedPassage>>(SEEDED_PASSAGES_JSON) {
    Ok(v) => v,
    Err(e) => {
      error!(target: "reading_coach", error = %e, "Embedded seed passages failed to parse; using hard fallback");
      vec![hard_fallback_passage()]
    }
  }
}

/// Absolute last resort when the embedded pool is unusable.
pub fn hard_fallback_passage() -> GeneratedPassage {
  let text = "Maya planted a bean seed in a paper cup. She gave it water every morning and set it by the sunny window. After one week, a tiny green sprout pushed up through the soil. Maya smiled. She knew that plants need water and sunlight to grow.";
  GeneratedPassage {
    passage_title: "Maya's Bean Plant".into(),
    passage_text: text.into(),
    passage_type: PassageType::Fiction,
    primary_skill_category: SkillCategory::C,
    reading_level: "grade3".into(),
    questions: vec![
      GeneratedQuestion {
        order_index: 0,
        question_type: QuestionType::McqMainIdea,
        prompt: "What is this story mostly about?".into(),
        choices: Some(vec![
          "A girl who grows a bean plant".into(),
          "How to make a paper cup".into(),
          "Why windows are sunny".into(),
          "A trip to the farm".into(),
        ]),
        correct_answer: "A girl who grows a bean plant".into(),
        explanation: "The whole story follows Maya as she cares for her bean seed until it sprouts.".into(),
        hint: None,
        evidence_spans: vec![EvidenceSpan { start: 0, end: 41 }],
      },
      GeneratedQuestion {
        order_index: 1,
        question_type: QuestionType::McqDetail,
        prompt: "Where did Maya put the cup?".into(),
        choices: Some(vec![
          "In the closet".into(),
          "By the sunny window".into(),
          "Under her bed".into(),
          "In the garden".into(),
        ]),
        correct_answer: "By the sunny window".into(),
        explanation: "The story says she set it by the sunny window.".into(),
        hint: None,
        evidence_spans: vec![EvidenceSpan { start: 42, end: 115 }],
      },
      GeneratedQuestion {
        order_index: 2,
        question_type: QuestionType::ShortAnswer,
        prompt: "What do plants need to grow?".into(),
        choices: None,
        correct_answer: "Plants need water and sunlight to grow.".into(),
        explanation: "At the end, Maya knows plants need water and sunlight.".into(),
        hint: Some("Look at the last sentence.".into()),
        evidence_spans: vec![EvidenceSpan { start: 187, end: 243 }],
      },
      GeneratedQuestion {
        order_index: 3,
        question_type: QuestionType::McqVocab,
        prompt: "What does 'sprout' mean in the story?".into(),
        choices: Some(vec![
          "A new little plant".into(),
          "A kind of bug".into(),
          "A drop of rain".into(),
          "A big tree".into(),
        ]),
        correct_answer: "A new little plant".into(),
        explanation: "A sprout is the first small shoot of a new plant.".into(),
        hint: None,
        evidence_spans: vec![EvidenceSpan { start: 116, end: 180 }],
      },
    ],
    word_detective: Vec::new(),
  }
}
