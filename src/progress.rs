//! Progress aggregation and result summaries. Everything here is pure.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Attempt, DailyStats, Session, SkillCategory};

/// Rounded percentage; 0 when `total` is 0.
pub fn percent(correct: u32, total: u32) -> u32 {
  if total == 0 {
    return 0;
  }
  ((correct as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Overview {
  pub completed_sessions: u32,
  pub total_correct: u32,
  pub total_questions: u32,
  pub accuracy_pct: u32,
}

/// Totals over completed sessions only.
pub fn overview(sessions: &[Session]) -> Overview {
  let done = sessions.iter().filter(|s| s.is_completed());
  let (mut n, mut correct, mut total) = (0, 0, 0);
  for s in done {
    n += 1;
    correct += s.correct_count;
    total += s.total_questions;
  }
  Overview {
    completed_sessions: n,
    total_correct: correct,
    total_questions: total,
    accuracy_pct: percent(correct, total),
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillProgress {
  pub category: SkillCategory,
  pub name: String,
  pub description: String,
  pub sessions: u32,
  /// None until the category has at least one answered question.
  pub accuracy_pct: Option<u32>,
}

pub fn skill_breakdown(sessions: &[Session]) -> Vec<SkillProgress> {
  SkillCategory::ALL
    .iter()
    .map(|&category| {
      let of_cat: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.is_completed() && s.primary_skill_category == category)
        .collect();
      let correct: u32 = of_cat.iter().map(|s| s.correct_count).sum();
      let total: u32 = of_cat.iter().map(|s| s.total_questions).sum();
      SkillProgress {
        category,
        name: category.name().to_string(),
        description: category.description().to_string(),
        sessions: of_cat.len() as u32,
        accuracy_pct: (total > 0).then(|| percent(correct, total)),
      }
    })
    .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayPoint {
  pub date: NaiveDate,
  /// Short weekday name, e.g. "Mon".
  pub day: String,
  pub sessions: u32,
  pub accuracy_pct: u32,
}

/// One point per day from `today - 6` to `today`; days without a row are zero.
pub fn seven_day_chart(today: NaiveDate, stats: &[DailyStats]) -> Vec<DayPoint> {
  (0..7)
    .rev()
    .map(|back| {
      let date = today - Duration::days(back);
      let row = stats.iter().find(|s| s.date == date);
      DayPoint {
        date,
        day: date.format("%a").to_string(),
        sessions: row.map(|r| r.sessions_completed).unwrap_or(0),
        accuracy_pct: row.map(|r| percent(r.correct_count, r.total_count)).unwrap_or(0),
      }
    })
    .collect()
}

/// Today's goal progress in percent, capped at 100.
pub fn daily_goal_percent(sessions_today: u32, daily_goal: u32) -> u32 {
  if daily_goal == 0 {
    return 100;
  }
  let pct = (sessions_today as f64 / daily_goal as f64) * 100.0;
  pct.min(100.0).round() as u32
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsSummary {
  pub correct: u32,
  pub total: u32,
  pub percent: u32,
  pub headline: String,
  pub stars: u8,
  pub points: u32,
}

pub fn headline(pct: u32) -> &'static str {
  match pct {
    p if p >= 100 => "Perfect!",
    p if p >= 75 => "Great Job!",
    p if p >= 50 => "Good Work!",
    _ => "Keep Trying!",
  }
}

/// Results card for one session, counted from its attempts.
pub fn summarize_results(attempts: &[Attempt], total_questions: u32) -> ResultsSummary {
  let correct = attempts.iter().filter(|a| a.is_correct).count() as u32;
  let pct = percent(correct, total_questions);
  ResultsSummary {
    correct,
    total: total_questions,
    percent: pct,
    headline: headline(pct).to_string(),
    stars: match correct {
      c if c >= 3 => 3,
      2 => 2,
      _ => 1,
    },
    points: correct * 10,
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
  pub overview: Overview,
  pub skills: Vec<SkillProgress>,
  pub last_seven_days: Vec<DayPoint>,
  pub today: DailyStats,
  pub daily_goal: u32,
  pub daily_goal_pct: u32,
}

pub fn build_report(
  sessions: &[Session],
  recent: &[DailyStats],
  today: DailyStats,
  daily_goal: u32,
) -> ProgressReport {
  ProgressReport {
    overview: overview(sessions),
    skills: skill_breakdown(sessions),
    last_seven_days: seven_day_chart(today.date, recent),
    daily_goal_pct: daily_goal_percent(today.sessions_completed, daily_goal),
    today,
    daily_goal,
  }
}
