//! Daily stats: lazy creation for today, streak carry-over and the
//! per-completion update. The store applies the update inside the same
//! write that completes the session.
//!
//! A missing row for yesterday means the streak restarts at 0. The streak
//! only moves on the first completed session of a day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, instrument};

use crate::domain::DailyStats;
use crate::store::MemoryStore;

/// Sunday through Saturday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
  let from_sunday = today.weekday().num_days_from_sunday() as i64;
  let start = today - Duration::days(from_sunday);
  (start, start + Duration::days(6))
}

/// Today and the six days before it.
pub fn last_seven_days(today: NaiveDate) -> (NaiveDate, NaiveDate) {
  (today - Duration::days(6), today)
}

/// Empty row for `date`, carrying the streak of the previous day's row if any.
pub fn fresh_day(account_id: &str, date: NaiveDate, previous: Option<&DailyStats>) -> DailyStats {
  DailyStats {
    account_id: account_id.to_string(),
    date,
    sessions_completed: 0,
    correct_count: 0,
    total_count: 0,
    minutes_spent: 0,
    streak: previous.map(|p| p.streak).unwrap_or(0),
  }
}

/// Minutes since the session started, rounded, at least 1.
pub fn minutes_spent(created_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
  let secs = (now - created_at).num_seconds().max(0) as f64;
  ((secs / 60.0).round() as u32).max(1)
}

/// Fold one completed session into a day's row.
pub fn apply_session_complete(stats: &mut DailyStats, correct: u32, total: u32, minutes: u32) {
  stats.sessions_completed += 1;
  stats.correct_count += correct;
  stats.total_count += total;
  stats.minutes_spent += minutes;
  if stats.sessions_completed == 1 {
    stats.streak += 1;
  }
}

/// Read today's row, creating it if absent.
#[instrument(level = "debug", skip(store))]
pub async fn today_stats(store: &MemoryStore, account_id: &str, today: NaiveDate) -> DailyStats {
  if let Some(s) = store.get_daily_stats(account_id, today).await {
    return s;
  }
  let yesterday = today - Duration::days(1);
  let previous = store.get_daily_stats(account_id, yesterday).await;
  let row = fresh_day(account_id, today, previous.as_ref());
  debug!(target: "stats", %account_id, %today, streak = row.streak, carried = previous.is_some(), "Creating today's stats");
  store.insert_daily_stats_if_absent(row).await
}

pub async fn week_stats(store: &MemoryStore, account_id: &str, today: NaiveDate) -> Vec<DailyStats> {
  let (from, to) = week_bounds(today);
  store.daily_stats_range(account_id, from, to).await
}
