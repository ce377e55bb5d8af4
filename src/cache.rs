//! Read-through query cache with tag-based invalidation.
//!
//! Entries are stored as JSON values under a query key and carry a set of
//! tags. Writers invalidate by tag, e.g. `sessions:<account>` after a new
//! session or `daily-stats:<account>:<date>` after a completion.
//!
//! The cache is bounded: entries expire after a time-to-live, and once the
//! entry cap is reached the oldest insertions are evicted first. Keys that
//! embed a date therefore age out instead of piling up day after day.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 2048;
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

pub fn sessions_tag(account_id: &str) -> String {
  format!("sessions:{account_id}")
}

pub fn session_tag(session_id: &str) -> String {
  format!("session:{session_id}")
}

pub fn settings_tag(account_id: &str) -> String {
  format!("settings:{account_id}")
}

pub fn daily_stats_tag(account_id: &str, date: NaiveDate) -> String {
  format!("daily-stats:{account_id}:{date}")
}

/// Carried by every account-scoped entry; used by the full reset.
pub fn account_tag(account_id: &str) -> String {
  format!("account:{account_id}")
}

struct CacheEntry {
  value: Value,
  tags: Vec<String>,
  inserted_at: Instant,
  seq: u64,
}

#[derive(Default)]
struct Entries {
  map: HashMap<String, CacheEntry>,
  next_seq: u64,
}

pub struct QueryCache {
  entries: RwLock<Entries>,
  max_entries: usize,
  ttl: Duration,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::with_limits(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
  }
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// `max_entries` is clamped to at least 1.
  pub fn with_limits(max_entries: usize, ttl: Duration) -> Self {
    Self { entries: RwLock::new(Entries::default()), max_entries: max_entries.max(1), ttl }
  }

  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let entries = self.entries.read().await;
    let entry = entries.map.get(key)?;
    if entry.inserted_at.elapsed() >= self.ttl {
      return None;
    }
    match serde_json::from_value::<T>(entry.value.clone()) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "cache", %key, error = %e, "Cached value has unexpected shape; treating as miss");
        None
      }
    }
  }

  pub async fn put<T: Serialize>(&self, key: impl Into<String>, tags: Vec<String>, value: &T) {
    let key = key.into();
    let value = match serde_json::to_value(value) {
      Ok(v) => v,
      Err(e) => {
        warn!(target: "cache", %key, error = %e, "Value not cacheable");
        return;
      }
    };

    let mut entries = self.entries.write().await;
    let ttl = self.ttl;
    let before = entries.map.len();
    entries.map.retain(|_, e| e.inserted_at.elapsed() < ttl);
    let expired = before - entries.map.len();

    let mut evicted = 0;
    while !entries.map.contains_key(&key) && entries.map.len() >= self.max_entries {
      let oldest = entries.map.iter().min_by_key(|(_, e)| e.seq).map(|(k, _)| k.clone());
      match oldest {
        Some(k) => {
          entries.map.remove(&k);
          evicted += 1;
        }
        None => break,
      }
    }
    if expired + evicted > 0 {
      debug!(target: "cache", expired, evicted, "trimmed");
    }

    let seq = entries.next_seq;
    entries.next_seq += 1;
    entries.map.insert(key, CacheEntry { value, tags, inserted_at: Instant::now(), seq });
  }

  /// Return the cached value or run `load`, caching only successes.
  pub async fn get_or_try_load<T, E, F, Fut>(&self, key: &str, tags: Vec<String>, load: F) -> Result<T, E>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(hit) = self.get::<T>(key).await {
      debug!(target: "cache", %key, "hit");
      return Ok(hit);
    }
    debug!(target: "cache", %key, "miss");
    let value = load().await?;
    self.put(key, tags, &value).await;
    Ok(value)
  }

  /// Drop every entry carrying `tag`. Returns how many were dropped.
  pub async fn invalidate(&self, tag: &str) -> usize {
    let mut entries = self.entries.write().await;
    let before = entries.map.len();
    entries.map.retain(|_, e| !e.tags.iter().any(|t| t == tag));
    let dropped = before - entries.map.len();
    debug!(target: "cache", %tag, dropped, "invalidate");
    dropped
  }

  /// Stored entries, including expired ones not yet swept by a `put`.
  pub async fn len(&self) -> usize {
    self.entries.read().await.map.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.entries.read().await.map.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[tokio::test]
  async fn loads_once_until_invalidated() {
    let cache = QueryCache::new();
    let counter = AtomicUsize::new(0);
    let loads = &counter;
    let load = move || async move {
      loads.fetch_add(1, Ordering::SeqCst);
      Ok::<_, String>(vec![1, 2, 3])
    };

    let tags = vec![sessions_tag("acct")];
    let a: Vec<i32> = cache.get_or_try_load("sessions:list:acct", tags.clone(), load).await.unwrap();
    let b: Vec<i32> = cache.get_or_try_load("sessions:list:acct", tags.clone(), load).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert_eq!(cache.invalidate(&sessions_tag("acct")).await, 1);
    let _: Vec<i32> = cache.get_or_try_load("sessions:list:acct", tags, load).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn failed_loads_are_not_cached() {
    let cache = QueryCache::new();
    let r: Result<u32, &str> = cache.get_or_try_load("k", vec![], || async { Err("boom") }).await;
    assert_eq!(r, Err("boom"));
    assert!(cache.is_empty().await);
  }

  #[tokio::test]
  async fn invalidation_only_touches_tagged_entries() {
    let cache = QueryCache::new();
    let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
    let next = day.succ_opt().unwrap();
    cache.put("today", vec![daily_stats_tag("acct", day), account_tag("acct")], &1u32).await;
    cache.put("week", vec![daily_stats_tag("acct", day), daily_stats_tag("acct", next)], &2u32).await;
    cache.put("settings", vec![settings_tag("acct"), account_tag("acct")], &3u32).await;

    assert_eq!(cache.invalidate(&daily_stats_tag("acct", next)).await, 1);
    assert_eq!(cache.get::<u32>("today").await, Some(1));
    assert_eq!(cache.get::<u32>("week").await, None);

    assert_eq!(cache.invalidate(&account_tag("acct")).await, 2);
    assert!(cache.is_empty().await);
  }

  #[tokio::test]
  async fn old_days_are_evicted_first() {
    let cache = QueryCache::with_limits(3, DEFAULT_TTL);
    let first = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
    let days: Vec<NaiveDate> = first.iter_days().take(10).collect();
    for d in &days {
      cache.put(format!("daily-stats:today:acct:{d}"), vec![daily_stats_tag("acct", *d)], &1u32).await;
    }
    assert_eq!(cache.len().await, 3);
    assert_eq!(cache.get::<u32>(&format!("daily-stats:today:acct:{}", days[6])).await, None);
    for d in &days[7..] {
      assert_eq!(cache.get::<u32>(&format!("daily-stats:today:acct:{d}")).await, Some(1));
    }
  }

  #[tokio::test]
  async fn rewriting_a_key_at_capacity_keeps_the_others() {
    let cache = QueryCache::with_limits(2, DEFAULT_TTL);
    cache.put("a", vec![], &1u32).await;
    cache.put("b", vec![], &2u32).await;
    cache.put("a", vec![], &3u32).await;
    assert_eq!(cache.get::<u32>("a").await, Some(3));
    assert_eq!(cache.get::<u32>("b").await, Some(2));
  }

  #[tokio::test]
  async fn expired_entries_miss_and_are_swept() {
    let cache = QueryCache::with_limits(16, Duration::ZERO);
    cache.put("stale", vec![], &1u32).await;
    assert_eq!(cache.get::<u32>("stale").await, None);
    cache.put("fresh", vec![], &2u32).await;
    assert_eq!(cache.len().await, 1);
  }

  #[test]
  fn tag_formats() {
    let day = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
    assert_eq!(sessions_tag("a1"), "sessions:a1");
    assert_eq!(daily_stats_tag("a1", day), "daily-stats:a1:2026-01-09");
  }
}
