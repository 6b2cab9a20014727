//! Abuse guard
//!
//! Sliding-window limiter keyed by (client identity, action). Each action has
//! its own (limit, window) rule. State lives behind [`RateLimitStore`] so a
//! shared backend can replace the in-process map.

use axum::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::{RateLimitConfig, WindowRule};
use crate::error::AppError;

const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Rate-limited public actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedAction {
    Register,
    Vote,
    Contact,
}

impl GuardedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Vote => "vote",
            Self::Contact => "contact",
        }
    }
}

/// Storage for per-key call timestamps
///
/// `hit` must prune, check and append as one atomic step.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a call at `now` if fewer than `limit` calls remain inside
    /// `window`. Returns whether the call was allowed.
    async fn hit(&self, key: &str, now: Instant, window: Duration, limit: usize) -> bool;

    /// Forget every key
    async fn clear(&self);
}

/// In-process store: one timestamp queue per key
pub struct InMemoryRateLimitStore {
    entries: RwLock<HashMap<String, VecDeque<Instant>>>,
    max_tracked_keys: usize,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::with_max_tracked_keys(DEFAULT_MAX_TRACKED_KEYS)
    }

    /// Create a store with an explicit in-memory key cap.
    pub fn with_max_tracked_keys(max_tracked_keys: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_tracked_keys: max_tracked_keys.max(1),
        }
    }

    fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = queue.front() {
            if now.saturating_duration_since(*oldest) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop empty queues, then the key with the oldest newest-call if still full
    fn make_room_locked(entries: &mut HashMap<String, VecDeque<Instant>>, max_tracked_keys: usize) {
        entries.retain(|_, queue| !queue.is_empty());
        if entries.len() < max_tracked_keys {
            return;
        }

        let oldest_key = entries
            .iter()
            .min_by_key(|(_, queue)| queue.back().copied())
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest_key {
            entries.remove(&key);
        }
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, now: Instant, window: Duration, limit: usize) -> bool {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_tracked_keys {
            Self::make_room_locked(&mut entries, self.max_tracked_keys);
        }

        let queue = entries.entry(key.to_string()).or_default();
        Self::prune(queue, now, window);

        if queue.len() >= limit {
            return false;
        }
        queue.push_back(now);
        true
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Per-action limiter over a shared store
pub struct AbuseGuard {
    store: Arc<dyn RateLimitStore>,
    rules: RateLimitConfig,
}

impl AbuseGuard {
    pub fn new(store: Arc<dyn RateLimitStore>, rules: RateLimitConfig) -> Self {
        Self { store, rules }
    }

    /// Guard backed by a fresh in-memory store
    pub fn in_memory(rules: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), rules)
    }

    fn rule(&self, action: GuardedAction) -> WindowRule {
        match action {
            GuardedAction::Register => self.rules.register,
            GuardedAction::Vote => self.rules.vote,
            GuardedAction::Contact => self.rules.contact,
        }
    }

    /// Whether `identity` may perform `action` now
    pub async fn allow(&self, identity: &str, action: GuardedAction) -> bool {
        self.allow_at(identity, action, Instant::now()).await
    }

    pub async fn allow_at(&self, identity: &str, action: GuardedAction, now: Instant) -> bool {
        let rule = self.rule(action);
        let key = format!("{}|{}", action.as_str(), identity);
        self.store
            .hit(&key, now, Duration::from_secs(rule.window_seconds), rule.limit)
            .await
    }

    /// Like [`allow`](Self::allow) but as an error for handlers
    ///
    /// # Errors
    /// `RateLimited` when the window is full
    pub async fn check(&self, identity: &str, action: GuardedAction) -> Result<(), AppError> {
        if self.allow(identity, action).await {
            return Ok(());
        }

        crate::metrics::RATE_LIMITED_TOTAL
            .with_label_values(&[action.as_str()])
            .inc();
        tracing::warn!(identity = %identity, action = action.as_str(), "Rate limit exceeded");
        Err(AppError::RateLimited)
    }

    /// Forget every recorded call
    pub async fn reset(&self) {
        self.store.clear().await;
    }
}
