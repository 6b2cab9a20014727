//! Media engagement counters
//!
//! Views and downloads are telemetry: the in-memory store starts at zero on
//! every process start.

use axum::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Countable media interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    View,
    Download,
}

impl MediaEvent {
    /// Parse the wire name (`view` | `download`, case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "view" => Some(Self::View),
            "download" => Some(Self::Download),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Download => "download",
        }
    }
}

/// Storage for per-file counters
#[async_trait]
pub trait MediaCounterStore: Send + Sync {
    async fn increment(&self, name: &str, event: MediaEvent);

    async fn get(&self, name: &str) -> MediaCounters;
}

const DEFAULT_MAX_TRACKED_NAMES: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaCounters {
    pub views: u64,
    pub downloads: u64,
}

impl MediaCounters {
    fn total(&self) -> u64 {
        self.views + self.downloads
    }
}

pub struct InMemoryMediaCounters {
    counters: RwLock<HashMap<String, MediaCounters>>,
    max_tracked_names: usize,
}

impl InMemoryMediaCounters {
    pub fn new() -> Self {
        Self::with_max_tracked_names(DEFAULT_MAX_TRACKED_NAMES)
    }

    /// Create a store that keeps at most `max_tracked_names` entries; the
    /// least counted name is evicted to make room.
    pub fn with_max_tracked_names(max_tracked_names: usize) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            max_tracked_names: max_tracked_names.max(1),
        }
    }

    pub async fn tracked_names(&self) -> usize {
        self.counters.read().await.len()
    }
}

impl Default for InMemoryMediaCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCounterStore for InMemoryMediaCounters {
    async fn increment(&self, name: &str, event: MediaEvent) {
        let mut counters = self.counters.write().await;
        if !counters.contains_key(name) && counters.len() >= self.max_tracked_names {
            let least_counted = counters
                .iter()
                .min_by_key(|(_, counts)| counts.total())
                .map(|(name, _)| name.clone());
            if let Some(evicted) = least_counted {
                counters.remove(&evicted);
            }
        }

        let entry = counters.entry(name.to_string()).or_default();
        match event {
            MediaEvent::View => entry.views += 1,
            MediaEvent::Download => entry.downloads += 1,
        }
    }

    async fn get(&self, name: &str) -> MediaCounters {
        self.counters
            .read()
            .await
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}
