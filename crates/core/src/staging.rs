//! Process-scoped staging for analysis results that are not yet quotes.
//!
//! Entries expire after a fixed TTL. Expired entries are purged on every
//! access; when the cache is full the oldest insertion is evicted.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::FloorplanAnalyzer;
use crate::config::StagingConfig;
use crate::domain::room::FloorplanAnalysis;
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagingKey(pub String);

impl StagingKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Analysis awaiting quote creation, with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedAnalysis {
    pub analysis: FloorplanAnalysis,
    pub source_name: Option<String>,
    pub floorplan_id: Option<String>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

#[derive(Debug)]
struct State<V> {
    entries: HashMap<StagingKey, Entry<V>>,
    order: VecDeque<StagingKey>,
}

#[derive(Debug)]
pub struct StagingCache<V> {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<State<V>>,
}

impl<V: Clone> StagingCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(State { entries: HashMap::new(), order: VecDeque::new() }),
        }
    }

    /// Out-of-range TTLs saturate at `Duration::MAX`; config validation caps them first.
    pub fn from_config(config: &StagingConfig) -> Self {
        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(ttl, config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, key: StagingKey, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    pub fn insert_at(&self, key: StagingKey, value: V, now: DateTime<Utc>) {
        self.with_state(|state| {
            self.purge_expired(state, now);
            if state.entries.remove(&key).is_some() {
                state.order.retain(|existing| existing != &key);
            }
            while state.entries.len() >= self.max_entries {
                match state.order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.order.push_back(key.clone());
            state.entries.insert(key, Entry { value, inserted_at: now });
        });
    }

    pub fn get(&self, key: &StagingKey) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &StagingKey, now: DateTime<Utc>) -> Option<V> {
        self.with_state(|state| {
            self.purge_expired(state, now);
            state.entries.get(key).map(|entry| entry.value.clone())
        })
    }

    /// Removes and returns the entry, e.g. once a quote has been created from it.
    pub fn take(&self, key: &StagingKey) -> Option<V> {
        self.take_at(key, Utc::now())
    }

    pub fn take_at(&self, key: &StagingKey, now: DateTime<Utc>) -> Option<V> {
        self.with_state(|state| {
            self.purge_expired(state, now);
            let entry = state.entries.remove(key)?;
            state.order.retain(|existing| existing != key);
            Some(entry.value)
        })
    }

    pub fn len_at(&self, now: DateTime<Utc>) -> usize {
        self.with_state(|state| {
            self.purge_expired(state, now);
            state.entries.len()
        })
    }

    fn purge_expired(&self, state: &mut State<V>, now: DateTime<Utc>) {
        let ttl = self.ttl;
        state.entries.retain(|_, entry| now - entry.inserted_at < ttl);
        let entries = &state.entries;
        state.order.retain(|key| entries.contains_key(key));
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<V>) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// Runs the analyzer and parks the validated result until a quote claims it.
pub struct AnalysisIntake<A> {
    analyzer: A,
    cache: Arc<StagingCache<StagedAnalysis>>,
}

impl<A: FloorplanAnalyzer> AnalysisIntake<A> {
    pub fn new(analyzer: A, cache: Arc<StagingCache<StagedAnalysis>>) -> Self {
        Self { analyzer, cache }
    }

    pub async fn stage(
        &self,
        payload: &[u8],
        mime_type: &str,
        source_name: Option<String>,
        floorplan_id: Option<String>,
    ) -> Result<StagingKey, ApplicationError> {
        let analysis = self.analyzer.analyze(payload, mime_type).await?;
        let key = StagingKey::generate();
        debug!(
            event_name = "analysis.staged",
            staging_key = %key,
            rooms = analysis.rooms.len(),
            ttl_secs = self.cache.ttl().num_seconds(),
            "analysis staged"
        );
        self.cache.insert(key.clone(), StagedAnalysis { analysis, source_name, floorplan_id });
        Ok(key)
    }

    /// Reads a staged analysis without consuming it.
    pub fn peek(&self, key: &StagingKey) -> Result<StagedAnalysis, ApplicationError> {
        self.cache.get(key).ok_or_else(|| expired(key))
    }

    pub fn claim(&self, key: &StagingKey) -> Result<StagedAnalysis, ApplicationError> {
        let staged = self.cache.take(key).ok_or_else(|| expired(key))?;
        debug!(event_name = "analysis.claimed", staging_key = %key, "staged analysis claimed");
        Ok(staged)
    }
}

fn expired(key: &StagingKey) -> ApplicationError {
    DomainError::not_found("staged analysis", key.to_string()).into()
}
