//! Bounded, time-limited cache of fetched analysis results
//!
//! `get` serves a fresh entry without touching the network; otherwise it
//! fetches through the analysis endpoint, gates the result on the quality
//! floor, stores it, and returns it. Concurrent callers for the same
//! protocol share one in-flight fetch.
//!
//! Eviction is strict oldest-by-store-time: the bound evicts the entry
//! stored longest ago, not the one read longest ago (this is deliberately
//! NOT access-time LRU — re-reading an entry does not extend its life).
//!
//! When a refresh fails but an expired-yet-valid entry exists, `get` logs a
//! warning and serves the stale entry: for display purposes a stale result
//! beats a hard failure. `force_refresh` never falls back — an explicit
//! refresh that silently returned old data would make the control a no-op.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use mrp_common::Clock;

use crate::models::analysis::{AnalysisResult, MIN_COMPLETENESS, MIN_DATA_QUALITY};
use crate::types::{AnalysisEndpoint, FetchError};

/// Cache sizing and freshness configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry time-to-live from store time
    pub ttl: Duration,
    /// Maximum entry count; inserting beyond it evicts the oldest entry
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_entries: 50,
        }
    }
}

/// A cached analysis result and the instant it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: AnalysisResult,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

/// Analysis retrieval errors.
///
/// `InvalidAnalysis` is distinct from `Fetch` so a caller can render
/// "results not yet reliable" versus "couldn't reach the server".
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Result failed the quality floor; nothing was cached and any previous
    /// entry for the protocol is untouched
    #[error(
        "Analysis rejected: data quality {data_quality:.2}, completeness {completeness:.2} \
         (floor {floor:.2})"
    )]
    InvalidAnalysis {
        data_quality: f64,
        completeness: f64,
        floor: f64,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

type SharedFetch = Shared<BoxFuture<'static, Result<AnalysisResult, AnalysisError>>>;

struct CacheInner {
    endpoint: Arc<dyn AnalysisEndpoint>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    entries: Mutex<HashMap<Uuid, CacheEntry>>,
    in_flight: Mutex<HashMap<Uuid, SharedFetch>>,
}

/// Analysis result cache
pub struct AnalysisCache {
    inner: Arc<CacheInner>,
}

impl AnalysisCache {
    pub fn new(
        endpoint: Arc<dyn AnalysisEndpoint>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                endpoint,
                clock,
                config,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fresh cached result, or fetch-and-store. Falls back to a stale entry
    /// when the refresh fails (see module docs).
    pub async fn get(&self, protocol_id: Uuid) -> Result<AnalysisResult, AnalysisError> {
        if let Some(entry) = self.fresh_entry(protocol_id) {
            tracing::debug!(protocol = %protocol_id, "Analysis cache hit");
            return Ok(entry.result);
        }

        match self.fetch_coalesced(protocol_id).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if let Some(stale) = self.peek(protocol_id) {
                    tracing::warn!(
                        protocol = %protocol_id,
                        error = %err,
                        stored_at = %stale.stored_at,
                        "Analysis refresh failed, serving stale cached result"
                    );
                    return Ok(stale.result);
                }
                Err(err)
            }
        }
    }

    /// Bypass the freshness check and refetch through the same validation
    /// and eviction path. Failures surface; no stale fallback.
    pub async fn force_refresh(&self, protocol_id: Uuid) -> Result<AnalysisResult, AnalysisError> {
        tracing::debug!(protocol = %protocol_id, "Forced analysis refresh");
        self.fetch_coalesced(protocol_id).await
    }

    /// Stored entry for the protocol regardless of freshness; never fetches
    pub fn peek(&self, protocol_id: Uuid) -> Option<CacheEntry> {
        self.inner.entries.lock().unwrap().get(&protocol_id).cloned()
    }

    /// Drop the entry for one protocol (new submissions invalidate the
    /// protocol's computed results)
    pub fn invalidate(&self, protocol_id: Uuid) {
        if self.inner.entries.lock().unwrap().remove(&protocol_id).is_some() {
            tracing::debug!(protocol = %protocol_id, "Analysis cache entry invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh_entry(&self, protocol_id: Uuid) -> Option<CacheEntry> {
        let ttl = chrono::Duration::from_std(self.inner.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let now = self.inner.clock.now();
        self.inner
            .entries
            .lock()
            .unwrap()
            .get(&protocol_id)
            .filter(|entry| now - entry.stored_at < ttl)
            .cloned()
    }

    /// At most one concurrent fetch per protocol; later callers share the
    /// in-flight fetch's outcome.
    async fn fetch_coalesced(&self, protocol_id: Uuid) -> Result<AnalysisResult, AnalysisError> {
        let fetch = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&protocol_id) {
                tracing::debug!(protocol = %protocol_id, "Joining in-flight analysis fetch");
                existing.clone()
            } else {
                let fetch = fetch_and_store(self.inner.clone(), protocol_id)
                    .boxed()
                    .shared();
                in_flight.insert(protocol_id, fetch.clone());
                fetch
            }
        };
        fetch.await
    }
}

async fn fetch_and_store(
    inner: Arc<CacheInner>,
    protocol_id: Uuid,
) -> Result<AnalysisResult, AnalysisError> {
    let outcome = fetch_validated(&inner, protocol_id).await;
    inner.in_flight.lock().unwrap().remove(&protocol_id);
    outcome
}

async fn fetch_validated(
    inner: &CacheInner,
    protocol_id: Uuid,
) -> Result<AnalysisResult, AnalysisError> {
    tracing::debug!(protocol = %protocol_id, "Fetching analysis from endpoint");
    let result = inner.endpoint.fetch_analysis(protocol_id).await?;

    let metadata = &result.metadata;
    if !metadata.meets_quality_floor() {
        tracing::warn!(
            protocol = %protocol_id,
            data_quality = metadata.data_quality,
            completeness = metadata.completeness,
            "Fetched analysis below quality floor, rejecting"
        );
        return Err(AnalysisError::InvalidAnalysis {
            data_quality: metadata.data_quality,
            completeness: metadata.completeness,
            floor: MIN_DATA_QUALITY.min(MIN_COMPLETENESS),
        });
    }

    store(inner, protocol_id, result.clone());
    Ok(result)
}

fn store(inner: &CacheInner, protocol_id: Uuid, result: AnalysisResult) {
    let now = inner.clock.now();
    let mut entries = inner.entries.lock().unwrap();

    if !entries.contains_key(&protocol_id) && entries.len() >= inner.config.max_entries {
        // Evict the single oldest-by-store-time entry
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| *key)
        {
            tracing::debug!(
                evicted = %oldest,
                capacity = inner.config.max_entries,
                "Analysis cache at capacity, evicting oldest entry"
            );
            entries.remove(&oldest);
        }
    }

    entries.insert(protocol_id, CacheEntry { result, stored_at: now });
    tracing::debug!(protocol = %protocol_id, entries = entries.len(), "Analysis result cached");
}

// ============================================================================
// Tests
// ============================================================================
