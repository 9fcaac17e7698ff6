use crate::domain::{Scenario, ValidationError};
use crate::engine::{Comparison, CostProjector, ProjectionOptions, ProjectionResult};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Bounded memo of projection results keyed by input fingerprint.
///
/// Eviction is first-in first-out. A capacity of zero disables caching.
pub struct ProjectionCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Arc<ProjectionResult>>,
    order: VecDeque<String>,
}

impl ProjectionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// SHA-256 hex of the serialized scenario and options.
    pub fn fingerprint(
        scenario: &Scenario,
        options: &ProjectionOptions,
    ) -> Result<String, serde_json::Error> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(scenario)?);
        hasher.update(b"\x00");
        hasher.update(serde_json::to_vec(options)?);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Return the cached projection or compute and remember it. Errors are
    /// never cached.
    pub fn project(
        &self,
        scenario: &Scenario,
        options: &ProjectionOptions,
    ) -> Result<Arc<ProjectionResult>, ValidationError> {
        if self.capacity == 0 {
            return CostProjector::project(scenario, options).map(Arc::new);
        }
        let Ok(key) = Self::fingerprint(scenario, options) else {
            return CostProjector::project(scenario, options).map(Arc::new);
        };

        if let Some(hit) = self.inner.lock().entries.get(&key) {
            debug!(key = %&key[..12], "projection cache hit");
            return Ok(Arc::clone(hit));
        }

        let result = Arc::new(CostProjector::project(scenario, options)?);
        self.insert(key, Arc::clone(&result));
        Ok(result)
    }

    /// Compare two scenarios, each side served from or stored in the cache.
    pub fn compare(
        &self,
        current: &Scenario,
        optimized: &Scenario,
        options: &ProjectionOptions,
    ) -> Result<Comparison, ValidationError> {
        let current = self.project(current, options)?;
        let optimized = self.project(optimized, options)?;
        Comparison::new(current.as_ref().clone(), optimized.as_ref().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: String, result: Arc<ProjectionResult>) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return;
        }
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, result);
    }
}
