//! In-memory bookkeeping for a sync run.
//!
//! Nothing here persists: a fresh process starts from an empty state and
//! rebuilds what it needs from the two APIs during bootstrap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Tracks which requests are still in flight.
///
/// Keys are free-form strings (`zd_locales`, `stats:<slug>` and the like).
/// The same key may be pushed more than once when parallel fan-out hits
/// the same endpoint; `finish` clears every occurrence so a key never
/// lingers after its last completion.
#[derive(Debug, Clone, Default)]
pub struct SyncTracker {
    pending: Vec<String>,
}

impl SyncTracker {
    pub fn begin(&mut self, key: &str) {
        self.pending.push(key.to_string());
    }

    /// Remove all occurrences of `key`.
    pub fn finish(&mut self, key: &str) {
        self.pending.retain(|k| k != key);
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending.iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Per-key counters for bounded auth retries.
#[derive(Debug, Clone, Default)]
pub struct RetryCounter {
    counts: HashMap<String, u32>,
}

impl RetryCounter {
    /// Bump the counter for `key` and return the new count.
    pub fn record(&mut self, key: &str) -> u32 {
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, key: &str) {
        self.counts.remove(key);
    }
}

/// Outcome of one named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Processing,
    Success,
    Failed,
}

/// Status of each named operation in the current run.
#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    ops: HashMap<String, OpStatus>,
}

impl OpRegistry {
    pub fn begin(&mut self, name: &str) {
        self.ops.insert(name.to_string(), OpStatus::Processing);
    }

    pub fn succeed(&mut self, name: &str) {
        self.ops.insert(name.to_string(), OpStatus::Success);
    }

    pub fn fail(&mut self, name: &str) {
        self.ops.insert(name.to_string(), OpStatus::Failed);
    }

    pub fn status(&self, name: &str) -> Option<OpStatus> {
        self.ops.get(name).copied()
    }

    /// Forget all recorded outcomes, for the start of a fresh pass.
    pub fn reset_all(&mut self) {
        self.ops.clear();
    }

    /// Counts per status, for run reports.
    pub fn summary(&self) -> OpSummary {
        let mut summary = OpSummary::default();
        for status in self.ops.values() {
            match status {
                OpStatus::Processing => summary.processing += 1,
                OpStatus::Success => summary.success += 1,
                OpStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSummary {
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

/// Which Transifex resources already exist, so uploads know whether to
/// create or update.
#[derive(Debug, Clone, Default)]
pub struct ResourceInventory {
    slugs: Vec<String>,
}

impl ResourceInventory {
    /// Add a slug if it is not already present.
    pub fn record(&mut self, slug: &str) {
        if !self.contains(slug) {
            self.slugs.push(slug.to_string());
        }
    }

    /// Swap in the full slug list, as fetched from the project.
    pub fn replace(&mut self, slugs: Vec<String>) {
        self.slugs = slugs;
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.iter().any(|s| s == slug)
    }

    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

/// Everything a run tracks, owned in one place.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub tracker: SyncTracker,
    pub retries: RetryCounter,
    pub ops: OpRegistry,
    pub inventory: ResourceInventory,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }
}
