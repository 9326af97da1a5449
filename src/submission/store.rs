//! Keyed submission entry store
//!
//! Entries are keyed `"{contract}::{verifier}"`. Every entry carries a
//! generation; a round captures the generation when it starts and its writes
//! are dropped once the entry has been reset or the store cleared.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::domain::{SubmissionEntry, DEFAULT_VERIFIER};

/// Store key for a `(contract, verifier)` pair.
pub fn entry_key(contract: &str, verifier: &str) -> String {
    let verifier = if verifier.is_empty() {
        DEFAULT_VERIFIER
    } else {
        verifier
    };
    format!("{contract}::{verifier}")
}

#[derive(Debug, Default)]
struct Slot {
    entry: SubmissionEntry,
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    next_generation: u64,
}

/// Coordinator-owned map of submission entries.
#[derive(Debug, Default)]
pub struct SubmissionStore {
    inner: RwLock<Inner>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a round for `key`: fresh entry, new generation.
    pub async fn begin(&self, key: &str) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.slots.insert(
            key.to_string(),
            Slot {
                entry: SubmissionEntry::default(),
                generation,
            },
        );
        generation
    }

    /// Apply `f` to the entry if it still belongs to `generation`.
    ///
    /// Returns `false` when the write was discarded.
    pub async fn update<F>(&self, key: &str, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut SubmissionEntry),
    {
        let mut inner = self.inner.write().await;
        match inner.slots.get_mut(key) {
            Some(slot) if slot.generation == generation => {
                f(&mut slot.entry);
                true
            }
            _ => false,
        }
    }

    /// Current entry, or idle defaults when none exists.
    pub async fn entry(&self, key: &str) -> SubmissionEntry {
        self.inner
            .read()
            .await
            .slots
            .get(key)
            .map(|slot| slot.entry.clone())
            .unwrap_or_default()
    }

    /// Drop one entry. Safe to call for unknown keys.
    pub async fn reset_entry(&self, key: &str) {
        self.inner.write().await.slots.remove(key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.slots.clear();
    }

    /// Entries of one contract, keyed by verifier name.
    pub async fn entries_for(&self, contract: &str) -> BTreeMap<String, SubmissionEntry> {
        let prefix = format!("{contract}::");
        self.inner
            .read()
            .await
            .slots
            .iter()
            .filter_map(|(key, slot)| {
                key.strip_prefix(&prefix)
                    .map(|verifier| (verifier.to_string(), slot.entry.clone()))
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
