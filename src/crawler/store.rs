//! Shared accumulator for normalized notes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::NoteFeature;

/// Concurrency-safe note store, keyed and ordered by note id.
///
/// Neighbouring cells share their edges, so a note lying exactly on one is
/// returned twice; keying by id keeps a single copy.
#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<BTreeMap<u64, NoteFeature>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit one cell's notes under a single lock. Returns how many were new.
    pub fn extend(&self, features: Vec<NoteFeature>) -> usize {
        let offered = features.len();
        let mut map = self.lock();
        let before = map.len();
        for feature in features {
            map.entry(feature.id()).or_insert(feature);
        }
        let added = map.len() - before;

        if added < offered {
            debug!("Skipped {} notes already stored", offered - added);
        }
        added
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain the store, sorted by note id
    pub fn take_sorted(&self) -> Vec<NoteFeature> {
        std::mem::take(&mut *self.lock()).into_values().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, NoteFeature>> {
        // Entries are inserted whole, a panic elsewhere cannot leave one half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
