//! In-memory record store
//!
//! Records are kept in insertion order. Every record gets a sequence number
//! when it is inserted; iteration follows sequence numbers, so deleting a
//! record never renumbers the others.

use crate::error::StoreError;
use postkeep_types::{Record, RecordPatch};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Ordered mapping from `unique_id` to [`Record`], guarded by a single lock
pub struct RecordStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

struct Entry {
    seq: u64,
    record: Record,
}

impl Inner {
    fn push(&mut self, record: Record) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, record.unique_id.clone());
        self.records.insert(record.unique_id.clone(), Entry { seq, record });
        seq
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Replace the whole contents with `records`, in the given order.
    ///
    /// A repeated id keeps its first position and takes the later value.
    pub async fn restore(&self, records: Vec<Record>) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        for record in records {
            if let Some(entry) = inner.records.get_mut(&record.unique_id) {
                warn!("Duplicate id {} in snapshot, keeping last value", record.unique_id);
                entry.record = record;
                continue;
            }
            inner.push(record);
        }
        debug!("Store restored with {} records", inner.records.len());
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        let inner = self.inner.read().await;
        inner.records.get(id).map(|entry| entry.record.clone())
    }

    /// All records in insertion order
    pub async fn list(&self) -> Vec<Record> {
        let inner = self.inner.read().await;
        inner
            .order
            .values()
            .filter_map(|id| inner.records.get(id))
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Insert a new record and return its sequence number.
    pub async fn insert(&self, record: Record) -> Result<u64, StoreError> {
        if record.unique_id.is_empty() {
            return Err(StoreError::MissingId);
        }

        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&record.unique_id) {
            return Err(StoreError::Conflict(record.unique_id));
        }
        Ok(inner.push(record))
    }

    /// Merge the present fields of `patch` into the record and return it.
    pub async fn update(&self, id: &str, patch: &RecordPatch) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(&mut entry.record);
        Ok(entry.record.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .records
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        inner.order.remove(&entry.seq);
        Ok(entry.record)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
