//! Persistent store for marked event records.
//!
//! Every event that survives the trigger gate is marked for storage and its
//! output record is written here, rejected-later events included. Keys are
//! big-endian event numbers so a range scan walks the run in order; values
//! are the JSON-encoded [`ProcessedRecord`].

use std::path::Path;

use thiserror::Error;

use crate::types::ProcessedRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Sled-backed record store, one entry per marked event.
pub struct RecordStore {
    db: sled::Db,
}

impl RecordStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Writes (or overwrites) the record under its event number.
    pub fn put(&self, record: &ProcessedRecord) -> Result<(), StoreError> {
        let key = record.event_number.to_be_bytes();
        let value = serde_json::to_vec(record)?;
        self.db.insert(key, value)?;
        Ok(())
    }

    pub fn get(&self, event_number: u64) -> Result<Option<ProcessedRecord>, StoreError> {
        match self.db.get(event_number.to_be_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// All stored records in event-number order.
    pub fn records(&self) -> impl Iterator<Item = Result<ProcessedRecord, StoreError>> + '_ {
        self.db.iter().map(|entry| {
            let (_, raw) = entry?;
            Ok(serde_json::from_slice(&raw)?)
        })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

// ============================================================
// Tests
// ============================================================
