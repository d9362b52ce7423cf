//! Record store seam
//!
//! The two persistence touchpoints the coordinator needs from the host
//! database layer: reading the currently stored file name, and writing the
//! metadata columns without re-entering the lifecycle callbacks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use filebind_core::Id;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(Id),
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam to the host database layer
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the given column of a record. Missing records yield `None`.
    async fn stored_file_name(&self, id: Id, column: &str) -> StoreResult<Option<String>>;

    /// Write metadata columns on a record without running lifecycle
    /// callbacks (the secondary save after a successful upload).
    async fn save_metadata(&self, id: Id, columns: &Map<String, Value>) -> StoreResult<()>;
}

/// In-memory record store for testing
pub struct MemoryRecordStore {
    rows: RwLock<HashMap<Id, Map<String, Value>>>,
    fail_next_save: AtomicBool,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            fail_next_save: AtomicBool::new(false),
        }
    }

    /// Insert or replace a row
    pub async fn insert(&self, id: Id, columns: Map<String, Value>) {
        self.rows.write().await.insert(id, columns);
    }

    /// Fetch a row copy
    pub async fn row(&self, id: Id) -> Option<Map<String, Value>> {
        self.rows.read().await.get(&id).cloned()
    }

    /// Make the next `save_metadata` call fail
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn stored_file_name(&self, id: Id, column: &str) -> StoreResult<Option<String>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&id)
            .and_then(|row| row.get(column))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn save_metadata(&self, id: Id, columns: &Map<String, Value>) -> StoreResult<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("simulated save failure".to_string()));
        }

        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        for (column, value) in columns {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }
}
