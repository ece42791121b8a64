use crate::models::error::StoreError;
use crate::models::log_row::PersistedRow;
use crate::repo::row_store::RowStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Keeps inserted rows in memory, keyed by table.
#[derive(Default)]
pub struct MemoryRowStore {
    rows: Mutex<HashMap<String, Vec<PersistedRow>>>,
    failing: AtomicBool,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every insert is rejected and nothing is stored.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self, table: &str) -> Vec<PersistedRow> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(table).cloned().unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(table).map_or(0, Vec::len)
    }
}

impl RowStore for MemoryRowStore {
    fn insert(&self, table: &str, row: &PersistedRow) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                table: table.to_string(),
                reason: "store is unavailable".to_string(),
            });
        }

        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.entry(table.to_string()).or_default().push(row.clone());
        Ok(())
    }
}
