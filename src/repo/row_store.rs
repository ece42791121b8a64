use crate::models::error::StoreError;
use crate::models::log_row::PersistedRow;

/// Insert-one capability of the remote log table.
///
/// Implementations own their connections and any timeouts. The transport calls
/// `insert` at most once per admitted record and never retries.
pub trait RowStore: Send + Sync {
    fn insert(&self, table: &str, row: &PersistedRow) -> Result<(), StoreError>;
}
