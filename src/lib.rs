//! Forwards opted-in log records to a database table.
//!
//! A record is forwarded only when its opt-in field (`supabase` by default)
//! is exactly `true`. The flag, `level` and `message` are stripped from the
//! metadata, the rest is stored as JSON, and a failed insert is reported on a
//! separate diagnostic channel instead of reaching the caller.

pub mod models;
pub mod repo;
pub mod service;
pub mod utils;

pub use models::config::TransportConfig;
pub use models::error::{ForwardError, StoreError};
pub use models::log_record::InputLogRecord;
pub use models::log_row::{PersistedRow, StoredLogRow};
pub use repo::memory::MemoryRowStore;
pub use repo::row_store::RowStore;
pub use repo::sqlite::SqliteRowStore;
pub use service::completion::{Completion, Delivery};
pub use service::transport::{admissible, to_row, ForwardingTransport};
pub use utils::db_logger::{init_forwarding_logger, ForwardingLogger};
pub use utils::diagnostics::{DiagnosticSink, LogDiagnostics, StderrDiagnostics};
