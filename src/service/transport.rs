use crate::models::config::TransportConfig;
use crate::models::error::{Result, StoreError};
use crate::models::log_record::InputLogRecord;
use crate::models::log_row::PersistedRow;
use crate::repo::row_store::RowStore;
use crate::service::completion::{completion_pair, Completion, Delivery};
use crate::utils::diagnostics::DiagnosticSink;
use log::info;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Keys that never make it into a row's `meta`, besides the opt-in key.
const NAMED_KEYS: [&str; 2] = ["level", "message"];

/// A record is admissible only when its opt-in field is exactly `true`.
pub fn admissible(record: &InputLogRecord, opt_in_key: &str) -> bool {
    matches!(record.field(opt_in_key), Some(Value::Bool(true)))
}

/// Build the row for a record. The record itself is left untouched.
pub fn to_row(record: &InputLogRecord, opt_in_key: &str) -> PersistedRow {
    let mut meta = record.fields.clone();
    meta.retain(|key, _| key != opt_in_key && !NAMED_KEYS.contains(&key.as_str()));

    PersistedRow {
        level: record.level.clone(),
        message: record.message.clone(),
        meta,
    }
}

/// Forwards opted-in log records to a table in a [`RowStore`].
///
/// Every submission is one independent attempt: at most one insert and no
/// retry. Failures go to the diagnostic sink only, never through `log`, since
/// this transport can sit behind the global logger.
#[derive(Clone)]
pub struct ForwardingTransport {
    inner: Arc<Inner>,
}

struct Inner {
    table: String,
    opt_in_key: String,
    store: Arc<dyn RowStore>,
    diagnostics: Arc<dyn DiagnosticSink>,
    pool: rayon::ThreadPool,
}

impl ForwardingTransport {
    /// Fails straight away when no table name is configured.
    pub fn new(
        config: &TransportConfig,
        store: Arc<dyn RowStore>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.delivery_threads)
            .thread_name(|idx| format!("logship-delivery-{}", idx))
            // A panicking completion callback ends only its own job
            .panic_handler(|_| {})
            .build()?;

        info!(
            "Forwarding log records with {}=true to table {} ({} delivery threads)",
            config.opt_in_key, config.logs_table_name, config.delivery_threads
        );

        Ok(Self {
            inner: Arc::new(Inner {
                table: config.logs_table_name.clone(),
                opt_in_key: config.opt_in_key.clone(),
                store,
                diagnostics,
                pool,
            }),
        })
    }

    pub fn table(&self) -> &str {
        &self.inner.table
    }

    pub fn opt_in_key(&self) -> &str {
        &self.inner.opt_in_key
    }

    pub fn is_admissible(&self, record: &InputLogRecord) -> bool {
        admissible(record, &self.inner.opt_in_key)
    }

    /// Submit one record. Never blocks on the store and never fails; the
    /// returned [`Completion`] resolves once the attempt is over.
    pub fn submit(&self, record: &InputLogRecord) -> Completion {
        if !self.is_admissible(record) {
            return Completion::resolved(Delivery::Skipped);
        }

        let (tx, completion) = completion_pair();
        self.dispatch(record, move |delivery| tx.complete(delivery));
        completion
    }

    /// Submit one record and call `done` exactly once when the attempt is
    /// over, whatever its outcome. Skipped records call `done` before this
    /// returns.
    pub fn submit_with_callback<F>(&self, record: &InputLogRecord, done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_admissible(record) {
            done();
            return;
        }

        self.dispatch(record, move |_| done());
    }

    fn dispatch<F>(&self, record: &InputLogRecord, on_done: F)
    where
        F: FnOnce(Delivery) + Send + 'static,
    {
        let row = to_row(record, &self.inner.opt_in_key);
        let inner = Arc::clone(&self.inner);

        self.inner.pool.spawn(move || {
            let guard = DoneGuard {
                on_done: Some(on_done),
            };
            let delivery = inner.deliver(&row);
            guard.finish(delivery);
        });
    }
}

/// Runs the completion step exactly once, even if the delivery job unwinds.
struct DoneGuard<F: FnOnce(Delivery)> {
    on_done: Option<F>,
}

impl<F: FnOnce(Delivery)> DoneGuard<F> {
    fn finish(mut self, delivery: Delivery) {
        if let Some(on_done) = self.on_done.take() {
            on_done(delivery);
        }
    }
}

impl<F: FnOnce(Delivery)> Drop for DoneGuard<F> {
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done(Delivery::Failed {
                reason: "delivery job panicked".to_string(),
            });
        }
    }
}

impl Inner {
    fn deliver(&self, row: &PersistedRow) -> Delivery {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.store.insert(&self.table, row)))
            .unwrap_or_else(|payload| Err(StoreError::Panicked(panic_message(payload))));

        match attempt {
            Ok(()) => Delivery::Delivered,
            Err(error) => {
                let reason = error.to_string();
                let line = format!(
                    "Error logging to table {}: error inserting log: {}",
                    self.table, reason
                );
                // A broken sink must not turn a failed delivery into a lost one
                let _ = panic::catch_unwind(AssertUnwindSafe(|| self.diagnostics.error(&line)));
                Delivery::Failed { reason }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
