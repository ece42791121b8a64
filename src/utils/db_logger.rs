use crate::models::log_record::InputLogRecord;
use crate::service::transport::ForwardingTransport;
use log::kv::{self, Key, Source, Value, VisitSource};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::Map;

/// `log` facade adapter that hands every enabled record to a
/// [`ForwardingTransport`].
///
/// Structured key-values become record fields, so
/// `info!(supabase = true, user_id = 42; "signed in")` is forwarded while a
/// plain `info!("signed in")` only reaches the console logger.
pub struct ForwardingLogger {
    level: LevelFilter,
    transport: ForwardingTransport,
    console: Option<Box<dyn Log>>,
}

impl ForwardingLogger {
    pub fn new(level: LevelFilter, transport: ForwardingTransport) -> Self {
        ForwardingLogger {
            level,
            transport,
            console: None,
        }
    }

    /// Also pass every record on to `console`, e.g. an `env_logger::Logger`.
    pub fn with_console(mut self, console: Box<dyn Log>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for ForwardingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(console) = &self.console {
            if console.enabled(record.metadata()) {
                console.log(record);
            }
        }

        // Fire and forget
        let _ = self.transport.submit(&to_input_record(record));
    }

    /// Flushes the console logger only. Deliveries still running on the
    /// transport's pool are not waited for and may be lost at process exit.
    fn flush(&self) {
        if let Some(console) = &self.console {
            console.flush();
        }
    }
}

pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

/// Convert a `log` record into the transport's input shape.
pub fn to_input_record(record: &Record) -> InputLogRecord {
    let mut collector = FieldCollector { fields: Map::new() };
    // The collector never returns an error
    let _ = record.key_values().visit(&mut collector);

    InputLogRecord {
        level: level_name(record.level()).to_string(),
        message: record.args().to_string(),
        fields: collector.fields,
    }
}

struct FieldCollector {
    fields: Map<String, serde_json::Value>,
}

impl<'kvs> VisitSource<'kvs> for FieldCollector {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        let value = serde_json::to_value(&value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        self.fields.insert(key.as_str().to_string(), value);
        Ok(())
    }
}

/// Install a [`ForwardingLogger`] as the global logger, echoing records to an
/// env_logger console logger configured from `RUST_LOG`.
///
/// For embedding applications; the `logship` binary keeps env_logger as its
/// global logger. Can only succeed once per process.
pub fn init_forwarding_logger(
    level: LevelFilter,
    transport: ForwardingTransport,
) -> Result<(), log::SetLoggerError> {
    let console = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .build();

    let logger = ForwardingLogger::new(level, transport).with_console(Box::new(console));
    log::set_max_level(level);
    log::set_boxed_logger(Box::new(logger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::TransportConfig;
    use crate::repo::memory::MemoryRowStore;
    use crate::utils::diagnostics::testing::RecordingDiagnostics;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const TABLE: &str = "app_logs";

    fn setup(level: LevelFilter) -> (ForwardingLogger, Arc<MemoryRowStore>) {
        let store = Arc::new(MemoryRowStore::new());
        let mut config = TransportConfig::new(TABLE);
        config.delivery_threads = 1;
        let transport = ForwardingTransport::new(
            &config,
            store.clone(),
            Arc::new(RecordingDiagnostics::default()),
        )
        .unwrap();
        (ForwardingLogger::new(level, transport), store)
    }

    fn wait_for_rows(store: &MemoryRowStore, expected: usize) {
        for _ in 0..200 {
            if store.count(TABLE) >= expected {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    /// Console stand-in that remembers what it was asked to print.
    #[derive(Clone, Default)]
    struct CapturingConsole {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl Log for CapturingConsole {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.messages.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_to_input_record_collects_key_values() {
        let kvs: [(&str, Value); 3] = [
            ("supabase", Value::from(true)),
            ("user_id", Value::from(42u64)),
            ("route", Value::from("/login")),
        ];
        let record = Record::builder()
            .level(Level::Warn)
            .args(format_args!("signed in"))
            .key_values(&kvs)
            .build();

        let input = to_input_record(&record);

        assert_eq!(input.level, "warn");
        assert_eq!(input.message, "signed in");
        assert_eq!(input.field("supabase"), Some(&json!(true)));
        assert_eq!(input.field("user_id"), Some(&json!(42)));
        assert_eq!(input.field("route"), Some(&json!("/login")));
    }

    #[test]
    fn test_opted_in_record_is_forwarded() {
        let (logger, store) = setup(LevelFilter::Info);
        let kvs: [(&str, Value); 2] = [("supabase", Value::from(true)), ("job", Value::from(7u64))];

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("job finished"))
                .key_values(&kvs)
                .build(),
        );
        wait_for_rows(&store, 1);

        let rows = store.rows(TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, "info");
        assert_eq!(rows[0].message, "job finished");
        assert_eq!(serde_json::Value::Object(rows[0].meta.clone()), json!({"job": 7}));
    }

    #[test]
    fn test_plain_record_is_not_forwarded() {
        let (logger, store) = setup(LevelFilter::Info);
        let console = CapturingConsole::default();
        let logger = logger.with_console(Box::new(console.clone()));

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("just for the console"))
                .build(),
        );

        assert_eq!(store.count(TABLE), 0);
        assert_eq!(
            console.messages.lock().unwrap().as_slice(),
            ["just for the console".to_string()]
        );
    }

    #[test]
    fn test_records_below_level_are_dropped() {
        let (logger, store) = setup(LevelFilter::Warn);
        let console = CapturingConsole::default();
        let logger = logger.with_console(Box::new(console.clone()));
        let kvs: [(&str, Value); 1] = [("supabase", Value::from(true))];

        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("noise"))
                .key_values(&kvs)
                .build(),
        );

        assert!(console.messages.lock().unwrap().is_empty());
        assert_eq!(store.count(TABLE), 0);
    }

    #[test]
    fn test_init_forwarding_logger_routes_log_macros() {
        let store = Arc::new(MemoryRowStore::new());
        let mut config = TransportConfig::new(TABLE);
        config.delivery_threads = 1;
        let transport = ForwardingTransport::new(
            &config,
            store.clone(),
            Arc::new(RecordingDiagnostics::default()),
        )
        .unwrap();

        init_forwarding_logger(LevelFilter::Info, transport.clone()).unwrap();
        assert!(init_forwarding_logger(LevelFilter::Info, transport).is_err());

        log::info!(supabase = true, job = 3; "installed logger");
        log::info!("console only");
        wait_for_rows(&store, 1);

        let rows = store.rows(TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "installed logger");
        assert_eq!(serde_json::Value::Object(rows[0].meta.clone()), json!({"job": 3}));
    }

    #[test]
    fn test_level_names_are_lowercase() {
        assert_eq!(level_name(Level::Error), "error");
        assert_eq!(level_name(Level::Trace), "trace");
    }
}
