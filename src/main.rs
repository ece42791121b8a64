use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use logship::models::config::DEFAULT_OPT_IN_KEY;
use logship::{
    Delivery, ForwardingTransport, InputLogRecord, LogDiagnostics, SqliteRowStore,
    TransportConfig,
};
use std::io::{self, BufRead};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Ships opted-in JSON log records from stdin into a SQLite table", long_about = None)]
struct Cli {
    #[arg(
        short = 'd',
        long = "database",
        default_value = "logs.db",
        env = "LOGSHIP_DATABASE"
    )]
    database_file: String,

    #[arg(short = 't', long = "table", env = "LOGS_TABLE_NAME")]
    table: Option<String>,

    #[arg(
        short = 'k',
        long = "opt-in-key",
        default_value = DEFAULT_OPT_IN_KEY,
        env = "LOGS_OPT_IN_KEY"
    )]
    opt_in_key: String,

    #[arg(long = "threads", env = "LOGS_DELIVERY_THREADS")]
    delivery_threads: Option<usize>,

    /// Create the logs table before shipping
    #[arg(short = 's', long = "setup")]
    setup: bool,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "info",
        env = "LOG_LEVEL"
    )]
    log_level: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ShipSummary {
    delivered: usize,
    skipped: usize,
    failed: usize,
    malformed: usize,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    let mut config = TransportConfig::new(args.table.unwrap_or_default());
    config.opt_in_key = args.opt_in_key;
    if let Some(threads) = args.delivery_threads {
        config.delivery_threads = threads;
    }
    config.validate().context("Invalid log forwarding configuration")?;

    let store = Arc::new(
        SqliteRowStore::open(&args.database_file)
            .context("Failed to initialize database connection pool")?,
    );
    if args.setup {
        store
            .setup_logs_table(&config.logs_table_name)
            .context("Failed to set up logs table")?;
    }

    let transport = ForwardingTransport::new(&config, store, Arc::new(LogDiagnostics))
        .context("Failed to start log forwarding")?;

    let stdin = io::stdin();
    let summary = ship_lines(stdin.lock(), &transport)?;

    info!(
        "Shipped {} records to {} ({} skipped, {} failed, {} malformed)",
        summary.delivered,
        transport.table(),
        summary.skipped,
        summary.failed,
        summary.malformed
    );
    Ok(())
}

/// Submit one record per non-empty line and wait for every delivery.
fn ship_lines<R: BufRead>(reader: R, transport: &ForwardingTransport) -> Result<ShipSummary> {
    let mut summary = ShipSummary::default();
    let mut completions = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read log line")?;
        if line.trim().is_empty() {
            continue;
        }

        match InputLogRecord::from_json(&line) {
            Ok(record) => completions.push(transport.submit(&record)),
            Err(e) => {
                warn!("Skipping line {}: {}", idx + 1, e);
                summary.malformed += 1;
            }
        }
    }

    debug!("Waiting for {} submissions", completions.len());
    for completion in completions {
        match completion.wait() {
            Delivery::Delivered => summary.delivered += 1,
            Delivery::Skipped => summary.skipped += 1,
            Delivery::Failed { .. } => summary.failed += 1,
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship::MemoryRowStore;
    use std::io::Cursor;

    fn transport_with(store: Arc<MemoryRowStore>) -> ForwardingTransport {
        let mut config = TransportConfig::new("winston_logs");
        config.delivery_threads = 2;
        ForwardingTransport::new(&config, store, Arc::new(LogDiagnostics)).unwrap()
    }

    #[test]
    fn test_ship_lines_counts_outcomes() {
        let store = Arc::new(MemoryRowStore::new());
        let transport = transport_with(store.clone());
        let input = r#"{"level":"info","message":"a","supabase":true,"userId":42}
{"level":"info","message":"b","supabase":false}

{"level":"info","message":"c","supabase":"foobar"}
not json
{"message":"no level","supabase":true}
"#;

        let summary = ship_lines(Cursor::new(input), &transport).unwrap();

        assert_eq!(
            summary,
            ShipSummary {
                delivered: 1,
                skipped: 2,
                failed: 0,
                malformed: 2,
            }
        );
        assert_eq!(store.count("winston_logs"), 1);
    }

    #[test]
    fn test_ship_lines_counts_failures() {
        let store = Arc::new(MemoryRowStore::new());
        store.set_failing(true);
        let transport = transport_with(store.clone());
        let input = r#"{"level":"error","message":"a","supabase":true}"#;

        let summary = ship_lines(Cursor::new(input), &transport).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(store.count("winston_logs"), 0);
    }
}
