use std::io::Write;

pub const DIAGNOSTICS_TARGET: &str = "logship::diagnostics";

/// Secondary channel for delivery failures.
///
/// A sink must never route back into the forwarding transport that reports
/// through it.
pub trait DiagnosticSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Writes a timestamped line straight to stderr, bypassing the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn error(&self, message: &str) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        // Nowhere left to report a failed stderr write
        let _ = writeln!(
            handle,
            "[{}] ERROR: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
    }
}

/// Reports through `log::error!` under [`DIAGNOSTICS_TARGET`].
///
/// Only safe when the global logger is not a
/// [`ForwardingLogger`](crate::utils::db_logger::ForwardingLogger).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticSink for LogDiagnostics {
    fn error(&self, message: &str) {
        log::error!(target: DIAGNOSTICS_TARGET, "{}", message);
    }
}
