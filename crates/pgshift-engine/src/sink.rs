//! Error sink for failures that must stay visible without stopping the run

/// Receives non-fatal migration failures
///
/// Recording is fire-and-forget and never influences control flow.
pub trait ErrorSink: Send + Sync {
    fn record_error(&self, message: &str, sql: Option<&str>);
}

/// Emits recorded failures on the `pgshift::errors` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn record_error(&self, message: &str, sql: Option<&str>) {
        match sql {
            Some(sql) => tracing::error!(target: "pgshift::errors", sql = %sql, "{}", message),
            None => tracing::error!(target: "pgshift::errors", "{}", message),
        }
    }
}
