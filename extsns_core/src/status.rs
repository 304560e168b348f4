//! Operator facing progress lines.

/// Receives human readable progress and status lines.
///
/// Lines are informational; a sink cannot fail the reconciliation.
pub trait StatusSink: Send + Sync {
    /// Emits one line.
    fn status(&self, line: &str);
}

/// A sink forwarding every line to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn status(&self, line: &str) {
        log::info!("{line}");
    }
}

impl<S: StatusSink + ?Sized> StatusSink for &S {
    fn status(&self, line: &str) {
        (**self).status(line)
    }
}

impl<S: StatusSink + ?Sized> StatusSink for std::sync::Arc<S> {
    fn status(&self, line: &str) {
        (**self).status(line)
    }
}
