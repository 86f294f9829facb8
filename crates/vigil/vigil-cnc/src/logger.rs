/// Optional sink for human-readable progress messages.
///
/// Never needed for correctness: a handshake without a logger behaves
/// exactly the same, only silently.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Forwards every message to `tracing` at info level.
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "vigil_cnc", "{message}");
    }
}
