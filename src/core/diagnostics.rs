//! Diagnostic sink injected into the queue and orchestrator.
//!
//! Components never write to a process-wide stream themselves; they are handed
//! an `Arc<dyn DiagnosticSink>`. The default `LogSink` forwards to the `log`
//! facade, so the binary decides where messages end up when it initialises
//! `env_logger`.

use log::Level;
use parking_lot::Mutex;

pub const LOG_TARGET: &str = "ferrous_sieve";

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}
