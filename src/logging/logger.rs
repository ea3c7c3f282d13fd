// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger handle and sinks

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::{Facility, Severity};

/// Destination for log entries
pub trait LogSink: Send + Sync {
    /// Write one formatted entry
    fn write(&self, severity: Severity, facility: Facility, message: &str);
}

/// JSON-lines sink writing directly to stderr
pub struct StderrJsonSink;

impl LogSink for StderrJsonSink {
    fn write(&self, severity: Severity, facility: Facility, message: &str) {
        let entry = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": severity.as_str(),
            "facility": facility.as_str(),
            "message": message,
        });
        eprintln!("{}", entry);
        // No flush() - let stderr buffer naturally
    }
}

/// In-memory sink collecting entries, for tests and diagnostics
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Severity, Facility, String)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all collected entries
    pub fn entries(&self) -> Vec<(Severity, Facility, String)> {
        self.entries.lock().expect("log sink poisoned").clone()
    }
}

impl LogSink for MemorySink {
    fn write(&self, severity: Severity, facility: Facility, message: &str) {
        self.entries
            .lock()
            .expect("log sink poisoned")
            .push((severity, facility, message.to_string()));
    }
}

/// Logger handle for writing log entries
///
/// This is a lightweight handle that can be cloned and passed around.
/// The sink is shared via Arc.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    /// Global minimum log level (default: Info)
    global_min_level: Arc<AtomicU8>,
    /// Per-facility minimum log levels
    facility_min_levels: Arc<RwLock<HashMap<Facility, Severity>>>,
}

impl Logger {
    /// Create a logger writing to the given sink
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            global_min_level: Arc::new(AtomicU8::new(Severity::Info.as_u8())),
            facility_min_levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a logger that writes JSON lines to stderr
    pub fn stderr_json() -> Self {
        Self::new(Arc::new(StderrJsonSink))
    }

    /// Set the global minimum severity
    pub fn set_global_min_level(&self, level: Severity) {
        self.global_min_level.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Override the minimum severity for one facility
    pub fn set_facility_min_level(&self, facility: Facility, level: Severity) {
        self.facility_min_levels
            .write()
            .expect("level map poisoned")
            .insert(facility, level);
    }

    /// Check if a log message should be written based on severity filtering
    #[inline]
    fn should_log(&self, severity: Severity, facility: Facility) -> bool {
        let min = self
            .facility_min_levels
            .read()
            .expect("level map poisoned")
            .get(&facility)
            .map(|s| s.as_u8())
            .unwrap_or_else(|| self.global_min_level.load(Ordering::Relaxed));
        severity.as_u8() <= min
    }

    fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if self.should_log(severity, facility) {
            self.sink.write(severity, facility, message);
        }
    }

    /// Log at error severity
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    /// Log at warning severity
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    /// Log at notice severity
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    /// Log at info severity
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    /// Log at debug severity
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::stderr_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_level_filtering() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone());

        logger.debug(Facility::Mld, "hidden at default level");
        logger.info(Facility::Mld, "visible");
        logger.error(Facility::Mld, "also visible");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].2, "visible");
        assert_eq!(entries[1].0, Severity::Error);
    }

    #[test]
    fn test_facility_override() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone());

        logger.set_facility_min_level(Facility::Reconcile, Severity::Debug);
        logger.debug(Facility::Reconcile, "merge trace");
        logger.debug(Facility::Mld, "still hidden");

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, Facility::Reconcile);
    }

    #[test]
    fn test_clone_shares_sink() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone());
        let clone = logger.clone();

        logger.notice(Facility::Service, "one");
        clone.notice(Facility::Service, "two");

        assert_eq!(sink.entries().len(), 2);
    }
}
