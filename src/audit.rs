//! Audit stream: structured statement events.
//!
//! An observer attached to a database receives one event per executed
//! statement. Delivery is best-effort and never affects outcomes. The
//! [`BufferedAudit`] collector supports the audit-on-failure pattern:
//! buffer everything, flush only when the surrounding work failed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One executed statement.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub statement: String,
    /// Bound parameters, rendered.
    pub parameters: Vec<String>,
    pub duration: Duration,
    /// Rows affected, for statements that report it.
    pub rows_affected: Option<u64>,
    /// The error message, when the statement failed.
    pub error: Option<String>,
}

/// Observers are plain callbacks; they run on the executing task.
pub type AuditObserver = Arc<dyn Fn(&AuditEvent) + Send + Sync>;

/// An in-memory event buffer that flushes on demand.
///
/// Attach `observer()` to a database; on failure, drain the buffer into
/// a real sink. Dropping the buffer discards the events.
#[derive(Debug, Clone, Default)]
pub struct BufferedAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl BufferedAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// The observer half: pass to [`crate::Database::audit`].
    pub fn observer(&self) -> AuditObserver {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &AuditEvent| {
            if let Ok(mut buffer) = events.lock() {
                buffer.push(event.clone());
            }
        })
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything buffered so far.
    pub fn drain(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|mut buffer| buffer.drain(..).collect())
            .unwrap_or_default()
    }

    /// Feed the buffered events to a sink, clearing the buffer.
    pub fn flush_to(&self, sink: impl Fn(&AuditEvent)) {
        for event in self.drain() {
            sink(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(statement: &str) -> AuditEvent {
        AuditEvent {
            statement: statement.to_string(),
            parameters: vec![],
            duration: Duration::from_millis(1),
            rows_affected: Some(1),
            error: None,
        }
    }

    #[test]
    fn test_buffering() {
        let buffer = BufferedAudit::new();
        let observer = buffer.observer();
        observer(&event("SELECT 1"));
        observer(&event("SELECT 2"));
        assert_eq!(buffer.len(), 2);
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].statement, "SELECT 1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_to() {
        let buffer = BufferedAudit::new();
        let observer = buffer.observer();
        observer(&event("INSERT"));
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&seen);
        buffer.flush_to(move |event| sink.lock().unwrap().push(event.statement.clone()));
        assert_eq!(*seen.lock().unwrap(), vec!["INSERT".to_string()]);
        assert!(buffer.is_empty());
    }
}
