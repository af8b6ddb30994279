use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only writer for the studio `events.jsonl` log.
///
/// Each line carries `type`, `session_id` and `ts`; caller payload keys are
/// merged last, so they win over those three. Clones share one write lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    log: Arc<EventLog>,
    session_id: Arc<str>,
}

#[derive(Debug)]
struct EventLog {
    path: PathBuf,
    writing: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        let log = EventLog {
            path: path.into(),
            writing: Mutex::new(()),
        };
        Self {
            log: Arc::new(log),
            session_id: Arc::from(session_id.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Appends one event and returns the object that was written.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let event = self.render(event_type, payload);
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.log.append(line.as_bytes())?;
        Ok(Value::Object(event))
    }

    fn render(&self, event_type: &str, payload: EventPayload) -> EventPayload {
        let mut event = EventPayload::new();
        event.insert("type".into(), Value::from(event_type));
        event.insert("session_id".into(), Value::from(self.session_id()));
        event.insert("ts".into(), Value::from(timestamp()));
        event.extend(payload);
        event
    }
}

impl EventLog {
    fn append(&self, line: &[u8]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("create event log directory {}", dir.display()))?;
        }
        let _writing = self
            .writing
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open event log {}", self.path.display()))?;
        file.write_all(line)?;
        Ok(())
    }
}

/// Emits through an optional writer, swallowing write failures.
///
/// Event logging never changes the outcome of the operation being logged.
pub fn emit_best_effort(events: Option<&EventWriter>, event_type: &str, payload: EventPayload) {
    if let Some(writer) = events {
        if let Err(err) = writer.emit(event_type, payload) {
            eprintln!("stone-studio: failed to record {event_type} event: {err:#}");
        }
    }
}

pub fn payload(pairs: &[(&str, Value)]) -> EventPayload {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

/// RFC 3339 UTC with microseconds.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
