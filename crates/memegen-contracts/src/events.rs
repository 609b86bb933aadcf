use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Lifecycle events of a generation session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    GenerationStarted {
        template_key: String,
        transport: String,
        images: usize,
        texts: usize,
    },
    GenerationSucceeded {
        template_key: String,
        mime: String,
        payload_len: usize,
    },
    GenerationFailed {
        template_key: String,
        error: String,
    },
    GenerationDiscarded {
        template_key: String,
    },
    SessionReset,
    MemeSaved {
        ok: bool,
        detail: Option<String>,
    },
    MemeShared {
        ok: bool,
        detail: Option<String>,
    },
}

#[derive(Serialize)]
struct LogLine<'a> {
    #[serde(flatten)]
    event: &'a SessionEvent,
    session_id: &'a str,
    ts: String,
}

/// Append-only `events.jsonl` sink. Clones share one lazily opened handle,
/// so lines from concurrent writers never interleave.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: Arc<Path>,
    session_id: Arc<str>,
    file: Arc<Mutex<Option<File>>>,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: Arc::from(path.into()),
            session_id: Arc::from(session_id.into()),
            file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Appends `event` stamped with the session id and an RFC3339 timestamp,
    /// returning the line as written.
    pub fn record(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let line = serde_json::to_value(LogLine {
            event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        })?;
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');

        let mut slot = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        if let Some(file) = slot.as_mut() {
            file.write_all(&encoded)?;
        }
        Ok(line)
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?)
    }
}
