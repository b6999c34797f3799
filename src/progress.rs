//! Indexing progress reporting.
//!
//! Reports what `lidx index` is doing: which collection is being
//! enumerated, and how many dispatched jobs have come back. Progress is
//! emitted on **stderr** so stdout stays parseable for scripts.

use anyhow::{bail, Result};
use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The source tree is being walked. Total unknown.
    Enumerating { collection: String },
    /// Results collected so far out of the jobs dispatched.
    Indexing {
        collection: String,
        sent: u64,
        received: u64,
    },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "index Collection 1  sent 1,234 | received 1,000".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Enumerating { collection } => {
                format!("index {}  enumerating...\n", collection)
            }
            ProgressEvent::Indexing {
                collection,
                sent,
                received,
            } => format!(
                "index {}  sent {} | received {}\n",
                collection,
                format_number(*sent),
                format_number(*received)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Enumerating { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "enumerating"
            }),
            ProgressEvent::Indexing {
                collection,
                sent,
                received,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "indexing",
                "sent": sent,
                "received": received
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value: `auto`, `human`, `json`, or `off`.
    pub fn from_flag(value: &str) -> Result<Self> {
        match value {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => bail!(
                "Unknown progress mode: '{}'. Must be auto, human, json, or off.",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn progress_flag_parsing() {
        assert_eq!(ProgressMode::from_flag("json").unwrap(), ProgressMode::Json);
        assert_eq!(ProgressMode::from_flag("off").unwrap(), ProgressMode::Off);
        assert!(ProgressMode::from_flag("loud").is_err());
    }
}
