//! Core data models for the ingestion pipeline.
//!
//! These types describe the three persisted relations (leak files, hosts,
//! credentials) and the leak-file status state machine.

use std::fmt;

/// Processing state of a leak file.
///
/// `Unindexed` is implicit: a file with no stored record. Stored values
/// are `Indexed = 1`, `Processing = 2`, `Done = 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeakStatus {
    /// Record created by the enumerator, not yet claimed by a worker.
    Indexed,
    /// Claimed by a worker; set when parsing starts.
    Processing,
    /// Result received by the collector.
    Done,
}

impl LeakStatus {
    /// Integer encoding used by the persisted `leaks.status` column.
    pub fn as_i64(self) -> i64 {
        match self {
            LeakStatus::Indexed => 1,
            LeakStatus::Processing => 2,
            LeakStatus::Done => 3,
        }
    }

    /// Decode a stored status. Unknown values yield `None`.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(LeakStatus::Indexed),
            2 => Some(LeakStatus::Processing),
            3 => Some(LeakStatus::Done),
            _ => None,
        }
    }

    /// Whether a file in this state still needs a worker.
    ///
    /// Only `Done` is final. A file left in `Processing` by an aborted run
    /// is picked up again; credential dedup makes the second pass idempotent.
    pub fn needs_processing(self) -> bool {
        self != LeakStatus::Done
    }
}

impl fmt::Display for LeakStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeakStatus::Indexed => "indexed",
            LeakStatus::Processing => "processing",
            LeakStatus::Done => "done",
        };
        f.write_str(s)
    }
}

/// A leak file about to be recorded for the first time.
#[derive(Debug, Clone)]
pub struct NewLeakFile {
    /// Folder name inside the collection.
    pub name: String,
    /// Collection (parent) label.
    pub parent: String,
    pub filename: String,
    /// Identity fingerprint of `(parent, name, filename)`.
    pub fingerprint: String,
    /// Unix timestamp of discovery.
    pub discovered_at: i64,
    /// Declared source label.
    pub source: String,
    pub line_count: i64,
    pub status: LeakStatus,
}

/// Identity and status of a stored leak file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakRef {
    pub id: i64,
    pub status: LeakStatus,
}

/// A mail/domain endpoint referenced by credentials.
///
/// SMTP/IMAP metadata is reserved for a later stage and never populated
/// by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Host {
    pub id: i64,
    pub domain: String,
    pub smtp: Option<String>,
    pub smtp_port: Option<i64>,
    pub imap: Option<String>,
    pub imap_port: Option<i64>,
}

/// A credential pair ready to be flushed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub email: String,
    pub username: String,
    pub password: String,
    /// Content fingerprint of `(email, password)`; the dedup key.
    pub fingerprint: String,
    pub host_id: i64,
    pub leak_id: i64,
    /// Unix timestamp of first sighting.
    pub first_seen: i64,
}

/// A stored credential as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
    pub fingerprint: String,
    /// Unset by ingestion; reserved for a verification stage.
    pub valid: bool,
    pub host_id: i64,
    pub leak_id: i64,
    pub first_seen: i64,
}

/// Result of a batch insert.
///
/// Rows rejected by a uniqueness constraint are counted as duplicates,
/// never reported as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub duplicates: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_storage_encoding() {
        for status in [LeakStatus::Indexed, LeakStatus::Processing, LeakStatus::Done] {
            assert_eq!(LeakStatus::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(LeakStatus::from_i64(0), None);
        assert_eq!(LeakStatus::from_i64(7), None);
    }

    #[test]
    fn only_done_is_final() {
        assert!(LeakStatus::Indexed.needs_processing());
        assert!(LeakStatus::Processing.needs_processing());
        assert!(!LeakStatus::Done.needs_processing());
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(LeakStatus::Indexed.to_string(), "indexed");
        assert_eq!(LeakStatus::Processing.to_string(), "processing");
        assert_eq!(LeakStatus::Done.to_string(), "done");
    }
}
