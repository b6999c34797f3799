//! Storage abstraction for the ingestion pipeline.
//!
//! The [`LeakStore`] trait is the persistence interface consumed by the
//! job enumerator, the workers, and the result collector. Implementations
//! must serialize every check-then-act sequence internally: callers never
//! hold a lock across store calls.
//!
//! Implementations must be `Send + Sync` to be shared across worker tasks.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{BatchOutcome, LeakRef, LeakStatus, NewCredential, NewLeakFile};

/// Persistence backend for leak files, hosts, and credentials.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_leak`](LeakStore::find_leak) | Look up a leak file by identity fingerprint |
/// | [`insert_leak`](LeakStore::insert_leak) | Record a newly discovered leak file |
/// | [`read_status`](LeakStore::read_status) | Read a leak file's status |
/// | [`update_status`](LeakStore::update_status) | Advance a leak file's status |
/// | [`credential_exists`](LeakStore::credential_exists) | Dedup lookup by credential fingerprint |
/// | [`host_id`](LeakStore::host_id) | Look up or create a host by domain |
/// | [`insert_credentials`](LeakStore::insert_credentials) | Flush a credential batch |
#[async_trait]
pub trait LeakStore: Send + Sync {
    /// Look up a leak file by its identity fingerprint.
    async fn find_leak(&self, fingerprint: &str) -> Result<Option<LeakRef>>;

    /// Record a leak file and return its id.
    ///
    /// If a record with the same fingerprint already exists, its id is
    /// returned and the stored row is left untouched.
    async fn insert_leak(&self, leak: &NewLeakFile) -> Result<i64>;

    /// Read the status of a leak file. `None` if the id is unknown.
    async fn read_status(&self, leak_id: i64) -> Result<Option<LeakStatus>>;

    /// Set the status of a leak file.
    async fn update_status(&self, leak_id: i64, status: LeakStatus) -> Result<()>;

    /// Whether a credential with this fingerprint is already stored.
    async fn credential_exists(&self, fingerprint: &str) -> Result<bool>;

    /// Return the id of the host for `domain`, creating it if needed.
    ///
    /// Concurrent callers with the same domain always observe one id.
    async fn host_id(&self, domain: &str) -> Result<i64>;

    /// Insert a batch of credentials.
    ///
    /// Rows whose fingerprint is already stored (or repeated within the
    /// batch) are counted in [`BatchOutcome::duplicates`], not reported as
    /// errors.
    async fn insert_credentials(&self, batch: &[NewCredential]) -> Result<BatchOutcome>;
}
