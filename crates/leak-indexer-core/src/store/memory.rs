//! In-memory [`LeakStore`] implementation for tests.
//!
//! All state sits behind one `std::sync::Mutex`, so every operation is
//! trivially serialized. Uniqueness of leak, host and credential
//! fingerprints is enforced the same way the SQLite schema does.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{
    BatchOutcome, Credential, Host, LeakRef, LeakStatus, NewCredential, NewLeakFile,
};

use super::LeakStore;

struct StoredLeak {
    leak: NewLeakFile,
    status: LeakStatus,
}

#[derive(Default)]
struct State {
    leaks: Vec<StoredLeak>,
    leak_by_fingerprint: HashMap<String, i64>,
    hosts: Vec<Host>,
    host_by_domain: HashMap<String, i64>,
    credentials: Vec<Credential>,
    credential_by_fingerprint: HashMap<String, i64>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    /// Snapshot of all stored credentials, in insertion order.
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        Ok(self.lock()?.credentials.clone())
    }

    /// Snapshot of all stored hosts, in insertion order.
    pub fn hosts(&self) -> Result<Vec<Host>> {
        Ok(self.lock()?.hosts.clone())
    }

    /// Number of recorded leak files.
    pub fn leak_count(&self) -> Result<usize> {
        Ok(self.lock()?.leaks.len())
    }

    /// The record a leak file was first stored with. `None` if the id is unknown.
    pub fn leak(&self, leak_id: i64) -> Result<Option<NewLeakFile>> {
        let state = self.lock()?;
        Ok(leak_index(leak_id)
            .and_then(|i| state.leaks.get(i))
            .map(|stored| stored.leak.clone()))
    }
}

#[async_trait]
impl LeakStore for InMemoryStore {
    async fn find_leak(&self, fingerprint: &str) -> Result<Option<LeakRef>> {
        let state = self.lock()?;
        Ok(state.leak_by_fingerprint.get(fingerprint).and_then(|&id| {
            let stored = leak_index(id).and_then(|i| state.leaks.get(i))?;
            Some(LeakRef {
                id,
                status: stored.status,
            })
        }))
    }

    async fn insert_leak(&self, leak: &NewLeakFile) -> Result<i64> {
        let mut state = self.lock()?;
        if let Some(&id) = state.leak_by_fingerprint.get(&leak.fingerprint) {
            return Ok(id);
        }
        state.leaks.push(StoredLeak {
            leak: leak.clone(),
            status: leak.status,
        });
        let id = state.leaks.len() as i64;
        state
            .leak_by_fingerprint
            .insert(leak.fingerprint.clone(), id);
        Ok(id)
    }

    async fn read_status(&self, leak_id: i64) -> Result<Option<LeakStatus>> {
        let state = self.lock()?;
        Ok(leak_index(leak_id)
            .and_then(|i| state.leaks.get(i))
            .map(|stored| stored.status))
    }

    async fn update_status(&self, leak_id: i64, status: LeakStatus) -> Result<()> {
        let mut state = self.lock()?;
        match leak_index(leak_id).and_then(|i| state.leaks.get_mut(i)) {
            Some(stored) => {
                stored.status = status;
                Ok(())
            }
            None => bail!("leak {} not found", leak_id),
        }
    }

    async fn credential_exists(&self, fingerprint: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .credential_by_fingerprint
            .contains_key(fingerprint))
    }

    async fn host_id(&self, domain: &str) -> Result<i64> {
        let mut state = self.lock()?;
        if let Some(&id) = state.host_by_domain.get(domain) {
            return Ok(id);
        }
        let id = state.hosts.len() as i64 + 1;
        state.hosts.push(Host {
            id,
            domain: domain.to_string(),
            ..Host::default()
        });
        state.host_by_domain.insert(domain.to_string(), id);
        Ok(id)
    }

    async fn insert_credentials(&self, batch: &[NewCredential]) -> Result<BatchOutcome> {
        let mut state = self.lock()?;
        let mut outcome = BatchOutcome::default();
        for cred in batch {
            if state.credential_by_fingerprint.contains_key(&cred.fingerprint) {
                outcome.duplicates += 1;
                continue;
            }
            let id = state.credentials.len() as i64 + 1;
            state.credentials.push(Credential {
                id,
                email: cred.email.clone(),
                username: cred.username.clone(),
                password: cred.password.clone(),
                fingerprint: cred.fingerprint.clone(),
                valid: false,
                host_id: cred.host_id,
                leak_id: cred.leak_id,
                first_seen: cred.first_seen,
            });
            state
                .credential_by_fingerprint
                .insert(cred.fingerprint.clone(), id);
            outcome.inserted += 1;
        }
        Ok(outcome)
    }
}

fn leak_index(leak_id: i64) -> Option<usize> {
    usize::try_from(leak_id).ok()?.checked_sub(1)
}
