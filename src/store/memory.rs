//! In-memory store
//!
//! All records live behind one `RwLock`. A commit validates every expected
//! version and applies the write set inside a single write-lock critical
//! section with no await points, so a cancelled caller either committed
//! everything or nothing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuctionStore, Version, Versioned, WriteSet};
use crate::model::{Account, Network};
use crate::types::StoreError;

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Versioned<Account>>,
    networks: HashMap<String, Versioned<Network>>,
}

/// Store for dev mode and tests
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Commits still to be rejected with a conflict (fault injection)
    forced_conflicts: AtomicU32,
    commits: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` writes with a version conflict.
    pub fn inject_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Sum of every account balance. Escrowed tribets are not included.
    pub async fn total_balance(&self) -> u128 {
        let tables = self.tables.read().await;
        tables
            .accounts
            .values()
            .map(|a| a.record.tribet_balance as u128)
            .sum()
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn check_version<T>(
    current: Option<&Versioned<T>>,
    kind: &str,
    id: &str,
    expected: Version,
) -> Result<(), StoreError> {
    match current {
        Some(existing) if existing.version == expected => Ok(()),
        Some(existing) => Err(StoreError::Conflict(format!(
            "{}/{} expected version {}, found {}",
            kind, id, expected, existing.version
        ))),
        None => Err(StoreError::Conflict(format!("{}/{} no longer exists", kind, id))),
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Versioned<Account>>, StoreError> {
        Ok(self.tables.read().await.accounts.get(account_id).cloned())
    }

    async fn get_network(
        &self,
        network_id: &str,
    ) -> Result<Option<Versioned<Network>>, StoreError> {
        Ok(self.tables.read().await.networks.get(network_id).cloned())
    }

    async fn update_network(
        &self,
        expected: Version,
        network: Network,
    ) -> Result<Version, StoreError> {
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        let mut tables = self.tables.write().await;
        let id = network.network_id.clone();
        check_version(tables.networks.get(&id), "networks", &id, expected)?;

        let version = expected + 1;
        tables.networks.insert(id, Versioned::new(network, version));
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        let mut tables = self.tables.write().await;

        // Validate the whole set before touching anything
        for write in &writes.networks {
            let id = &write.record.network_id;
            check_version(tables.networks.get(id), "networks", id, write.version)?;
        }
        for write in &writes.accounts {
            let id = &write.record.account_id;
            check_version(tables.accounts.get(id), "accounts", id, write.version)?;
        }

        let touched = writes.len();
        for write in writes.networks {
            let id = write.record.network_id.clone();
            tables
                .networks
                .insert(id, Versioned::new(write.record, write.version + 1));
        }
        for write in writes.accounts {
            let id = write.record.account_id.clone();
            tables
                .accounts
                .insert(id, Versioned::new(write.record, write.version + 1));
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(records = touched, "Committed write set");
        Ok(())
    }

    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(&account.account_id) {
            return Err(StoreError::AlreadyExists(format!(
                "accounts/{}",
                account.account_id
            )));
        }
        tables
            .accounts
            .insert(account.account_id.clone(), Versioned::new(account, 1));
        Ok(())
    }

    async fn insert_network(&self, network: Network) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.networks.contains_key(&network.network_id) {
            return Err(StoreError::AlreadyExists(format!(
                "networks/{}",
                network.network_id
            )));
        }
        tables
            .networks
            .insert(network.network_id.clone(), Versioned::new(network, 1));
        Ok(())
    }
}
