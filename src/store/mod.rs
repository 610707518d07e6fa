//! Storage seam for accounts and networks
//!
//! Every record carries a version. Writers read a record and its version,
//! compute the new record, and commit conditionally on the version being
//! unchanged. `commit` applies a whole write set atomically or not at all,
//! which is what lets a bid touch the network and two accounts as one unit.
//!
//! Backends:
//! - [`MemoryStore`]: single-process, used in dev mode and tests
//! - [`MongoStore`]: MongoDB collections with session transactions

pub mod clock;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Account, Network};
use crate::types::StoreError;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
pub use mongo::{MongoClock, MongoStore};

/// Record version; incremented on every successful write
pub type Version = u64;

/// A record paired with the version it was read at (or is expected at)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: Version,
}

impl<T> Versioned<T> {
    pub fn new(record: T, version: Version) -> Self {
        Self { record, version }
    }
}

/// Records to write in one atomic commit.
///
/// Each entry's `version` is the version the caller read; the commit fails
/// with [`StoreError::Conflict`] if any record has moved on since.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    pub networks: Vec<Versioned<Network>>,
    pub accounts: Vec<Versioned<Account>>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, expected: Version, network: Network) -> Self {
        self.networks.push(Versioned::new(network, expected));
        self
    }

    pub fn account(mut self, expected: Version, account: Account) -> Self {
        self.accounts.push(Versioned::new(account, expected));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.accounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len() + self.accounts.len()
    }
}

/// Versioned storage for the ledger and the network registry
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn get_account(&self, account_id: &str)
        -> Result<Option<Versioned<Account>>, StoreError>;

    async fn get_network(&self, network_id: &str)
        -> Result<Option<Versioned<Network>>, StoreError>;

    /// Replace a network record if it is still at `expected`.
    /// Returns the new version.
    async fn update_network(&self, expected: Version, network: Network)
        -> Result<Version, StoreError>;

    /// Atomically apply every write in the set, or none of them.
    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError>;

    /// Create an account at version 1. Used by seeding paths only.
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    /// Create a network at version 1. Used by seeding paths only.
    async fn insert_network(&self, network: Network) -> Result<(), StoreError>;
}

/// Records loaded into a store at startup (dev mode) or by tests
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Fixtures {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub networks: Vec<Network>,
}

impl Fixtures {
    /// Parse fixtures from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Insert every fixture record into the store
    pub async fn load_into(self, store: &dyn AuctionStore) -> Result<(), StoreError> {
        for account in self.accounts {
            store.insert_account(account).await?;
        }
        for network in self.networks {
            store.insert_network(network).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_set_builder() {
        let writes = WriteSet::new()
            .network(3, Network::new("net-1", "admin"))
            .account(1, Account::new("alice", 10))
            .account(7, Account::new("bob", 20));

        assert_eq!(writes.len(), 3);
        assert!(!writes.is_empty());
        assert_eq!(writes.networks[0].version, 3);
        assert_eq!(writes.accounts[1].version, 7);
        assert!(WriteSet::new().is_empty());
    }

    #[test]
    fn test_fixtures_parse() {
        let fixtures: Fixtures = serde_json::from_str(
            r#"{
                "accounts": [{"accountId": "alice", "tribetBalance": 500}],
                "networks": [{"networkId": "net-1", "adminAccountId": "admin"}]
            }"#,
        )
        .unwrap();

        assert_eq!(fixtures.accounts.len(), 1);
        assert_eq!(fixtures.networks[0].admin_account_id, "admin");
    }
}
