//! MongoDB store
//!
//! Accounts and networks live in their own collections, keyed by their ids,
//! each document carrying a `version` field. Conditional writes filter on
//! `{_id, version}`; an unmatched filter means another writer got there
//! first. Multi-record commits run inside a client session transaction, so
//! a bid's refund, debit and network update land together or not at all.
//! Transactions need a replica set or sharded cluster.

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use chrono::Utc;
use mongodb::{
    error::{
        ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
    },
    options::IndexOptions,
    Client, ClientSession, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AuctionStore, Clock, Version, Versioned, WriteSet};
use crate::model::{Account, Network};
use crate::types::StoreError;

/// Collection name for accounts
pub const ACCOUNT_COLLECTION: &str = "accounts";

/// Collection name for networks
pub const NETWORK_COLLECTION: &str = "networks";

/// How many times to re-issue a commit whose outcome is unknown
const COMMIT_RETRIES: u32 = 3;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Account document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(flatten)]
    pub account: Account,

    pub version: i64,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime,
}

impl AccountDoc {
    fn new(account: Account, version: Version) -> Self {
        Self {
            id: account.account_id.clone(),
            account,
            version: to_i64(version),
            updated_at: DateTime::now(),
        }
    }

    fn into_versioned(self) -> Versioned<Account> {
        Versioned::new(self.account, to_version(self.version))
    }
}

impl IntoIndexes for AccountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

/// Network document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NetworkDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(flatten)]
    pub network: Network,

    pub version: i64,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime,
}

impl NetworkDoc {
    fn new(network: Network, version: Version) -> Self {
        Self {
            id: network.network_id.clone(),
            network,
            version: to_i64(version),
            updated_at: DateTime::now(),
        }
    }

    fn into_versioned(self) -> Versioned<Network> {
        Versioned::new(self.network, to_version(self.version))
    }
}

impl IntoIndexes for NetworkDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Networks owned by an account
            (
                doc! { "adminAccountId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("admin_account_index".to_string())
                        .build(),
                ),
            ),
            // Networks on which an account holds the standing bid
            (
                doc! { "auction.standing.accountId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("standing_bidder_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
        ]
    }
}

fn to_i64(version: Version) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn to_version(version: i64) -> Version {
    Version::try_from(version).unwrap_or_default()
}

/// Transient transaction errors (write conflicts, elections) are retryable
fn classify(err: mongodb::error::Error) -> StoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}

/// MongoDB-backed store
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    accounts: Collection<AccountDoc>,
    networks: Collection<NetworkDoc>,
}

impl MongoStore {
    /// Connect, verify the connection and apply indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            StoreError::Backend(format!("Failed to connect to MongoDB: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {}", e)))?;

        let database = client.database(db_name);
        let store = Self {
            accounts: database.collection(ACCOUNT_COLLECTION),
            networks: database.collection(NETWORK_COLLECTION),
            client,
        };

        apply_indexes(&store.accounts).await?;
        apply_indexes(&store.networks).await?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(store)
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn apply_writes(
        &self,
        session: &mut ClientSession,
        writes: &WriteSet,
    ) -> Result<(), StoreError> {
        for write in &writes.networks {
            let id = &write.record.network_id;
            let replacement = NetworkDoc::new(write.record.clone(), write.version + 1);
            let result = self
                .networks
                .replace_one(
                    doc! { "_id": id.as_str(), "version": to_i64(write.version) },
                    replacement,
                )
                .session(&mut *session)
                .await
                .map_err(classify)?;
            if result.matched_count == 0 {
                return Err(StoreError::Conflict(format!(
                    "{}/{} moved past version {}",
                    NETWORK_COLLECTION, id, write.version
                )));
            }
        }

        for write in &writes.accounts {
            let id = &write.record.account_id;
            let replacement = AccountDoc::new(write.record.clone(), write.version + 1);
            let result = self
                .accounts
                .replace_one(
                    doc! { "_id": id.as_str(), "version": to_i64(write.version) },
                    replacement,
                )
                .session(&mut *session)
                .await
                .map_err(classify)?;
            if result.matched_count == 0 {
                return Err(StoreError::Conflict(format!(
                    "{}/{} moved past version {}",
                    ACCOUNT_COLLECTION, id, write.version
                )));
            }
        }

        Ok(())
    }

    async fn commit_session(&self, session: &mut ClientSession) -> Result<(), StoreError> {
        let mut attempts = 0;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(()),
                Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempts < COMMIT_RETRIES =>
                {
                    attempts += 1;
                    warn!(attempt = attempts, error = %e, "Commit outcome unknown, re-issuing");
                }
                Err(e) => return Err(classify(e)),
            }
        }
    }
}

/// Apply schema-defined indexes
async fn apply_indexes<T>(collection: &Collection<T>) -> Result<(), StoreError>
where
    T: IntoIndexes + Send + Sync,
{
    let schema_indices = T::into_indices();

    if schema_indices.is_empty() {
        return Ok(());
    }

    let indices: Vec<IndexModel> = schema_indices
        .into_iter()
        .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
        .collect();

    collection
        .create_indexes(indices)
        .await
        .map_err(|e| StoreError::Backend(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

#[async_trait]
impl AuctionStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn get_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Versioned<Account>>, StoreError> {
        let found = self
            .accounts
            .find_one(doc! { "_id": account_id })
            .await
            .map_err(classify)?;
        Ok(found.map(AccountDoc::into_versioned))
    }

    async fn get_network(
        &self,
        network_id: &str,
    ) -> Result<Option<Versioned<Network>>, StoreError> {
        let found = self
            .networks
            .find_one(doc! { "_id": network_id })
            .await
            .map_err(classify)?;
        Ok(found.map(NetworkDoc::into_versioned))
    }

    async fn update_network(
        &self,
        expected: Version,
        network: Network,
    ) -> Result<Version, StoreError> {
        let id = network.network_id.clone();
        let version = expected + 1;
        let result = self
            .networks
            .replace_one(
                doc! { "_id": id.as_str(), "version": to_i64(expected) },
                NetworkDoc::new(network, version),
            )
            .await
            .map_err(classify)?;

        if result.matched_count == 0 {
            return Err(StoreError::Conflict(format!(
                "{}/{} moved past version {}",
                NETWORK_COLLECTION, id, expected
            )));
        }
        Ok(version)
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut session = self.client.start_session().await.map_err(classify)?;
        session.start_transaction().await.map_err(classify)?;

        if let Err(e) = self.apply_writes(&mut session, &writes).await {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!(error = %abort_err, "Failed to abort transaction");
            }
            return Err(e);
        }

        self.commit_session(&mut session).await
    }

    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let id = account.account_id.clone();
        match self.accounts.insert_one(AccountDoc::new(account, 1)).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::AlreadyExists(format!(
                "{}/{}",
                ACCOUNT_COLLECTION, id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_network(&self, network: Network) -> Result<(), StoreError> {
        let id = network.network_id.clone();
        match self.networks.insert_one(NetworkDoc::new(network, 1)).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::AlreadyExists(format!(
                "{}/{}",
                NETWORK_COLLECTION, id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

/// Clock read from the MongoDB server (`hello.localTime`), so every service
/// instance sharing the database agrees on window expiry.
#[derive(Clone)]
pub struct MongoClock {
    client: Client,
}

impl MongoClock {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Clock for MongoClock {
    async fn now(&self) -> Result<chrono::DateTime<Utc>, StoreError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "hello": 1 })
            .await
            .map_err(classify)?;
        let local_time = reply
            .get_datetime("localTime")
            .map_err(|e| StoreError::Backend(format!("hello.localTime missing: {}", e)))?;
        Ok(local_time.to_chrono())
    }
}
