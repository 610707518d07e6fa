//! Auction service
//!
//! Public operation surface over a store and a trusted clock. Holds no
//! auction state of its own; every call reads, validates and commits
//! through the store, bounded by the configured per-operation timeout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use super::coordinator::{self, BidReceipt};
use super::finalizer;
use super::retry::RetryPolicy;
use super::state_machine::{apply_transition, Transition};
use super::window;
use crate::config::AuctionConfig;
use crate::model::{Account, AuctionPhase, Network, TransferReceipt};
use crate::store::{AuctionStore, Clock};
use crate::types::{AuctionError, Result};

/// Read-only view of a network's auction at a given server time
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionStatus {
    pub network_id: String,
    pub admin_account_id: String,
    pub state: AuctionPhase,
    pub min_value: Option<u64>,
    pub current_bidder: Option<String>,
    pub last_bid_at: Option<DateTime<Utc>>,
    /// Advisory countdown target; decisions use the server clock
    pub window_expires_at: Option<DateTime<Utc>>,
    pub seconds_remaining: Option<i64>,
    pub server_time: DateTime<Utc>,
}

impl AuctionStatus {
    fn observe(network: &Network, now: DateTime<Utc>, window: chrono::Duration) -> Self {
        let last_bid_at = network.last_bid_at();
        Self {
            network_id: network.network_id.clone(),
            admin_account_id: network.admin_account_id.clone(),
            state: window::phase(network, now, window),
            min_value: network.min_acquisition_value(),
            current_bidder: network.current_bidder().map(str::to_string),
            last_bid_at,
            window_expires_at: last_bid_at.map(|at| window::window_expires_at(at, window)),
            seconds_remaining: last_bid_at
                .map(|at| window::remaining(at, now, window).num_seconds()),
            server_time: now,
        }
    }
}

pub struct AuctionService {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
    config: AuctionConfig,
    retry: RetryPolicy,
}

impl AuctionService {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>, config: AuctionConfig) -> Self {
        let retry = RetryPolicy::new(config.retry.clone());
        Self {
            store,
            clock,
            config,
            retry,
        }
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AuctionStore> {
        &self.store
    }

    /// Current trusted server time
    pub async fn server_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.clock.now().await?)
    }

    /// Open a CLOSED network for acquisition
    pub async fn open_for_acquisition(&self, network_id: &str, caller_id: &str) -> Result<()> {
        self.transition(network_id, caller_id, Transition::Open).await
    }

    /// Set the floor of an open auction; allowed once per episode
    pub async fn set_floor_value(
        &self,
        network_id: &str,
        caller_id: &str,
        value: u64,
    ) -> Result<()> {
        self.transition(network_id, caller_id, Transition::SetFloor(value))
            .await
    }

    /// Abort an open auction that has no standing bid
    pub async fn close_acquisition(&self, network_id: &str, caller_id: &str) -> Result<()> {
        self.transition(network_id, caller_id, Transition::Close).await
    }

    pub async fn place_bid(
        &self,
        network_id: &str,
        bidder_id: &str,
        amount: u64,
    ) -> Result<BidReceipt> {
        self.bounded(
            "place_bid",
            coordinator::place_bid(
                self.store.as_ref(),
                self.clock.as_ref(),
                &self.retry,
                self.config.bid_window(),
                network_id,
                bidder_id,
                amount,
            ),
        )
        .await
    }

    pub async fn claim_ownership(
        &self,
        network_id: &str,
        claimant_id: &str,
    ) -> Result<TransferReceipt> {
        self.bounded(
            "claim_ownership",
            finalizer::claim_ownership(
                self.store.as_ref(),
                self.clock.as_ref(),
                &self.retry,
                self.config.bid_window(),
                network_id,
                claimant_id,
            ),
        )
        .await
    }

    pub async fn get_auction_status(&self, network_id: &str) -> Result<AuctionStatus> {
        self.bounded("get_auction_status", async {
            let now = self.clock.now().await?;
            let network = self
                .store
                .get_network(network_id)
                .await?
                .ok_or_else(|| AuctionError::NetworkNotFound(network_id.to_string()))?;
            Ok(AuctionStatus::observe(
                &network.record,
                now,
                self.config.bid_window(),
            ))
        })
        .await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.bounded("get_account", async {
            let account = self
                .store
                .get_account(account_id)
                .await?
                .ok_or_else(|| AuctionError::AccountNotFound(account_id.to_string()))?;
            Ok(account.record)
        })
        .await
    }

    async fn transition(
        &self,
        network_id: &str,
        caller_id: &str,
        transition: Transition,
    ) -> Result<()> {
        self.bounded(
            transition.name(),
            apply_transition(
                self.store.as_ref(),
                &self.retry,
                network_id,
                caller_id,
                transition,
            ),
        )
        .await
        .map(|_| ())
    }

    /// Apply the per-operation timeout. A timed-out operation is dropped
    /// before or after its single commit, never partway through it.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.config.request_timeout_ms,
                    "Operation timed out"
                );
                Err(AuctionError::Timeout(self.config.request_timeout_ms))
            }
        }
    }
}
