//! Bid transaction coordinator
//!
//! A bid escrows the full offered total from the bidder, refunds the
//! previous standing bidder's entire escrow, and installs the new high bid,
//! all in one commit over the network record and at most two accounts.
//! Every precondition is checked against records read in the same attempt;
//! the commit fails if any of them moved, and the attempt is re-run from
//! fresh reads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::retry::RetryPolicy;
use super::window;
use crate::model::{Account, Auction, Bid, Network};
use crate::store::{AuctionStore, Clock, Versioned, WriteSet};
use crate::types::{AuctionError, Result};

/// Outcome of an accepted bid
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BidReceipt {
    pub network_id: String,
    pub bidder_id: String,
    /// The accepted amount, now the value to beat
    pub new_min_value: u64,
    pub accepted_at: DateTime<Utc>,
    /// Advisory: when the window closes if no higher bid arrives
    pub window_expires_at: DateTime<Utc>,
    /// Account whose escrow was returned, if this bid displaced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_bidder_id: Option<String>,
}

/// Network-level bid checks. Returns the bid being displaced, if any.
pub fn validate_bid(
    network: &Network,
    bidder_id: &str,
    amount: u64,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Option<Bid>> {
    let previous = match &network.auction {
        Auction::Closed => {
            return Err(AuctionError::AuctionClosed(format!(
                "network {} is not open for acquisition",
                network.network_id
            )))
        }
        Auction::OpenNoBids { .. } => None,
        Auction::ActiveBid { standing } => {
            if window::is_window_expired(standing.accepted_at, now, window) {
                return Err(AuctionError::AuctionClosed(format!(
                    "bid window on network {} closed at {}",
                    network.network_id,
                    window::window_expires_at(standing.accepted_at, window)
                )));
            }
            Some(standing.clone())
        }
    };

    if network.is_admin(bidder_id) {
        return Err(AuctionError::NotAuthorized(format!(
            "admin {} cannot bid on network {}",
            bidder_id, network.network_id
        )));
    }

    let standing_value = network.min_acquisition_value().unwrap_or(0);
    if amount <= standing_value {
        return Err(AuctionError::BidTooLow {
            offered: amount,
            standing: standing_value,
        });
    }

    if network.current_bidder() == Some(bidder_id) {
        return Err(AuctionError::AlreadyStandingBidder(bidder_id.to_string()));
    }

    Ok(previous)
}

/// Compute the write set for a bid from records read in this attempt.
pub fn plan_bid(
    network: Versioned<Network>,
    bidder: Versioned<Account>,
    previous_bidder: Option<Versioned<Account>>,
    amount: u64,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(WriteSet, BidReceipt)> {
    let Versioned {
        record: mut network,
        version: network_version,
    } = network;
    let previous = validate_bid(&network, &bidder.record.account_id, amount, now, window)?;
    let network_id = network.network_id.clone();

    let Versioned {
        record: mut bidder,
        version: bidder_version,
    } = bidder;
    bidder.escrow(&network_id, amount)?;

    let mut writes = WriteSet::new();
    let mut refunded_bidder_id = None;

    match (previous, previous_bidder) {
        (Some(displaced), Some(account)) if account.record.account_id == displaced.account_id => {
            let Versioned {
                record: mut account,
                version,
            } = account;
            account.refund(&network_id, displaced.amount)?;
            refunded_bidder_id = Some(account.account_id.clone());
            writes = writes.account(version, account);
        }
        (Some(displaced), _) => {
            return Err(AuctionError::AccountNotFound(displaced.account_id));
        }
        (None, _) => {}
    }

    let bidder_id = bidder.account_id.clone();
    network.auction = Auction::ActiveBid {
        standing: Bid {
            account_id: bidder_id.clone(),
            amount,
            accepted_at: now,
        },
    };

    let writes = writes
        .account(bidder_version, bidder)
        .network(network_version, network);

    let receipt = BidReceipt {
        network_id,
        bidder_id,
        new_min_value: amount,
        accepted_at: now,
        window_expires_at: window::window_expires_at(now, window),
        refunded_bidder_id,
    };

    Ok((writes, receipt))
}

/// One read-validate-commit pass
async fn attempt_bid(
    store: &dyn AuctionStore,
    clock: &dyn Clock,
    window: Duration,
    network_id: &str,
    bidder_id: &str,
    amount: u64,
) -> Result<BidReceipt> {
    let now = clock.now().await?;

    let network = store
        .get_network(network_id)
        .await?
        .ok_or_else(|| AuctionError::NetworkNotFound(network_id.to_string()))?;
    let previous = validate_bid(&network.record, bidder_id, amount, now, window)?;

    let bidder = store
        .get_account(bidder_id)
        .await?
        .ok_or_else(|| AuctionError::AccountNotFound(bidder_id.to_string()))?;

    let previous_bidder = match &previous {
        Some(displaced) => {
            let account = store.get_account(&displaced.account_id).await?;
            if account.is_none() {
                error!(
                    network = %network_id,
                    bidder = %displaced.account_id,
                    "Standing bidder account is missing, escrow cannot be refunded"
                );
            }
            account
        }
        None => None,
    };

    let (writes, receipt) = plan_bid(network, bidder, previous_bidder, amount, now, window)?;
    store.commit(writes).await?;
    Ok(receipt)
}

/// Place a bid, retrying version conflicts under `retry`.
pub async fn place_bid(
    store: &dyn AuctionStore,
    clock: &dyn Clock,
    retry: &RetryPolicy,
    window: Duration,
    network_id: &str,
    bidder_id: &str,
    amount: u64,
) -> Result<BidReceipt> {
    let receipt = retry
        .run("place_bid", |_| {
            attempt_bid(store, clock, window, network_id, bidder_id, amount)
        })
        .await?;

    info!(
        network = %network_id,
        bidder = %bidder_id,
        amount,
        refunded = ?receipt.refunded_bidder_id,
        window_expires_at = %receipt.window_expires_at,
        "Bid accepted"
    );
    Ok(receipt)
}
