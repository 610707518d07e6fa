//! Transfer finalizer
//!
//! Settles an expired auction: the winner's escrow (debited when the bid
//! was placed) is credited to the outgoing admin, the winner becomes admin,
//! and the auction resets to CLOSED. The winner is not charged again.
//!
//! A repeated claim finds the network CLOSED with a `last_transfer` naming
//! the claimant and fails with `AlreadyTransferred`, so retries after a
//! timeout never settle twice.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::retry::RetryPolicy;
use super::window;
use crate::model::{Account, Auction, Bid, Network, TransferReceipt};
use crate::store::{AuctionStore, Clock, Versioned, WriteSet};
use crate::types::{AuctionError, Result};

/// Claim checks against the network. Returns the winning bid.
pub fn validate_claim(
    network: &Network,
    claimant_id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Bid> {
    match &network.auction {
        Auction::Closed => match &network.last_transfer {
            Some(transfer) if transfer.new_admin_id == claimant_id => {
                Err(AuctionError::AlreadyTransferred(claimant_id.to_string()))
            }
            _ => Err(AuctionError::NoStandingBid(network.network_id.clone())),
        },
        Auction::OpenNoBids { .. } => Err(AuctionError::NoStandingBid(network.network_id.clone())),
        Auction::ActiveBid { standing } => {
            if !window::is_window_expired(standing.accepted_at, now, window) {
                return Err(AuctionError::WindowNotExpired(window::window_expires_at(
                    standing.accepted_at,
                    window,
                )));
            }
            if standing.account_id != claimant_id {
                return Err(AuctionError::NotHighestBidder(format!(
                    "{} does not hold the standing bid on network {}",
                    claimant_id, network.network_id
                )));
            }
            Ok(standing.clone())
        }
    }
}

/// Compute the settlement write set from records read in this attempt.
pub fn plan_claim(
    network: Versioned<Network>,
    winner: Versioned<Account>,
    seller: Versioned<Account>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(WriteSet, TransferReceipt)> {
    let Versioned {
        record: mut network,
        version: network_version,
    } = network;
    let winning = validate_claim(&network, &winner.record.account_id, now, window)?;

    if seller.record.account_id != network.admin_account_id {
        return Err(AuctionError::InvalidState(format!(
            "settlement account {} is not the admin of network {}",
            seller.record.account_id, network.network_id
        )));
    }

    let network_id = network.network_id.clone();
    let Versioned {
        record: mut seller,
        version: seller_version,
    } = seller;
    let Versioned {
        record: mut winner,
        version: winner_version,
    } = winner;

    seller.credit(winning.amount)?;
    winner.clear_standing(&network_id);

    let receipt = TransferReceipt {
        network_id,
        previous_admin_id: seller.account_id.clone(),
        new_admin_id: winner.account_id.clone(),
        amount: winning.amount,
        transferred_at: now,
    };

    network.admin_account_id = winner.account_id.clone();
    network.auction = Auction::Closed;
    network.last_transfer = Some(receipt.clone());

    let writes = WriteSet::new()
        .network(network_version, network)
        .account(seller_version, seller)
        .account(winner_version, winner);

    Ok((writes, receipt))
}

async fn attempt_claim(
    store: &dyn AuctionStore,
    clock: &dyn Clock,
    window: Duration,
    network_id: &str,
    claimant_id: &str,
) -> Result<TransferReceipt> {
    let now = clock.now().await?;

    let network = store
        .get_network(network_id)
        .await?
        .ok_or_else(|| AuctionError::NetworkNotFound(network_id.to_string()))?;
    validate_claim(&network.record, claimant_id, now, window)?;

    let winner = store
        .get_account(claimant_id)
        .await?
        .ok_or_else(|| AuctionError::AccountNotFound(claimant_id.to_string()))?;
    let seller_id = network.record.admin_account_id.clone();
    let seller = store
        .get_account(&seller_id)
        .await?
        .ok_or(AuctionError::AccountNotFound(seller_id))?;

    let (writes, receipt) = plan_claim(network, winner, seller, now, window)?;
    store.commit(writes).await?;
    Ok(receipt)
}

/// Claim ownership, retrying version conflicts under `retry`.
pub async fn claim_ownership(
    store: &dyn AuctionStore,
    clock: &dyn Clock,
    retry: &RetryPolicy,
    window: Duration,
    network_id: &str,
    claimant_id: &str,
) -> Result<TransferReceipt> {
    let receipt = retry
        .run("claim_ownership", |_| {
            attempt_claim(store, clock, window, network_id, claimant_id)
        })
        .await?;

    info!(
        network = %network_id,
        previous_admin = %receipt.previous_admin_id,
        new_admin = %receipt.new_admin_id,
        amount = receipt.amount,
        "Ownership transferred"
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Duration {
        Duration::seconds(60)
    }

    fn active(bid_at: DateTime<Utc>) -> Network {
        let mut network = Network::new("net-1", "admin");
        network.auction = Auction::ActiveBid {
            standing: Bid {
                account_id: "bob".to_string(),
                amount: 260,
                accepted_at: bid_at,
            },
        };
        network
    }

    fn bob() -> Account {
        let mut bob = Account::new("bob", 40);
        bob.standing_bids.insert("net-1".to_string());
        bob
    }

    #[test]
    fn test_settlement_after_window() {
        let bid_at = Utc::now();
        let now = bid_at + Duration::seconds(61);
        let (writes, receipt) = plan_claim(
            Versioned::new(active(bid_at), 7),
            Versioned::new(bob(), 3),
            Versioned::new(Account::new("admin", 10), 2),
            now,
            window(),
        )
        .unwrap();

        assert_eq!(receipt.new_admin_id, "bob");
        assert_eq!(receipt.previous_admin_id, "admin");
        assert_eq!(receipt.amount, 260);

        let network = &writes.networks[0].record;
        assert_eq!(network.admin_account_id, "bob");
        assert_eq!(network.auction, Auction::Closed);
        assert_eq!(network.min_acquisition_value(), None);
        assert_eq!(network.last_transfer.as_ref(), Some(&receipt));

        let admin = &writes.accounts[0];
        assert_eq!((admin.record.tribet_balance, admin.version), (270, 2));
        let winner = &writes.accounts[1];
        // Escrow was taken at bid time; no second debit
        assert_eq!((winner.record.tribet_balance, winner.version), (40, 3));
        assert!(!winner.record.is_bidding());
    }

    #[test]
    fn test_claim_before_expiry_rejected() {
        let bid_at = Utc::now();
        let err = validate_claim(&active(bid_at), "bob", bid_at + Duration::seconds(59), window())
            .unwrap_err();
        assert!(matches!(err, AuctionError::WindowNotExpired(at) if at == bid_at + window()));
    }

    #[test]
    fn test_only_standing_bidder_may_claim() {
        let bid_at = Utc::now();
        let err = validate_claim(&active(bid_at), "alice", bid_at + Duration::seconds(61), window())
            .unwrap_err();
        assert!(matches!(err, AuctionError::NotHighestBidder(_)));
    }

    #[test]
    fn test_no_standing_bid() {
        let mut network = Network::new("net-1", "admin");
        network.auction = Auction::OpenNoBids { floor: Some(200) };
        let err = validate_claim(&network, "bob", Utc::now(), window()).unwrap_err();
        assert!(matches!(err, AuctionError::NoStandingBid(_)));

        let err = validate_claim(&Network::new("net-1", "admin"), "bob", Utc::now(), window())
            .unwrap_err();
        assert!(matches!(err, AuctionError::NoStandingBid(_)));
    }

    #[test]
    fn test_repeated_claim_is_already_transferred() {
        let bid_at = Utc::now();
        let now = bid_at + Duration::seconds(61);
        let (writes, _) = plan_claim(
            Versioned::new(active(bid_at), 1),
            Versioned::new(bob(), 1),
            Versioned::new(Account::new("admin", 0), 1),
            now,
            window(),
        )
        .unwrap();

        let settled = &writes.networks[0].record;
        let err = validate_claim(settled, "bob", now, window()).unwrap_err();
        assert!(matches!(err, AuctionError::AlreadyTransferred(_)));

        // Anyone else just sees a closed auction
        let err = validate_claim(settled, "alice", now, window()).unwrap_err();
        assert!(matches!(err, AuctionError::NoStandingBid(_)));
    }

    #[test]
    fn test_settlement_account_must_be_admin() {
        let bid_at = Utc::now();
        let err = plan_claim(
            Versioned::new(active(bid_at), 1),
            Versioned::new(bob(), 1),
            Versioned::new(Account::new("someone-else", 0), 1),
            bid_at + Duration::seconds(61),
            window(),
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidState(_)));
    }
}
