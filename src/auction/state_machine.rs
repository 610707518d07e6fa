//! Admin-driven auction transitions
//!
//! ```text
//! CLOSED ──open──▶ OPEN_NO_BIDS ──bid──▶ ACTIVE_BID ──window──▶ WINDOW_EXPIRED
//!    ▲                 │  floor (once)                               │
//!    └──────close──────┘                                   claim ────┘─▶ CLOSED
//! ```
//!
//! Only the network record changes here; no balance moves. Bids and claims
//! live in the coordinator and finalizer.

use tracing::{debug, info};

use super::retry::RetryPolicy;
use crate::model::{Auction, Network};
use crate::store::AuctionStore;
use crate::types::{AuctionError, Result};

/// An admin request against a network's auction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// CLOSED → OPEN_NO_BIDS
    Open,
    /// Set the floor while OPEN_NO_BIDS; allowed once per episode
    SetFloor(u64),
    /// Abort back to CLOSED while no bid stands
    Close,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open_for_acquisition",
            Self::SetFloor(_) => "set_floor_value",
            Self::Close => "close_acquisition",
        }
    }

    /// Validate the request against the current record and mutate it.
    pub fn apply(&self, network: &mut Network, requested_by: &str) -> Result<()> {
        if !network.is_admin(requested_by) {
            return Err(AuctionError::NotAuthorized(format!(
                "{} is not the admin of network {}",
                requested_by, network.network_id
            )));
        }

        match (*self, &network.auction) {
            (Self::Open, Auction::Closed) => {
                network.auction = Auction::OpenNoBids { floor: None };
                Ok(())
            }
            (Self::Open, _) => Err(AuctionError::InvalidState(format!(
                "network {} is already {}",
                network.network_id,
                network.state()
            ))),

            (Self::SetFloor(_), Auction::OpenNoBids { floor: Some(existing) }) => {
                Err(AuctionError::AlreadySet(*existing))
            }
            (Self::SetFloor(0), Auction::OpenNoBids { floor: None }) => Err(
                AuctionError::InvalidAmount("floor value must be greater than zero".to_string()),
            ),
            (Self::SetFloor(value), Auction::OpenNoBids { floor: None }) => {
                network.auction = Auction::OpenNoBids { floor: Some(value) };
                Ok(())
            }
            (Self::SetFloor(_), _) => Err(AuctionError::InvalidState(format!(
                "floor can only be set while OPEN_NO_BIDS, network {} is {}",
                network.network_id,
                network.state()
            ))),

            (Self::Close, Auction::OpenNoBids { .. }) => {
                network.auction = Auction::Closed;
                Ok(())
            }
            (Self::Close, Auction::ActiveBid { standing }) => Err(AuctionError::InvalidState(
                format!(
                    "network {} has a standing bid from {}",
                    network.network_id, standing.account_id
                ),
            )),
            (Self::Close, Auction::Closed) => Err(AuctionError::InvalidState(format!(
                "network {} is not open for acquisition",
                network.network_id
            ))),
        }
    }
}

/// Read, validate, and conditionally write one transition, retrying on
/// version conflicts.
pub async fn apply_transition(
    store: &dyn AuctionStore,
    retry: &RetryPolicy,
    network_id: &str,
    requested_by: &str,
    transition: Transition,
) -> Result<Network> {
    retry
        .run(transition.name(), |attempt| async move {
            let current = store
                .get_network(network_id)
                .await?
                .ok_or_else(|| AuctionError::NetworkNotFound(network_id.to_string()))?;

            let mut network = current.record;
            transition.apply(&mut network, requested_by)?;

            debug!(network = %network_id, attempt, version = current.version, "Writing transition");
            store.update_network(current.version, network.clone()).await?;

            info!(
                network = %network_id,
                caller = %requested_by,
                transition = transition.name(),
                state = %network.state(),
                "Auction transition applied"
            );
            Ok(network)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::model::Bid;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn network() -> Network {
        Network::new("net-1", "admin")
    }

    #[test]
    fn test_open_requires_admin() {
        let mut network = network();
        let err = Transition::Open.apply(&mut network, "mallory").unwrap_err();
        assert!(matches!(err, AuctionError::NotAuthorized(_)));
        assert_eq!(network.auction, Auction::Closed);
    }

    #[test]
    fn test_open_from_closed_only() {
        let mut network = network();
        Transition::Open.apply(&mut network, "admin").unwrap();
        assert_eq!(network.auction, Auction::OpenNoBids { floor: None });

        let err = Transition::Open.apply(&mut network, "admin").unwrap_err();
        assert!(matches!(err, AuctionError::InvalidState(_)));
    }

    #[test]
    fn test_floor_is_set_once() {
        let mut network = network();
        Transition::Open.apply(&mut network, "admin").unwrap();
        Transition::SetFloor(200).apply(&mut network, "admin").unwrap();
        assert_eq!(network.min_acquisition_value(), Some(200));

        let err = Transition::SetFloor(300)
            .apply(&mut network, "admin")
            .unwrap_err();
        assert!(matches!(err, AuctionError::AlreadySet(200)));
        assert_eq!(network.min_acquisition_value(), Some(200));
    }

    #[test]
    fn test_floor_rejects_zero_and_closed() {
        let mut network = network();
        let err = Transition::SetFloor(100)
            .apply(&mut network, "admin")
            .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidState(_)));

        Transition::Open.apply(&mut network, "admin").unwrap();
        let err = Transition::SetFloor(0).apply(&mut network, "admin").unwrap_err();
        assert!(matches!(err, AuctionError::InvalidAmount(_)));
    }

    #[test]
    fn test_zero_floor_on_closed_network_is_a_state_error() {
        let mut network = network();
        let err = Transition::SetFloor(0).apply(&mut network, "admin").unwrap_err();
        assert!(matches!(err, AuctionError::InvalidState(_)));
    }

    #[test]
    fn test_floor_and_close_require_admin() {
        let mut network = network();
        Transition::Open.apply(&mut network, "admin").unwrap();

        let err = Transition::SetFloor(200)
            .apply(&mut network, "mallory")
            .unwrap_err();
        assert!(matches!(err, AuctionError::NotAuthorized(_)));
        assert_eq!(network.min_acquisition_value(), None);

        let err = Transition::Close.apply(&mut network, "mallory").unwrap_err();
        assert!(matches!(err, AuctionError::NotAuthorized(_)));
        assert_eq!(network.auction, Auction::OpenNoBids { floor: None });
    }

    #[test]
    fn test_close_blocked_by_standing_bid() {
        let mut network = network();
        network.auction = Auction::ActiveBid {
            standing: Bid {
                account_id: "alice".to_string(),
                amount: 250,
                accepted_at: Utc::now(),
            },
        };

        let err = Transition::Close.apply(&mut network, "admin").unwrap_err();
        assert!(matches!(err, AuctionError::InvalidState(_)));
        assert_eq!(network.current_bidder(), Some("alice"));
    }

    #[test]
    fn test_close_resets_floor() {
        let mut network = network();
        Transition::Open.apply(&mut network, "admin").unwrap();
        Transition::SetFloor(200).apply(&mut network, "admin").unwrap();
        Transition::Close.apply(&mut network, "admin").unwrap();

        assert_eq!(network.auction, Auction::Closed);
        assert_eq!(network.min_acquisition_value(), None);
    }

    #[tokio::test]
    async fn test_apply_transition_retries_conflicts() {
        let store = MemoryStore::new();
        store.insert_network(network()).await.unwrap();
        store.inject_conflicts(2);

        let retry = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        });
        let network = apply_transition(&store, &retry, "net-1", "admin", Transition::Open)
            .await
            .unwrap();

        assert_eq!(network.auction, Auction::OpenNoBids { floor: None });
        let stored = store.get_network("net-1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_apply_transition_missing_network() {
        let store = MemoryStore::new();
        let retry = RetryPolicy::new(RetryConfig::default());
        let err = apply_transition(&store, &retry, "nope", "admin", Transition::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::NetworkNotFound(_)));
    }
}
