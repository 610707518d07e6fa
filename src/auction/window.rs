//! Bid window evaluation
//!
//! Expiry is always computed from the server clock at the moment a decision
//! is made. Countdown values handed to clients are advisory.

use chrono::{DateTime, Duration, Utc};

use crate::model::{AuctionPhase, Network};

/// True once `window` has elapsed since the last accepted bid
pub fn is_window_expired(last_bid_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(last_bid_at) >= window
}

/// Instant at which the window following `last_bid_at` closes
pub fn window_expires_at(last_bid_at: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    last_bid_at + window
}

/// Time left in the window, never negative
pub fn remaining(last_bid_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> Duration {
    let left = window_expires_at(last_bid_at, window).signed_duration_since(now);
    left.max(Duration::zero())
}

/// Auction phase as observed at `now`. An auction without bids has no
/// window and never expires.
pub fn phase(network: &Network, now: DateTime<Utc>, window: Duration) -> AuctionPhase {
    match network.last_bid_at() {
        Some(last_bid_at) if is_window_expired(last_bid_at, now, window) => {
            AuctionPhase::WindowExpired
        }
        _ => network.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auction, Bid};

    fn window() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_expiry_boundary() {
        let bid_at = Utc::now();

        assert!(!is_window_expired(bid_at, bid_at, window()));
        assert!(!is_window_expired(bid_at, bid_at + Duration::seconds(59), window()));
        // Exactly at the boundary the window is closed
        assert!(is_window_expired(bid_at, bid_at + Duration::seconds(60), window()));
        assert!(is_window_expired(bid_at, bid_at + Duration::seconds(61), window()));
    }

    #[test]
    fn test_clock_behind_last_bid_is_not_expired() {
        let bid_at = Utc::now();
        assert!(!is_window_expired(bid_at, bid_at - Duration::seconds(5), window()));
        assert_eq!(
            remaining(bid_at, bid_at - Duration::seconds(5), window()),
            Duration::seconds(65)
        );
    }

    #[test]
    fn test_remaining_clamps_to_zero() {
        let bid_at = Utc::now();
        assert_eq!(
            remaining(bid_at, bid_at + Duration::seconds(20), window()),
            Duration::seconds(40)
        );
        assert_eq!(remaining(bid_at, bid_at + Duration::seconds(600), window()), Duration::zero());
    }

    #[test]
    fn test_phase_derivation() {
        let now = Utc::now();
        let mut network = Network::new("net-1", "admin");
        assert_eq!(phase(&network, now, window()), AuctionPhase::Closed);

        // Open auctions without bids never expire
        network.auction = Auction::OpenNoBids { floor: Some(200) };
        assert_eq!(
            phase(&network, now + Duration::days(30), window()),
            AuctionPhase::OpenNoBids
        );

        network.auction = Auction::ActiveBid {
            standing: Bid {
                account_id: "alice".to_string(),
                amount: 250,
                accepted_at: now,
            },
        };
        assert_eq!(phase(&network, now, window()), AuctionPhase::ActiveBid);
        assert_eq!(
            phase(&network, now + Duration::seconds(61), window()),
            AuctionPhase::WindowExpired
        );
    }
}
