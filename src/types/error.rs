//! Error types for the auction service
//!
//! `AuctionError` is what callers of the service see. `StoreError` is what
//! storage backends report; conflicts become `Contention` once retries are
//! exhausted.

use chrono::{DateTime, Utc};
use hyper::StatusCode;

/// Errors surfaced by auction operations
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Network not found: {0}")]
    NetworkNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Floor value already set to {0}")]
    AlreadySet(u64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Auction closed: {0}")]
    AuctionClosed(String),

    #[error("Bid too low: offered {offered}, must exceed {standing}")]
    BidTooLow { offered: u64, standing: u64 },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Account {0} already holds the standing bid")]
    AlreadyStandingBidder(String),

    #[error("Bid window open until {0}")]
    WindowNotExpired(DateTime<Utc>),

    #[error("Not the highest bidder: {0}")]
    NotHighestBidder(String),

    #[error("No standing bid on network {0}")]
    NoStandingBid(String),

    #[error("Ownership already transferred to {0}")]
    AlreadyTransferred(String),

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Contention: {0}")]
    Contention(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Store error: {0}")]
    Store(String),
}

impl AuctionError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkNotFound(_) => "NETWORK_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::NotAuthorized(_) => "NOT_AUTHORIZED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AlreadySet(_) => "ALREADY_SET",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::AuctionClosed(_) => "AUCTION_CLOSED",
            Self::BidTooLow { .. } => "BID_TOO_LOW",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AlreadyStandingBidder(_) => "ALREADY_STANDING_BIDDER",
            Self::WindowNotExpired(_) => "WINDOW_NOT_EXPIRED",
            Self::NotHighestBidder(_) => "NOT_HIGHEST_BIDDER",
            Self::NoStandingBid(_) => "NO_STANDING_BID",
            Self::AlreadyTransferred(_) => "ALREADY_TRANSFERRED",
            Self::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            Self::Contention(_) => "CONTENTION",
            Self::Timeout(_) => "TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NetworkNotFound(_) | Self::AccountNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAuthorized(_) | Self::NotHighestBidder(_) => StatusCode::FORBIDDEN,
            Self::InvalidState(_)
            | Self::AlreadySet(_)
            | Self::AuctionClosed(_)
            | Self::AlreadyStandingBidder(_)
            | Self::WindowNotExpired(_)
            | Self::NoStandingBid(_)
            | Self::AlreadyTransferred(_) => StatusCode::CONFLICT,
            Self::InvalidAmount(_) | Self::BidTooLow { .. } | Self::InsufficientFunds { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::ArithmeticOverflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Contention(_) | Self::Timeout(_) | Self::Store(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Whether a client may resubmit the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_) | Self::Timeout(_))
    }
}

impl From<StoreError> for AuctionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Contention(msg),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Errors reported by storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record changed between read and commit
    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result type alias for auction operations
pub type Result<T> = std::result::Result<T, AuctionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_contention() {
        let err: AuctionError = StoreError::Conflict("networks/n1".to_string()).into();
        assert!(matches!(err, AuctionError::Contention(_)));
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_business_rule_errors_are_not_retryable() {
        let low = AuctionError::BidTooLow {
            offered: 260,
            standing: 260,
        };
        assert!(!low.is_retryable());
        assert_eq!(low.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(low.code(), "BID_TOO_LOW");

        let funds = AuctionError::InsufficientFunds {
            balance: 40,
            required: 1000,
        };
        assert!(!funds.is_retryable());
        assert_eq!(funds.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_backend_failure_maps_to_store() {
        let err: AuctionError = StoreError::Backend("connection reset".to_string()).into();
        assert!(matches!(err, AuctionError::Store(_)));
        assert!(!err.is_retryable());
    }
}
