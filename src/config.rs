//! Configuration for the auction service
//!
//! CLI arguments and environment variable handling using clap. The library
//! itself only sees [`AuctionConfig`], built from the arguments or from
//! defaults.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Default length of the bid window
pub const DEFAULT_BID_WINDOW_SECS: u64 = 60;

/// Longest accepted bid window (30 days)
pub const MAX_BID_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Storage backend selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process store, for development and tests
    Memory,
    /// MongoDB replica set
    Mongo,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Network Auction - escrowed acquisition of community networks
#[derive(Parser, Debug, Clone)]
#[command(name = "network-auction")]
#[command(about = "Tribet auction service for network ownership transfer")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Storage backend
    #[arg(long, env = "STORE", value_enum, default_value = "memory")]
    pub store: StoreKind,

    /// MongoDB connection URI (must point at a replica set for transactions)
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "network_auction")]
    pub mongodb_db: String,

    /// Seconds after the last accepted bid before the window closes
    #[arg(long, env = "BID_WINDOW_SECS", default_value_t = DEFAULT_BID_WINDOW_SECS)]
    pub bid_window_secs: u64,

    /// Transaction attempts before a conflict is reported as contention
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value = "5")]
    pub retry_max_attempts: u32,

    /// Base backoff between transaction attempts in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "20")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value = "250")]
    pub retry_max_delay_ms: u64,

    /// Per-operation timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Enable development mode (allows fixture seeding into any store)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JSON fixture file with accounts and networks to load at startup
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bid_window_secs == 0 {
            return Err("BID_WINDOW_SECS must be greater than zero".to_string());
        }

        if self.bid_window_secs > MAX_BID_WINDOW_SECS {
            return Err(format!(
                "BID_WINDOW_SECS must be at most {}",
                MAX_BID_WINDOW_SECS
            ));
        }

        if self.retry_max_attempts == 0 {
            return Err("RETRY_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(
                "RETRY_BASE_DELAY_MS must be less than or equal to RETRY_MAX_DELAY_MS".to_string(),
            );
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.store == StoreKind::Mongo && self.seed_file.is_some() && !self.dev_mode {
            return Err("SEED_FILE with the mongo store requires DEV_MODE".to_string());
        }

        Ok(())
    }

    /// Service configuration derived from the arguments
    pub fn auction_config(&self) -> AuctionConfig {
        AuctionConfig {
            bid_window_secs: self.bid_window_secs,
            request_timeout_ms: self.request_timeout_ms,
            retry: RetryConfig {
                max_attempts: self.retry_max_attempts,
                base_delay_ms: self.retry_base_delay_ms,
                max_delay_ms: self.retry_max_delay_ms,
            },
        }
    }
}

/// Auction service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Bid window length in seconds
    pub bid_window_secs: u64,
    /// Per-operation timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Optimistic transaction retry policy
    pub retry: RetryConfig,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            bid_window_secs: DEFAULT_BID_WINDOW_SECS,
            request_timeout_ms: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

impl AuctionConfig {
    /// Bid window as a chrono duration, for timestamp arithmetic
    pub fn bid_window(&self) -> chrono::Duration {
        let secs = self.bid_window_secs.min(MAX_BID_WINDOW_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Retry policy for version conflicts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt
    pub base_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["network-auction"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_args_are_valid() {
        let args = parse(&[]);
        assert_eq!(args.store, StoreKind::Memory);
        assert_eq!(args.bid_window_secs, 60);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_window() {
        let args = parse(&["--bid-window-secs", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let args = parse(&["--retry-base-delay-ms", "500", "--retry-max-delay-ms", "100"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_mongo_seed_requires_dev_mode() {
        let args = parse(&["--store", "mongo", "--seed-file", "fixtures.json"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--store",
            "mongo",
            "--seed-file",
            "fixtures.json",
            "--dev-mode",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_auction_config_from_args() {
        let args = parse(&["--bid-window-secs", "90", "--retry-max-attempts", "3"]);
        let config = args.auction_config();

        assert_eq!(config.bid_window(), chrono::Duration::seconds(90));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
    }
}
