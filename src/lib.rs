//! Network Auction - escrowed acquisition of community networks
//!
//! Moves admin ownership of a network to the highest tribet bidder.
//! Bids escrow the full offered total, outbid accounts are refunded in the
//! same transaction, and the standing bidder claims ownership once the bid
//! window has elapsed by server time.
//!
//! ## Components
//!
//! - **State machine**: open, floor and close transitions on a network
//! - **Bid coordinator**: escrow/refund/high-bid update as one transaction
//! - **Window evaluator**: server-clock expiry of the bid window
//! - **Transfer finalizer**: settlement and ownership hand-off
//! - **Store**: versioned records with optimistic multi-record commits
//!   (in-memory or MongoDB)
//! - **Server**: HTTP/JSON surface over [`AuctionService`]

pub mod auction;
pub mod config;
pub mod model;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use auction::AuctionService;
pub use config::{Args, AuctionConfig};
pub use server::{run, AppState};
pub use types::{AuctionError, Result, StoreError};
