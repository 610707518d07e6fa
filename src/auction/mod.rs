//! Auction logic
//!
//! - `state_machine`: admin transitions (open, floor, close)
//! - `coordinator`: atomic escrowed bids
//! - `window`: server-side expiry evaluation
//! - `finalizer`: ownership transfer after the window closes
//! - `retry`: bounded optimistic retry shared by the writers
//! - `service`: the public operation surface

pub mod coordinator;
pub mod finalizer;
pub mod retry;
pub mod service;
pub mod state_machine;
pub mod window;

pub use coordinator::BidReceipt;
pub use retry::RetryPolicy;
pub use service::{AuctionService, AuctionStatus};
pub use state_machine::Transition;
