//! Shared types for the auction service

pub mod error;

pub use error::{AuctionError, Result, StoreError};
