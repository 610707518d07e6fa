//! Account and network records

mod account;
mod network;

pub use account::Account;
pub use network::{Auction, AuctionPhase, Bid, Network, TransferReceipt};
