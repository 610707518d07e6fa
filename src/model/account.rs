//! Account record
//!
//! A user's tribet balance plus the networks on which it holds the standing
//! bid. Balances only move through escrow, refund and settlement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{AuctionError, Result};

/// A user's economic identity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque account identifier
    pub account_id: String,

    /// Spendable tribets (escrowed amounts are already deducted)
    pub tribet_balance: u64,

    /// Networks on which this account holds the standing bid
    #[serde(default)]
    pub standing_bids: BTreeSet<String>,
}

impl Account {
    /// Create an account with no standing bids
    pub fn new(account_id: impl Into<String>, tribet_balance: u64) -> Self {
        Self {
            account_id: account_id.into(),
            tribet_balance,
            standing_bids: BTreeSet::new(),
        }
    }

    /// True while the account is the standing bidder on any network
    pub fn is_bidding(&self) -> bool {
        !self.standing_bids.is_empty()
    }

    /// True if the account stands on this particular network
    pub fn is_bidding_on(&self, network_id: &str) -> bool {
        self.standing_bids.contains(network_id)
    }

    /// Debit the full offered total and mark the account as standing bidder.
    pub fn escrow(&mut self, network_id: &str, amount: u64) -> Result<()> {
        if self.tribet_balance < amount {
            return Err(AuctionError::InsufficientFunds {
                balance: self.tribet_balance,
                required: amount,
            });
        }
        self.tribet_balance -= amount;
        self.standing_bids.insert(network_id.to_string());
        Ok(())
    }

    /// Return an outbid escrow and drop the standing flag for the network.
    pub fn refund(&mut self, network_id: &str, amount: u64) -> Result<()> {
        self.credit(amount)?;
        self.standing_bids.remove(network_id);
        Ok(())
    }

    /// Add tribets to the balance
    pub fn credit(&mut self, amount: u64) -> Result<()> {
        self.tribet_balance = self.tribet_balance.checked_add(amount).ok_or_else(|| {
            AuctionError::ArithmeticOverflow(format!(
                "crediting {} to account {}",
                amount, self.account_id
            ))
        })?;
        Ok(())
    }

    /// Drop the standing flag after the escrow has been settled
    pub fn clear_standing(&mut self, network_id: &str) {
        self.standing_bids.remove(network_id);
    }
}
