//! Premium name auctions
//!
//! Short names without a dot are sold to the highest bidder. Outbid amounts are
//! escrowed as refunds and handed back by a deferred `bidrefund`. The block hook closes
//! the highest open auction once its bid has stood long enough; a closed auction keeps
//! its row with the winning bid negated.

use crate::action::Action;
use crate::contract::SystemContract;
use crate::host::{Deferred, DeferredId, Host};
use helix_core::{
    ensure, AccountName, Asset, BlockTimestamp, HelixError, IndexedRow, Result, Row, TimePoint,
    MAX_NAME_LEN,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameBid {
    pub newname: AccountName,
    pub high_bidder: AccountName,
    /// Negative once the auction has closed
    pub high_bid: i64,
    pub last_bid_time: TimePoint,
}

impl NameBid {
    pub fn is_open(&self) -> bool {
        self.high_bid > 0
    }
}

impl Row for NameBid {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.newname.clone()
    }
}

impl IndexedRow for NameBid {
    type IndexKey = Reverse<i64>;

    /// Highest bid first; closed auctions sort last
    fn index_key(&self) -> Reverse<i64> {
        Reverse(self.high_bid)
    }
}

/// Amount owed to an outbid bidder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRefund {
    pub newname: AccountName,
    pub bidder: AccountName,
    pub amount: i64,
}

impl Row for BidRefund {
    type Key = (AccountName, AccountName);

    fn primary_key(&self) -> Self::Key {
        (self.newname.clone(), self.bidder.clone())
    }
}

fn check_premium_name(newname: &AccountName) -> Result<()> {
    ensure!(
        !newname.has_suffix(),
        HelixError::invalid("you can only bid on top-level suffix")
    );
    ensure!(
        !newname.is_empty(),
        HelixError::invalid("the empty name is not a valid account name to bid on")
    );
    ensure!(
        newname.len() < MAX_NAME_LEN,
        HelixError::invalid(format!(
            "accounts with {MAX_NAME_LEN} character names and no dots can be created without bidding"
        ))
    );
    Ok(())
}

impl<H: Host> SystemContract<'_, H> {
    pub fn bidname(&mut self, bidder: &AccountName, newname: &AccountName, bid: &Asset) -> Result<()> {
        self.require_auth(bidder)?;
        check_premium_name(newname)?;
        self.check_core(bid, "asset must be system token")?;
        ensure!(bid.amount > 0, HelixError::invalid("insufficient bid"));

        let names_account = self.config.accounts.names.clone();
        self.host
            .transfer(bidder, &names_account, bid, &format!("bid name {newname}"))?;

        let now = self.now();
        let Some(current) = self.state.name_bids.find(newname).cloned() else {
            self.state.name_bids.emplace(NameBid {
                newname: newname.clone(),
                high_bidder: bidder.clone(),
                high_bid: bid.amount,
                last_bid_time: now,
            })?;
            info!(%newname, %bidder, bid = bid.amount, "name auction opened");
            return Ok(());
        };

        ensure!(current.is_open(), HelixError::invalid("this auction has already closed"));
        let min_increment = current.high_bid / self.config.names.min_increment_divisor;
        ensure!(
            bid.amount - current.high_bid > min_increment,
            HelixError::invalid("must increase bid by 10%")
        );
        ensure!(
            current.high_bidder != *bidder,
            HelixError::invalid("account is already highest bidder")
        );

        let outbid = current.high_bidder.clone();
        let key = (newname.clone(), outbid.clone());
        if self.state.bid_refunds.contains(&key) {
            self.state
                .bid_refunds
                .modify(&key, |r| r.amount += current.high_bid)?;
        } else {
            self.state.bid_refunds.emplace(BidRefund {
                newname: newname.clone(),
                bidder: outbid.clone(),
                amount: current.high_bid,
            })?;
        }
        self.host.schedule(Deferred {
            id: DeferredId::BidRefund {
                bidder: outbid.clone(),
                name: newname.clone(),
            },
            action: Action::BidRefund {
                bidder: outbid.clone(),
                newname: newname.clone(),
            },
            authorizer: self.config.accounts.system.clone(),
            execute_at: now,
        })?;

        self.state.name_bids.modify(newname, |b| {
            b.high_bidder = bidder.clone();
            b.high_bid = bid.amount;
            b.last_bid_time = now;
        })?;
        info!(%newname, %bidder, %outbid, bid = bid.amount, "name outbid");
        Ok(())
    }

    /// Return an outbid amount; anyone may trigger it
    pub fn bidrefund(&mut self, bidder: &AccountName, newname: &AccountName) -> Result<()> {
        let key = (newname.clone(), bidder.clone());
        let amount = self.state.bid_refunds.get(&key, "refund not found")?.amount;
        let names_account = self.config.accounts.names.clone();
        self.pay(&names_account, bidder, amount, &format!("refund bid on name {newname}"))?;
        self.state.bid_refunds.erase(&key);
        Ok(())
    }

    /// Close the highest open auction if its bid has stood long enough
    pub(crate) fn close_highest_bid(&mut self, timestamp: BlockTimestamp) -> Result<()> {
        let Some(highest) = self.state.name_bids.iter_by_index().next().cloned() else {
            return Ok(());
        };
        let now = self.now();
        let rules = &self.config.names;
        let activated_at = self.state.global.thresh_activated_stake_time;
        let closable = highest.is_open()
            && now.micros_since(highest.last_bid_time) > rules.close_after_secs * 1_000_000
            && !activated_at.is_zero()
            && now.micros_since(activated_at) > rules.activation_lock_secs * 1_000_000;
        if !closable {
            return Ok(());
        }

        self.state.global.last_name_close = timestamp;
        self.state
            .name_bids
            .modify(&highest.newname, |b| b.high_bid = -b.high_bid)?;
        info!(newname = %highest.newname, winner = %highest.high_bidder, bid = highest.high_bid, "name auction closed");
        Ok(())
    }
}
