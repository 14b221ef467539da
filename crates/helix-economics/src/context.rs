//! Execution context for one action

use helix_core::{AccountName, BlockTimestamp, HelixError, Result, TimePoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current time, block slot and the accounts that signed the action
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    now: TimePoint,
    block_time: BlockTimestamp,
    authorizations: BTreeSet<AccountName>,
}

impl Context {
    /// Context at `now` with the block slot derived from it and no signers
    pub fn new(now: TimePoint) -> Self {
        Self {
            now,
            block_time: BlockTimestamp::from_time_point(now),
            authorizations: BTreeSet::new(),
        }
    }

    pub fn with_auth(mut self, account: AccountName) -> Self {
        self.authorizations.insert(account);
        self
    }

    pub fn with_block_time(mut self, block_time: BlockTimestamp) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn now(&self) -> TimePoint {
        self.now
    }

    pub fn block_time(&self) -> BlockTimestamp {
        self.block_time
    }

    pub fn has_auth(&self, account: &AccountName) -> bool {
        self.authorizations.contains(account)
    }

    pub fn require_auth(&self, account: &AccountName) -> Result<()> {
        if self.has_auth(account) {
            Ok(())
        } else {
            Err(HelixError::MissingAuthority(account.to_string()))
        }
    }

    pub fn signers(&self) -> impl Iterator<Item = &AccountName> {
        self.authorizations.iter()
    }
}
