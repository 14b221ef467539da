//! In-memory host
//!
//! A complete [`Host`](crate::host::Host) backed by hash maps: a token ledger with
//! per-symbol supply, resource limits, privileged flags, published schedules and a
//! deferred-action queue. `checkpoint` pushes a copy of everything; `rollback` pops
//! it back.

use crate::host::{
    Deferred, DeferredId, Ledger, Limits, Privileges, ProducerKey, ResourceLimits,
    SchedulePublisher, Scheduler, Transactional,
};
use crate::state::BlockchainParameters;
use hashbrown::{HashMap, HashSet};
use helix_core::{ensure, AccountName, Asset, HelixError, Result, Symbol, TimePoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Token definition: issuer, circulating supply and cap
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenStats {
    pub issuer: AccountName,
    pub supply: Asset,
    pub max_supply: Asset,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLedger {
    tokens: HashMap<String, TokenStats>,
    balances: HashMap<(AccountName, String), i64>,
}

impl MemoryLedger {
    /// Register a token with a cap and an issuer
    pub fn create(&mut self, issuer: AccountName, max_supply: Asset) -> Result<()> {
        ensure!(max_supply.is_positive(), HelixError::invalid("max-supply must be positive"));
        let code = max_supply.symbol.code().to_string();
        ensure!(
            !self.tokens.contains_key(&code),
            HelixError::invalid("token with symbol already exists")
        );
        let supply = Asset::zero(max_supply.symbol.clone());
        self.tokens.insert(
            code,
            TokenStats {
                issuer,
                supply,
                max_supply,
            },
        );
        Ok(())
    }

    pub fn balance(&self, account: &AccountName, symbol: &Symbol) -> i64 {
        self.balances
            .get(&(account.clone(), symbol.code().to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self, symbol: &Symbol) -> Option<&TokenStats> {
        self.tokens.get(symbol.code())
    }

    fn token_for(&self, quantity: &Asset) -> Result<&TokenStats> {
        let stats = self
            .tokens
            .get(quantity.symbol.code())
            .ok_or_else(|| HelixError::not_found("token with symbol does not exist"))?;
        ensure!(
            stats.supply.symbol == quantity.symbol,
            HelixError::invalid("symbol precision mismatch")
        );
        Ok(stats)
    }

    fn credit(&mut self, account: &AccountName, quantity: &Asset) -> Result<()> {
        let entry = self
            .balances
            .entry((account.clone(), quantity.symbol.code().to_string()))
            .or_insert(0);
        *entry = entry
            .checked_add(quantity.amount)
            .ok_or_else(|| HelixError::invariant("balance overflow"))?;
        Ok(())
    }

    fn debit(&mut self, account: &AccountName, quantity: &Asset) -> Result<()> {
        let key = (account.clone(), quantity.symbol.code().to_string());
        let balance = self.balances.get(&key).copied().unwrap_or(0);
        ensure!(
            balance >= quantity.amount,
            HelixError::insufficient(format!("overdrawn balance of {account}"))
        );
        self.balances.insert(key, balance - quantity.amount);
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn transfer(&mut self, from: &AccountName, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()> {
        ensure!(from != to, HelixError::invalid("cannot transfer to self"));
        ensure!(quantity.is_positive(), HelixError::invalid("must transfer positive quantity"));
        self.token_for(quantity)?;
        self.debit(from, quantity)?;
        self.credit(to, quantity)?;
        debug!(%from, %to, %quantity, memo, "transfer");
        Ok(())
    }

    fn issue(&mut self, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()> {
        ensure!(quantity.is_positive(), HelixError::invalid("must issue positive quantity"));
        let stats = self.token_for(quantity)?;
        ensure!(
            quantity.amount <= stats.max_supply.amount - stats.supply.amount,
            HelixError::invalid("quantity exceeds available supply")
        );
        if let Some(stats) = self.tokens.get_mut(quantity.symbol.code()) {
            stats.supply.amount += quantity.amount;
        }
        self.credit(to, quantity)?;
        debug!(%to, %quantity, memo, "issue");
        Ok(())
    }

    fn supply(&self, symbol: &Symbol) -> Result<Asset> {
        self.tokens
            .get(symbol.code())
            .map(|stats| stats.supply.clone())
            .ok_or_else(|| HelixError::not_found("token with symbol does not exist"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct HostData {
    ledger: MemoryLedger,
    limits: HashMap<AccountName, Limits>,
    privileged: HashSet<AccountName>,
    parameters: Option<BlockchainParameters>,
    schedules: Vec<Vec<ProducerKey>>,
    deferred: BTreeMap<DeferredId, Deferred>,
}

/// Host that keeps everything in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
    data: HostData,
    checkpoints: Vec<HostData>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.data.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        &mut self.data.ledger
    }

    pub fn balance(&self, account: &AccountName, symbol: &Symbol) -> i64 {
        self.data.ledger.balance(account, symbol)
    }

    pub fn is_privileged(&self, account: &AccountName) -> bool {
        self.data.privileged.contains(account)
    }

    pub fn parameters(&self) -> Option<&BlockchainParameters> {
        self.data.parameters.as_ref()
    }

    /// Every schedule accepted so far, oldest first
    pub fn schedules(&self) -> &[Vec<ProducerKey>] {
        &self.data.schedules
    }

    pub fn pending(&self) -> impl Iterator<Item = &Deferred> {
        self.data.deferred.values()
    }

    pub fn pending_for(&self, id: &DeferredId) -> Option<&Deferred> {
        self.data.deferred.get(id)
    }

    /// Remove and return every deferred action due at `now`, earliest first
    pub fn take_due(&mut self, now: TimePoint) -> Vec<Deferred> {
        let due: Vec<DeferredId> = self
            .data
            .deferred
            .iter()
            .filter(|(_, d)| d.execute_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        let mut actions: Vec<Deferred> = due
            .iter()
            .filter_map(|id| self.data.deferred.remove(id))
            .collect();
        actions.sort_by_key(|d| d.execute_at);
        actions
    }
}

impl Ledger for MemoryHost {
    fn transfer(&mut self, from: &AccountName, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()> {
        self.data.ledger.transfer(from, to, quantity, memo)
    }

    fn issue(&mut self, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()> {
        self.data.ledger.issue(to, quantity, memo)
    }

    fn supply(&self, symbol: &Symbol) -> Result<Asset> {
        self.data.ledger.supply(symbol)
    }
}

impl ResourceLimits for MemoryHost {
    fn get_limits(&self, account: &AccountName) -> Limits {
        self.data
            .limits
            .get(account)
            .copied()
            .unwrap_or(Limits::UNLIMITED)
    }

    fn set_limits(&mut self, account: &AccountName, limits: Limits) -> Result<()> {
        ensure!(
            limits.ram_bytes >= -1 && limits.net_weight >= -1 && limits.cpu_weight >= -1,
            HelixError::invalid("resource limits must be -1 or non-negative")
        );
        self.data.limits.insert(account.clone(), limits);
        Ok(())
    }
}

impl Privileges for MemoryHost {
    fn set_privileged(&mut self, account: &AccountName, privileged: bool) -> Result<()> {
        if privileged {
            self.data.privileged.insert(account.clone());
        } else {
            self.data.privileged.remove(account);
        }
        Ok(())
    }

    fn set_blockchain_parameters(&mut self, params: &BlockchainParameters) -> Result<()> {
        self.data.parameters = Some(params.clone());
        Ok(())
    }
}

impl SchedulePublisher for MemoryHost {
    /// Declines a schedule identical to the latest accepted one
    fn set_proposed_producers(&mut self, schedule: &[ProducerKey]) -> Result<Option<u64>> {
        if self.data.schedules.last().map(Vec::as_slice) == Some(schedule) {
            return Ok(None);
        }
        self.data.schedules.push(schedule.to_vec());
        Ok(Some(self.data.schedules.len() as u64))
    }
}

impl Scheduler for MemoryHost {
    fn schedule(&mut self, deferred: Deferred) -> Result<()> {
        self.data.deferred.insert(deferred.id.clone(), deferred);
        Ok(())
    }

    fn cancel(&mut self, id: &DeferredId) -> bool {
        self.data.deferred.remove(id).is_some()
    }
}

impl Transactional for MemoryHost {
    fn checkpoint(&mut self) {
        self.checkpoints.push(self.data.clone());
    }

    fn commit(&mut self) {
        self.checkpoints.pop();
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.checkpoints.pop() {
            self.data = saved;
        }
    }
}
