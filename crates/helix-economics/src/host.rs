//! Host capabilities
//!
//! The system account never reaches for ambient services. Everything outside its own
//! state (token balances, per-account resource limits, privileged intrinsics, the
//! producer schedule and deferred execution) comes through these traits. The engine
//! brackets every action with `Transactional` so host-side effects are discarded
//! together with the state when an action fails.

use crate::action::Action;
use crate::state::BlockchainParameters;
use helix_core::{AccountName, Asset, PublicKey, Result, Symbol, TimePoint};
use serde::{Deserialize, Serialize};

/// Fungible token ledger
pub trait Ledger {
    fn transfer(&mut self, from: &AccountName, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()>;

    /// Mint `quantity` into `to`
    fn issue(&mut self, to: &AccountName, quantity: &Asset, memo: &str) -> Result<()>;

    fn supply(&self, symbol: &Symbol) -> Result<Asset>;
}

/// Per-account resource caps; `-1` means unlimited
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub ram_bytes: i64,
    pub net_weight: i64,
    pub cpu_weight: i64,
}

impl Limits {
    pub const UNLIMITED: Limits = Limits {
        ram_bytes: -1,
        net_weight: -1,
        cpu_weight: -1,
    };
}

pub trait ResourceLimits {
    fn get_limits(&self, account: &AccountName) -> Limits;

    fn set_limits(&mut self, account: &AccountName, limits: Limits) -> Result<()>;
}

/// Privileged chain intrinsics
pub trait Privileges {
    fn set_privileged(&mut self, account: &AccountName, privileged: bool) -> Result<()>;

    fn set_blockchain_parameters(&mut self, params: &BlockchainParameters) -> Result<()>;
}

/// A scheduled producer and its block signing key
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProducerKey {
    pub producer_name: AccountName,
    pub block_signing_key: PublicKey,
}

pub trait SchedulePublisher {
    /// Propose a new schedule; `Ok(None)` means the chain declined it
    fn set_proposed_producers(&mut self, schedule: &[ProducerKey]) -> Result<Option<u64>>;
}

/// Identity of a deferred action; scheduling an id that is already pending replaces it
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeferredId {
    Refund(AccountName),
    BidRefund {
        bidder: AccountName,
        name: AccountName,
    },
}

/// An action to run later under `authorizer`'s authority
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deferred {
    pub id: DeferredId,
    pub action: Action,
    pub authorizer: AccountName,
    pub execute_at: TimePoint,
}

pub trait Scheduler {
    fn schedule(&mut self, deferred: Deferred) -> Result<()>;

    /// Cancel a pending action; returns whether one existed
    fn cancel(&mut self, id: &DeferredId) -> bool;
}

/// Atomic boundary around one action
pub trait Transactional {
    fn checkpoint(&mut self);

    fn commit(&mut self);

    fn rollback(&mut self);
}

/// Everything the engine needs from its environment
pub trait Host:
    Ledger + ResourceLimits + Privileges + SchedulePublisher + Scheduler + Transactional
{
}

impl<T> Host for T where
    T: Ledger + ResourceLimits + Privileges + SchedulePublisher + Scheduler + Transactional
{
}
