//! # Helix Economics - System Account Engine
//!
//! Resource and incentive economics of the Helix system account.
//!
//! ## Key Features
//!
//! - **RAM market**: Bancor pool pricing RAM against the core token, 0.5% fee per trade
//! - **Bandwidth staking**: NET/CPU delegation with delayed, mergeable refunds
//! - **Linear vote age**: votes accrue age by quantity and elapsed time
//! - **Producer election**: top producers by votes become the proposed schedule
//! - **Rewards**: continuous inflation split into per-block and per-vote buckets,
//!   shared with voters through a commission
//! - **Name auctions** and one-time **airdrop grants**
//!
//! ## Token Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         HELIX TOKEN FLOWS                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  buyram / sellram      payer  <->  helix.ram     (fee -> helix.ramfee)  │
//! │  delegatebw / refund   owner  <->  helix.stake                          │
//! │  bidname / bidrefund   bidder <->  helix.names                          │
//! │  inflation             helix  -->  helix.bpay / helix.vpay / saving     │
//! │  claimprod / claimvoter  bpay, vpay  -->  producer, voters              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution
//!
//! An [`Engine`] applies one [`Action`] at a time under a [`Context`] (time and
//! signers). Each action is atomic: if it fails, neither [`SystemState`] nor the
//! [`Host`] keeps any of its effects.

pub mod action;
pub mod admin;
pub mod airdrop;
pub mod bandwidth;
pub mod config;
pub mod context;
pub mod contract;
pub mod engine;
pub mod host;
pub mod market;
pub mod memory;
pub mod names;
pub mod producers;
pub mod resources;
pub mod rewards;
pub mod state;
pub mod voting;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use action::{Action, COMMANDS};
pub use config::{ConfigError, EconomicsConfig};
pub use context::Context;
pub use contract::SystemContract;
pub use engine::{DeferredOutcome, Engine};
pub use host::{Deferred, DeferredId, Host, Ledger, Limits, ProducerKey};
pub use market::RamMarket;
pub use memory::{MemoryHost, MemoryLedger};
pub use state::{BlockchainParameters, GlobalState, ShareSeries, SystemState};
