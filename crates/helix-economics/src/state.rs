//! # System State
//!
//! Everything the system account persists: the global singleton, the RAM market and
//! one keyed table per row type. `SystemState` is plain data; the component modules
//! mutate it through `SystemContract`.

use crate::airdrop::AirdropGrant;
use crate::bandwidth::{DelegatedBandwidth, RefundRequest};
use crate::config::EconomicsConfig;
use crate::market::RamMarket;
use crate::names::{BidRefund, NameBid};
use crate::producers::ProducerInfo;
use crate::resources::UserResources;
use crate::voting::{VoteInfo, VoterInfo};
use helix_core::{
    ensure, BlockTimestamp, HelixError, IndexedTable, Result, Symbol, Table, TimePoint,
};
use serde::{Deserialize, Serialize};

/// A decaying running total of shares
///
/// Between touches the total grows by `rate` shares per second; each touch also
/// applies a discrete delta. Both the total and the rate clamp at zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareSeries {
    pub total: f64,
    pub rate: f64,
    pub last_update: TimePoint,
}

impl ShareSeries {
    /// Accrue up to `now`, apply the deltas and return the new total
    pub fn advance(&mut self, now: TimePoint, additional_shares: f64, rate_delta: f64) -> f64 {
        let mut delta = 0.0;
        if now > self.last_update {
            delta = self.rate * now.seconds_since(self.last_update);
        }
        delta += additional_shares;
        if delta < 0.0 && self.total < -delta {
            self.total = 0.0;
        } else {
            self.total += delta;
        }

        if rate_delta < 0.0 && self.rate < -rate_delta {
            self.rate = 0.0;
        } else {
            self.rate += rate_delta;
        }
        self.last_update = now;
        self.total
    }
}

/// Chain-wide resource parameters the system account may publish
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainParameters {
    pub max_block_net_usage: u64,
    /// Hundredths of a percent
    pub target_block_net_usage_pct: u32,
    pub max_transaction_net_usage: u32,
    pub base_per_transaction_net_usage: u32,
    pub net_usage_leeway: u32,
    pub context_free_discount_net_usage_num: u32,
    pub context_free_discount_net_usage_den: u32,
    pub max_block_cpu_usage: u32,
    /// Hundredths of a percent
    pub target_block_cpu_usage_pct: u32,
    pub max_transaction_cpu_usage: u32,
    pub min_transaction_cpu_usage: u32,
    pub max_transaction_lifetime: u32,
    pub deferred_trx_expiration_window: u32,
    pub max_transaction_delay: u32,
    pub max_inline_action_size: u32,
    pub max_inline_action_depth: u16,
    pub max_authority_depth: u16,
}

/// 100% in hundredths of a percent
pub const PERCENT_100: u32 = 10_000;

impl Default for BlockchainParameters {
    fn default() -> Self {
        Self {
            max_block_net_usage: 1024 * 1024,
            target_block_net_usage_pct: 1000,
            max_transaction_net_usage: 512 * 1024,
            base_per_transaction_net_usage: 12,
            net_usage_leeway: 500,
            context_free_discount_net_usage_num: 20,
            context_free_discount_net_usage_den: 100,
            max_block_cpu_usage: 200_000,
            target_block_cpu_usage_pct: 1000,
            max_transaction_cpu_usage: 150_000,
            min_transaction_cpu_usage: 100,
            max_transaction_lifetime: 3600,
            deferred_trx_expiration_window: 600,
            max_transaction_delay: 45 * 24 * 3600,
            max_inline_action_size: 512 * 1024,
            max_inline_action_depth: 4,
            max_authority_depth: 6,
        }
    }
}

impl BlockchainParameters {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.target_block_net_usage_pct <= PERCENT_100,
            HelixError::invalid("target block net usage percentage cannot exceed 100%")
        );
        ensure!(
            self.target_block_cpu_usage_pct <= PERCENT_100,
            HelixError::invalid("target block cpu usage percentage cannot exceed 100%")
        );
        ensure!(
            (self.max_transaction_net_usage as u64) < self.max_block_net_usage,
            HelixError::invalid("max transaction net usage must be less than max block net usage")
        );
        ensure!(
            self.max_transaction_cpu_usage < self.max_block_cpu_usage,
            HelixError::invalid("max transaction cpu usage must be less than max block cpu usage")
        );
        ensure!(
            self.base_per_transaction_net_usage < self.max_transaction_net_usage,
            HelixError::invalid("base net usage per transaction must be less than the max transaction net usage")
        );
        ensure!(
            self.min_transaction_cpu_usage <= self.max_transaction_cpu_usage,
            HelixError::invalid("min transaction cpu usage cannot exceed max transaction cpu usage")
        );
        ensure!(
            self.context_free_discount_net_usage_den > 0
                && self.context_free_discount_net_usage_num
                    <= self.context_free_discount_net_usage_den,
            HelixError::invalid("context-free discount must be a fraction in [0, 1]")
        );
        ensure!(
            self.max_transaction_lifetime >= 1,
            HelixError::invalid("max transaction lifetime must be at least 1 second")
        );
        ensure!(
            self.max_authority_depth >= 1,
            HelixError::invalid("max authority depth must be at least 1")
        );
        Ok(())
    }
}

/// The global singleton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub max_ram_size: u64,
    pub total_ram_bytes_reserved: u64,
    pub total_ram_stake: i64,

    pub last_producer_schedule_update: BlockTimestamp,
    pub last_producer_schedule_size: u16,
    pub last_pervote_bucket_fill: TimePoint,
    pub pervote_bucket: i64,
    pub perblock_bucket: i64,
    /// Blocks produced but not yet paid
    pub total_unpaid_blocks: u32,
    pub total_activated_stake: i64,
    /// When `total_activated_stake` first reached the activation threshold
    pub thresh_activated_stake_time: TimePoint,
    pub last_name_close: BlockTimestamp,
    /// Timestamp of the last block seen by `onblock`
    pub last_block: BlockTimestamp,

    pub new_ram_per_block: u16,
    pub last_ram_increase: BlockTimestamp,

    pub votepay: ShareSeries,
    pub blockpay: ShareSeries,

    pub revision: u8,

    pub res_airdrop_limit_net: i64,
    pub res_airdrop_limit_cpu: i64,
    pub res_airdrop_limit_ram_bytes: u32,

    pub parameters: BlockchainParameters,
}

impl GlobalState {
    pub fn new(max_ram_size: u64) -> Self {
        Self {
            max_ram_size,
            total_ram_bytes_reserved: 0,
            total_ram_stake: 0,
            last_producer_schedule_update: BlockTimestamp::default(),
            last_producer_schedule_size: 0,
            last_pervote_bucket_fill: TimePoint::ZERO,
            pervote_bucket: 0,
            perblock_bucket: 0,
            total_unpaid_blocks: 0,
            total_activated_stake: 0,
            thresh_activated_stake_time: TimePoint::ZERO,
            last_name_close: BlockTimestamp::default(),
            last_block: BlockTimestamp::default(),
            new_ram_per_block: 0,
            last_ram_increase: BlockTimestamp::default(),
            votepay: ShareSeries::default(),
            blockpay: ShareSeries::default(),
            revision: 0,
            res_airdrop_limit_net: 0,
            res_airdrop_limit_cpu: 0,
            res_airdrop_limit_ram_bytes: 0,
            parameters: BlockchainParameters::default(),
        }
    }

    pub fn free_ram(&self) -> u64 {
        self.max_ram_size.saturating_sub(self.total_ram_bytes_reserved)
    }
}

/// All persisted state of the system account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemState {
    pub global: GlobalState,
    /// Created by `init`
    pub market: Option<RamMarket>,
    pub user_resources: Table<UserResources>,
    pub delegations: Table<DelegatedBandwidth>,
    pub refunds: Table<RefundRequest>,
    pub voters: Table<VoterInfo>,
    pub votes: Table<VoteInfo>,
    pub producers: IndexedTable<ProducerInfo>,
    pub airdrops: Table<AirdropGrant>,
    pub name_bids: IndexedTable<NameBid>,
    pub bid_refunds: Table<BidRefund>,
}

impl SystemState {
    pub fn new(config: &EconomicsConfig) -> Self {
        Self {
            global: GlobalState::new(config.market.initial_max_ram_size),
            market: None,
            user_resources: Table::new(),
            delegations: Table::new(),
            refunds: Table::new(),
            voters: Table::new(),
            votes: Table::new(),
            producers: IndexedTable::new(),
            airdrops: Table::new(),
            name_bids: IndexedTable::new(),
            bid_refunds: Table::new(),
        }
    }

    pub fn market(&self) -> Result<&RamMarket> {
        self.market
            .as_ref()
            .ok_or_else(|| HelixError::not_found("system contract must first be initialized"))
    }

    pub fn market_mut(&mut self) -> Result<&mut RamMarket> {
        self.market
            .as_mut()
            .ok_or_else(|| HelixError::not_found("system contract must first be initialized"))
    }

    /// The core token symbol, fixed by `init`
    pub fn core_symbol(&self) -> Result<Symbol> {
        Ok(self.market()?.core_symbol.clone())
    }

    /// Canonical binary encoding of the whole state
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| HelixError::Serialization(e.to_string()))
    }

    /// Hex blake3 digest of the canonical encoding, for comparing replays
    pub fn digest(&self) -> Result<String> {
        let bytes = self.encode()?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_series_accrues_and_clamps() {
        let t0 = TimePoint::from_secs(1_000);
        let mut series = ShareSeries {
            total: 0.0,
            rate: 0.0,
            last_update: t0,
        };
        series.advance(t0, 0.0, 10.0);
        let total = series.advance(t0.plus_secs(5), 0.0, 0.0);
        assert!((total - 50.0).abs() < 1e-9);

        let total = series.advance(t0.plus_secs(5), -80.0, -25.0);
        assert_eq!(total, 0.0);
        assert_eq!(series.rate, 0.0);
    }

    #[test]
    fn test_share_series_ignores_backwards_time() {
        let t0 = TimePoint::from_secs(10);
        let mut series = ShareSeries {
            total: 5.0,
            rate: 1.0,
            last_update: t0,
        };
        assert_eq!(series.advance(TimePoint::from_secs(5), 0.0, 0.0), 5.0);
    }

    #[test]
    fn test_parameters_validation() {
        assert!(BlockchainParameters::default().validate().is_ok());
        let params = BlockchainParameters {
            target_block_cpu_usage_pct: PERCENT_100 + 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        let params = BlockchainParameters {
            max_transaction_cpu_usage: 300_000,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_free_ram() {
        let mut global = GlobalState::new(1_000);
        global.total_ram_bytes_reserved = 400;
        assert_eq!(global.free_ram(), 600);
    }

    #[test]
    fn test_digest_and_json() {
        let state = SystemState::new(&EconomicsConfig::default());
        let digest = state.digest().unwrap();
        assert_eq!(digest.len(), 64);

        let json = state.to_json().unwrap();
        let loaded = SystemState::from_json(&json).unwrap();
        assert_eq!(loaded.digest().unwrap(), digest);
        assert!(state.core_symbol().is_err());
    }
}
