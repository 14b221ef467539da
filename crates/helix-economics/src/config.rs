//! Economics configuration
//!
//! Every tunable of the system account lives here with its production default.
//! A TOML file only needs to name the values it overrides:
//!
//! ```toml
//! [voting]
//! max_supply = 1000
//!
//! [producers]
//! top_producers = 21
//! ```

use helix_core::{AccountName, MICROS_PER_DAY, MICROS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete economics configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomicsConfig {
    /// Well-known system accounts
    #[serde(default)]
    pub accounts: SystemAccounts,

    /// RAM market settings
    #[serde(default)]
    pub market: MarketConfig,

    /// Bandwidth staking settings
    #[serde(default)]
    pub bandwidth: BandwidthConfig,

    /// Voting and activation settings
    #[serde(default)]
    pub voting: VotingConfig,

    /// Producer registry and election settings
    #[serde(default)]
    pub producers: ProducerConfig,

    /// Emission and payout settings
    #[serde(default)]
    pub rewards: RewardConfig,

    /// Name auction settings
    #[serde(default)]
    pub names: NameAuctionConfig,
}

impl EconomicsConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.market.validate()?;
        self.bandwidth.validate()?;
        self.voting.validate()?;
        self.producers.validate()?;
        self.rewards.validate()?;
        self.names.validate()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

/// Accounts the system contract moves tokens between
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemAccounts {
    /// The system account itself; authorizes administrative actions
    #[serde(default = "default_system_account")]
    pub system: AccountName,

    /// Receives the tokens paid for RAM
    #[serde(default = "default_ram_account")]
    pub ram: AccountName,

    /// Collects RAM trading fees
    #[serde(default = "default_ramfee_account")]
    pub ramfee: AccountName,

    /// Holds staked bandwidth tokens and pending refunds
    #[serde(default = "default_stake_account")]
    pub stake: AccountName,

    /// Per-block reward bucket
    #[serde(default = "default_bpay_account")]
    pub bpay: AccountName,

    /// Per-vote reward bucket
    #[serde(default = "default_vpay_account")]
    pub vpay: AccountName,

    /// Escrows name auction bids
    #[serde(default = "default_names_account")]
    pub names: AccountName,

    /// Receives the unallocated part of each mint
    #[serde(default = "default_saving_account")]
    pub saving: AccountName,

    /// Grants bootstrap resources
    #[serde(default = "default_airdrop_account")]
    pub airdrop: AccountName,
}

fn default_system_account() -> AccountName {
    AccountName::from_static("helix")
}

fn default_ram_account() -> AccountName {
    AccountName::from_static("helix.ram")
}

fn default_ramfee_account() -> AccountName {
    AccountName::from_static("helix.ramfee")
}

fn default_stake_account() -> AccountName {
    AccountName::from_static("helix.stake")
}

fn default_bpay_account() -> AccountName {
    AccountName::from_static("helix.bpay")
}

fn default_vpay_account() -> AccountName {
    AccountName::from_static("helix.vpay")
}

fn default_names_account() -> AccountName {
    AccountName::from_static("helix.names")
}

fn default_saving_account() -> AccountName {
    AccountName::from_static("helix.saving")
}

fn default_airdrop_account() -> AccountName {
    AccountName::from_static("helix.resad")
}

impl Default for SystemAccounts {
    fn default() -> Self {
        Self {
            system: default_system_account(),
            ram: default_ram_account(),
            ramfee: default_ramfee_account(),
            stake: default_stake_account(),
            bpay: default_bpay_account(),
            vpay: default_vpay_account(),
            names: default_names_account(),
            saving: default_saving_account(),
            airdrop: default_airdrop_account(),
        }
    }
}

/// RAM market settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Bytes every account gets on top of what it bought
    #[serde(default = "default_ram_gift_bytes")]
    pub ram_gift_bytes: i64,

    /// Trading fee is `ceil(amount / fee_divisor)` (200 = 0.5%)
    #[serde(default = "default_fee_divisor")]
    pub fee_divisor: i64,

    /// RAM supply before any `setram`
    #[serde(default = "default_max_ram_size")]
    pub initial_max_ram_size: u64,
}

fn default_ram_gift_bytes() -> i64 {
    1400
}

fn default_fee_divisor() -> i64 {
    200
}

fn default_max_ram_size() -> u64 {
    64 * 1024 * 1024 * 1024
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            ram_gift_bytes: default_ram_gift_bytes(),
            fee_divisor: default_fee_divisor(),
            initial_max_ram_size: default_max_ram_size(),
        }
    }
}

impl MarketConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ram_gift_bytes < 0 {
            return Err(invalid("market.ram_gift_bytes must be non-negative"));
        }
        if self.fee_divisor <= 0 {
            return Err(invalid("market.fee_divisor must be positive"));
        }
        if self.initial_max_ram_size == 0 {
            return Err(invalid("market.initial_max_ram_size must be positive"));
        }
        Ok(())
    }
}

/// Bandwidth staking settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandwidthConfig {
    /// Seconds between an unstake and the refund becoming claimable
    #[serde(default = "default_refund_delay_secs")]
    pub refund_delay_secs: i64,
}

fn default_refund_delay_secs() -> i64 {
    3 * 24 * 3600
}

impl Default for BandwidthConfig {
    fn default() -> Self {
        Self {
            refund_delay_secs: default_refund_delay_secs(),
        }
    }
}

impl BandwidthConfig {
    pub fn refund_delay_micros(&self) -> i64 {
        self.refund_delay_secs * MICROS_PER_SECOND
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refund_delay_secs < 0 {
            return Err(invalid("bandwidth.refund_delay_secs must be non-negative"));
        }
        Ok(())
    }
}

/// Voting and activation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Microseconds per unit of vote age (one claim period / 10^6)
    #[serde(default = "default_vote_age_basis_us")]
    pub vote_age_basis_us: i64,

    /// Maximum token supply in whole tokens, the base of the activation threshold
    #[serde(default = "default_max_supply")]
    pub max_supply: i64,

    /// Fraction of `max_supply` that must be voting before the chain activates
    #[serde(default = "default_min_activated_stake_rate")]
    pub min_activated_stake_rate: f64,
}

fn default_vote_age_basis_us() -> i64 {
    MICROS_PER_DAY / 1_000_000
}

fn default_max_supply() -> i64 {
    150_000_000
}

fn default_min_activated_stake_rate() -> f64 {
    0.15
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            vote_age_basis_us: default_vote_age_basis_us(),
            max_supply: default_max_supply(),
            min_activated_stake_rate: default_min_activated_stake_rate(),
        }
    }
}

impl VotingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.vote_age_basis_us <= 0 {
            return Err(invalid("voting.vote_age_basis_us must be positive"));
        }
        if self.max_supply <= 0 {
            return Err(invalid("voting.max_supply must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_activated_stake_rate) {
            return Err(invalid("voting.min_activated_stake_rate must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Producer registry and election settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Size of the elected schedule
    #[serde(default = "default_top_producers")]
    pub top_producers: usize,

    /// Block slots between elections (120 slots = one minute)
    #[serde(default = "default_schedule_interval_slots")]
    pub schedule_interval_slots: u32,

    /// Seconds a producer must wait between commission changes
    #[serde(default = "default_commission_cooldown_secs")]
    pub commission_cooldown_secs: i64,

    /// Largest relative commission reduction allowed in one change
    #[serde(default = "default_max_commission_step")]
    pub max_commission_step: f64,

    /// Exclusive upper bound on the url length in bytes
    #[serde(default = "default_max_url_len")]
    pub max_url_len: usize,
}

fn default_top_producers() -> usize {
    15
}

fn default_schedule_interval_slots() -> u32 {
    120
}

fn default_commission_cooldown_secs() -> i64 {
    7 * 24 * 3600
}

fn default_max_commission_step() -> f64 {
    0.05
}

fn default_max_url_len() -> usize {
    512
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            top_producers: default_top_producers(),
            schedule_interval_slots: default_schedule_interval_slots(),
            commission_cooldown_secs: default_commission_cooldown_secs(),
            max_commission_step: default_max_commission_step(),
            max_url_len: default_max_url_len(),
        }
    }
}

impl ProducerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_producers == 0 || self.top_producers > u16::MAX as usize {
            return Err(invalid("producers.top_producers must be within [1, 65535]"));
        }
        if self.commission_cooldown_secs < 0 {
            return Err(invalid("producers.commission_cooldown_secs must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.max_commission_step) {
            return Err(invalid("producers.max_commission_step must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Emission and payout settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Annual issuance as a fraction of current supply
    #[serde(default = "default_continuous_rate")]
    pub continuous_rate: f64,

    /// Share of each mint routed to the per-block bucket
    #[serde(default = "default_perblock_rate")]
    pub perblock_rate: f64,

    /// Share of each mint routed to the per-vote bucket; the rest goes to savings
    #[serde(default = "default_pervote_rate")]
    pub pervote_rate: f64,

    /// Vote pay below this many whole tokens is forfeited
    #[serde(default = "default_min_pervote_daily_pay")]
    pub min_pervote_daily_pay: i64,

    /// Seconds in the emission year (52 weeks)
    #[serde(default = "default_seconds_per_year")]
    pub seconds_per_year: i64,

    /// Seconds between producer claims
    #[serde(default = "default_claim_period_secs")]
    pub producer_claim_period_secs: i64,

    /// Seconds between voter claims
    #[serde(default = "default_claim_period_secs")]
    pub voter_claim_period_secs: i64,

    /// Seconds after its last claim when a producer stops earning vote pay
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,
}

fn default_continuous_rate() -> f64 {
    0.04879
}

fn default_perblock_rate() -> f64 {
    0.2
}

fn default_pervote_rate() -> f64 {
    0.3
}

fn default_min_pervote_daily_pay() -> i64 {
    10
}

fn default_seconds_per_year() -> i64 {
    52 * 7 * 24 * 3600
}

fn default_claim_period_secs() -> i64 {
    24 * 3600
}

fn default_staleness_secs() -> i64 {
    3 * 24 * 3600
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            continuous_rate: default_continuous_rate(),
            perblock_rate: default_perblock_rate(),
            pervote_rate: default_pervote_rate(),
            min_pervote_daily_pay: default_min_pervote_daily_pay(),
            seconds_per_year: default_seconds_per_year(),
            producer_claim_period_secs: default_claim_period_secs(),
            voter_claim_period_secs: default_claim_period_secs(),
            staleness_secs: default_staleness_secs(),
        }
    }
}

impl RewardConfig {
    pub fn micros_per_year(&self) -> i64 {
        self.seconds_per_year * MICROS_PER_SECOND
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.continuous_rate) {
            return Err(invalid("rewards.continuous_rate must be within [0, 1]"));
        }
        if self.perblock_rate < 0.0 || self.pervote_rate < 0.0 {
            return Err(invalid("rewards split rates must be non-negative"));
        }
        if self.perblock_rate + self.pervote_rate > 1.0 {
            return Err(invalid(
                "rewards.perblock_rate + rewards.pervote_rate must not exceed 1",
            ));
        }
        if self.seconds_per_year <= 0 {
            return Err(invalid("rewards.seconds_per_year must be positive"));
        }
        if self.min_pervote_daily_pay < 0
            || self.producer_claim_period_secs < 0
            || self.voter_claim_period_secs < 0
            || self.staleness_secs < 0
        {
            return Err(invalid("rewards periods and minimums must be non-negative"));
        }
        Ok(())
    }
}

/// Name auction settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameAuctionConfig {
    /// A new bid must beat the current one by more than `current / min_increment_divisor`
    #[serde(default = "default_min_increment_divisor")]
    pub min_increment_divisor: i64,

    /// Seconds the highest bid must stand before the auction can close
    #[serde(default = "default_close_after_secs")]
    pub close_after_secs: i64,

    /// Seconds after activation before any auction can close
    #[serde(default = "default_activation_lock_secs")]
    pub activation_lock_secs: i64,
}

fn default_min_increment_divisor() -> i64 {
    10
}

fn default_close_after_secs() -> i64 {
    24 * 3600
}

fn default_activation_lock_secs() -> i64 {
    14 * 24 * 3600
}

impl Default for NameAuctionConfig {
    fn default() -> Self {
        Self {
            min_increment_divisor: default_min_increment_divisor(),
            close_after_secs: default_close_after_secs(),
            activation_lock_secs: default_activation_lock_secs(),
        }
    }
}

impl NameAuctionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_increment_divisor <= 0 {
            return Err(invalid("names.min_increment_divisor must be positive"));
        }
        if self.close_after_secs < 0 || self.activation_lock_secs < 0 {
            return Err(invalid("names delays must be non-negative"));
        }
        Ok(())
    }
}
