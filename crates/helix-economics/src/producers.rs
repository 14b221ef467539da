//! # Producer Registry & Election
//!
//! Producers register with a signing key and a commission rate, the fraction of their
//! rewards passed on to their voters. The election takes the top producers by vote
//! total from the vote index and proposes them, sorted by name, as the next schedule.

use crate::contract::SystemContract;
use crate::host::{Host, ProducerKey};
use crate::voting::age_periods;
use helix_core::{
    ensure, AccountName, BlockTimestamp, HelixError, IndexedRow, PublicKey, Result, Row, TimePoint,
    TotalOrd,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub owner: AccountName,
    /// Every account that ever voted for this producer, in first-vote order
    pub voters: Vec<AccountName>,
    pub total_votes: f64,
    pub producer_key: PublicKey,
    pub is_active: bool,
    pub url: String,
    pub location: u16,
    pub unpaid_blocks: u32,
    pub last_claim_time: TimePoint,
    pub votepay_share: f64,
    pub last_votepay_share_update: TimePoint,
    pub blockpay_share: f64,
    pub last_blockpay_share_update: TimePoint,
    pub commission_rate: f64,
    pub last_commission_adjustment: TimePoint,
    pub total_voteage: i128,
    pub voteage_update_time: TimePoint,
    pub producer_block_balance: i64,
    pub producer_vote_balance: i64,
    pub voters_block_balance: i64,
    pub voters_vote_balance: i64,
}

impl ProducerInfo {
    pub fn new(owner: AccountName, producer_key: PublicKey, commission_rate: f64, now: TimePoint) -> Self {
        Self {
            owner,
            voters: Vec::new(),
            total_votes: 0.0,
            producer_key,
            is_active: true,
            url: String::new(),
            location: 0,
            unpaid_blocks: 0,
            last_claim_time: now,
            votepay_share: 0.0,
            last_votepay_share_update: now,
            blockpay_share: 0.0,
            last_blockpay_share_update: now,
            commission_rate,
            last_commission_adjustment: now,
            total_voteage: 0,
            voteage_update_time: now,
            producer_block_balance: 0,
            producer_vote_balance: 0,
            voters_block_balance: 0,
            voters_vote_balance: 0,
        }
    }

    pub fn deactivate(&mut self) {
        self.producer_key = PublicKey::DEFAULT;
        self.is_active = false;
    }

    /// Roll the total vote age forward to `now` using the current vote total
    pub fn roll_voteage(&mut self, now: TimePoint, unit: i64, basis_us: i64) {
        let periods = age_periods(self.voteage_update_time, now, basis_us);
        self.total_voteage += ((self.total_votes / unit as f64) * periods as f64) as i128;
        self.voteage_update_time = now;
    }
}

impl Row for ProducerInfo {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.owner.clone()
    }
}

impl IndexedRow for ProducerInfo {
    type IndexKey = TotalOrd;

    /// Active producers first, highest votes first
    fn index_key(&self) -> TotalOrd {
        TotalOrd(if self.is_active {
            -self.total_votes
        } else {
            self.total_votes
        })
    }
}

impl<H: Host> SystemContract<'_, H> {
    /// Register a producer or update its key, url, location and commission rate
    pub fn regproducer(
        &mut self,
        producer: &AccountName,
        producer_key: PublicKey,
        url: &str,
        location: u16,
        commission_rate: f64,
    ) -> Result<()> {
        let limits = self.config.producers.clone();
        ensure!(url.len() < limits.max_url_len, HelixError::invalid("url too long"));
        ensure!(
            !producer_key.is_default(),
            HelixError::invalid("public key should not be the default value")
        );
        ensure!(
            (0.0..=1.0).contains(&commission_rate),
            HelixError::invalid("commission rate should >=0 and <= 1")
        );
        self.require_auth(producer)?;
        let now = self.now();

        let Some(existing) = self.state.producers.find(producer).cloned() else {
            let mut info = ProducerInfo::new(producer.clone(), producer_key, commission_rate, now);
            info.url = url.to_string();
            info.location = location;
            self.state.producers.emplace(info)?;
            info!(%producer, commission_rate, "producer registered");
            return Ok(());
        };

        if existing.commission_rate != commission_rate {
            let cooldown = limits.commission_cooldown_secs;
            ensure!(
                now.micros_since(existing.last_commission_adjustment) > cooldown * 1_000_000,
                HelixError::too_early("the commission ratio has been adjusted, please try again later")
            );
            if commission_rate < existing.commission_rate {
                let step = (existing.commission_rate - commission_rate) / existing.commission_rate;
                ensure!(
                    step <= limits.max_commission_step,
                    HelixError::invalid("the commission ratio cannot be reduced by that much at once")
                );
            }
            // Settle under the old rate first
            if self.is_activated()? {
                self.distribute_voters_rewards(now, producer)?;
            }
            let url = url.to_string();
            self.state.producers.modify(producer, |p| {
                p.producer_key = producer_key;
                p.is_active = true;
                p.url = url;
                p.location = location;
                p.commission_rate = commission_rate;
                p.last_commission_adjustment = now;
            })?;
            info!(%producer, from = existing.commission_rate, to = commission_rate, "commission changed");
        } else {
            let url = url.to_string();
            self.state.producers.modify(producer, |p| {
                p.producer_key = producer_key;
                p.is_active = true;
                p.url = url;
                p.location = location;
                if p.last_claim_time.is_zero() {
                    p.last_claim_time = now;
                }
            })?;
        }

        if existing.last_votepay_share_update.is_zero() {
            let prod = self
                .state
                .producers
                .modify(producer, |p| p.last_votepay_share_update = now)?;
            self.state
                .global
                .votepay
                .advance(now, 0.0, prod.total_votes);
        }
        Ok(())
    }

    pub fn unregprod(&mut self, producer: &AccountName) -> Result<()> {
        self.require_auth(producer)?;
        if self.is_activated()? {
            let now = self.now();
            self.distribute_voters_rewards(now, producer)?;
        }
        self.state.producers.get(producer, "producer not found")?;
        self.state.producers.modify(producer, ProducerInfo::deactivate)?;
        info!(%producer, "producer unregistered");
        Ok(())
    }

    /// Deactivate a producer on the system account's authority
    pub fn rmvproducer(&mut self, producer: &AccountName) -> Result<()> {
        self.require_system_auth()?;
        self.state.producers.get(producer, "producer not found")?;
        self.state.producers.modify(producer, ProducerInfo::deactivate)?;
        info!(%producer, "producer removed");
        Ok(())
    }

    /// Propose the top producers by votes as the next schedule
    pub(crate) fn update_elected_producers(&mut self, block_time: BlockTimestamp) -> Result<()> {
        self.state.global.last_producer_schedule_update = block_time;

        let mut top: Vec<ProducerKey> = self
            .state
            .producers
            .iter_by_index()
            .take_while(|p| p.total_votes > 0.0 && p.is_active)
            .take(self.config.producers.top_producers)
            .map(|p| ProducerKey {
                producer_name: p.owner.clone(),
                block_signing_key: p.producer_key,
            })
            .collect();

        if top.is_empty() || top.len() < usize::from(self.state.global.last_producer_schedule_size) {
            debug!(elected = top.len(), "schedule unchanged");
            return Ok(());
        }

        top.sort();
        if let Some(version) = self.host.set_proposed_producers(&top)? {
            self.state.global.last_producer_schedule_size = top.len() as u16;
            info!(
                version,
                producers = ?top.iter().map(|k| k.producer_name.as_str()).collect::<Vec<_>>(),
                "proposed new producer schedule"
            );
        }
        Ok(())
    }
}
