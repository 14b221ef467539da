//! # Reward Distribution
//!
//! New tokens are minted continuously against the core supply and split between a
//! per-block bucket, a per-vote bucket and savings:
//!
//! ```text
//!   minted = continuous_rate * supply * elapsed_us / us_per_year
//!   ├── 20%  per-block bucket   (bpay)   by unpaid blocks
//!   ├── 30%  per-vote bucket    (vpay)   by votepay share
//!   └── rest savings
//! ```
//!
//! Settling a producer moves its slice of both buckets into four claimable balances:
//! the producer keeps `1 - commission_rate` of each and the rest is held for its
//! voters, who claim it in proportion to their vote age.

use crate::contract::SystemContract;
use crate::host::Host;
use helix_core::{ensure, AccountName, BlockTimestamp, HelixError, Result, TimePoint, BLOCKS_PER_DAY};
use tracing::{debug, info};

impl<H: Host> SystemContract<'_, H> {
    /// Mint everything accrued since the last bucket fill
    fn fill_buckets(&mut self, at: TimePoint) -> Result<()> {
        let last_fill = self.state.global.last_pervote_bucket_fill;
        let usecs = at.micros_since(last_fill);
        if usecs <= 0 || last_fill.is_zero() {
            return Ok(());
        }

        let rates = self.config.rewards.clone();
        let accounts = self.config.accounts.clone();
        let core = self.core_symbol()?;
        let supply = self.host.supply(&core)?;

        let new_tokens = (rates.continuous_rate * supply.amount as f64 * usecs as f64
            / rates.micros_per_year() as f64) as i64;
        let to_per_block = (new_tokens as f64 * rates.perblock_rate) as i64;
        let to_per_vote = (new_tokens as f64 * rates.pervote_rate) as i64;
        let to_savings = new_tokens - to_per_block - to_per_vote;

        if new_tokens > 0 {
            let minted = self.core_asset(new_tokens)?;
            self.host.issue(
                &accounts.system,
                &minted,
                "issue tokens for producer pay and savings",
            )?;
        }
        self.pay(&accounts.system, &accounts.saving, to_savings, "unallocated inflation")?;
        self.pay(&accounts.system, &accounts.bpay, to_per_block, "fund per-block bucket")?;
        self.pay(&accounts.system, &accounts.vpay, to_per_vote, "fund per-vote bucket")?;

        let global = &mut self.state.global;
        global.pervote_bucket += to_per_vote;
        global.perblock_bucket += to_per_block;
        global.last_pervote_bucket_fill = at;
        info!(
            minted = new_tokens,
            per_block = to_per_block,
            per_vote = to_per_vote,
            savings = to_savings,
            "filled reward buckets"
        );
        Ok(())
    }

    /// Fill the buckets, then move `producer`'s slice into its claimable balances
    pub(crate) fn distribute_voters_rewards(&mut self, at: TimePoint, producer: &AccountName) -> Result<()> {
        self.require_activated()?;
        self.fill_buckets(at)?;

        let prod = match self.state.producers.find(producer) {
            Some(p) if p.is_active => p.clone(),
            _ => return Ok(()),
        };
        let unit = self.precision_unit()?;
        let rates = self.config.rewards.clone();

        let init_total_votes = prod.total_votes.trunc();
        let threshold = prod.last_claim_time.plus_secs(rates.staleness_secs);
        let crossed_threshold = threshold <= at;
        let updated_after_threshold = threshold <= prod.last_votepay_share_update;

        let new_share = self.update_producer_votepay_share(
            producer,
            at,
            if updated_after_threshold { 0.0 } else { init_total_votes },
            true,
        )?;
        let total_share = self.state.global.votepay.advance(at, 0.0, 0.0);

        let global = &self.state.global;
        let mut per_vote = 0;
        if total_share > 0.0 && !crossed_threshold {
            per_vote = ((new_share * global.pervote_bucket as f64) / total_share) as i64;
            per_vote = per_vote.min(global.pervote_bucket);
        }
        if per_vote < rates.min_pervote_daily_pay * unit {
            per_vote = 0;
        }

        let unpaid = prod.unpaid_blocks;
        let mut per_block = 0;
        if global.total_unpaid_blocks > 0 {
            per_block = (i128::from(global.perblock_bucket) * i128::from(unpaid)
                / i128::from(global.total_unpaid_blocks)) as i64;
        }

        let to_voters_vote = (per_vote as f64 * prod.commission_rate) as i64;
        let to_voters_block = (per_block as f64 * prod.commission_rate) as i64;

        let global = &mut self.state.global;
        global.pervote_bucket -= per_vote;
        global.perblock_bucket -= per_block;
        global.total_unpaid_blocks = global.total_unpaid_blocks.saturating_sub(unpaid);
        global.votepay.advance(
            at,
            -new_share,
            if updated_after_threshold { init_total_votes } else { 0.0 },
        );
        global.blockpay.advance(at, -f64::from(unpaid), 0.0);

        self.state.producers.modify(producer, |p| {
            p.unpaid_blocks = 0;
            p.last_claim_time = at;
            p.blockpay_share = 0.0;
            p.last_blockpay_share_update = at;
            p.voters_block_balance += to_voters_block;
            p.voters_vote_balance += to_voters_vote;
            p.producer_block_balance += per_block - to_voters_block;
            p.producer_vote_balance += per_vote - to_voters_vote;
        })?;

        debug!(
            %producer,
            new_share,
            total_share,
            per_vote,
            per_block,
            unpaid,
            to_voters_vote,
            to_voters_block,
            "settled producer rewards"
        );
        Ok(())
    }

    /// Sum of the vote ages of every voter of `producer` as of `now`
    pub(crate) fn producer_voter_age(&self, producer: &AccountName, now: TimePoint) -> Result<i128> {
        let unit = self.precision_unit()?;
        let basis = self.config.voting.vote_age_basis_us;
        let prod = self.state.producers.get(producer, "producer not found")?;
        Ok(prod
            .voters
            .iter()
            .filter_map(|voter| self.state.votes.find(&(voter.clone(), producer.clone())))
            .map(|v| v.age_at(now, unit, basis))
            .sum())
    }

    pub fn claimprod(&mut self, owner: &AccountName) -> Result<()> {
        self.require_auth(owner)?;
        self.require_activated()?;
        let now = self.now();
        let last_claim = self
            .state
            .producers
            .get(owner, "producer not found")?
            .last_claim_time;
        let period = self.config.rewards.producer_claim_period_secs;
        ensure!(
            now.micros_since(last_claim) >= period * 1_000_000,
            HelixError::too_early("already claimed rewards within past day")
        );

        self.distribute_voters_rewards(now, owner)?;

        let prod = self.state.producers.get(owner, "producer not found")?.clone();
        let accounts = self.config.accounts.clone();
        self.pay(&accounts.bpay, owner, prod.producer_block_balance, "producer block pay")?;
        self.pay(&accounts.vpay, owner, prod.producer_vote_balance, "producer vote pay")?;
        self.state.producers.modify(owner, |p| {
            p.producer_block_balance = 0;
            p.producer_vote_balance = 0;
        })?;

        info!(
            %owner,
            block_pay = prod.producer_block_balance,
            vote_pay = prod.producer_vote_balance,
            "producer claimed rewards"
        );
        Ok(())
    }

    /// Pay `owner` its vote-age cut of `producer`'s voter balances
    pub fn claimvoter(&mut self, owner: &AccountName, producer: &AccountName) -> Result<()> {
        self.require_auth(owner)?;
        self.require_activated()?;
        let now = self.now();
        let unit = self.precision_unit()?;
        let basis = self.config.voting.vote_age_basis_us;

        let voter = self.state.voters.get(owner, "voter not found")?.clone();
        let prod = self.state.producers.get(producer, "producer not found")?.clone();
        let period = self.config.rewards.voter_claim_period_secs;
        ensure!(
            now.micros_since(voter.last_claim_time) >= period * 1_000_000,
            HelixError::too_early("already claimed rewards within past period")
        );

        let key = (owner.clone(), producer.clone());
        let voter_age = self
            .state
            .votes
            .get(&key, "voter has not voted for the producer yet")?
            .age_at(now, unit, basis);
        let total_age = self.producer_voter_age(producer, now)?;
        ensure!(total_age > 0, HelixError::too_early("claim is not available yet"));

        let cut = voter_age as f64 / total_age as f64;
        let vote_reward = (prod.voters_vote_balance as f64 * cut) as i64;
        let block_reward = (prod.voters_block_balance as f64 * cut) as i64;
        ensure!(
            (0..=prod.voters_vote_balance).contains(&vote_reward),
            HelixError::invariant("voter vote reward out of range")
        );
        ensure!(
            (0..=prod.voters_block_balance).contains(&block_reward),
            HelixError::invariant("voter block reward out of range")
        );

        let accounts = self.config.accounts.clone();
        self.pay(&accounts.vpay, owner, vote_reward, "voter vote pay")?;
        self.pay(&accounts.bpay, owner, block_reward, "voter block pay")?;

        self.state
            .voters
            .modify(owner, |v| v.last_claim_time = now)?;
        self.state.votes.modify(&key, |v| {
            v.age = 0;
            v.age_update_time = now;
        })?;
        self.state.producers.modify(producer, |p| {
            p.voters_vote_balance -= vote_reward;
            p.voters_block_balance -= block_reward;
            p.total_voteage = total_age - voter_age;
            p.voteage_update_time = now;
        })?;

        info!(%owner, %producer, cut, vote_reward, block_reward, "voter claimed rewards");
        Ok(())
    }

    /// Per-block hook: count the block, run elections and close name auctions
    pub fn onblock(&mut self, timestamp: BlockTimestamp, producer: &AccountName) -> Result<()> {
        self.require_system_auth()?;
        self.state.global.last_block = timestamp;
        if !self.is_activated()? {
            return Ok(());
        }

        let now = self.now();
        if self.state.global.last_pervote_bucket_fill.is_zero() {
            self.state.global.last_pervote_bucket_fill = now;
            info!(%now, "started reward presses");
        }

        if self.state.producers.contains(producer) {
            self.state.global.total_unpaid_blocks += 1;
            self.state.producers.modify(producer, |p| {
                p.unpaid_blocks += 1;
                p.blockpay_share += 1.0;
                p.last_blockpay_share_update = now;
            })?;
            self.state.global.blockpay.advance(now, 1.0, 0.0);
        }

        let global = &self.state.global;
        if timestamp.slots_since(global.last_producer_schedule_update) > self.config.producers.schedule_interval_slots {
            self.update_elected_producers(timestamp)?;
            if timestamp.slots_since(self.state.global.last_name_close) > BLOCKS_PER_DAY {
                self.close_highest_bid(timestamp)?;
            }
        }
        Ok(())
    }
}
