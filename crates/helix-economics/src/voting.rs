//! # Vote Ledger
//!
//! Voters spend staked balance on votes for individual producers. Every vote record
//! carries an age that grows linearly with the number of whole tokens voted and the
//! number of whole age periods (one day by default) elapsed:
//!
//! ```text
//!   age += (quantity / unit) * (elapsed_us / basis_us)
//! ```
//!
//! The producer keeps the same accumulator over its total votes, so a voter's share of
//! the producer's voter rewards is its age over the sum of all its voters' ages.

use crate::contract::SystemContract;
use crate::host::Host;
use crate::resources::ResourceFlags;
use helix_core::{ensure, AccountName, Asset, HelixError, Result, Row, TimePoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Whole age periods between `since` and `now`
pub fn age_periods(since: TimePoint, now: TimePoint, basis_us: i64) -> i64 {
    now.micros_since(since).max(0) / basis_us
}

/// Age accrued by `quantity` between `since` and `now`
pub fn accrued_age(quantity: i64, unit: i64, since: TimePoint, now: TimePoint, basis_us: i64) -> i128 {
    i128::from(quantity / unit) * i128::from(age_periods(since, now, basis_us))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoterInfo {
    pub owner: AccountName,
    /// Stake not yet spent on votes
    pub staked_balance: i64,
    pub last_vote_weight: f64,
    pub last_claim_time: TimePoint,
    pub flags: ResourceFlags,
}

impl VoterInfo {
    pub fn new(owner: AccountName) -> Self {
        Self {
            owner,
            staked_balance: 0,
            last_vote_weight: 0.0,
            last_claim_time: TimePoint::ZERO,
            flags: ResourceFlags::default(),
        }
    }
}

impl Row for VoterInfo {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.owner.clone()
    }
}

/// One voter's votes for one producer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub voter: AccountName,
    pub producer: AccountName,
    pub quantity: i64,
    pub age: i128,
    pub age_update_time: TimePoint,
}

impl VoteInfo {
    /// Age as of `now` without touching the record
    pub fn age_at(&self, now: TimePoint, unit: i64, basis_us: i64) -> i128 {
        self.age + accrued_age(self.quantity, unit, self.age_update_time, now, basis_us)
    }

    pub fn roll_age(&mut self, now: TimePoint, unit: i64, basis_us: i64) {
        self.age = self.age_at(now, unit, basis_us);
        self.age_update_time = now;
    }
}

impl Row for VoteInfo {
    type Key = (AccountName, AccountName);

    fn primary_key(&self) -> Self::Key {
        (self.voter.clone(), self.producer.clone())
    }
}

impl<H: Host> SystemContract<'_, H> {
    /// Set `voter`'s votes for `producer` to exactly `quantity`
    pub fn voteproducer(&mut self, voter: &AccountName, producer: &AccountName, quantity: &Asset) -> Result<()> {
        self.require_auth(voter)?;
        self.check_core(quantity, "symbol precision mismatch")?;
        let unit = self.precision_unit()?;
        ensure!(
            quantity.amount >= 0 && quantity.amount % unit == 0,
            HelixError::invalid("the number of votes must be an integer")
        );

        let staked = self
            .state
            .voters
            .get(voter, "user must stake before they can vote")?
            .staked_balance;
        let active = self
            .state
            .producers
            .get(producer, "producer is not registered")?
            .is_active;
        ensure!(active, HelixError::invalid("producer is not registered"));

        let now = self.now();
        let basis = self.config.voting.vote_age_basis_us;
        let key = (voter.clone(), producer.clone());
        let change = match self.state.votes.find(&key) {
            None => {
                ensure!(
                    quantity.amount <= staked,
                    HelixError::insufficient("the balance available for the vote is insufficient")
                );
                self.state.votes.emplace(VoteInfo {
                    voter: voter.clone(),
                    producer: producer.clone(),
                    quantity: quantity.amount,
                    age: 0,
                    age_update_time: now,
                })?;
                self.state
                    .producers
                    .modify(producer, |p| p.voters.push(voter.clone()))?;
                quantity.amount
            }
            Some(existing) => {
                let change = quantity.amount - existing.quantity;
                ensure!(
                    change <= staked,
                    HelixError::insufficient("need votes change quantity < your staked balance")
                );
                self.state.votes.modify(&key, |v| {
                    v.roll_age(now, unit, basis);
                    v.quantity = quantity.amount;
                })?;
                change
            }
        };

        self.state
            .voters
            .modify(voter, |v| v.staked_balance -= change)?;

        let prod = self.state.producers.modify(producer, |p| {
            p.roll_voteage(now, unit, basis);
            p.total_votes = (p.total_votes + change as f64).max(0.0);
        })?;

        let init_total_votes = prod.total_votes;
        let threshold = prod
            .last_claim_time
            .plus_secs(self.config.rewards.staleness_secs);
        let crossed_threshold = threshold <= now;
        let updated_after_threshold = threshold <= prod.last_votepay_share_update;

        let new_share = self.update_producer_votepay_share(
            producer,
            now,
            if updated_after_threshold { 0.0 } else { init_total_votes },
            crossed_threshold && !updated_after_threshold,
        )?;

        let mut rate_delta = 0.0;
        let mut inactive_share = 0.0;
        if !crossed_threshold {
            rate_delta += change as f64;
        } else if !updated_after_threshold {
            inactive_share += new_share;
            rate_delta -= init_total_votes;
        }
        self.state
            .global
            .votepay
            .advance(now, -inactive_share, rate_delta);

        let min_activated = self.min_activated_stake()?;
        let global = &mut self.state.global;
        global.total_activated_stake = (global.total_activated_stake + change).max(0);
        if global.total_activated_stake >= min_activated && global.thresh_activated_stake_time.is_zero() {
            global.thresh_activated_stake_time = now;
            info!(stake = global.total_activated_stake, "chain activated");
        }

        debug!(%voter, %producer, change, total_votes = prod.total_votes, "votes updated");
        Ok(())
    }

    /// Accrue `rate` shares per second onto a producer's votepay share
    ///
    /// Returns the accrued share; with `reset` the stored share goes back to zero.
    pub(crate) fn update_producer_votepay_share(
        &mut self,
        producer: &AccountName,
        now: TimePoint,
        rate: f64,
        reset: bool,
    ) -> Result<f64> {
        let mut accrued = 0.0;
        self.state.producers.modify(producer, |p| {
            let mut delta = 0.0;
            if rate > 0.0 && now > p.last_votepay_share_update {
                delta = rate * now.seconds_since(p.last_votepay_share_update);
            }
            accrued = p.votepay_share + delta;
            p.votepay_share = if reset { 0.0 } else { accrued };
            p.last_votepay_share_update = now;
        })?;
        Ok(accrued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hlx, name, Fixture, UNIT};
    use crate::Action;
    use helix_core::{ErrorKind, MICROS_PER_DAY};
    use proptest::prelude::*;

    fn vote(voter: &str, producer: &str, tokens: i64) -> Action {
        Action::VoteProducer {
            voter: name(voter),
            producer: name(producer),
            quantity: hlx(tokens * UNIT),
        }
    }

    fn staked_voter(fx: &mut Fixture, voter: &str, tokens: i64) {
        fx.fund(voter, tokens * UNIT);
        fx.act(
            voter,
            Action::DelegateBw {
                from: name(voter),
                receiver: name(voter),
                stake_net_quantity: hlx(tokens * UNIT / 2),
                stake_cpu_quantity: hlx(tokens * UNIT / 2),
                transfer: false,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_accrued_age() {
        let t0 = TimePoint::from_secs(1_000_000);
        let t1 = t0.plus_micros(3 * MICROS_PER_DAY + 5);
        assert_eq!(accrued_age(25 * UNIT, UNIT, t0, t1, MICROS_PER_DAY), 75);
        // Partial units and partial days do not count
        assert_eq!(accrued_age(25 * UNIT + 9_999, UNIT, t0, t1, MICROS_PER_DAY), 75);
        assert_eq!(accrued_age(25 * UNIT, UNIT, t1, t0, MICROS_PER_DAY), 0);
    }

    #[test]
    fn test_first_vote_and_update() {
        let mut fx = Fixture::new();
        fx.register("bpa");
        staked_voter(&mut fx, "alice", 100);

        fx.act("alice", vote("alice", "bpa", 60)).unwrap();
        let state = fx.engine.state();
        let record = state.votes.find(&(name("alice"), name("bpa"))).unwrap();
        assert_eq!((record.quantity, record.age), (60 * UNIT, 0));
        assert_eq!(state.voters.find(&name("alice")).unwrap().staked_balance, 40 * UNIT);
        let producer = state.producers.find(&name("bpa")).unwrap();
        assert_eq!(producer.total_votes, (60 * UNIT) as f64);
        assert_eq!(producer.voters, vec![name("alice")]);
        assert_eq!(state.global.total_activated_stake, 60 * UNIT);

        fx.advance_secs(2 * 24 * 3600);
        fx.act("alice", vote("alice", "bpa", 30)).unwrap();
        let state = fx.engine.state();
        let record = state.votes.find(&(name("alice"), name("bpa"))).unwrap();
        assert_eq!(record.quantity, 30 * UNIT);
        // A million age periods per day at the default basis
        assert_eq!(record.age, 60 * 2_000_000);
        assert_eq!(state.voters.find(&name("alice")).unwrap().staked_balance, 70 * UNIT);
        let producer = state.producers.find(&name("bpa")).unwrap();
        assert_eq!(producer.total_voteage, 60 * 2_000_000);
        assert_eq!(producer.total_votes, (30 * UNIT) as f64);
        assert_eq!(producer.voters.len(), 1);
    }

    #[test]
    fn test_vote_validation() {
        let mut fx = Fixture::new();
        fx.register("bpa");
        staked_voter(&mut fx, "alice", 10);

        let fractional = Action::VoteProducer {
            voter: name("alice"),
            producer: name("bpa"),
            quantity: hlx(UNIT + 1),
        };
        assert_eq!(fx.act("alice", fractional).unwrap_err().kind(), ErrorKind::Validation);
        let err = fx.act("alice", vote("alice", "bpa", 11)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        let err = fx.act("bob", vote("bob", "bpa", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let err = fx.act("alice", vote("alice", "nobody", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        fx.act("carol", Action::VoteProducer {
            voter: name("carol"),
            producer: name("bpa"),
            quantity: hlx(0),
        })
        .unwrap_err();

        fx.act("bpa", Action::UnregProd { producer: name("bpa") }).unwrap();
        assert!(fx.act("alice", vote("alice", "bpa", 1)).is_err());
    }

    #[test]
    fn test_activation_time_recorded_once() {
        let mut fx = Fixture::new();
        fx.register("bpa");
        staked_voter(&mut fx, "alice", 400);
        fx.act("alice", vote("alice", "bpa", 100)).unwrap();
        assert!(fx.engine.state().global.thresh_activated_stake_time.is_zero());

        fx.act("alice", vote("alice", "bpa", 150)).unwrap();
        let crossed = fx.engine.state().global.thresh_activated_stake_time;
        assert_eq!(crossed, fx.now);

        fx.advance_secs(60);
        fx.act("alice", vote("alice", "bpa", 200)).unwrap();
        assert_eq!(fx.engine.state().global.thresh_activated_stake_time, crossed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_age_is_monotonic(
            quantity in 0i64..1_000_000_000,
            first in 0i64..100 * MICROS_PER_DAY,
            second in 0i64..100 * MICROS_PER_DAY,
        ) {
            let start = TimePoint::from_secs(1_700_000_000);
            let record = VoteInfo {
                voter: name("alice"),
                producer: name("bpa"),
                quantity,
                age: 7,
                age_update_time: start,
            };
            let a = record.age_at(start.plus_micros(first), UNIT, MICROS_PER_DAY);
            let b = record.age_at(start.plus_micros(first + second), UNIT, MICROS_PER_DAY);
            prop_assert!(a <= b);
            prop_assert_eq!(record.age_at(start, UNIT, MICROS_PER_DAY), 7);
        }
    }
}
