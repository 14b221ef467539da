//! # Bandwidth Delegation
//!
//! Stake is delegated from a payer to a beneficiary in two dimensions (NET and CPU).
//! Unstaked tokens do not return at once: they sit in a per-owner refund request and
//! a deferred `refund` pays them out after the refund delay. Restaking before then
//! first absorbs the pending refund.
//!
//! ```text
//!   delegatebw ──► changebw(+net, +cpu) ──► stake account
//!   undelegatebw ─► changebw(-net, -cpu) ──► refund request ──(delay)──► refund
//! ```

use crate::action::Action;
use crate::contract::SystemContract;
use crate::host::{Deferred, DeferredId, Host, Limits};
use crate::resources::UserResources;
use crate::voting::VoterInfo;
use helix_core::{ensure, AccountName, Asset, HelixError, Result, Row, TimePoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Stake `from` has placed on `to`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedBandwidth {
    pub from: AccountName,
    pub to: AccountName,
    pub net_weight: i64,
    pub cpu_weight: i64,
}

impl Row for DelegatedBandwidth {
    type Key = (AccountName, AccountName);

    fn primary_key(&self) -> Self::Key {
        (self.from.clone(), self.to.clone())
    }
}

/// Unstaked tokens waiting for the refund delay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub owner: AccountName,
    pub request_time: TimePoint,
    pub net_amount: i64,
    pub cpu_amount: i64,
}

impl RefundRequest {
    pub fn is_empty(&self) -> bool {
        self.net_amount == 0 && self.cpu_amount == 0
    }
}

impl Row for RefundRequest {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.owner.clone()
    }
}

/// Absorb `delta` into a pending refund amount
///
/// A stake increase first cancels pending refund; whatever is left over must still be
/// transferred in. A decrease grows the refund. Returns the leftover increase.
fn absorb(pending: &mut i64, delta: i64) -> i64 {
    *pending -= delta;
    if *pending < 0 {
        let leftover = -*pending;
        *pending = 0;
        leftover
    } else {
        0
    }
}

impl<H: Host> SystemContract<'_, H> {
    /// Move stake between a payer and a beneficiary
    ///
    /// Positive deltas stake, negative deltas unstake. With `transfer` the stake
    /// belongs to `receiver` from then on.
    pub(crate) fn changebw(
        &mut self,
        from: &AccountName,
        receiver: &AccountName,
        net_delta: i64,
        cpu_delta: i64,
        transfer: bool,
    ) -> Result<()> {
        self.require_auth(from)?;
        ensure!(
            net_delta != 0 || cpu_delta != 0,
            HelixError::invalid("should stake non-zero amount")
        );
        let total = net_delta
            .checked_add(cpu_delta)
            .ok_or_else(|| HelixError::invalid("stake amount overflow"))?;
        ensure!(
            total.abs() >= net_delta.abs().max(cpu_delta.abs()),
            HelixError::invalid("net and cpu deltas cannot be opposite signs")
        );

        let source = from.clone();
        let owner = if transfer { receiver.clone() } else { from.clone() };

        if source == self.config.accounts.airdrop {
            self.record_airdrop_bandwidth(receiver, net_delta, cpu_delta)?;
        }

        self.update_delegation(&owner, receiver, net_delta, cpu_delta)?;
        self.update_totals(receiver, net_delta, cpu_delta)?;

        if source != self.config.accounts.stake {
            let leftover = self.update_refund(&owner, receiver, net_delta, cpu_delta, transfer)?;
            if leftover > 0 {
                let stake = self.config.accounts.stake.clone();
                self.pay(&source, &stake, leftover, "stake bandwidth")?;
            }
        }

        if !self.state.voters.contains(&owner) {
            self.state.voters.emplace(VoterInfo::new(owner.clone()))?;
        }
        let voter = self
            .state
            .voters
            .modify(&owner, |v| v.staked_balance += total)?;
        ensure!(
            voter.staked_balance >= 0,
            HelixError::insufficient("stake for voting cannot be negative")
        );
        debug!(%owner, %receiver, net_delta, cpu_delta, staked = voter.staked_balance, "bandwidth changed");
        Ok(())
    }

    fn update_delegation(&mut self, owner: &AccountName, receiver: &AccountName, net: i64, cpu: i64) -> Result<()> {
        let key = (owner.clone(), receiver.clone());
        let row = if self.state.delegations.contains(&key) {
            self.state.delegations.modify(&key, |d| {
                d.net_weight += net;
                d.cpu_weight += cpu;
            })?
        } else {
            let row = DelegatedBandwidth {
                from: owner.clone(),
                to: receiver.clone(),
                net_weight: net,
                cpu_weight: cpu,
            };
            self.state.delegations.emplace(row.clone())?;
            row
        };
        ensure!(
            row.net_weight >= 0,
            HelixError::insufficient("insufficient staked net bandwidth")
        );
        ensure!(
            row.cpu_weight >= 0,
            HelixError::insufficient("insufficient staked cpu bandwidth")
        );
        if row.net_weight == 0 && row.cpu_weight == 0 {
            self.state.delegations.erase(&key);
        }
        Ok(())
    }

    fn update_totals(&mut self, receiver: &AccountName, net: i64, cpu: i64) -> Result<()> {
        let totals = if self.state.user_resources.contains(receiver) {
            self.state.user_resources.modify(receiver, |r| {
                r.net_weight += net;
                r.cpu_weight += cpu;
            })?
        } else {
            let mut row = UserResources::new(receiver.clone());
            row.net_weight = net;
            row.cpu_weight = cpu;
            self.state.user_resources.emplace(row.clone())?;
            row
        };
        ensure!(
            totals.net_weight >= 0,
            HelixError::insufficient("insufficient staked total net bandwidth")
        );
        ensure!(
            totals.cpu_weight >= 0,
            HelixError::insufficient("insufficient staked total cpu bandwidth")
        );

        let flags = self.resource_flags(receiver);
        if !(flags.net_managed && flags.cpu_managed) {
            let current = self.host.get_limits(receiver);
            let gifted = totals.ram_bytes + self.config.market.ram_gift_bytes;
            let limits = Limits {
                ram_bytes: if flags.ram_managed {
                    current.ram_bytes
                } else {
                    gifted.max(current.ram_bytes)
                },
                net_weight: if flags.net_managed {
                    current.net_weight
                } else {
                    totals.net_weight
                },
                cpu_weight: if flags.cpu_managed {
                    current.cpu_weight
                } else {
                    totals.cpu_weight
                },
            };
            self.host.set_limits(receiver, limits)?;
        }

        if totals.is_empty() {
            self.state.user_resources.erase(receiver);
        }
        Ok(())
    }

    /// Merge the deltas into `owner`'s refund request and (re)schedule its payout
    ///
    /// Returns the part of a stake increase the pending refund did not cover.
    fn update_refund(
        &mut self,
        owner: &AccountName,
        receiver: &AccountName,
        net_delta: i64,
        cpu_delta: i64,
        transfer: bool,
    ) -> Result<i64> {
        let now = self.now();
        let mut net_balance = net_delta;
        let mut cpu_balance = cpu_delta;
        let mut need_deferred = false;

        let undelegating = net_delta + cpu_delta < 0;
        let delegating_to_self = !transfer && owner == receiver;

        if undelegating || delegating_to_self {
            if self.state.refunds.contains(owner) {
                let request = self.state.refunds.modify(owner, |r| {
                    if net_delta < 0 || cpu_delta < 0 {
                        r.request_time = now;
                    }
                    net_balance = absorb(&mut r.net_amount, net_delta);
                    cpu_balance = absorb(&mut r.cpu_amount, cpu_delta);
                })?;
                ensure!(
                    request.net_amount >= 0 && request.cpu_amount >= 0,
                    HelixError::invariant("negative refund amount")
                );
                if request.is_empty() {
                    self.state.refunds.erase(owner);
                } else {
                    need_deferred = true;
                }
            } else if net_delta < 0 || cpu_delta < 0 {
                let request = RefundRequest {
                    owner: owner.clone(),
                    request_time: now,
                    net_amount: (-net_delta).max(0),
                    cpu_amount: (-cpu_delta).max(0),
                };
                net_balance = net_balance.max(0);
                cpu_balance = cpu_balance.max(0);
                self.state.refunds.emplace(request)?;
                need_deferred = true;
            }
        }

        let id = DeferredId::Refund(owner.clone());
        if need_deferred {
            self.host.cancel(&id);
            self.host.schedule(Deferred {
                id,
                action: Action::Refund { owner: owner.clone() },
                authorizer: owner.clone(),
                execute_at: now.plus_secs(self.config.bandwidth.refund_delay_secs),
            })?;
        } else {
            self.host.cancel(&id);
        }

        Ok(net_balance + cpu_balance)
    }

    pub fn delegatebw(
        &mut self,
        from: &AccountName,
        receiver: &AccountName,
        stake_net_quantity: &Asset,
        stake_cpu_quantity: &Asset,
        transfer: bool,
    ) -> Result<()> {
        self.check_core(stake_net_quantity, "must stake the core token")?;
        self.check_core(stake_cpu_quantity, "must stake the core token")?;
        ensure!(
            stake_net_quantity.amount >= 0 && stake_cpu_quantity.amount >= 0,
            HelixError::invalid("must stake a positive amount")
        );
        ensure!(
            stake_net_quantity.amount + stake_cpu_quantity.amount > 0,
            HelixError::invalid("must stake a positive amount")
        );
        ensure!(
            !transfer || from != receiver,
            HelixError::invalid("cannot use transfer flag if delegating to self")
        );
        self.changebw(
            from,
            receiver,
            stake_net_quantity.amount,
            stake_cpu_quantity.amount,
            transfer,
        )
    }

    pub fn undelegatebw(
        &mut self,
        from: &AccountName,
        receiver: &AccountName,
        unstake_net_quantity: &Asset,
        unstake_cpu_quantity: &Asset,
    ) -> Result<()> {
        self.check_core(unstake_net_quantity, "must unstake the core token")?;
        self.check_core(unstake_cpu_quantity, "must unstake the core token")?;
        ensure!(
            unstake_net_quantity.amount >= 0 && unstake_cpu_quantity.amount >= 0,
            HelixError::invalid("must unstake a positive amount")
        );
        ensure!(
            unstake_net_quantity.amount + unstake_cpu_quantity.amount > 0,
            HelixError::invalid("must unstake a positive amount")
        );
        ensure!(
            self.is_activated()?,
            HelixError::too_early("cannot undelegate bandwidth until the chain is activated")
        );
        self.changebw(
            from,
            receiver,
            -unstake_net_quantity.amount,
            -unstake_cpu_quantity.amount,
            false,
        )
    }

    /// Pay out a refund request once the delay has passed
    pub fn refund(&mut self, owner: &AccountName) -> Result<()> {
        self.require_auth(owner)?;
        let request = self
            .state
            .refunds
            .get(owner, "refund request not found")?
            .clone();
        let due = request
            .request_time
            .plus_secs(self.config.bandwidth.refund_delay_secs);
        ensure!(due <= self.now(), HelixError::too_early("refund is not available yet"));

        let stake = self.config.accounts.stake.clone();
        let amount = request.net_amount + request.cpu_amount;
        self.pay(&stake, owner, amount, "unstake")?;
        self.state.refunds.erase(owner);
        info!(%owner, amount, "refunded stake");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hlx, name, Fixture};
    use crate::host::ResourceLimits;
    use helix_core::ErrorKind;
    use proptest::prelude::*;

    fn delegate(from: &str, to: &str, net: i64, cpu: i64, transfer: bool) -> Action {
        Action::DelegateBw {
            from: name(from),
            receiver: name(to),
            stake_net_quantity: hlx(net),
            stake_cpu_quantity: hlx(cpu),
            transfer,
        }
    }

    fn undelegate(from: &str, to: &str, net: i64, cpu: i64) -> Action {
        Action::UndelegateBw {
            from: name(from),
            receiver: name(to),
            unstake_net_quantity: hlx(net),
            unstake_cpu_quantity: hlx(cpu),
        }
    }

    #[test]
    fn test_delegate_to_self() {
        let mut fx = Fixture::new();
        fx.fund("alice", 10_000);
        fx.act("alice", delegate("alice", "alice", 1_000, 2_000, false))
            .unwrap();

        let state = fx.engine.state();
        let row = state
            .delegations
            .find(&(name("alice"), name("alice")))
            .unwrap();
        assert_eq!((row.net_weight, row.cpu_weight), (1_000, 2_000));
        let totals = state.user_resources.find(&name("alice")).unwrap();
        assert_eq!((totals.net_weight, totals.cpu_weight), (1_000, 2_000));
        assert_eq!(state.voters.find(&name("alice")).unwrap().staked_balance, 3_000);
        assert_eq!(fx.balance("alice"), 7_000);
        assert_eq!(fx.balance("helix.stake"), 3_000);

        let limits = fx.engine.host().get_limits(&name("alice"));
        assert_eq!(limits.net_weight, 1_000);
        assert_eq!(limits.cpu_weight, 2_000);
        assert_eq!(limits.ram_bytes, 1400);
    }

    #[test]
    fn test_delegate_validation() {
        let mut fx = Fixture::new();
        fx.fund("alice", 10_000);
        assert!(fx.act("alice", delegate("alice", "alice", 0, 0, false)).is_err());
        assert!(fx.act("alice", delegate("alice", "alice", -5, 10, false)).is_err());
        assert!(fx.act("alice", delegate("alice", "alice", 5, 5, true)).is_err());
        let err = fx
            .act("alice", delegate("alice", "alice", 20_000, 0, false))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(fx.engine.state().delegations.is_empty());
    }

    #[test]
    fn test_huge_amounts_are_rejected() {
        let mut fx = Fixture::activated();
        fx.fund("alice", 10_000);
        for (net, cpu) in [(i64::MAX, 1), (1, i64::MAX), (i64::MAX, i64::MAX)] {
            let err = fx
                .act("alice", delegate("alice", "alice", net, cpu, false))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = fx
            .act("alice", undelegate("alice", "alice", i64::MAX, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(fx.engine.state().delegations.find(&(name("alice"), name("alice"))).is_none());
        assert_eq!(fx.balance("alice"), 10_000);
    }

    #[test]
    fn test_transfer_flag_moves_ownership() {
        let mut fx = Fixture::new();
        fx.fund("alice", 10_000);
        fx.act("alice", delegate("alice", "bob", 1_000, 1_000, true))
            .unwrap();

        let state = fx.engine.state();
        assert!(state.delegations.contains(&(name("bob"), name("bob"))));
        assert!(!state.delegations.contains(&(name("alice"), name("bob"))));
        assert_eq!(state.voters.find(&name("bob")).unwrap().staked_balance, 2_000);
        assert!(state.voters.find(&name("alice")).is_none());
        assert_eq!(fx.balance("alice"), 8_000);
    }

    #[test]
    fn test_undelegate_requires_activation() {
        let mut fx = Fixture::new();
        fx.fund("alice", 10_000);
        fx.act("alice", delegate("alice", "alice", 1_000, 1_000, false))
            .unwrap();
        let err = fx.act("alice", undelegate("alice", "alice", 10, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);
    }

    #[test]
    fn test_refund_merge_and_restake() {
        let mut fx = Fixture::activated();
        fx.fund("alice", 3_000_000);
        fx.act("alice", delegate("alice", "alice", 1_000_000, 1_000_000, false))
            .unwrap();

        fx.act("alice", undelegate("alice", "alice", 300_000, 100_000)).unwrap();
        fx.advance_secs(3600);
        fx.act("alice", undelegate("alice", "alice", 100_000, 0)).unwrap();
        let request = fx.engine.state().refunds.find(&name("alice")).unwrap().clone();
        assert_eq!((request.net_amount, request.cpu_amount), (400_000, 100_000));
        assert_eq!(request.request_time, fx.now);

        let pending = fx
            .engine
            .host()
            .pending_for(&DeferredId::Refund(name("alice")))
            .unwrap();
        assert_eq!(pending.execute_at, fx.now.plus_secs(3 * 24 * 3600));

        // Restaking absorbs the pending refund before pulling new tokens
        let before = fx.balance("alice");
        fx.act("alice", delegate("alice", "alice", 500_000, 150_000, false))
            .unwrap();
        let request = fx.engine.state().refunds.find(&name("alice"));
        assert!(request.is_none());
        assert_eq!(fx.balance("alice"), before - 100_000 - 50_000);
        assert!(fx
            .engine
            .host()
            .pending_for(&DeferredId::Refund(name("alice")))
            .is_none());
    }

    #[test]
    fn test_undelegate_removes_empty_rows() {
        let mut fx = Fixture::activated();
        fx.fund("alice", 100_000);
        fx.act("alice", delegate("alice", "bob", 40_000, 60_000, false))
            .unwrap();
        fx.act("alice", undelegate("alice", "bob", 40_000, 60_000)).unwrap();

        let state = fx.engine.state();
        assert!(!state.delegations.contains(&(name("alice"), name("bob"))));
        assert!(!state.user_resources.contains(&name("bob")));
        let request = state.refunds.find(&name("alice")).unwrap();
        assert_eq!((request.net_amount, request.cpu_amount), (40_000, 60_000));

        let err = fx.act("alice", undelegate("alice", "bob", 1, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_refund_timing() {
        let mut fx = Fixture::activated();
        fx.fund("alice", 100_000);
        fx.act("alice", delegate("alice", "alice", 50_000, 50_000, false))
            .unwrap();
        fx.act("alice", undelegate("alice", "alice", 20_000, 20_000)).unwrap();

        let err = fx.act("alice", Action::Refund { owner: name("alice") }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);
        assert!(fx.act("bob", Action::Refund { owner: name("alice") }).is_err());

        fx.advance_secs(3 * 24 * 3600);
        let before = fx.balance("alice");
        fx.act("alice", Action::Refund { owner: name("alice") }).unwrap();
        assert_eq!(fx.balance("alice"), before + 40_000);
        assert!(fx.engine.state().refunds.is_empty());

        let err = fx.act("alice", Action::Refund { owner: name("alice") }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_refund_matches_total_unstaked(
            steps in proptest::collection::vec((0i64..5_000, 0i64..5_000), 1..8)
        ) {
            let mut fx = Fixture::activated();
            fx.fund("alice", 100_000);
            fx.act("alice", delegate("alice", "alice", 50_000, 50_000, false)).unwrap();

            let (mut net_out, mut cpu_out) = (0, 0);
            for (net, cpu) in steps {
                if net + cpu == 0 {
                    continue;
                }
                fx.act("alice", undelegate("alice", "alice", net, cpu)).unwrap();
                net_out += net;
                cpu_out += cpu;
            }

            let state = fx.engine.state();
            let row = state.delegations.find(&(name("alice"), name("alice"))).unwrap();
            prop_assert_eq!(row.net_weight, 50_000 - net_out);
            prop_assert_eq!(row.cpu_weight, 50_000 - cpu_out);
            match state.refunds.find(&name("alice")) {
                Some(request) => {
                    prop_assert_eq!(request.net_amount, net_out);
                    prop_assert_eq!(request.cpu_amount, cpu_out);
                }
                None => {
                    prop_assert_eq!(net_out + cpu_out, 0);
                }
            }
        }
    }
}
