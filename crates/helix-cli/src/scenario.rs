//! JSON scenarios replayed against the in-memory host
//!
//! ```json
//! {
//!   "start": "2024-01-01T00:00:00Z",
//!   "token": { "issuer": "helix", "max_supply": "10000000000.0000 HLX", "supply": "1000000000.0000 HLX" },
//!   "balances": { "alice": "1000.0000 HLX" },
//!   "steps": [
//!     { "auth": ["helix"], "action": "init", "data": { "version": 0, "core": "4,HLX" } },
//!     { "after_secs": 60, "auth": ["alice"], "action": "buyram",
//!       "data": { "payer": "alice", "receiver": "alice", "quant": "10.0000 HLX" } }
//!   ]
//! }
//! ```
//!
//! Before each step the clock moves forward by `after_secs` and every deferred action
//! due by then runs.

use anyhow::{bail, Context as _};
use chrono::{DateTime, Utc};
use helix_core::{AccountName, Asset, TimePoint};
use helix_economics::{Action, Context, EconomicsConfig, Engine, Ledger, MemoryHost};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,
    pub token: TokenGenesis,
    #[serde(default)]
    pub balances: BTreeMap<AccountName, Asset>,
    pub steps: Vec<Step>,
}

fn default_start() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

/// The core token as it exists before the first step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenGenesis {
    pub issuer: AccountName,
    pub max_supply: Asset,
    /// Issued to `issuer`
    pub supply: Asset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub after_secs: i64,
    pub auth: Vec<AccountName>,
    pub action: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// The step is expected to be rejected
    #[serde(default)]
    pub expect_failure: bool,
}

/// Outcome of a replay
#[derive(Debug)]
pub struct Report {
    pub engine: Engine<MemoryHost>,
    pub applied: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub now: TimePoint,
}

impl Report {
    pub fn balances(&self, accounts: impl IntoIterator<Item = AccountName>) -> BTreeMap<AccountName, i64> {
        let Ok(symbol) = self.engine.state().core_symbol() else {
            return BTreeMap::new();
        };
        accounts
            .into_iter()
            .map(|account| {
                let balance = self.engine.host().balance(&account, &symbol);
                (account, balance)
            })
            .collect()
    }
}

impl Scenario {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid scenario")
    }

    /// Run every step; an unexpected rejection aborts the replay
    pub fn replay(&self, config: EconomicsConfig) -> anyhow::Result<Report> {
        let mut host = MemoryHost::new();
        let ledger = host.ledger_mut();
        ledger.create(self.token.issuer.clone(), self.token.max_supply.clone())?;
        ledger.issue(&self.token.issuer, &self.token.supply, "genesis")?;
        for (account, amount) in &self.balances {
            ledger.transfer(&self.token.issuer, account, amount, "genesis")?;
        }

        let mut engine = Engine::new(config, host);
        let mut now = TimePoint::from_datetime(self.start);
        let (mut applied, mut rejected, mut deferred) = (0, 0, 0);

        for (i, step) in self.steps.iter().enumerate() {
            if step.after_secs < 0 {
                bail!("step {i}: time cannot move backwards");
            }
            now = now.plus_secs(step.after_secs);
            for outcome in engine.run_deferred(now) {
                deferred += 1;
                if let Err(e) = outcome.result {
                    warn!(id = ?outcome.id, error = %e, "deferred action failed");
                }
            }

            let action = Action::from_command(&step.action, step.data.clone())
                .with_context(|| format!("step {i}: bad {} action", step.action))?;
            let ctx = step
                .auth
                .iter()
                .fold(Context::new(now), |ctx, account| ctx.with_auth(account.clone()));

            match (engine.execute(&ctx, &action), step.expect_failure) {
                (Ok(()), false) => applied += 1,
                (Err(e), true) => {
                    info!(step = i, error = %e, "rejected as expected");
                    rejected += 1;
                }
                (Ok(()), true) => bail!("step {i}: {} was expected to fail", step.action),
                (Err(e), false) => bail!("step {i}: {} failed: {e}", step.action),
            }
        }

        Ok(Report {
            engine,
            applied,
            rejected,
            deferred,
            now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "token": { "issuer": "helix", "max_supply": "10000000000.0000 HLX", "supply": "1000000000.0000 HLX" },
        "balances": { "alice": "1000.0000 HLX" },
        "steps": [
            { "auth": ["helix"], "action": "init", "data": { "version": 0, "core": "4,HLX" } },
            { "auth": ["alice"], "action": "buyram",
              "data": { "payer": "alice", "receiver": "alice", "quant": "10.0000 HLX" } },
            { "auth": ["bob"], "action": "buyram", "expect_failure": true,
              "data": { "payer": "alice", "receiver": "alice", "quant": "10.0000 HLX" } },
            { "after_secs": 60, "auth": ["alice"], "action": "delegatebw",
              "data": { "from": "alice", "receiver": "alice",
                        "stake_net_quantity": "5.0000 HLX", "stake_cpu_quantity": "5.0000 HLX",
                        "transfer": false } }
        ]
    }"#;

    #[test]
    fn test_replay_counts_steps() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let report = scenario.replay(EconomicsConfig::default()).unwrap();
        assert_eq!((report.applied, report.rejected, report.deferred), (3, 1, 0));
        assert_eq!(report.now, TimePoint::from_secs(1_704_067_200 + 60));

        let alice = AccountName::new("alice").unwrap();
        let balances = report.balances([alice.clone()]);
        assert_eq!(balances[&alice], (1_000 - 10 - 10) * 10_000);
        assert!(report.engine.state().user_resources.find(&alice).unwrap().ram_bytes > 0);
    }

    #[test]
    fn test_replay_is_reproducible() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let first = scenario.replay(EconomicsConfig::default()).unwrap();
        let second = scenario.replay(EconomicsConfig::default()).unwrap();
        assert_eq!(
            first.engine.state().digest().unwrap(),
            second.engine.state().digest().unwrap()
        );
    }

    #[test]
    fn test_unexpected_rejection_aborts() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.steps[2].expect_failure = false;
        let err = scenario.replay(EconomicsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("step 2"));

        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.steps[1].expect_failure = true;
        assert!(scenario.replay(EconomicsConfig::default()).is_err());
    }

    #[test]
    fn test_bundled_first_day() {
        let scenario = Scenario::from_json(include_str!("../scenarios/first-day.json")).unwrap();
        let report = scenario.replay(EconomicsConfig::default()).unwrap();
        // A bid refund and an unstake refund ran between steps
        assert_eq!((report.applied, report.rejected, report.deferred), (12, 1, 2));

        let name = |s: &str| AccountName::new(s).unwrap();
        let balances = report.balances([name("bob"), name("helix.names"), name("bpa")]);
        assert_eq!(balances[&name("helix.names")], 12 * 10_000);
        assert!(balances[&name("bpa")] > 100 * 10_000);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, report.engine.state().to_json().unwrap()).unwrap();
        let loaded =
            helix_economics::SystemState::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.digest().unwrap(), report.engine.state().digest().unwrap());
        assert!(loaded.refunds.is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.steps[1].action = "transfer".to_string();
        assert!(scenario.replay(EconomicsConfig::default()).is_err());
    }
}
