//! One-time resource grants paid for by the airdrop account
//!
//! Recipients are enrolled once with `addairdrop`. Each of RAM, NET and CPU can then be
//! granted a single time, up to the caps set by `setresadcfg`. Granted RAM cannot be
//! sold back to the market.

use crate::contract::SystemContract;
use crate::host::Host;
use helix_core::{ensure, AccountName, Asset, HelixError, Result, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropGrant {
    pub owner: AccountName,
    pub net: i64,
    pub cpu: i64,
    pub ram_bytes: u32,
}

impl AirdropGrant {
    pub fn new(owner: AccountName) -> Self {
        Self {
            owner,
            net: 0,
            cpu: 0,
            ram_bytes: 0,
        }
    }
}

impl Row for AirdropGrant {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.owner.clone()
    }
}

impl<H: Host> SystemContract<'_, H> {
    /// Set the per-recipient caps; a zero cap switches that grant off
    pub fn setresadcfg(&mut self, limit_ram_kbytes: u32, limit_net: &Asset, limit_cpu: &Asset) -> Result<()> {
        self.require_system_auth()?;
        self.check_core(limit_net, "net limit must be in the core token")?;
        self.check_core(limit_cpu, "cpu limit must be in the core token")?;
        ensure!(
            limit_net.amount >= 0 && limit_cpu.amount >= 0,
            HelixError::invalid("airdrop limits cannot be negative")
        );
        let ram_bytes = limit_ram_kbytes
            .checked_mul(1024)
            .ok_or_else(|| HelixError::invalid("ram limit too large"))?;

        let global = &mut self.state.global;
        global.res_airdrop_limit_ram_bytes = ram_bytes;
        global.res_airdrop_limit_net = limit_net.amount;
        global.res_airdrop_limit_cpu = limit_cpu.amount;
        info!(ram_bytes, net = limit_net.amount, cpu = limit_cpu.amount, "airdrop limits set");
        Ok(())
    }

    pub fn addairdrop(&mut self, account: &AccountName) -> Result<()> {
        self.require_auth(&self.config.accounts.airdrop)?;
        ensure!(
            !self.state.airdrops.contains(account),
            HelixError::invalid("account is already an airdrop recipient")
        );
        self.state.airdrops.emplace(AirdropGrant::new(account.clone()))?;
        info!(%account, "airdrop recipient added");
        Ok(())
    }

    /// Record a RAM grant of `bytes` to `receiver`
    pub(crate) fn record_airdrop_ram(&mut self, receiver: &AccountName, bytes: i64) -> Result<()> {
        let limit = self.state.global.res_airdrop_limit_ram_bytes;
        ensure!(
            limit > 0,
            HelixError::invalid("the airdrop memory resource function has been turned off")
        );
        let grant = self
            .state
            .airdrops
            .get(receiver, "receiver is not an airdrop recipient")?;
        ensure!(
            grant.ram_bytes == 0,
            HelixError::invalid("memory resources can only be dropped once")
        );
        ensure!(
            bytes <= i64::from(limit),
            HelixError::invalid("the airdrop memory exceeded the maximum limit")
        );
        let bytes = bytes as u32;
        self.state.airdrops.modify(receiver, |g| g.ram_bytes = bytes)?;
        Ok(())
    }

    /// Record NET and CPU grants; only positive deltas count as grants
    pub(crate) fn record_airdrop_bandwidth(&mut self, receiver: &AccountName, net: i64, cpu: i64) -> Result<()> {
        let global = &self.state.global;
        if cpu > 0 {
            ensure!(
                global.res_airdrop_limit_cpu > 0,
                HelixError::invalid("the airdrop cpu resource function has been turned off")
            );
            ensure!(
                cpu <= global.res_airdrop_limit_cpu,
                HelixError::invalid("the airdrop cpu exceeded the maximum limit")
            );
        }
        if net > 0 {
            ensure!(
                global.res_airdrop_limit_net > 0,
                HelixError::invalid("the airdrop net resource function has been turned off")
            );
            ensure!(
                net <= global.res_airdrop_limit_net,
                HelixError::invalid("the airdrop net exceeded the maximum limit")
            );
        }

        let grant = self
            .state
            .airdrops
            .get(receiver, "receiver is not an airdrop recipient")?;
        ensure!(
            cpu <= 0 || grant.cpu == 0,
            HelixError::invalid("cpu resources can only be dropped once")
        );
        ensure!(
            net <= 0 || grant.net == 0,
            HelixError::invalid("net resources can only be dropped once")
        );
        self.state.airdrops.modify(receiver, |g| {
            if cpu > 0 {
                g.cpu = cpu;
            }
            if net > 0 {
                g.net = net;
            }
        })?;
        Ok(())
    }
}
