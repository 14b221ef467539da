//! RAM trading and per-account resource limits

use crate::contract::SystemContract;
use crate::host::{Host, Limits};
use crate::voting::VoterInfo;
use helix_core::{ensure, AccountName, Asset, HelixError, Result, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// `setram` rejects sizes at or above 1 PiB
pub const MAX_RAM_SIZE_LIMIT: u64 = 1 << 50;

/// Staked bandwidth and purchased RAM held by one account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResources {
    pub owner: AccountName,
    pub net_weight: i64,
    pub cpu_weight: i64,
    pub ram_bytes: i64,
}

impl UserResources {
    pub fn new(owner: AccountName) -> Self {
        Self {
            owner,
            net_weight: 0,
            cpu_weight: 0,
            ram_bytes: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.net_weight == 0 && self.cpu_weight == 0 && self.ram_bytes == 0
    }
}

impl Row for UserResources {
    type Key = AccountName;

    fn primary_key(&self) -> AccountName {
        self.owner.clone()
    }
}

/// Which of an account's limits are set by hand instead of following its stake
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFlags {
    pub ram_managed: bool,
    pub net_managed: bool,
    pub cpu_managed: bool,
}

#[derive(Clone, Copy)]
enum Resource {
    Ram,
    Net,
    Cpu,
}

impl Resource {
    fn flag(self, flags: &mut ResourceFlags) -> &mut bool {
        match self {
            Resource::Ram => &mut flags.ram_managed,
            Resource::Net => &mut flags.net_managed,
            Resource::Cpu => &mut flags.cpu_managed,
        }
    }

    fn is_set(self, flags: &ResourceFlags) -> bool {
        match self {
            Resource::Ram => flags.ram_managed,
            Resource::Net => flags.net_managed,
            Resource::Cpu => flags.cpu_managed,
        }
    }

    fn unmanaged_msg(self) -> &'static str {
        match self {
            Resource::Ram => "RAM of account is already unmanaged",
            Resource::Net => "network bandwidth of account is already unmanaged",
            Resource::Cpu => "CPU bandwidth of account is already unmanaged",
        }
    }
}

fn fee_for(amount: i64, divisor: i64) -> i64 {
    (amount + divisor - 1) / divisor
}

impl<H: Host> SystemContract<'_, H> {
    /// Apply RAM supply growth accrued since the last increase
    pub(crate) fn update_ram_supply(&mut self) -> Result<()> {
        let now = self.block_time();
        let global = &self.state.global;
        if now <= global.last_ram_increase {
            return Ok(());
        }
        let new_ram = u64::from(now.slots_since(global.last_ram_increase)) * u64::from(global.new_ram_per_block);
        let grow = i64::try_from(new_ram).map_err(|_| HelixError::invariant("ram growth overflow"))?;
        self.state.market_mut()?.grow_supply(grow)?;
        self.state.global.max_ram_size += new_ram;
        self.state.global.last_ram_increase = now;
        Ok(())
    }

    pub(crate) fn resource_flags(&self, account: &AccountName) -> ResourceFlags {
        self.state
            .voters
            .find(account)
            .map(|v| v.flags)
            .unwrap_or_default()
    }

    /// Point the host's RAM limit at purchased bytes plus the gift, unless managed
    pub(crate) fn sync_ram_limit(&mut self, account: &AccountName) -> Result<()> {
        if self.resource_flags(account).ram_managed {
            return Ok(());
        }
        let ram_bytes = self
            .state
            .user_resources
            .find(account)
            .map_or(0, |r| r.ram_bytes);
        let current = self.host.get_limits(account);
        self.host.set_limits(
            account,
            Limits {
                ram_bytes: ram_bytes + self.config.market.ram_gift_bytes,
                ..current
            },
        )
    }

    pub fn buyram(&mut self, payer: &AccountName, receiver: &AccountName, quant: &Asset) -> Result<()> {
        self.require_auth(payer)?;
        self.update_ram_supply()?;
        self.check_core(quant, "must buy ram with core token")?;
        ensure!(quant.amount > 0, HelixError::invalid("must purchase a positive amount"));

        let fee = if payer == &self.config.accounts.airdrop {
            let bytes = self.state.market()?.preview_buy(quant.amount)?;
            self.record_airdrop_ram(receiver, bytes)?;
            0
        } else {
            fee_for(quant.amount, self.config.market.fee_divisor)
        };
        let quant_after_fee = quant.amount - fee;
        ensure!(
            quant_after_fee > 0,
            HelixError::invalid("must purchase a positive amount after fees")
        );

        let accounts = self.config.accounts.clone();
        let net_quant = self.core_asset(quant_after_fee)?;
        self.host.transfer(payer, &accounts.ram, &net_quant, "buy ram")?;
        self.pay(payer, &accounts.ramfee, fee, "ram fee")?;

        let bytes_out = self.state.market_mut()?.buy_bytes(quant_after_fee)?;
        ensure!(bytes_out > 0, HelixError::invalid("must reserve a positive amount"));

        self.state.global.total_ram_bytes_reserved += bytes_out as u64;
        self.state.global.total_ram_stake += quant_after_fee;

        if self.state.user_resources.contains(receiver) {
            self.state
                .user_resources
                .modify(receiver, |r| r.ram_bytes += bytes_out)?;
        } else {
            let mut row = UserResources::new(receiver.clone());
            row.ram_bytes = bytes_out;
            self.state.user_resources.emplace(row)?;
        }
        self.sync_ram_limit(receiver)?;

        info!(%payer, %receiver, spent = quant.amount, fee, bytes = bytes_out, "bought ram");
        Ok(())
    }

    /// Buy an exact number of kilobytes at the current price
    pub fn buyrambytes(&mut self, payer: &AccountName, receiver: &AccountName, kbytes: u32) -> Result<()> {
        let bytes = i64::from(kbytes) * 1024;
        let cost = self.state.market()?.quote_bytes(bytes)?;
        let quant = self.core_asset(cost)?;
        self.buyram(payer, receiver, &quant)
    }

    pub fn sellram(&mut self, account: &AccountName, kbytes: i64) -> Result<()> {
        self.require_auth(account)?;
        self.update_ram_supply()?;
        ensure!(kbytes > 0, HelixError::invalid("cannot sell negative byte"));
        let bytes = kbytes
            .checked_mul(1024)
            .ok_or_else(|| HelixError::invalid("byte count overflow"))?;

        let airdropped = self
            .state
            .airdrops
            .find(account)
            .map_or(0, |g| i64::from(g.ram_bytes));
        let held = self
            .state
            .user_resources
            .get(account, "no resource row")?
            .ram_bytes;
        ensure!(held - airdropped >= bytes, HelixError::insufficient("insufficient quota"));

        let tokens_out = self.state.market_mut()?.sell_bytes(bytes)?;
        ensure!(
            tokens_out > 1,
            HelixError::invalid("token amount received from selling ram is too low")
        );

        self.state.global.total_ram_bytes_reserved -= bytes as u64;
        self.state.global.total_ram_stake -= tokens_out;
        ensure!(
            self.state.global.total_ram_stake >= 0,
            HelixError::invariant("attempt to unstake more tokens than previously staked")
        );

        let row = self
            .state
            .user_resources
            .modify(account, |r| r.ram_bytes -= bytes)?;
        self.sync_ram_limit(account)?;
        if row.is_empty() {
            self.state.user_resources.erase(account);
        }

        let accounts = self.config.accounts.clone();
        let proceeds = self.core_asset(tokens_out)?;
        self.host.transfer(&accounts.ram, account, &proceeds, "sell ram")?;
        let fee = fee_for(tokens_out, self.config.market.fee_divisor);
        self.pay(account, &accounts.ramfee, fee, "sell ram fee")?;

        info!(%account, bytes, proceeds = tokens_out, fee, "sold ram");
        Ok(())
    }

    pub fn setram(&mut self, max_ram_size: u64) -> Result<()> {
        self.require_system_auth()?;
        let global = &self.state.global;
        ensure!(
            max_ram_size > global.max_ram_size,
            HelixError::invalid("ram may only be increased")
        );
        ensure!(
            max_ram_size < MAX_RAM_SIZE_LIMIT,
            HelixError::invalid("ram size is unrealistic")
        );
        ensure!(
            max_ram_size > global.total_ram_bytes_reserved,
            HelixError::invalid("attempt to set max below reserved")
        );

        let delta = (max_ram_size - global.max_ram_size) as i64;
        self.state.market_mut()?.grow_supply(delta)?;
        self.state.global.max_ram_size = max_ram_size;
        info!(max_ram_size, "ram size increased");
        Ok(())
    }

    pub fn setramrate(&mut self, bytes_per_block: u16) -> Result<()> {
        self.require_system_auth()?;
        self.update_ram_supply()?;
        self.state.global.new_ram_per_block = bytes_per_block;
        Ok(())
    }

    /// Set all three limits of an account that has no stake and no managed flags
    pub fn setalimits(&mut self, account: &AccountName, ram_bytes: i64, net_weight: i64, cpu_weight: i64) -> Result<()> {
        self.require_system_auth()?;
        ensure!(
            !self.state.user_resources.contains(account),
            HelixError::invalid("only supports unlimited accounts")
        );
        let flags = self.resource_flags(account);
        ensure!(
            !(flags.ram_managed || flags.net_managed || flags.cpu_managed),
            HelixError::invalid("cannot use setalimits on an account with managed resources")
        );
        self.host.set_limits(
            account,
            Limits {
                ram_bytes,
                net_weight,
                cpu_weight,
            },
        )
    }

    pub fn setacctram(&mut self, account: &AccountName, ram_bytes: Option<i64>) -> Result<()> {
        self.require_system_auth()?;
        let ram = match ram_bytes {
            None => {
                self.set_managed(account, Resource::Ram, false)?;
                let held = self
                    .state
                    .user_resources
                    .find(account)
                    .map_or(0, |r| r.ram_bytes);
                held + self.config.market.ram_gift_bytes
            }
            Some(value) => {
                ensure!(value >= 0, HelixError::invalid("not allowed to set RAM limit to unlimited"));
                self.set_managed(account, Resource::Ram, true)?;
                value
            }
        };
        let current = self.host.get_limits(account);
        self.host
            .set_limits(account, Limits { ram_bytes: ram, ..current })
    }

    pub fn setacctnet(&mut self, account: &AccountName, net_weight: Option<i64>) -> Result<()> {
        self.require_system_auth()?;
        let net = match net_weight {
            None => {
                self.set_managed(account, Resource::Net, false)?;
                self.state
                    .user_resources
                    .find(account)
                    .map_or(0, |r| r.net_weight)
            }
            Some(value) => {
                ensure!(value >= -1, HelixError::invalid("invalid value for net_weight"));
                self.set_managed(account, Resource::Net, true)?;
                value
            }
        };
        let current = self.host.get_limits(account);
        self.host
            .set_limits(account, Limits { net_weight: net, ..current })
    }

    pub fn setacctcpu(&mut self, account: &AccountName, cpu_weight: Option<i64>) -> Result<()> {
        self.require_system_auth()?;
        let cpu = match cpu_weight {
            None => {
                self.set_managed(account, Resource::Cpu, false)?;
                self.state
                    .user_resources
                    .find(account)
                    .map_or(0, |r| r.cpu_weight)
            }
            Some(value) => {
                ensure!(value >= -1, HelixError::invalid("invalid value for cpu_weight"));
                self.set_managed(account, Resource::Cpu, true)?;
                value
            }
        };
        let current = self.host.get_limits(account);
        self.host
            .set_limits(account, Limits { cpu_weight: cpu, ..current })
    }

    /// Clearing requires the flag to be set; setting creates the voter row if needed
    fn set_managed(&mut self, account: &AccountName, resource: Resource, managed: bool) -> Result<()> {
        if !managed {
            ensure!(
                self.state.voters.contains(account) && resource.is_set(&self.resource_flags(account)),
                HelixError::invalid(resource.unmanaged_msg())
            );
        }
        if !self.state.voters.contains(account) {
            self.state.voters.emplace(VoterInfo::new(account.clone()))?;
        }
        self.state
            .voters
            .modify(account, |v| *resource.flag(&mut v.flags) = managed)?;
        debug!(%account, managed, "resource management flag changed");
        Ok(())
    }
}
