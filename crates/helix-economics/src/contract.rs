//! The system contract: one action's view of state, host, config and context
//!
//! Each component module adds its operations as `impl<H: Host> SystemContract<'_, H>`
//! blocks; [`SystemContract::apply`] is the command table routing an [`Action`] to
//! its handler.

use crate::action::Action;
use crate::config::EconomicsConfig;
use crate::context::Context;
use crate::host::Host;
use crate::state::SystemState;
use helix_core::{ensure, AccountName, Asset, BlockTimestamp, HelixError, Result, Symbol, TimePoint};

pub struct SystemContract<'a, H: Host> {
    pub(crate) state: &'a mut SystemState,
    pub(crate) host: &'a mut H,
    pub(crate) config: &'a EconomicsConfig,
    pub(crate) ctx: &'a Context,
}

impl<'a, H: Host> SystemContract<'a, H> {
    pub fn new(
        state: &'a mut SystemState,
        host: &'a mut H,
        config: &'a EconomicsConfig,
        ctx: &'a Context,
    ) -> Self {
        Self {
            state,
            host,
            config,
            ctx,
        }
    }

    /// Route an action to its handler
    pub fn apply(&mut self, action: &Action) -> Result<()> {
        match action.clone() {
            Action::Init { version, core } => self.init(version, core),
            Action::SetAlimits {
                account,
                ram_bytes,
                net_weight,
                cpu_weight,
            } => self.setalimits(&account, ram_bytes, net_weight, cpu_weight),
            Action::SetAcctRam { account, ram_bytes } => self.setacctram(&account, ram_bytes),
            Action::SetAcctNet { account, net_weight } => self.setacctnet(&account, net_weight),
            Action::SetAcctCpu { account, cpu_weight } => self.setacctcpu(&account, cpu_weight),
            Action::BuyRam {
                payer,
                receiver,
                quant,
            } => self.buyram(&payer, &receiver, &quant),
            Action::BuyRamBytes {
                payer,
                receiver,
                kbytes,
            } => self.buyrambytes(&payer, &receiver, kbytes),
            Action::SellRam { account, kbytes } => self.sellram(&account, kbytes),
            Action::DelegateBw {
                from,
                receiver,
                stake_net_quantity,
                stake_cpu_quantity,
                transfer,
            } => self.delegatebw(&from, &receiver, &stake_net_quantity, &stake_cpu_quantity, transfer),
            Action::UndelegateBw {
                from,
                receiver,
                unstake_net_quantity,
                unstake_cpu_quantity,
            } => self.undelegatebw(&from, &receiver, &unstake_net_quantity, &unstake_cpu_quantity),
            Action::Refund { owner } => self.refund(&owner),
            Action::RegProducer {
                producer,
                producer_key,
                url,
                location,
                commission_rate,
            } => self.regproducer(&producer, producer_key, &url, location, commission_rate),
            Action::UnregProd { producer } => self.unregprod(&producer),
            Action::SetRam { max_ram_size } => self.setram(max_ram_size),
            Action::SetRamRate { bytes_per_block } => self.setramrate(bytes_per_block),
            Action::VoteProducer {
                voter,
                producer,
                quantity,
            } => self.voteproducer(&voter, &producer, &quantity),
            Action::SetParams { params } => self.setparams(params),
            Action::ClaimProd { owner } => self.claimprod(&owner),
            Action::ClaimVoter { owner, producer } => self.claimvoter(&owner, &producer),
            Action::SetPriv { account, is_priv } => self.setpriv(&account, is_priv),
            Action::RmvProducer { producer } => self.rmvproducer(&producer),
            Action::BidName {
                bidder,
                newname,
                bid,
            } => self.bidname(&bidder, &newname, &bid),
            Action::BidRefund { bidder, newname } => self.bidrefund(&bidder, &newname),
            Action::SetResAdCfg {
                limit_ram_kbytes,
                limit_net,
                limit_cpu,
            } => self.setresadcfg(limit_ram_kbytes, &limit_net, &limit_cpu),
            Action::OnBlock {
                timestamp,
                producer,
            } => self.onblock(timestamp, &producer),
            Action::UpdtRevision { revision } => self.updtrevision(revision),
            Action::AddAirdrop { account } => self.addairdrop(&account),
        }
    }

    pub(crate) fn now(&self) -> TimePoint {
        self.ctx.now()
    }

    pub(crate) fn block_time(&self) -> BlockTimestamp {
        self.ctx.block_time()
    }

    pub(crate) fn require_auth(&self, account: &AccountName) -> Result<()> {
        self.ctx.require_auth(account)
    }

    pub(crate) fn require_system_auth(&self) -> Result<()> {
        self.ctx.require_auth(&self.config.accounts.system)
    }

    pub(crate) fn core_symbol(&self) -> Result<Symbol> {
        self.state.core_symbol()
    }

    /// Smallest units per whole core token
    pub(crate) fn precision_unit(&self) -> Result<i64> {
        Ok(self.core_symbol()?.precision_unit())
    }

    pub(crate) fn core_asset(&self, amount: i64) -> Result<Asset> {
        Ok(Asset::new(amount, self.core_symbol()?))
    }

    /// Reject anything not denominated in the core token
    pub(crate) fn check_core(&self, quantity: &Asset, msg: &str) -> Result<()> {
        ensure!(quantity.symbol == self.core_symbol()?, HelixError::invalid(msg));
        ensure!(quantity.is_valid(), HelixError::invalid("invalid quantity"));
        Ok(())
    }

    /// Voting stake needed before the chain activates
    pub(crate) fn min_activated_stake(&self) -> Result<i64> {
        let voting = &self.config.voting;
        let unit = self.precision_unit()? as f64;
        Ok((voting.max_supply as f64 * (voting.min_activated_stake_rate * unit)) as i64)
    }

    pub(crate) fn is_activated(&self) -> Result<bool> {
        Ok(self.state.global.total_activated_stake >= self.min_activated_stake()?)
    }

    pub(crate) fn require_activated(&self) -> Result<()> {
        ensure!(
            self.is_activated()?,
            HelixError::too_early("cannot claim rewards until the chain is activated")
        );
        Ok(())
    }

    /// Move core tokens through the ledger, skipping empty amounts
    pub(crate) fn pay(&mut self, from: &AccountName, to: &AccountName, amount: i64, memo: &str) -> Result<()> {
        if amount <= 0 {
            return Ok(());
        }
        let quantity = self.core_asset(amount)?;
        self.host.transfer(from, to, &quantity, memo)
    }
}
