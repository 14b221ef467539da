//! Administrative actions of the system account

use crate::contract::SystemContract;
use crate::host::Host;
use crate::market::RamMarket;
use crate::state::BlockchainParameters;
use helix_core::{ensure, AccountName, HelixError, Result, Symbol};
use tracing::info;

/// Highest revision `updtrevision` may reach
pub const MAX_REVISION: u8 = 255;

impl<H: Host> SystemContract<'_, H> {
    /// Create the RAM market against the core token
    ///
    /// The base reserve is all unreserved RAM, the quote reserve a thousandth of the
    /// current core supply.
    pub fn init(&mut self, version: u32, core: Symbol) -> Result<()> {
        self.require_system_auth()?;
        ensure!(version == 0, HelixError::invalid("unsupported version for init action"));
        ensure!(
            self.state.market.is_none(),
            HelixError::invalid("system contract has already been initialized")
        );

        let supply = self.host.supply(&core)?;
        ensure!(
            supply.symbol == core,
            HelixError::invalid("specified core symbol does not exist (precision mismatch)")
        );
        ensure!(
            supply.amount > 0,
            HelixError::invalid("system token supply must be greater than 0")
        );

        let free_ram = i64::try_from(self.state.global.free_ram())
            .map_err(|_| HelixError::invariant("free ram exceeds market range"))?;
        let market = RamMarket::new(free_ram, supply.amount / 1000, core.clone())?;
        info!(
            core = %core,
            base = market.base.balance,
            quote = market.quote.balance,
            "initialized ram market"
        );
        self.state.market = Some(market);
        Ok(())
    }

    pub fn setparams(&mut self, params: BlockchainParameters) -> Result<()> {
        self.require_system_auth()?;
        params.validate()?;
        self.host.set_blockchain_parameters(&params)?;
        self.state.global.parameters = params;
        Ok(())
    }

    pub fn setpriv(&mut self, account: &AccountName, is_priv: bool) -> Result<()> {
        self.require_system_auth()?;
        self.host.set_privileged(account, is_priv)
    }

    pub fn updtrevision(&mut self, revision: u8) -> Result<()> {
        self.require_system_auth()?;
        let current = self.state.global.revision;
        ensure!(current < MAX_REVISION, HelixError::invalid("can not increment revision"));
        ensure!(
            revision == current + 1,
            HelixError::invalid("can only increment revision by one")
        );
        self.state.global.revision = revision;
        Ok(())
    }
}
