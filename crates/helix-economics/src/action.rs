//! Typed actions
//!
//! Actions serialize as `{"action": "<command>", "data": {...}}` where `<command>` is
//! the name in [`COMMANDS`].

use crate::state::BlockchainParameters;
use helix_core::{AccountName, Asset, BlockTimestamp, HelixError, PublicKey, Result, Symbol};
use serde::{Deserialize, Serialize};

/// Every command the system account accepts
pub const COMMANDS: [&str; 27] = [
    "init",
    "setalimits",
    "setacctram",
    "setacctnet",
    "setacctcpu",
    "buyram",
    "buyrambytes",
    "sellram",
    "delegatebw",
    "undelegatebw",
    "refund",
    "regproducer",
    "unregprod",
    "setram",
    "setramrate",
    "voteproducer",
    "setparams",
    "claimprod",
    "claimvoter",
    "setpriv",
    "rmvproducer",
    "bidname",
    "bidrefund",
    "setresadcfg",
    "onblock",
    "updtrevision",
    "addairdrop",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum Action {
    Init {
        version: u32,
        core: Symbol,
    },
    SetAlimits {
        account: AccountName,
        ram_bytes: i64,
        net_weight: i64,
        cpu_weight: i64,
    },
    SetAcctRam {
        account: AccountName,
        ram_bytes: Option<i64>,
    },
    SetAcctNet {
        account: AccountName,
        net_weight: Option<i64>,
    },
    SetAcctCpu {
        account: AccountName,
        cpu_weight: Option<i64>,
    },
    BuyRam {
        payer: AccountName,
        receiver: AccountName,
        quant: Asset,
    },
    BuyRamBytes {
        payer: AccountName,
        receiver: AccountName,
        kbytes: u32,
    },
    SellRam {
        account: AccountName,
        kbytes: i64,
    },
    DelegateBw {
        from: AccountName,
        receiver: AccountName,
        stake_net_quantity: Asset,
        stake_cpu_quantity: Asset,
        transfer: bool,
    },
    UndelegateBw {
        from: AccountName,
        receiver: AccountName,
        unstake_net_quantity: Asset,
        unstake_cpu_quantity: Asset,
    },
    Refund {
        owner: AccountName,
    },
    RegProducer {
        producer: AccountName,
        producer_key: PublicKey,
        url: String,
        location: u16,
        commission_rate: f64,
    },
    UnregProd {
        producer: AccountName,
    },
    SetRam {
        max_ram_size: u64,
    },
    SetRamRate {
        bytes_per_block: u16,
    },
    VoteProducer {
        voter: AccountName,
        producer: AccountName,
        quantity: Asset,
    },
    SetParams {
        params: BlockchainParameters,
    },
    ClaimProd {
        owner: AccountName,
    },
    ClaimVoter {
        owner: AccountName,
        producer: AccountName,
    },
    SetPriv {
        account: AccountName,
        is_priv: bool,
    },
    RmvProducer {
        producer: AccountName,
    },
    BidName {
        bidder: AccountName,
        newname: AccountName,
        bid: Asset,
    },
    BidRefund {
        bidder: AccountName,
        newname: AccountName,
    },
    SetResAdCfg {
        limit_ram_kbytes: u32,
        limit_net: Asset,
        limit_cpu: Asset,
    },
    OnBlock {
        timestamp: BlockTimestamp,
        producer: AccountName,
    },
    UpdtRevision {
        revision: u8,
    },
    AddAirdrop {
        account: AccountName,
    },
}

impl Action {
    /// Command name this action dispatches under
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::SetAlimits { .. } => "setalimits",
            Self::SetAcctRam { .. } => "setacctram",
            Self::SetAcctNet { .. } => "setacctnet",
            Self::SetAcctCpu { .. } => "setacctcpu",
            Self::BuyRam { .. } => "buyram",
            Self::BuyRamBytes { .. } => "buyrambytes",
            Self::SellRam { .. } => "sellram",
            Self::DelegateBw { .. } => "delegatebw",
            Self::UndelegateBw { .. } => "undelegatebw",
            Self::Refund { .. } => "refund",
            Self::RegProducer { .. } => "regproducer",
            Self::UnregProd { .. } => "unregprod",
            Self::SetRam { .. } => "setram",
            Self::SetRamRate { .. } => "setramrate",
            Self::VoteProducer { .. } => "voteproducer",
            Self::SetParams { .. } => "setparams",
            Self::ClaimProd { .. } => "claimprod",
            Self::ClaimVoter { .. } => "claimvoter",
            Self::SetPriv { .. } => "setpriv",
            Self::RmvProducer { .. } => "rmvproducer",
            Self::BidName { .. } => "bidname",
            Self::BidRefund { .. } => "bidrefund",
            Self::SetResAdCfg { .. } => "setresadcfg",
            Self::OnBlock { .. } => "onblock",
            Self::UpdtRevision { .. } => "updtrevision",
            Self::AddAirdrop { .. } => "addairdrop",
        }
    }

    /// Build an action from a command name and its JSON arguments
    pub fn from_command(command: &str, data: serde_json::Value) -> Result<Self> {
        if !COMMANDS.contains(&command) {
            return Err(HelixError::invalid(format!("unknown command: {command}")));
        }
        let tagged = serde_json::json!({ "action": command, "data": data });
        Ok(serde_json::from_value(tagged)?)
    }
}
