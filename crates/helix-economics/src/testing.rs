//! Shared fixture for unit tests

use crate::action::Action;
use crate::config::EconomicsConfig;
use crate::context::Context;
use crate::engine::Engine;
use crate::host::Ledger;
use crate::memory::MemoryHost;
use helix_core::{AccountName, Asset, BlockTimestamp, PublicKey, Result, Symbol, TimePoint};

/// Smallest units per HLX
pub const UNIT: i64 = 10_000;

/// 2024-01-01T00:00:00Z
const GENESIS_SECS: i64 = 1_704_067_200;

pub fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

pub fn core() -> Symbol {
    Symbol::new("HLX", 4).unwrap()
}

pub fn hlx(units: i64) -> Asset {
    Asset::new(units, core())
}

pub fn key(byte: u8) -> PublicKey {
    PublicKey::new([byte; 33])
}

/// An initialized engine over a memory host with its own clock
///
/// `helix` holds 100,000,000 HLX and the activation threshold is 150 HLX.
pub struct Fixture {
    pub engine: Engine<MemoryHost>,
    pub now: TimePoint,
}

impl Fixture {
    pub fn new() -> Self {
        let mut config = EconomicsConfig::default();
        config.voting.max_supply = 1_000;

        let mut host = MemoryHost::new();
        host.ledger_mut()
            .create(name("helix"), hlx(10_000_000_000_000))
            .unwrap();
        host.ledger_mut()
            .issue(&name("helix"), &hlx(1_000_000_000_000), "genesis")
            .unwrap();

        let mut fx = Self {
            engine: Engine::new(config, host),
            now: TimePoint::from_secs(GENESIS_SECS),
        };
        fx.system(Action::Init { version: 0, core: core() }).unwrap();
        fx
    }

    /// `bpa` registered and `whale` voting exactly the activation threshold for it
    pub fn activated() -> Self {
        let mut fx = Self::new();
        fx.fund("whale", 2_000_000);
        fx.act(
            "whale",
            Action::DelegateBw {
                from: name("whale"),
                receiver: name("whale"),
                stake_net_quantity: hlx(1_000_000),
                stake_cpu_quantity: hlx(1_000_000),
                transfer: false,
            },
        )
        .unwrap();
        fx.register("bpa");
        fx.act(
            "whale",
            Action::VoteProducer {
                voter: name("whale"),
                producer: name("bpa"),
                quantity: hlx(1_500_000),
            },
        )
        .unwrap();
        fx
    }

    pub fn advance_secs(&mut self, secs: i64) {
        self.now = self.now.plus_secs(secs);
    }

    pub fn block(&self) -> BlockTimestamp {
        BlockTimestamp::from_time_point(self.now)
    }

    /// Run `action` signed by `signer` at the fixture's clock
    pub fn act(&mut self, signer: &str, action: Action) -> Result<()> {
        let ctx = Context::new(self.now).with_auth(name(signer));
        self.engine.execute(&ctx, &action)
    }

    pub fn system(&mut self, action: Action) -> Result<()> {
        self.act("helix", action)
    }

    pub fn fund(&mut self, account: &str, units: i64) {
        self.engine
            .host_mut()
            .transfer(&name("helix"), &name(account), &hlx(units), "fund")
            .unwrap();
    }

    pub fn balance(&self, account: &str) -> i64 {
        self.engine.host().balance(&name(account), &core())
    }

    pub fn supply(&self) -> i64 {
        self.engine.host().supply(&core()).unwrap().amount
    }

    pub fn register(&mut self, producer: &str) {
        self.act(
            producer,
            Action::RegProducer {
                producer: name(producer),
                producer_key: key(7),
                url: format!("https://{producer}.example.org"),
                location: 0,
                commission_rate: 0.5,
            },
        )
        .unwrap();
    }

    pub fn set_config(&mut self, config: EconomicsConfig) {
        self.engine.set_config(config);
    }
}
