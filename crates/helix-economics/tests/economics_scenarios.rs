//! End-to-end scenarios for the Helix system account
//!
//! Each scenario drives an `Engine<MemoryHost>` through actions the way a chain
//! would: one signed action at a time, with deferred actions run when due.

use helix_core::{AccountName, Asset, BlockTimestamp, ErrorKind, PublicKey, Result, Symbol, TimePoint};
use helix_economics::{Action, Context, EconomicsConfig, Engine, Ledger, MemoryHost};

const UNIT: i64 = 10_000;
const DAY: i64 = 24 * 3600;

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn core() -> Symbol {
    Symbol::new("HLX", 4).unwrap()
}

fn hlx(units: i64) -> Asset {
    Asset::new(units, core())
}

struct Chain {
    engine: Engine<MemoryHost>,
    now: TimePoint,
}

impl Chain {
    /// `supply` units issued to `helix`; activation at 150 HLX of votes
    fn new(supply: i64, mut config: EconomicsConfig) -> Self {
        config.voting.max_supply = 1_000;
        let mut host = MemoryHost::new();
        host.ledger_mut().create(name("helix"), hlx(supply * 10)).unwrap();
        host.ledger_mut().issue(&name("helix"), &hlx(supply), "genesis").unwrap();

        let mut chain = Self {
            engine: Engine::new(config, host),
            now: TimePoint::from_secs(1_704_067_200),
        };
        chain
            .act("helix", Action::Init { version: 0, core: core() })
            .unwrap();
        chain
    }

    fn act(&mut self, signer: &str, action: Action) -> Result<()> {
        let ctx = Context::new(self.now).with_auth(name(signer));
        self.engine.execute(&ctx, &action)
    }

    fn advance(&mut self, secs: i64) {
        self.now = self.now.plus_secs(secs);
        for outcome in self.engine.run_deferred(self.now) {
            outcome.result.unwrap();
        }
    }

    fn on_block(&mut self, producer: &str) {
        let timestamp = BlockTimestamp::from_time_point(self.now);
        self.act(
            "helix",
            Action::OnBlock {
                timestamp,
                producer: name(producer),
            },
        )
        .unwrap();
    }

    fn fund(&mut self, account: &str, units: i64) {
        self.engine
            .host_mut()
            .transfer(&name("helix"), &name(account), &hlx(units), "fund")
            .unwrap();
    }

    fn balance(&self, account: &str) -> i64 {
        self.engine.host().balance(&name(account), &core())
    }

    fn stake(&mut self, account: &str, net: i64, cpu: i64) {
        self.act(
            account,
            Action::DelegateBw {
                from: name(account),
                receiver: name(account),
                stake_net_quantity: hlx(net),
                stake_cpu_quantity: hlx(cpu),
                transfer: false,
            },
        )
        .unwrap();
    }

    fn register(&mut self, producer: &str, commission_rate: f64, key: u8) {
        self.act(
            producer,
            Action::RegProducer {
                producer: name(producer),
                producer_key: PublicKey::new([key; 33]),
                url: String::new(),
                location: 0,
                commission_rate,
            },
        )
        .unwrap();
    }

    fn vote(&mut self, voter: &str, producer: &str, units: i64) {
        self.act(
            voter,
            Action::VoteProducer {
                voter: name(voter),
                producer: name(producer),
                quantity: hlx(units),
            },
        )
        .unwrap();
    }
}

mod market_tests {
    use super::*;

    #[test]
    fn test_buy_against_known_reserves() {
        // Quote reserve = supply / 1000 = 1,000,000 HLX; base reserve = 1e9 bytes
        let mut config = EconomicsConfig::default();
        config.market.initial_max_ram_size = 1_000_000_000;
        let mut chain = Chain::new(10_000_000_000_000, config);
        chain.fund("alice", 10_000 * UNIT);

        chain
            .act(
                "alice",
                Action::BuyRam {
                    payer: name("alice"),
                    receiver: name("alice"),
                    quant: hlx(10_000 * UNIT),
                },
            )
            .unwrap();

        // 0.5% fee is 50 HLX; 9,950 HLX buys 1e9 * 9950 / 1,009,950 bytes
        assert_eq!(chain.balance("helix.ramfee"), 50 * UNIT);
        assert_eq!(chain.balance("helix.ram"), 9_950 * UNIT);
        let state = chain.engine.state();
        let row = state.user_resources.find(&name("alice")).unwrap();
        assert_eq!(row.ram_bytes, 9_851_972);
        assert_eq!(state.global.total_ram_bytes_reserved, 9_851_972);
        assert_eq!(state.global.total_ram_stake, 9_950 * UNIT);
    }

    #[test]
    fn test_sell_returns_less_than_paid() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("alice", 1_000 * UNIT);
        chain
            .act(
                "alice",
                Action::BuyRamBytes {
                    payer: name("alice"),
                    receiver: name("alice"),
                    kbytes: 64,
                },
            )
            .unwrap();
        let after_buy = chain.balance("alice");
        chain
            .act("alice", Action::SellRam { account: name("alice"), kbytes: 32 })
            .unwrap();

        let proceeds = chain.balance("alice") - after_buy;
        assert!(proceeds > 0);
        assert!(proceeds < 1_000 * UNIT - after_buy);
        let row = chain.engine.state().user_resources.find(&name("alice")).unwrap().clone();
        assert!(row.ram_bytes > 0);
        assert_eq!(
            chain.engine.state().global.total_ram_bytes_reserved,
            row.ram_bytes as u64
        );
    }
}

mod bandwidth_tests {
    use super::*;

    fn activated() -> Chain {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("whale", 200 * UNIT);
        chain.stake("whale", 100 * UNIT, 100 * UNIT);
        chain.register("bpa", 0.5, 1);
        chain.vote("whale", "bpa", 150 * UNIT);
        chain
    }

    #[test]
    fn test_delayed_refund() {
        let mut chain = activated();
        chain.fund("alice", 200 * UNIT);
        chain.stake("alice", 100 * UNIT, 100 * UNIT);
        chain
            .act(
                "alice",
                Action::UndelegateBw {
                    from: name("alice"),
                    receiver: name("alice"),
                    unstake_net_quantity: hlx(40 * UNIT),
                    unstake_cpu_quantity: hlx(40 * UNIT),
                },
            )
            .unwrap();

        let request = chain.engine.state().refunds.find(&name("alice")).unwrap().clone();
        assert_eq!((request.net_amount, request.cpu_amount), (40 * UNIT, 40 * UNIT));
        assert_eq!(request.request_time, chain.now);

        let err = chain
            .act("alice", Action::Refund { owner: name("alice") })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);

        // The deferred refund fires once the delay has passed
        chain.advance(3 * DAY - 1);
        assert_eq!(chain.balance("alice"), 0);
        chain.advance(1);
        assert_eq!(chain.balance("alice"), 80 * UNIT);
        assert!(chain.engine.state().refunds.is_empty());
    }

    #[test]
    fn test_undelegate_before_activation() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("alice", 20 * UNIT);
        chain.stake("alice", 10 * UNIT, 10 * UNIT);
        let err = chain
            .act(
                "alice",
                Action::UndelegateBw {
                    from: name("alice"),
                    receiver: name("alice"),
                    unstake_net_quantity: hlx(UNIT),
                    unstake_cpu_quantity: hlx(UNIT),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);
        assert!(chain.engine.state().refunds.is_empty());
    }
}

mod reward_tests {
    use super::*;

    #[test]
    fn test_equal_voters_split_commission() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.register("bpa", 0.1, 1);
        for voter in ["alice", "bob"] {
            chain.fund(voter, 200 * UNIT);
            chain.stake(voter, 100 * UNIT, 100 * UNIT);
            chain.vote(voter, "bpa", 100 * UNIT);
        }
        chain.on_block("bpa");
        chain.advance(DAY + 1);
        chain.act("bpa", Action::ClaimProd { owner: name("bpa") }).unwrap();

        let prod = chain.engine.state().producers.find(&name("bpa")).unwrap().clone();
        let held = prod.voters_vote_balance;
        assert!(held > 0);
        // Voters hold a tenth of the vote pay; the producer was paid the rest
        assert!(chain.balance("bpa") > 8 * held);

        chain
            .act("alice", Action::ClaimVoter { owner: name("alice"), producer: name("bpa") })
            .unwrap();
        let alice_vote_pay = held / 2;
        assert_eq!(
            chain.balance("alice"),
            alice_vote_pay + prod.voters_block_balance / 2
        );
        let prod = chain.engine.state().producers.find(&name("bpa")).unwrap().clone();
        assert_eq!(prod.voters_vote_balance, held - alice_vote_pay);

        // Bob is now the only voter with any age and takes what is left
        chain
            .act("bob", Action::ClaimVoter { owner: name("bob"), producer: name("bpa") })
            .unwrap();
        let prod = chain.engine.state().producers.find(&name("bpa")).unwrap().clone();
        assert_eq!(prod.voters_vote_balance, 0);
        assert_eq!(prod.voters_block_balance, 0);
        assert!(chain.balance("bob") >= chain.balance("alice"));
    }

    #[test]
    fn test_inflation_tracks_elapsed_time() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("whale", 200 * UNIT);
        chain.stake("whale", 100 * UNIT, 100 * UNIT);
        chain.register("bpa", 0.5, 1);
        chain.vote("whale", "bpa", 150 * UNIT);
        chain.on_block("bpa");

        let supply = |chain: &Chain| chain.engine.host().supply(&core()).unwrap().amount;
        let before = supply(&chain);
        chain.advance(7 * DAY);
        chain.act("bpa", Action::ClaimProd { owner: name("bpa") }).unwrap();

        // 4.879% a year over a 364 day year
        let expected = (0.04879 * before as f64 * 7.0 / 364.0) as i64;
        let minted = supply(&chain) - before;
        assert!((minted - expected).abs() <= 1, "minted {minted}, expected {expected}");
        assert!(chain.balance("helix.saving") > 0);
    }
}

mod election_tests {
    use super::*;

    #[test]
    fn test_schedule_follows_votes() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("whale", 2_000 * UNIT);
        chain.stake("whale", 1_000 * UNIT, 1_000 * UNIT);
        for (i, producer) in ["bpa", "bpb", "bpc"].iter().enumerate() {
            chain.register(producer, 0.5, i as u8 + 1);
        }
        chain.vote("whale", "bpa", 200 * UNIT);
        chain.vote("whale", "bpb", 100 * UNIT);

        chain.on_block("bpa");
        let schedules = chain.engine.host().schedules().to_vec();
        assert_eq!(schedules.len(), 1);
        let names: Vec<&str> = schedules[0].iter().map(|k| k.producer_name.as_str()).collect();
        assert_eq!(names, vec!["bpa", "bpb"]);

        // Not yet 120 slots since the last election
        chain.vote("whale", "bpc", 50 * UNIT);
        chain.advance(30);
        chain.on_block("bpa");
        assert_eq!(chain.engine.host().schedules().len(), 1);

        chain.advance(31);
        chain.on_block("bpb");
        let schedules = chain.engine.host().schedules();
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[1].len(), 3);
        assert_eq!(chain.engine.state().global.last_producer_schedule_size, 3);

        // Deactivated producers drop out, but a shrinking schedule is never proposed
        chain.act("bpc", Action::UnregProd { producer: name("bpc") }).unwrap();
        chain.advance(61);
        chain.on_block("bpa");
        assert_eq!(chain.engine.host().schedules().len(), 2);
    }
}

mod name_auction_tests {
    use super::*;

    #[test]
    fn test_outbid_bidder_is_refunded() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("bob", 100 * UNIT);
        chain.fund("carol", 100 * UNIT);
        let bid = |bidder: &str, units: i64| Action::BidName {
            bidder: name(bidder),
            newname: name("rare"),
            bid: hlx(units),
        };
        chain.act("bob", bid("bob", 10 * UNIT)).unwrap();
        chain.act("carol", bid("carol", 20 * UNIT)).unwrap();
        assert_eq!(chain.balance("bob"), 90 * UNIT);

        chain.advance(0);
        assert_eq!(chain.balance("bob"), 100 * UNIT);
        assert_eq!(chain.balance("helix.names"), 20 * UNIT);
        let state = chain.engine.state();
        assert!(state.bid_refunds.is_empty());
        assert_eq!(
            state.name_bids.find(&name("rare")).unwrap().high_bidder,
            name("carol")
        );
    }
}

mod determinism_tests {
    use super::*;

    fn replay() -> String {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("alice", 500 * UNIT);
        let steps = [
            ("alice", "delegatebw", serde_json::json!({
                "from": "alice", "receiver": "alice",
                "stake_net_quantity": "100.0000 HLX", "stake_cpu_quantity": "100.0000 HLX",
                "transfer": false
            })),
            ("alice", "buyram", serde_json::json!({
                "payer": "alice", "receiver": "alice", "quant": "25.0000 HLX"
            })),
            ("alice", "regproducer", serde_json::json!({
                "producer": "alice", "producer_key": "02".repeat(33),
                "url": "", "location": 0, "commission_rate": 0.5
            })),
            ("alice", "voteproducer", serde_json::json!({
                "voter": "alice", "producer": "alice", "quantity": "150.0000 HLX"
            })),
        ];
        for (signer, command, data) in steps {
            let action = Action::from_command(command, data).unwrap();
            chain.act(signer, action).unwrap();
            chain.advance(10);
        }
        chain.engine.state().digest().unwrap()
    }

    #[test]
    fn test_replay_is_deterministic() {
        assert_eq!(replay(), replay());
    }

    #[test]
    fn test_state_survives_json() {
        let mut chain = Chain::new(1_000_000_000_000, EconomicsConfig::default());
        chain.fund("alice", 50 * UNIT);
        chain.stake("alice", 10 * UNIT, 10 * UNIT);
        let state = chain.engine.state();
        let loaded = helix_economics::SystemState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(loaded.digest().unwrap(), state.digest().unwrap());
    }
}
