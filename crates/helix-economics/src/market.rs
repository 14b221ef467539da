//! # RAM Market
//!
//! Bancor pool pricing RAM bytes against the core token.
//!
//! ```text
//!   out = reserve_out * (1 - (reserve_in / (reserve_in + in)) ^ (w_in / w_out))
//! ```
//!
//! With equal connector weights this is `reserve_out * in / (reserve_in + in)`, which
//! is evaluated exactly in 128-bit integers. Outputs truncate toward zero and both
//! reserves stay strictly positive after every trade.

use helix_core::{ensure, HelixError, Result, Symbol};
use serde::{Deserialize, Serialize};

/// Default connector weight (a 1:1 reserve ratio)
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// One side of the pool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub balance: i64,
    pub weight: f64,
}

/// Bancor pool: `base` holds RAM bytes, `quote` holds core tokens
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RamMarket {
    pub base: Connector,
    pub quote: Connector,
    pub core_symbol: Symbol,
}

/// Tokens out of the pool for `amount_in` of the other side
pub fn bancor_out(
    reserve_in: i64,
    weight_in: f64,
    reserve_out: i64,
    weight_out: f64,
    amount_in: i64,
) -> Result<i64> {
    ensure!(
        reserve_in > 0 && reserve_out > 0,
        HelixError::invariant("market reserves must be positive")
    );
    ensure!(amount_in >= 0, HelixError::invalid("cannot convert a negative amount"));
    if amount_in == 0 {
        return Ok(0);
    }

    let out = if weight_in == weight_out {
        let numerator = reserve_out as i128 * amount_in as i128;
        let denominator = reserve_in as i128 + amount_in as i128;
        (numerator / denominator) as i64
    } else {
        let ratio = reserve_in as f64 / (reserve_in as f64 + amount_in as f64);
        (reserve_out as f64 * (1.0 - ratio.powf(weight_in / weight_out))) as i64
    };

    ensure!(
        out < reserve_out,
        HelixError::invariant("conversion would drain the market")
    );
    Ok(out.max(0))
}

impl RamMarket {
    pub fn new(base_bytes: i64, quote_tokens: i64, core_symbol: Symbol) -> Result<Self> {
        ensure!(
            base_bytes > 0 && quote_tokens > 0,
            HelixError::invalid("market reserves must be positive")
        );
        Ok(Self {
            base: Connector {
                balance: base_bytes,
                weight: DEFAULT_WEIGHT,
            },
            quote: Connector {
                balance: quote_tokens,
                weight: DEFAULT_WEIGHT,
            },
            core_symbol,
        })
    }

    /// Spend `tokens` on bytes, updating the reserves
    pub fn buy_bytes(&mut self, tokens: i64) -> Result<i64> {
        let bytes = bancor_out(
            self.quote.balance,
            self.quote.weight,
            self.base.balance,
            self.base.weight,
            tokens,
        )?;
        self.quote.balance = self
            .quote
            .balance
            .checked_add(tokens)
            .ok_or_else(|| HelixError::invariant("quote reserve overflow"))?;
        self.base.balance -= bytes;
        Ok(bytes)
    }

    /// Sell `bytes` for tokens, updating the reserves
    pub fn sell_bytes(&mut self, bytes: i64) -> Result<i64> {
        let tokens = bancor_out(
            self.base.balance,
            self.base.weight,
            self.quote.balance,
            self.quote.weight,
            bytes,
        )?;
        self.base.balance = self
            .base
            .balance
            .checked_add(bytes)
            .ok_or_else(|| HelixError::invariant("base reserve overflow"))?;
        self.quote.balance -= tokens;
        Ok(tokens)
    }

    /// Price of `bytes` in tokens at the current reserves, without trading
    pub fn quote_bytes(&self, bytes: i64) -> Result<i64> {
        self.clone().sell_bytes(bytes)
    }

    /// Bytes `tokens` would buy at the current reserves, without trading
    pub fn preview_buy(&self, tokens: i64) -> Result<i64> {
        self.clone().buy_bytes(tokens)
    }

    /// Add newly supplied bytes to the base reserve
    pub fn grow_supply(&mut self, bytes: i64) -> Result<()> {
        ensure!(bytes >= 0, HelixError::invalid("ram supply can only grow"));
        self.base.balance = self
            .base
            .balance
            .checked_add(bytes)
            .ok_or_else(|| HelixError::invariant("base reserve overflow"))?;
        Ok(())
    }

    /// Current price of one byte in token units
    pub fn spot_price(&self) -> f64 {
        (self.quote.balance as f64 / self.quote.weight) / (self.base.balance as f64 / self.base.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn core() -> Symbol {
        Symbol::new("HLX", 4).unwrap()
    }

    #[test]
    fn test_equal_weight_conversion() {
        // 1,000,000 tokens against 1,000,000,000 bytes, buying with 9,950 tokens
        let mut market = RamMarket::new(1_000_000_000, 10_000_000_000, core()).unwrap();
        let bytes = market.buy_bytes(99_500_000).unwrap();
        assert_eq!(bytes, 9_851_972);
        assert_eq!(market.base.balance, 1_000_000_000 - 9_851_972);
        assert_eq!(market.quote.balance, 10_099_500_000);
    }

    #[test]
    fn test_quote_does_not_mutate() {
        let market = RamMarket::new(1_000_000, 1_000_000, core()).unwrap();
        let price = market.quote_bytes(1024).unwrap();
        assert!(price > 0);
        assert_eq!(market.base.balance, 1_000_000);
        assert_eq!(market.preview_buy(price).unwrap(), market.clone().buy_bytes(price).unwrap());
    }

    #[test]
    fn test_unequal_weights() {
        let out = bancor_out(1_000_000, 0.25, 1_000_000, 0.5, 1_000_000).unwrap();
        // 1e6 * (1 - 0.5^0.5)
        assert_eq!(out, 292_893);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(bancor_out(0, 0.5, 10, 0.5, 1).is_err());
        assert!(bancor_out(10, 0.5, 10, 0.5, -1).is_err());
        assert_eq!(bancor_out(10, 0.5, 10, 0.5, 0).unwrap(), 0);
        assert!(RamMarket::new(0, 1, core()).is_err());
    }

    #[test]
    fn test_grow_supply() {
        let mut market = RamMarket::new(1_000, 1_000, core()).unwrap();
        market.grow_supply(500).unwrap();
        assert_eq!(market.base.balance, 1_500);
        assert!(market.grow_supply(-1).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip_never_gains(
            base in 1_000_000i64..1_000_000_000_000,
            quote in 1_000_000i64..1_000_000_000_000,
            tokens in 1i64..1_000_000_000,
        ) {
            let mut market = RamMarket::new(base, quote, core()).unwrap();
            let bytes = market.buy_bytes(tokens).unwrap();
            prop_assert!(market.base.balance > 0);
            let back = market.sell_bytes(bytes).unwrap();
            prop_assert!(back <= tokens);
            prop_assert!(market.base.balance > 0);
            prop_assert!(market.quote.balance > 0);
        }
    }
}
