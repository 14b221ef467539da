//! Core type definitions for Helix
//!
//! Accounts, token amounts, keys and the two clocks the system contract works with:
//! wall-clock `TimePoint` (microseconds) and block-slot `BlockTimestamp` (half seconds).

use crate::error::{HelixError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Maximum length of an account name
pub const MAX_NAME_LEN: usize = 12;

/// AccountName - human readable account identifier
///
/// Names are 1-12 characters drawn from `a-z`, `1-5` and `.`, and may not end with
/// a dot. Ordering is lexicographic, which is also the identity order used to break
/// ties wherever the engine needs a deterministic order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    /// Create a validated account name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(HelixError::invalid(format!(
                "account name must be 1-{MAX_NAME_LEN} characters: {name:?}"
            )));
        }
        if !name
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'1'..=b'5' | b'.'))
        {
            return Err(HelixError::invalid(format!(
                "account name contains invalid characters: {name:?}"
            )));
        }
        if name.ends_with('.') {
            return Err(HelixError::invalid(format!(
                "account name cannot end with a dot: {name:?}"
            )));
        }
        Ok(Self(name))
    }

    /// Name from a literal known to be valid, for built-in system accounts
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "invalid static account name {name}");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name contains a dot (a sub-name of some suffix)
    pub fn has_suffix(&self) -> bool {
        self.0.contains('.')
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for AccountName {
    type Error = HelixError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

impl FromStr for AccountName {
    type Err = HelixError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountName({})", self.0)
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token symbol: an upper-case code plus decimal precision, written `"4,HLX"`
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    code: String,
    precision: u8,
}

impl Symbol {
    /// Maximum number of decimal places supported by `i64` amounts
    pub const MAX_PRECISION: u8 = 18;

    pub fn new(code: impl Into<String>, precision: u8) -> Result<Self> {
        let code = code.into();
        if code.is_empty() || code.len() > 7 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(HelixError::invalid(format!("invalid symbol code: {code:?}")));
        }
        if precision > Self::MAX_PRECISION {
            return Err(HelixError::invalid(format!(
                "symbol precision {precision} exceeds {}",
                Self::MAX_PRECISION
            )));
        }
        Ok(Self { code, precision })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of smallest units in one whole token
    pub fn precision_unit(&self) -> i64 {
        10i64.pow(self.precision as u32)
    }
}

impl FromStr for Symbol {
    type Err = HelixError;

    fn from_str(s: &str) -> Result<Self> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| HelixError::invalid(format!("malformed symbol: {s:?}")))?;
        let precision: u8 = precision
            .trim()
            .parse()
            .map_err(|_| HelixError::invalid(format!("malformed symbol precision: {s:?}")))?;
        Self::new(code.trim(), precision)
    }
}

impl TryFrom<String> for Symbol {
    type Error = HelixError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

/// Largest magnitude a valid asset amount may have
pub const MAX_ASSET_AMOUNT: i64 = (1 << 62) - 1;

/// A token quantity in smallest units, tagged with its symbol
///
/// Serializes as its display form, e.g. `"12.5000 HLX"`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    pub fn zero(symbol: Symbol) -> Self {
        Self { amount: 0, symbol }
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Amount within `±MAX_ASSET_AMOUNT`, so the sum of two valid amounts cannot overflow
    pub fn is_valid(&self) -> bool {
        (-MAX_ASSET_AMOUNT..=MAX_ASSET_AMOUNT).contains(&self.amount)
    }

    /// Checked addition that also rejects mixed symbols
    pub fn checked_add(&self, other: &Asset) -> Result<Asset> {
        self.same_symbol(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| HelixError::invariant("asset addition overflow"))?;
        Ok(Asset::new(amount, self.symbol.clone()))
    }

    /// Checked subtraction that also rejects mixed symbols
    pub fn checked_sub(&self, other: &Asset) -> Result<Asset> {
        self.same_symbol(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| HelixError::invariant("asset subtraction underflow"))?;
        Ok(Asset::new(amount, self.symbol.clone()))
    }

    fn same_symbol(&self, other: &Asset) -> Result<()> {
        if self.symbol != other.symbol {
            return Err(HelixError::invalid(format!(
                "symbol mismatch: {} vs {}",
                self.symbol, other.symbol
            )));
        }
        Ok(())
    }
}

impl Add for Asset {
    type Output = Asset;

    fn add(self, rhs: Asset) -> Asset {
        debug_assert_eq!(self.symbol, rhs.symbol);
        Asset::new(self.amount + rhs.amount, self.symbol)
    }
}

impl Sub for Asset {
    type Output = Asset;

    fn sub(self, rhs: Asset) -> Asset {
        debug_assert_eq!(self.symbol, rhs.symbol);
        Asset::new(self.amount - rhs.amount, self.symbol)
    }
}

impl Neg for Asset {
    type Output = Asset;

    fn neg(self) -> Asset {
        Asset::new(-self.amount, self.symbol)
    }
}

impl FromStr for Asset {
    type Err = HelixError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || HelixError::invalid(format!("malformed asset: {s:?}"));
        let (number, code) = s.trim().split_once(' ').ok_or_else(bad)?;
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) || (digits.contains('.') && frac.is_empty()) {
            return Err(bad());
        }
        let precision = u8::try_from(frac.len()).map_err(|_| bad())?;
        let symbol = Symbol::new(code.trim(), precision)?;
        let whole: i64 = whole.parse().map_err(|_| bad())?;
        let frac: i64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| bad())? };
        let amount = whole
            .checked_mul(symbol.precision_unit())
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(bad)?;
        Ok(Asset::new(if negative { -amount } else { amount }, symbol))
    }
}

impl TryFrom<String> for Asset {
    type Error = HelixError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.symbol.precision_unit();
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let whole = abs / unit as u64;
        if self.symbol.precision == 0 {
            write!(f, "{sign}{whole} {}", self.symbol.code)
        } else {
            let frac = abs % unit as u64;
            write!(
                f,
                "{sign}{whole}.{frac:0width$} {}",
                self.symbol.code,
                width = self.symbol.precision as usize
            )
        }
    }
}

/// Length of a compressed public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Packed producer public key
///
/// The all-zero key is the "default" key: it is rejected at registration and is what
/// a deactivated producer's key is reset to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub const DEFAULT: Self = Self([0u8; PUBLIC_KEY_LEN]);

    pub fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| HelixError::invalid(format!("bad key hex: {e}")))?;
        let bytes: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            HelixError::invalid(format!("public key must be {PUBLIC_KEY_LEN} bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl Default for PublicKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 24 * 3600 * MICROS_PER_SECOND;

/// Wall-clock time in microseconds since the Unix epoch
///
/// `TimePoint::ZERO` doubles as "never", matching how the persisted rows mark
/// timestamps that were not set yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimePoint(i64);

impl TimePoint {
    pub const ZERO: Self = Self(0);

    pub fn from_micros(us: i64) -> Self {
        Self(us)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SECOND)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn micros(&self) -> i64 {
        self.0
    }

    pub fn secs(&self) -> i64 {
        self.0 / MICROS_PER_SECOND
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Microseconds elapsed since `earlier` (negative if `earlier` is later)
    pub fn micros_since(&self, earlier: TimePoint) -> i64 {
        self.0 - earlier.0
    }

    /// Seconds elapsed since `earlier` as a float, the unit share rates are kept in
    pub fn seconds_since(&self, earlier: TimePoint) -> f64 {
        (self.0 - earlier.0) as f64 / MICROS_PER_SECOND as f64
    }

    pub fn plus_micros(&self, us: i64) -> TimePoint {
        TimePoint(self.0.saturating_add(us))
    }

    pub fn plus_secs(&self, secs: i64) -> TimePoint {
        self.plus_micros(secs.saturating_mul(MICROS_PER_SECOND))
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_micros(self.0).single()
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}us", self.0),
        }
    }
}

/// Milliseconds between the Unix epoch and the block timestamp epoch (2000-01-01)
pub const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;

/// Block interval in milliseconds
pub const BLOCK_INTERVAL_MS: i64 = 500;

/// Blocks (half-second slots) in one day
pub const BLOCKS_PER_DAY: u32 = 2 * 24 * 3600;

/// Block time as a count of half-second slots since the block timestamp epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockTimestamp {
    pub slot: u32,
}

impl BlockTimestamp {
    pub fn new(slot: u32) -> Self {
        Self { slot }
    }

    /// Slot containing the given wall-clock time; times before the epoch map to slot 0
    pub fn from_time_point(tp: TimePoint) -> Self {
        let ms = tp.micros() / 1000 - BLOCK_TIMESTAMP_EPOCH_MS;
        let slot = (ms.max(0) / BLOCK_INTERVAL_MS).min(u32::MAX as i64);
        Self { slot: slot as u32 }
    }

    pub fn to_time_point(&self) -> TimePoint {
        TimePoint::from_micros(
            (self.slot as i64 * BLOCK_INTERVAL_MS + BLOCK_TIMESTAMP_EPOCH_MS) * 1000,
        )
    }

    /// Slots elapsed since `earlier`, zero if `earlier` is not before `self`
    pub fn slots_since(&self, earlier: BlockTimestamp) -> u32 {
        self.slot.saturating_sub(earlier.slot)
    }
}
