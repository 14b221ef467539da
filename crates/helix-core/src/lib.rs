//! # Helix Core
//!
//! Shared building blocks for the Helix system account.
//!
//! This crate provides:
//! - `AccountName`, `Symbol`, `Asset`, `PublicKey` - identities and token amounts
//! - `TimePoint` and `BlockTimestamp` - wall-clock and block-slot time
//! - `HelixError` - the single error type every operation returns
//! - `Table` and `IndexedTable` - ordered keyed storage for persisted rows
//!
//! ## Time
//!
//! ```text
//!   TimePoint       microseconds since 1970-01-01
//!   BlockTimestamp  half-second slots since 2000-01-01
//! ```

pub mod error;
pub mod table;
pub mod types;

pub use error::*;
pub use table::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ensure;
    pub use crate::error::{ErrorKind, HelixError, Result};
    pub use crate::table::{IndexedRow, IndexedTable, Row, Table, TotalOrd};
    pub use crate::types::*;
}
