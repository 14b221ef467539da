//! Keyed tables
//!
//! An ordered primary map (`Table`) and a primary map with one derived, ordered
//! secondary index (`IndexedTable`). Rows are addressed by the key they report
//! through [`Row::primary_key`]; the key of a stored row can never change.
//!
//! Both tables serialize as a plain sequence of rows. The index is derived state and
//! is rebuilt on load.

use crate::error::{HelixError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeBounds;

/// A persisted row with a primary key
pub trait Row: Clone {
    type Key: Ord + Clone + fmt::Debug;

    fn primary_key(&self) -> Self::Key;
}

/// A row that also participates in a secondary index
pub trait IndexedRow: Row {
    type IndexKey: Ord + Clone + fmt::Debug;

    fn index_key(&self) -> Self::IndexKey;
}

/// `f64` with a total order, for indexing floating point columns
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TotalOrd(pub f64);

impl Eq for TotalOrd {}

impl PartialOrd for TotalOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered primary-key table
#[derive(Clone, Debug)]
pub struct Table<R: Row> {
    rows: BTreeMap<R::Key, R>,
}

impl<R: Row> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Row> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.rows.contains_key(key)
    }

    /// Fetch a row or fail with `NotFound(msg)`
    pub fn get(&self, key: &R::Key, msg: &str) -> Result<&R> {
        self.rows.get(key).ok_or_else(|| HelixError::not_found(msg))
    }

    /// Insert a new row; the primary key must be unused
    pub fn emplace(&mut self, row: R) -> Result<()> {
        let key = row.primary_key();
        if self.rows.contains_key(&key) {
            return Err(HelixError::invariant(format!(
                "duplicate primary key {key:?}"
            )));
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Mutate an existing row in place and return a copy of the result
    pub fn modify<F>(&mut self, key: &R::Key, f: F) -> Result<R>
    where
        F: FnOnce(&mut R),
    {
        let row = self
            .rows
            .get_mut(key)
            .ok_or_else(|| HelixError::not_found(format!("row {key:?} not found")))?;
        f(row);
        if row.primary_key() != *key {
            return Err(HelixError::invariant(format!(
                "primary key of row {key:?} cannot change"
            )));
        }
        Ok(row.clone())
    }

    pub fn erase(&mut self, key: &R::Key) -> Option<R> {
        self.rows.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn range<B>(&self, bounds: B) -> impl Iterator<Item = &R>
    where
        B: RangeBounds<R::Key>,
    {
        self.rows.range(bounds).map(|(_, row)| row)
    }
}

impl<R: Row + Serialize> Serialize for Table<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.values())
    }
}

impl<'de, R: Row + Deserialize<'de>> Deserialize<'de> for Table<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let rows = Vec::<R>::deserialize(deserializer)?;
        let mut table = Table::new();
        for row in rows {
            table.emplace(row).map_err(serde::de::Error::custom)?;
        }
        Ok(table)
    }
}

/// Primary-key table with one ordered secondary index
#[derive(Clone, Debug)]
pub struct IndexedTable<R: IndexedRow> {
    table: Table<R>,
    index: BTreeSet<(R::IndexKey, R::Key)>,
}

impl<R: IndexedRow> Default for IndexedTable<R> {
    fn default() -> Self {
        Self {
            table: Table::new(),
            index: BTreeSet::new(),
        }
    }
}

impl<R: IndexedRow> IndexedTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.table.find(key)
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.table.contains(key)
    }

    pub fn get(&self, key: &R::Key, msg: &str) -> Result<&R> {
        self.table.get(key, msg)
    }

    pub fn emplace(&mut self, row: R) -> Result<()> {
        let entry = (row.index_key(), row.primary_key());
        self.table.emplace(row)?;
        self.index.insert(entry);
        Ok(())
    }

    pub fn modify<F>(&mut self, key: &R::Key, f: F) -> Result<R>
    where
        F: FnOnce(&mut R),
    {
        let before = self
            .table
            .find(key)
            .map(|row| row.index_key())
            .ok_or_else(|| HelixError::not_found(format!("row {key:?} not found")))?;
        let row = self.table.modify(key, f)?;
        let after = row.index_key();
        if before != after {
            self.index.remove(&(before, key.clone()));
            self.index.insert((after, key.clone()));
        }
        Ok(row)
    }

    pub fn erase(&mut self, key: &R::Key) -> Option<R> {
        let row = self.table.erase(key)?;
        self.index.remove(&(row.index_key(), key.clone()));
        Some(row)
    }

    /// Rows in primary-key order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.table.iter()
    }

    /// Rows in ascending secondary-index order, ties broken by primary key
    pub fn iter_by_index(&self) -> impl Iterator<Item = &R> {
        self.index
            .iter()
            .filter_map(move |(_, key)| self.table.find(key))
    }
}

impl<R: IndexedRow + Serialize> Serialize for IndexedTable<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.table.serialize(serializer)
    }
}

impl<'de, R: IndexedRow + Deserialize<'de>> Deserialize<'de> for IndexedTable<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let table = Table::<R>::deserialize(deserializer)?;
        let index = table
            .iter()
            .map(|row| (row.index_key(), row.primary_key()))
            .collect();
        Ok(Self { table, index })
    }
}
