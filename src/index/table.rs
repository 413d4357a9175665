//! Index implementation
//!
//! HashMap-based index. Not internally locked: the store guards the index
//! and the log with one lock so they always change together.

use std::collections::HashMap;

use crate::error::Result;
use crate::log::RecordLocation;

use super::{try_copy, IndexSlot};

/// Key → latest value location
#[derive(Debug, Default)]
pub struct Index {
    map: HashMap<Vec<u8>, IndexSlot>,

    /// Approximate bytes held: keys plus resident values
    size: usize,
}

/// Memory set aside for a key before the matching log append
///
/// Lets the store reserve everything an insert needs up front, so that once
/// a record is in the log the index update cannot fail.
#[derive(Debug)]
pub struct ReservedKey(Option<Vec<u8>>);

impl Index {
    /// Create a new empty Index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the slot for a key
    pub fn get(&self, key: &[u8]) -> Option<&IndexSlot> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Reserve the memory an insert of `key` needs
    pub fn reserve(&mut self, key: &[u8]) -> Result<ReservedKey> {
        if self.map.contains_key(key) {
            return Ok(ReservedKey(None));
        }
        self.map.try_reserve(1)?;
        Ok(ReservedKey(Some(try_copy(key)?)))
    }

    /// Upsert using memory from `reserve`
    ///
    /// Returns true if the key already had an entry.
    pub fn insert_reserved(&mut self, key: &[u8], reserved: ReservedKey, slot: IndexSlot) -> bool {
        let added = slot.heap_size();

        if let Some(existing) = self.map.get_mut(key) {
            self.size = self.size - existing.heap_size() + added;
            *existing = slot;
            return true;
        }

        let owned = reserved.0.unwrap_or_else(|| key.to_vec());
        self.size += owned.len() + added;
        self.map.insert(owned, slot);
        false
    }

    /// Upsert a key
    ///
    /// Returns true if the key already had an entry.
    pub fn insert(&mut self, key: &[u8], slot: IndexSlot) -> Result<bool> {
        let reserved = self.reserve(key)?;
        Ok(self.insert_reserved(key, reserved, slot))
    }

    /// Remove a key, returning whether it had a live entry
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let Some((owned, slot)) = self.map.remove_entry(key) else {
            return false;
        };
        self.size -= owned.len() + slot.heap_size();

        if self.map.is_empty() {
            self.map.shrink_to_fit();
        }
        true
    }

    /// Point a logged key at its post-compaction location
    pub fn relocate(&mut self, key: &[u8], location: RecordLocation) {
        if let Some(IndexSlot::Logged(current)) = self.map.get_mut(key) {
            *current = location;
        }
    }

    /// Snapshot of every logged key and its frame location
    pub fn logged_entries(&self) -> Result<Vec<(Vec<u8>, RecordLocation)>> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(self.map.len())?;
        for (key, slot) in &self.map {
            if let IndexSlot::Logged(location) = slot {
                entries.push((try_copy(key)?, *location));
            }
        }
        Ok(entries)
    }

    /// Iterate over all keys (no particular order)
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.map.keys().map(Vec::as_slice)
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get approximate size in bytes (keys + resident values)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Drop every entry and release the map's memory
    pub fn clear(&mut self) {
        self.map = HashMap::new();
        self.size = 0;
    }
}
