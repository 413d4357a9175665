//! Index Module
//!
//! In-memory map from each key to its most recent value.
//!
//! ## Responsibilities
//! - Point lookups by exact key bytes
//! - Track where a key's latest value lives (log frame or resident bytes)
//! - Release memory as soon as keys are removed
//!
//! ## Data Structure Choice
//! A `HashMap` rather than an ordered map: callers never see key order,
//! and recency (not insertion order) is all that matters.

mod table;

pub use table::{Index, ReservedKey};

use crate::error::Result;
use crate::log::RecordLocation;

/// Where the latest value for a key lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSlot {
    /// A frame in the append log
    Logged(RecordLocation),

    /// The value itself (cached-only stores)
    Resident(Vec<u8>),
}

impl IndexSlot {
    /// Bytes this slot holds in memory beyond its fixed size
    pub fn heap_size(&self) -> usize {
        match self {
            IndexSlot::Logged(_) => 0,
            IndexSlot::Resident(value) => value.len(),
        }
    }
}

/// Copy bytes into a new Vec, reporting allocation failure as `OutOfMemory`
pub fn try_copy(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut owned = Vec::new();
    owned.try_reserve_exact(bytes.len())?;
    owned.extend_from_slice(bytes);
    Ok(owned)
}
