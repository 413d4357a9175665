//! # SimpleStore
//!
//! A compact persistent key-value store with:
//! - An append-only log of checksummed records
//! - Tombstone records for deletes, reclaimed by compaction
//! - An in-memory index for point lookups
//! - A cached-only mode that keeps everything in memory
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │            (Single Writer / Multi Reader)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  AppendLog  │◄─────────│    Index    │
//!   │  (optional) │ offsets  │  (HashMap)  │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │   Record    │
//!   │   Codec     │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use simplestore::Store;
//!
//! let store = Store::create_cached_only();
//! store.put(b"WebProxy", b"http://proxy-1:8080").unwrap();
//! assert_eq!(store.get(b"WebProxy").unwrap(), Some(b"http://proxy-1:8080".to_vec()));
//!
//! store.delete(b"WebProxy").unwrap();
//! assert_eq!(store.get(b"WebProxy").unwrap(), None);
//!
//! store.close().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod log;
pub mod index;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, SyncStrategy};
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SimpleStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
