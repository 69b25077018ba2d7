//! Cache plumbing shared by Grove's persistent and in-memory caches.
//!
//! - [`atomic_write`] for crash-safe file replacement
//! - [`CacheLock`] for cross-process coordination
//! - [`SnapshotStore`] for deduplicating expensive immutable snapshots across owners
//!
//! Caches are best-effort: corruption and I/O failures surface as [`CacheError`] so callers
//! can log them and fall back to recomputing.

mod atomic;
mod cache_dir;
mod error;
mod fingerprint;
mod lock;
mod snapshot;

pub use atomic::atomic_write;
pub use cache_dir::{cache_root, default_cache_root, CACHE_DIR_ENV};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use lock::CacheLock;
pub use snapshot::{SnapshotHandle, SnapshotStore};
