//! Versioned bucket storage for request/response pairs.
//!
//! A bucket is a named key-value store mapping request identities to stored
//! response snapshots. The agent owns exactly one "current" bucket (named
//! for the deployed version); every other bucket is stale and gets deleted
//! on activation. Entries grow without bound: the source system has no size
//! limit or recency eviction, and none is added here.

mod storage;
mod traits;

pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{BucketStore, CachedEntry, StoredResponse};
