//! Response cache with TTL and stale-while-revalidate.
//!
//! ```text
//! get → local map (parking_lot RwLock) → remote tier (Redis, optional) → miss
//!            ↑ promote on remote hit ─────────┘
//! ```
//!
//! If the remote tier is missing or unreachable the facade behaves as a
//! local-only cache. Remote errors are logged and read as misses.

pub mod coalesce;
pub mod facade;
pub mod remote;

pub use coalesce::MissCoalescer;
pub use facade::{CacheEntry, CacheFacade, CacheStats, Freshness, RevalidateOptions};
pub use remote::{RemoteCache, StoredEntry};
