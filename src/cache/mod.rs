//! Penmark read-path cache.
//!
//! - **Store**: process-local key/value entries with per-entry TTL and a
//!   periodic expiry sweep.
//! - **Keys**: canonical `namespace:param:...` strings per cached resource.
//! - **Invalidation**: every mutation maps to a plan of stale namespaces and
//!   keys, executed right after the write succeeds.
//!
//! The cache is per process. Instances behind a load balancer do not see each
//! other's invalidations; staleness there is bounded only by the TTL.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 300
//! sweep_interval_seconds = 60
//! ```

mod clock;
mod config;
mod invalidation;
pub mod keys;
mod lock;
mod planner;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use invalidation::InvalidationCoordinator;
pub use planner::{InvalidationPlan, Mutation};
pub use store::{CacheEntry, CacheError, CacheStore, Generation, read_through, spawn_sweeper};
