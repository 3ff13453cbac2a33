//! Penmark: content-serving backend for a small blog.
//!
//! Reads go through a process-local TTL cache keyed by [`cache::keys`]; every
//! mutation purges exactly the entries it makes stale. Like and view counters
//! stay consistent under concurrent requests by leaning on storage atomicity
//! rather than in-process locks.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
