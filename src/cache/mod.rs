//! Cache module for storing upstream payloads on disk
//!
//! This module provides a cache manager that persists one JSON file per region
//! key with a configurable freshness window. It supports graceful degradation
//! by returning expired entries with an `is_expired` flag, allowing the proxy
//! to serve stale data when upstream is unavailable.

mod manager;

pub use manager::{CacheManager, CachedData, PruneReport, DEFAULT_FRESHNESS};
