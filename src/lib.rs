//! Fuel cache proxy library
//!
//! Exposes the cache, upstream client, lookup service and HTTP surface for
//! the binary and for integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod prune;
pub mod server;
pub mod service;
