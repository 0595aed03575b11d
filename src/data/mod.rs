//! Core data types for the fuel-price proxy
//!
//! The proxy never interprets fuel-price data. A payload is an opaque JSON
//! document that is only checked for syntactic validity before it is cached
//! or served.

pub mod region;
pub mod upstream;

pub use region::{normalize, CandidateStrategy, RegionKey};
pub use upstream::{HttpPriceSource, PriceSource, UpstreamError};

use serde::de::IgnoredAny;

/// A syntactically valid JSON document holding fuel prices for one region
///
/// The raw bytes are kept exactly as received so that cached and served
/// payloads are byte-for-byte identical to what upstream returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelPrices {
    bytes: Vec<u8>,
}

impl FuelPrices {
    /// Wraps raw bytes after checking they parse as a single JSON value
    ///
    /// # Returns
    /// * `Ok(FuelPrices)` if the bytes are valid JSON
    /// * `Err(serde_json::Error)` for empty, truncated or non-JSON input
    pub fn from_json_bytes(bytes: Vec<u8>) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<IgnoredAny>(&bytes)?;
        Ok(Self { bytes })
    }

    /// The raw JSON bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the payload, returning the raw JSON bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
