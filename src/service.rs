//! Fetch-through fuel-price lookup
//!
//! A lookup walks three stages strictly in order:
//! 1. serve a fresh cache entry for any candidate key,
//! 2. fetch from upstream candidate by candidate, writing the first success
//!    through to the cache,
//! 3. serve any remaining cache entry, however old, if upstream failed for
//!    every candidate.
//!
//! Corrupt entries and failed candidates are logged and skipped. Only when
//! all three stages come up empty does the caller see an error.
//!
//! Cache reads and writes block on the filesystem (writes `fsync`), so they
//! run on tokio's blocking pool rather than on the request worker.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::data::{normalize, CandidateStrategy, FuelPrices, PriceSource, RegionKey};

/// Where the payload of a successful lookup came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A cache entry inside the freshness window
    Fresh,
    /// A new upstream response, now written to the cache
    Fetched,
    /// An expired cache entry served because upstream failed
    Stale,
}

impl Origin {
    /// Short label used in logs and the `X-Cache` response header
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Fresh => "HIT",
            Origin::Fetched => "MISS",
            Origin::Stale => "STALE",
        }
    }
}

/// A successful lookup
#[derive(Debug, Clone)]
pub struct Lookup {
    /// Candidate key the payload belongs to
    pub key: RegionKey,
    /// The JSON payload, byte-for-byte as fetched
    pub prices: FuelPrices,
    /// Which stage produced the payload
    pub origin: Origin,
    /// When the served cache entry was written, `None` for fetched payloads
    pub cached_at: Option<DateTime<Utc>>,
}

/// Errors surfaced to callers of [`FuelPriceService::lookup`]
#[derive(Debug, Error)]
pub enum LookupError {
    /// The region parameter is missing, empty or has no usable characters
    #[error("{0}")]
    InvalidRequest(String),

    /// Every candidate failed upstream and nothing is cached for any of them
    #[error("fuel prices for {region} are unavailable: upstream failed for every candidate and nothing is cached")]
    UpstreamUnavailable {
        /// Canonical key of the requested region
        region: RegionKey,
        /// Candidate keys tried, in order
        candidates: Vec<RegionKey>,
        /// Message of the last upstream failure
        last_error: String,
    },
}

/// Serves regional fuel prices from cache and upstream
pub struct FuelPriceService {
    cache: CacheManager,
    source: Arc<dyn PriceSource>,
    strategy: CandidateStrategy,
}

impl FuelPriceService {
    /// Creates a service over the given cache, upstream and candidate strategy
    pub fn new(
        cache: CacheManager,
        source: Arc<dyn PriceSource>,
        strategy: CandidateStrategy,
    ) -> Self {
        Self {
            cache,
            source,
            strategy,
        }
    }

    /// The underlying cache
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Looks up fuel prices for a free-text region name
    ///
    /// # Returns
    /// * `Ok(Lookup)` with a fresh, freshly fetched or stale payload
    /// * `Err(LookupError::InvalidRequest)` before any I/O if `region` is unusable
    /// * `Err(LookupError::UpstreamUnavailable)` if upstream failed and nothing is cached
    pub async fn lookup(&self, region: &str) -> Result<Lookup, LookupError> {
        let key = normalize(region).ok_or_else(|| {
            LookupError::InvalidRequest("missing or empty lan parameter".to_string())
        })?;
        let candidates = self.strategy.candidates(&key);

        if let Some(hit) = self.find_cached(&candidates, false).await {
            debug!(region = %key, key = %hit.key, "cache hit");
            return Ok(hit);
        }

        let mut last_error = String::from("no candidates tried");
        for candidate in &candidates {
            match self.source.fetch(candidate).await {
                Ok(prices) => {
                    if let Err(e) = self.store(candidate, &prices).await {
                        error!(key = %candidate, error = %e, "failed to write cache entry");
                    }
                    info!(region = %key, key = %candidate, "refreshed from upstream");
                    return Ok(Lookup {
                        key: candidate.clone(),
                        prices,
                        origin: Origin::Fetched,
                        cached_at: None,
                    });
                }
                Err(e) => {
                    warn!(
                        region = %key,
                        key = %candidate,
                        malformed = e.is_malformed(),
                        error = %e,
                        "upstream candidate failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        if let Some(stale) = self.find_cached(&candidates, true).await {
            let cached_at = stale.cached_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            warn!(
                region = %key,
                key = %stale.key,
                cached_at = %cached_at,
                error = %last_error,
                "stale data served"
            );
            return Ok(stale);
        }

        Err(LookupError::UpstreamUnavailable {
            region: key,
            candidates,
            last_error,
        })
    }

    /// Returns the first valid cache entry among `candidates`
    async fn find_cached(&self, candidates: &[RegionKey], allow_expired: bool) -> Option<Lookup> {
        let cache = self.cache.clone();
        let candidates = candidates.to_vec();
        match tokio::task::spawn_blocking(move || scan_cache(&cache, &candidates, allow_expired))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "cache scan task failed");
                None
            }
        }
    }

    /// Writes `prices` through to the cache for `key`
    async fn store(&self, key: &RegionKey, prices: &FuelPrices) -> io::Result<()> {
        let cache = self.cache.clone();
        let key = key.clone();
        let prices = prices.clone();
        tokio::task::spawn_blocking(move || cache.write(&key, &prices))
            .await
            .map_err(io::Error::other)?
    }
}

/// Scans `candidates` in order for a usable entry
///
/// Expired entries are skipped unless `allow_expired` is set. Corrupt
/// entries are deleted and skipped.
fn scan_cache(
    cache: &CacheManager,
    candidates: &[RegionKey],
    allow_expired: bool,
) -> Option<Lookup> {
    for candidate in candidates {
        let cached = match cache.read(candidate) {
            Ok(Some(cached)) => cached,
            Ok(None) => continue,
            Err(e) => {
                warn!(key = %candidate, error = %e, "failed to read cache entry");
                continue;
            }
        };
        debug!(
            key = %candidate,
            age_secs = cached.age.as_secs(),
            expired = cached.is_expired,
            "cache entry found"
        );
        if cached.is_expired && !allow_expired {
            continue;
        }

        let origin = if cached.is_expired {
            Origin::Stale
        } else {
            Origin::Fresh
        };
        let cached_at = cached.modified_at;
        match cached.into_prices() {
            Ok(prices) => {
                return Some(Lookup {
                    key: candidate.clone(),
                    prices,
                    origin,
                    cached_at: Some(cached_at),
                })
            }
            Err(e) => {
                warn!(key = %candidate, error = %e, "corrupt cache entry removed");
                if let Err(e) = cache.remove(candidate) {
                    warn!(key = %candidate, error = %e, "failed to remove corrupt cache entry");
                }
            }
        }
    }
    None
}
