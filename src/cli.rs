//! Command-line interface parsing for the fuel cache proxy
//!
//! Every flag can also be set through the environment (`FUELCACHE_*`, plus
//! the conventional `PORT`). Parsed arguments are validated into a
//! [`ProxyConfig`] before anything is bound or spawned.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

use crate::cache::CacheManager;
use crate::data::upstream::{DEFAULT_QUERY_PARAM, DEFAULT_UPSTREAM_URL};
use crate::data::CandidateStrategy;
use crate::prune::PruneConfig;
use crate::server::DEFAULT_ROUTE;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The candidate strategy name is not recognized
    #[error("Invalid candidate strategy: '{0}'. Valid strategies: plural-toggle, exact")]
    InvalidCandidates(String),

    /// The bind host is not an IP address
    #[error("Invalid host: '{0}'. Expected an IP address such as 127.0.0.1 or 0.0.0.0")]
    InvalidHost(String),

    /// The upstream URL does not parse or is not http(s)
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    /// The upstream query parameter name is empty
    #[error("Upstream query parameter must not be empty")]
    EmptyQueryParam,

    /// A duration flag that must be positive was zero
    #[error("--{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A duration flag is too large to represent in seconds
    #[error("--{0} is too large")]
    DurationTooLarge(&'static str),

    /// Entries would be pruned before they can serve as a stale fallback
    #[error("--prune-max-age-hours ({prune_max_age_hours}) must be at least --freshness-hours ({freshness_hours})")]
    PruneMaxAgeTooShort {
        prune_max_age_hours: u64,
        freshness_hours: u64,
    },

    /// The route does not start with a slash
    #[error("Invalid route: '{0}'. Routes must start with '/'")]
    InvalidRoute(String),
}

/// Fuel cache proxy - serves regional fuel prices from a disk cache
#[derive(Parser, Debug)]
#[command(name = "fuelcache")]
#[command(about = "Caching proxy for Swedish regional fuel prices")]
#[command(version)]
pub struct Cli {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "FUELCACHE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5174)]
    pub port: u16,

    /// Directory holding cached responses (defaults to the user cache dir)
    #[arg(long, env = "FUELCACHE_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Upstream fuel-price endpoint
    #[arg(long, env = "FUELCACHE_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// Query parameter carrying the region key upstream
    #[arg(long, env = "FUELCACHE_UPSTREAM_PARAM", default_value = DEFAULT_QUERY_PARAM)]
    pub upstream_param: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "FUELCACHE_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Hours a cached response counts as fresh
    #[arg(long, env = "FUELCACHE_FRESHNESS_HOURS", default_value_t = 8)]
    pub freshness_hours: u64,

    /// Minutes between cache prune sweeps, 0 disables pruning
    #[arg(long, env = "FUELCACHE_PRUNE_INTERVAL_MINS", default_value_t = 60)]
    pub prune_interval_mins: u64,

    /// Hours after which cache entries are pruned, at least --freshness-hours
    #[arg(long, env = "FUELCACHE_PRUNE_MAX_AGE_HOURS", default_value_t = 168)]
    pub prune_max_age_hours: u64,

    /// Region key candidates tried per request
    ///
    /// Valid strategies: plural-toggle, exact
    #[arg(long, env = "FUELCACHE_CANDIDATES", default_value = "plural-toggle", value_name = "STRATEGY")]
    pub candidates: String,

    /// Path of the fuel-price endpoint
    #[arg(long, env = "FUELCACHE_ROUTE", default_value = DEFAULT_ROUTE)]
    pub route: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "FUELCACHE_LOG_JSON")]
    pub log_json: bool,
}

/// Validated configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub upstream_url: Url,
    pub upstream_param: String,
    pub upstream_timeout: Duration,
    pub freshness: Duration,
    pub prune: PruneConfig,
    pub strategy: CandidateStrategy,
    pub route: String,
    pub log_json: bool,
}

/// Parses a candidate strategy argument.
///
/// # Returns
/// * `Ok(CandidateStrategy)` if the name matches a strategy
/// * `Err(CliError::InvalidCandidates)` if it doesn't
pub fn parse_candidates_arg(s: &str) -> Result<CandidateStrategy, CliError> {
    CandidateStrategy::from_str(s).ok_or_else(|| CliError::InvalidCandidates(s.to_string()))
}

fn parse_upstream_url(s: &str) -> Result<Url, CliError> {
    let invalid = |reason: String| CliError::InvalidUpstreamUrl {
        url: s.to_string(),
        reason,
    };
    let url = Url::parse(s).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

/// Converts a flag value to a duration, rejecting overflow
fn checked_duration(value: u64, unit_secs: u64, flag: &'static str) -> Result<Duration, CliError> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or(CliError::DurationTooLarge(flag))
}

fn fallback_cache_dir() -> PathBuf {
    CacheManager::default_dir().unwrap_or_else(|| std::env::temp_dir().join("fuelcache"))
}

impl ProxyConfig {
    /// Creates a ProxyConfig from parsed CLI arguments.
    ///
    /// # Errors
    /// Returns the first [`CliError`] found among the arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let host: IpAddr = cli
            .host
            .parse()
            .map_err(|_| CliError::InvalidHost(cli.host.clone()))?;

        let upstream_url = parse_upstream_url(&cli.upstream_url)?;

        if cli.upstream_param.trim().is_empty() {
            return Err(CliError::EmptyQueryParam);
        }
        if cli.upstream_timeout_secs == 0 {
            return Err(CliError::ZeroDuration("upstream-timeout-secs"));
        }
        if cli.freshness_hours == 0 {
            return Err(CliError::ZeroDuration("freshness-hours"));
        }
        if cli.prune_max_age_hours < cli.freshness_hours {
            return Err(CliError::PruneMaxAgeTooShort {
                prune_max_age_hours: cli.prune_max_age_hours,
                freshness_hours: cli.freshness_hours,
            });
        }
        if !cli.route.starts_with('/') {
            return Err(CliError::InvalidRoute(cli.route.clone()));
        }

        let strategy = parse_candidates_arg(&cli.candidates)?;
        let freshness = checked_duration(cli.freshness_hours, 60 * 60, "freshness-hours")?;
        let prune_max_age =
            checked_duration(cli.prune_max_age_hours, 60 * 60, "prune-max-age-hours")?;
        let prune_interval =
            checked_duration(cli.prune_interval_mins, 60, "prune-interval-mins")?;

        Ok(ProxyConfig {
            bind_addr: SocketAddr::new(host, cli.port),
            cache_dir: cli.cache_dir.clone().unwrap_or_else(fallback_cache_dir),
            upstream_url,
            upstream_param: cli.upstream_param.clone(),
            upstream_timeout: Duration::from_secs(cli.upstream_timeout_secs),
            freshness,
            prune: PruneConfig {
                interval: prune_interval,
                max_age: prune_max_age,
                enabled: cli.prune_interval_mins > 0,
            },
            strategy,
            route: cli.route.clone(),
            log_json: cli.log_json,
        })
    }
}
