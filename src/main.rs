//! Fuel cache proxy - serves Swedish regional fuel prices
//!
//! An HTTP service that answers fuel-price lookups from a disk cache,
//! refreshes entries from the upstream provider when they go stale, and
//! falls back to stale data when the provider is unavailable.

use std::io;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fuelcache::cache::CacheManager;
use fuelcache::cli::{Cli, ProxyConfig};
use fuelcache::data::HttpPriceSource;
use fuelcache::prune::PruneHandle;
use fuelcache::server::create_server;
use fuelcache::service::FuelPriceService;

/// Sets up logging to stderr
///
/// Use RUST_LOG to override the default filter (e.g. RUST_LOG=fuelcache=debug).
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fuelcache=info"));

    let (plain, json) = if json {
        (None, Some(fmt::layer().json().with_writer(io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match ProxyConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    init_tracing(config.log_json);

    let cache = CacheManager::with_dir(config.cache_dir.clone(), config.freshness);
    if let Err(e) = cache.ensure_dir() {
        // Requests still create the directory on first write
        warn!(dir = %cache.dir().display(), error = %e, "could not create cache directory");
    }

    let source = HttpPriceSource::new(
        config.upstream_url.clone(),
        config.upstream_param.clone(),
        config.upstream_timeout,
    )?;

    info!(
        cache_dir = %cache.dir().display(),
        upstream = %config.upstream_url,
        candidates = %config.strategy,
        freshness_secs = config.freshness.as_secs(),
        "starting fuel cache proxy"
    );

    let prune = PruneHandle::spawn(cache.clone(), config.prune.clone());
    let service = FuelPriceService::new(cache, Arc::new(source), config.strategy);

    let result = create_server(service, config.route.clone(), config.bind_addr)?.await;

    prune.shutdown().await;
    info!("fuel cache proxy stopped");
    result?;
    Ok(())
}
