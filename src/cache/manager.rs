//! Cache manager for persisting upstream fuel-price payloads to disk
//!
//! Provides a `CacheManager` that stores one raw JSON file per region key,
//! using the file's modification time as the time of the last successful
//! write. Expired entries are still returned (with `is_expired = true`) so
//! callers can fall back to them when upstream is unavailable.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::data::{FuelPrices, RegionKey};

/// Default freshness window for cached payloads
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(8 * 60 * 60);

/// Extension of committed cache entries
const ENTRY_EXTENSION: &str = "json";

/// Marker present in the name of in-flight temporary files
const TEMP_MARKER: &str = ".tmp.";

/// Distinguishes temporary files written concurrently by this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug, Clone)]
pub struct CachedData {
    /// Raw file content, not yet validated as JSON
    pub bytes: Vec<u8>,
    /// When the entry was last written
    pub modified_at: DateTime<Utc>,
    /// How long ago the entry was last written
    pub age: Duration,
    /// Whether the entry is older than the freshness window
    pub is_expired: bool,
}

impl CachedData {
    /// Validates the cached bytes as JSON
    ///
    /// # Returns
    /// * `Ok(FuelPrices)` if the entry holds a complete JSON document
    /// * `Err(serde_json::Error)` if the entry is corrupt
    pub fn into_prices(self) -> Result<FuelPrices, serde_json::Error> {
        FuelPrices::from_json_bytes(self.bytes)
    }
}

/// Outcome of a prune sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Cache and temporary files inspected
    pub scanned: usize,
    /// Files deleted because they were older than the cutoff
    pub removed: usize,
    /// Files that could not be inspected or deleted
    pub failed: usize,
}

/// Manages reading and writing cached payloads on disk
///
/// Entries live at `<cache_dir>/<region-key>.json`. Writes go to a temporary
/// file in the same directory and are renamed into place, so readers see
/// either the old or the new content and never a partial file.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// Maximum age at which an entry is served without refetching
    freshness: Duration,
}

impl CacheManager {
    /// Creates a new CacheManager with a custom cache directory
    ///
    /// The directory is created lazily on first write.
    pub fn with_dir(cache_dir: PathBuf, freshness: Duration) -> Self {
        Self {
            cache_dir,
            freshness,
        }
    }

    /// Returns the XDG-compliant default cache directory
    ///
    /// Uses `~/.cache/fuelcache/` on Linux, or equivalent on other platforms.
    /// Returns `None` if no home directory can be determined.
    pub fn default_dir() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "fuelcache")?;
        Some(project_dirs.cache_dir().to_path_buf())
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    pub fn path_for(&self, key: &RegionKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    fn temp_path_for(&self, key: &RegionKey) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.cache_dir.join(format!(
            ".{}.{}{}{}.{}",
            key.as_str(),
            ENTRY_EXTENSION,
            TEMP_MARKER,
            std::process::id(),
            n
        ))
    }

    /// Ensures the cache directory exists
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Reads the entry for `key`
    ///
    /// # Returns
    /// * `Ok(None)` if no entry exists
    /// * `Ok(Some(CachedData))` with the raw bytes and freshness metadata
    /// * `Err` if the file exists but cannot be read
    pub fn read(&self, key: &RegionKey) -> io::Result<Option<CachedData>> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        // Take mtime from the open handle so it matches the bytes we read
        let modified = file.metadata()?.modified()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let age = age_of(modified);
        Ok(Some(CachedData {
            bytes,
            modified_at: DateTime::<Utc>::from(modified),
            age,
            is_expired: age > self.freshness,
        }))
    }

    /// Atomically replaces the entry for `key` with `prices`
    ///
    /// Creates the cache directory if needed. On failure any previous entry
    /// is left untouched.
    pub fn write(&self, key: &RegionKey, prices: &FuelPrices) -> io::Result<()> {
        self.ensure_dir()?;

        let tmp = self.temp_path_for(key);
        let result = write_synced(&tmp, prices.as_bytes())
            .and_then(|()| fs::rename(&tmp, self.path_for(key)));

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Deletes the entry for `key`; a missing entry is not an error
    pub fn remove(&self, key: &RegionKey) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Deletes entries and leftover temporary files older than `max_age`
    ///
    /// Per-file failures are counted in the report and otherwise ignored.
    /// A missing cache directory yields an empty report.
    pub fn prune(&self, max_age: Duration) -> io::Result<PruneReport> {
        let mut report = PruneReport::default();

        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => {
                    report.failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !is_cache_file(&path) {
                continue;
            }
            report.scanned += 1;

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat cache file");
                    report.failed += 1;
                    continue;
                }
            };
            if age_of(modified) <= max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "pruned expired cache file");
                    report.removed += 1;
                }
                // Removed concurrently by another sweep or a corrupt-entry cleanup
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot prune cache file");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Time elapsed since `modified`, treating timestamps in the future as age zero
fn age_of(modified: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Matches committed entries and temporary files, ignoring anything else
fn is_cache_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.contains(TEMP_MARKER)
        || path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
}
