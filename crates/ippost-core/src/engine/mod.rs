//! Single-run orchestration
//!
//! The [`Poster`] performs one invocation of the poster:
//!
//! ```text
//!   ensure cache dir ──► cache fresh? ──yes──────────────────────┐
//!                           │ no / --ignore-cache                 │
//!                           ▼                                     ▼
//!                    AddressResolver ──► FileCacheStore::persist ──► Dispatcher
//!                           │ zero addresses
//!                           ▼
//!                   Error::NoAddresses
//! ```
//!
//! Everything runs sequentially. Configuration loading happens before the
//! poster is built, so a missing config never reaches this module.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::FileCacheStore;
use crate::config::DestinationSpec;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::{Error, Result};
use crate::resolver::{AddressResolver, ResolutionReport};
use crate::snapshot::AddressSnapshot;

/// Default cache time-to-live (in seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory created before the cache is touched
    pub cache_dir: PathBuf,
    /// Maximum age of a reusable cache
    pub cache_ttl: Duration,
    /// Skip the cache and always resolve (the cache is overwritten)
    pub ignore_cache: bool,
}

impl RunOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            ignore_cache: false,
        }
    }

    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }
}

/// Where the published snapshot came from
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOrigin {
    /// A fresh cache was reused
    Cache,
    /// The echo services were queried
    Resolved(ResolutionReport),
}

/// Summary of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub origin: SnapshotOrigin,
    /// The snapshot the destinations received
    pub snapshot: AddressSnapshot,
    /// Whether this run wrote the cache file
    pub cache_written: bool,
    pub dispatch: DispatchReport,
}

impl RunReport {
    /// Whether the echo services were queried during this run
    pub fn resolved(&self) -> bool {
        matches!(self.origin, SnapshotOrigin::Resolved(_))
    }
}

/// Wires resolution, caching and dispatch for one invocation
pub struct Poster {
    resolver: AddressResolver,
    store: FileCacheStore,
    dispatcher: Dispatcher,
    destinations: Vec<DestinationSpec>,
}

impl Poster {
    /// Create a poster
    ///
    /// # Parameters
    ///
    /// - `resolver`: Echo services to query when the cache is not usable
    /// - `store`: Cache file location
    /// - `dispatcher`: Transports for the destinations
    /// - `destinations`: Publish targets, in order
    pub fn new(
        resolver: AddressResolver,
        store: FileCacheStore,
        dispatcher: Dispatcher,
        destinations: Vec<DestinationSpec>,
    ) -> Self {
        Self {
            resolver,
            store,
            dispatcher,
            destinations,
        }
    }

    /// Run once
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The snapshot was available and every destination was attempted
    /// - `Err(Error::NoAddresses)`: No usable cache and no service answered
    /// - `Err(Error::Cache)`: The cache directory could not be created
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        FileCacheStore::ensure_directory(&options.cache_dir).await?;

        let cached = if options.ignore_cache {
            info!("Ignoring cache file, fresh addresses requested");
            None
        } else {
            self.load_cache(options.cache_ttl).await
        };

        let (origin, snapshot, cache_written) = match cached {
            Some(snapshot) => {
                info!("Using cached public IP addresses");
                debug!("Got {} cached address(es): {:?}", snapshot.len(), snapshot.services);
                (SnapshotOrigin::Cache, snapshot, false)
            }
            None => self.resolve_and_persist().await?,
        };

        let dispatch = self
            .dispatcher
            .dispatch_all(&self.destinations, self.store.path())
            .await;

        info!(
            "Run finished: {} published, {} skipped, {} failed",
            dispatch.published_count(),
            dispatch.skipped_count(),
            dispatch.failed_count()
        );

        Ok(RunReport {
            origin,
            snapshot,
            cache_written,
            dispatch,
        })
    }

    async fn load_cache(&self, ttl: Duration) -> Option<AddressSnapshot> {
        match self.store.load_if_fresh(ttl).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not use cache file: {}", e);
                None
            }
        }
    }

    async fn resolve_and_persist(&self) -> Result<(SnapshotOrigin, AddressSnapshot, bool)> {
        let report = self.resolver.resolve().await;
        let snapshot = report.to_snapshot();
        info!("Retrieved {} public IP addresses", snapshot.len());
        debug!("Public IP addresses: {:?}", snapshot.services);

        if snapshot.is_empty() {
            error!("Could not retrieve public IP address from any service");
            return Err(Error::NoAddresses);
        }

        debug!("Attempting to save to cache file {}", self.store.path().display());
        let (snapshot, cache_written) = match self.store.persist(&snapshot).await {
            Ok(written) => (written, true),
            Err(e) => {
                error!("Failed to write to cache file: {}", e);
                (snapshot, false)
            }
        };

        Ok((SnapshotOrigin::Resolved(report), snapshot, cache_written))
    }
}
