//! Owns the current [`Snapshot`] and lazily merges level extension files
//! into it.
//!
//! The main data file carries levels 1 and 2. Deeper levels live in
//! extension files listed in the catalog under keys such as `"3"`, with an
//! optional `"3-metro"` companion holding the metro-area partition of the
//! same level. Each key moves through [`LevelState`]; at most one fetch per
//! key is in flight and concurrent callers share its outcome.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::parser::{parse_catalog, parse_dataset};
use crate::services::DataSource;
use crate::store::{Snapshot, merge};
use crate::types::{Catalog, Dataset};

/// Partition suffix of the metro-area companion files.
pub const METRO_PARTITION: &str = "metro";

/// First level that is not part of the main data file.
pub const FIRST_EXTENSION_LEVEL: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LevelState {
    NotRequested,
    Fetching,
    Merged,
    FetchFailed,
}

/// A level file key: a depth plus an optional region-subset partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelKey {
    pub depth: u8,
    pub partition: Option<String>,
}

impl LevelKey {
    pub fn level(depth: u8) -> Self {
        Self {
            depth,
            partition: None,
        }
    }

    pub fn partition(depth: u8, partition: &str) -> Self {
        Self {
            depth,
            partition: Some(partition.to_string()),
        }
    }
}

impl fmt::Display for LevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.partition {
            Some(p) => write!(f, "{}-{}", self.depth, p),
            None => write!(f, "{}", self.depth),
        }
    }
}

/// Failures of the initial load; the only errors the provider surfaces.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("failed to load catalog '{path}' from {location}")]
    Catalog {
        location: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("catalog at {0} lists no datasets")]
    EmptyCatalog(String),
    #[error("failed to load dataset '{file}' from {location}")]
    Dataset {
        location: String,
        file: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone)]
pub struct ProviderView {
    pub records: Snapshot,
    pub loaded_levels: Vec<u8>,
    pub level_loading: bool,
}

#[derive(Debug, Clone, Copy)]
struct LevelEntry {
    state: LevelState,
    /// Completed fetch attempts; lets a caller that waited on the coalescing
    /// lock tell whether someone else finished an attempt meanwhile.
    attempts: u64,
}

impl Default for LevelEntry {
    fn default() -> Self {
        Self {
            state: LevelState::NotRequested,
            attempts: 0,
        }
    }
}

/// One lock per key so that only one fetch per key runs at a time.
struct FetchCoalescer {
    inflight: AsyncMutex<HashMap<LevelKey, Arc<AsyncMutex<()>>>>,
}

impl FetchCoalescer {
    fn new() -> Self {
        Self {
            inflight: AsyncMutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: &LevelKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

struct Inner {
    source: Arc<dyn DataSource>,
    catalog: Catalog,
    snapshot: RwLock<Snapshot>,
    levels: Mutex<HashMap<LevelKey, LevelEntry>>,
    loaded_levels: Mutex<BTreeSet<u8>>,
    coalescer: FetchCoalescer,
    in_flight: AtomicUsize,
    alive: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the in-flight counter and resets an unfinished `Fetching`
/// state when the fetching future is dropped early.
struct InFlight<'a> {
    inner: &'a Inner,
    key: LevelKey,
}

impl<'a> InFlight<'a> {
    fn start(inner: &'a Inner, key: &LevelKey) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        lock(&inner.levels).entry(key.clone()).or_default().state = LevelState::Fetching;
        Self {
            inner,
            key: key.clone(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut levels = lock(&self.inner.levels);
        if let Some(entry) = levels.get_mut(&self.key) {
            if entry.state == LevelState::Fetching {
                entry.state = LevelState::NotRequested;
            }
        }
        drop(levels);
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared handle to the loaded records; cheap to clone.
#[derive(Clone)]
pub struct DataProvider {
    inner: Arc<Inner>,
}

impl DataProvider {
    /// Fetches the catalog and the default dataset's main file.
    #[tracing::instrument(skip(source), fields(source = %source.describe()))]
    pub async fn load(source: Arc<dyn DataSource>, catalog_file: &str) -> Result<Self, LoadError> {
        let location = source.describe();

        let catalog = source
            .fetch_json(catalog_file)
            .await
            .and_then(parse_catalog)
            .map_err(|e| LoadError::Catalog {
                location: location.clone(),
                path: catalog_file.to_string(),
                source: e,
            })?;

        let Some(entry) = catalog.default_dataset().cloned() else {
            return Err(LoadError::EmptyCatalog(location));
        };

        let (dataset, report) = source
            .fetch_json(&entry.file)
            .await
            .and_then(parse_dataset)
            .map_err(|e| LoadError::Dataset {
                location: location.clone(),
                file: entry.file.clone(),
                source: e,
            })?;

        info!(
            file = %entry.file,
            occupations = dataset.occupations.len(),
            regions = dataset.regions.len(),
            skipped = report.skipped(),
            "Main dataset loaded"
        );

        Ok(Self::from_parts(source, catalog, dataset, &entry.levels))
    }

    /// Builds a provider around an already parsed dataset whose levels
    /// `base_levels` count as merged.
    pub fn from_parts(
        source: Arc<dyn DataSource>,
        catalog: Catalog,
        dataset: Dataset,
        base_levels: &[u8],
    ) -> Self {
        let levels = base_levels
            .iter()
            .map(|d| {
                (
                    LevelKey::level(*d),
                    LevelEntry {
                        state: LevelState::Merged,
                        attempts: 1,
                    },
                )
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                source,
                catalog,
                snapshot: RwLock::new(Arc::new(dataset)),
                levels: Mutex::new(levels),
                loaded_levels: Mutex::new(base_levels.iter().copied().collect()),
                coalescer: FetchCoalescer::new(),
                in_flight: AtomicUsize::new(0),
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Current records. The returned value never changes; later merges
    /// publish a new snapshot instead.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn loaded_levels(&self) -> Vec<u8> {
        lock(&self.inner.loaded_levels).iter().copied().collect()
    }

    /// True while any level file is being fetched.
    pub fn level_loading(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn level_state(&self, key: &LevelKey) -> LevelState {
        lock(&self.inner.levels)
            .get(key)
            .map(|e| e.state)
            .unwrap_or(LevelState::NotRequested)
    }

    pub fn view(&self) -> ProviderView {
        ProviderView {
            records: self.snapshot(),
            loaded_levels: self.loaded_levels(),
            level_loading: self.level_loading(),
        }
    }

    pub fn max_digit_level(&self) -> u8 {
        self.inner.catalog.max_digit_level()
    }

    /// Stops applying results; fetches that resolve afterwards are dropped.
    pub fn close(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        !self.inner.alive.load(Ordering::SeqCst)
    }

    /// Loads level `depth` and its metro companion when the catalog has one.
    ///
    /// Never fails: transport and parse errors leave the key in
    /// [`LevelState::FetchFailed`]. Returns the state of the main key;
    /// `NotRequested` when the catalog has no file for it.
    pub async fn request_level(&self, depth: u8) -> LevelState {
        let main = LevelKey::level(depth);
        let metro = LevelKey::partition(depth, METRO_PARTITION);

        let (main_state, metro_state) =
            tokio::join!(self.request_key(&main), self.request_key(&metro));

        if main_state == LevelState::Merged {
            lock(&self.inner.loaded_levels).insert(depth);
        }
        if metro_state == LevelState::FetchFailed {
            warn!(level = depth, "Metro partition failed to load");
        }
        main_state
    }

    /// Requests every extension level up to `up_to` concurrently.
    pub async fn ensure_levels(&self, up_to: u8) -> Vec<(u8, LevelState)> {
        let mut tasks = JoinSet::new();
        for depth in FIRST_EXTENSION_LEVEL..=up_to {
            let provider = self.clone();
            tasks.spawn(async move { (depth, provider.request_level(depth).await) });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "Level request task failed"),
            }
        }
        results.sort_by_key(|(depth, _)| *depth);
        results
    }

    #[tracing::instrument(skip(self), fields(level = %key))]
    async fn request_key(&self, key: &LevelKey) -> LevelState {
        let inner = &self.inner;
        let Some(file) = inner.catalog.level_file(&key.to_string()).map(str::to_string) else {
            debug!("No file listed for level, skipping");
            return self.level_state(key);
        };

        let seen = {
            let levels = lock(&inner.levels);
            let entry = levels.get(key).copied().unwrap_or_default();
            if entry.state == LevelState::Merged {
                return LevelState::Merged;
            }
            entry.attempts
        };
        if self.is_closed() {
            return self.level_state(key);
        }

        let _guard = inner.coalescer.acquire(key).await;
        if self.is_closed() {
            debug!("Provider closed while waiting for concurrent fetch");
            return self.level_state(key);
        }

        {
            let levels = lock(&inner.levels);
            let entry = levels.get(key).copied().unwrap_or_default();
            if entry.state == LevelState::Merged || entry.attempts > seen {
                debug!(state = ?entry.state, "Sharing outcome of concurrent fetch");
                return entry.state;
            }
        }

        let in_flight = InFlight::start(inner, key);
        let fetched = inner
            .source
            .fetch_json(&file)
            .await
            .and_then(parse_dataset);

        if self.is_closed() {
            debug!(%file, "Provider closed, discarding fetched level");
            drop(in_flight);
            return self.level_state(key);
        }

        let state = match fetched {
            Ok((incoming, report)) => {
                {
                    let mut snapshot = inner
                        .snapshot
                        .write()
                        .unwrap_or_else(PoisonError::into_inner);
                    let merged = merge(&snapshot, &incoming);
                    *snapshot = Arc::new(merged);
                }
                info!(
                    %file,
                    occupations = incoming.occupations.len(),
                    skipped = report.skipped(),
                    "Level merged"
                );
                LevelState::Merged
            }
            Err(e) => {
                error!(%file, error = %e, "Level fetch failed");
                LevelState::FetchFailed
            }
        };

        {
            let mut levels = lock(&inner.levels);
            let entry = levels.entry(key.clone()).or_default();
            entry.state = state;
            entry.attempts += 1;
        }
        drop(in_flight);
        state
    }
}
