//! Difficulty lookups through a layered cache.
//!
//! A lookup resolves in this order:
//! 1. blank beatmap md5: the "unknown" sentinel, nothing is cached;
//! 2. the in-process memo map for the requested shape (rating or attributes);
//! 3. the durable store;
//! 4. a computation, shared by every concurrent caller of the same key.
//!
//! The in-flight map and the two memo maps are locked independently and never
//! across I/O. A purge bumps a generation counter; lookups that started before
//! it do not memoize their result.

pub mod memo;
pub mod single_flight;

pub use memo::MemoMap;
pub use single_flight::SingleFlight;
#[cfg(test)]
pub use single_flight::FlightState;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::beatmap::BeatmapSource;
use crate::database::{AttributeRow, DifficultyStore, RecordKey};
use crate::difficulty::{self, CalcError, DifficultyAttributes, RulesetRegistry};
use crate::error::DifficultyError;
use crate::request::{DifficultyRequest, RequestKey};

/// Default number of durable lookups between two progress log lines.
pub const DEFAULT_LOOKUP_LOG_INTERVAL: u64 = 1000;

#[cfg(test)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub flights: usize,
    pub ratings: usize,
    pub attributes: usize,
}

/// Collaborators needed by a computation. Shared with the spawned flights.
struct Collaborators {
    store: Arc<dyn DifficultyStore>,
    beatmaps: Arc<dyn BeatmapSource>,
    registry: Arc<RulesetRegistry>,
}

pub struct DifficultyCache {
    collaborators: Arc<Collaborators>,
    flights: SingleFlight<RequestKey, Arc<DifficultyAttributes>>,
    ratings: MemoMap<RequestKey, f64>,
    attributes: MemoMap<RequestKey, Arc<DifficultyAttributes>>,
    unknown: Arc<DifficultyAttributes>,
    purges: AtomicU64,
    lookups: AtomicU64,
    lookup_log_interval: u64,
}

impl DifficultyCache {
    pub fn new(
        store: Arc<dyn DifficultyStore>,
        beatmaps: Arc<dyn BeatmapSource>,
        registry: Arc<RulesetRegistry>,
    ) -> Self {
        Self {
            collaborators: Arc::new(Collaborators {
                store,
                beatmaps,
                registry,
            }),
            flights: SingleFlight::new(),
            ratings: MemoMap::new(),
            attributes: MemoMap::new(),
            unknown: Arc::new(DifficultyAttributes::unknown()),
            purges: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            lookup_log_interval: DEFAULT_LOOKUP_LOG_INTERVAL,
        }
    }

    /// Sets how many durable lookups pass between two log lines. Zero disables.
    pub fn with_lookup_log_interval(mut self, interval: u64) -> Self {
        self.lookup_log_interval = interval;
        self
    }

    /// Star rating for the request; `0.0` when the beatmap md5 is blank.
    pub async fn get_rating(&self, request: &DifficultyRequest) -> Result<f64, DifficultyError> {
        let Some(key) = request.key()? else {
            return Ok(0.0);
        };

        if let Some(rating) = self.ratings.get(&key) {
            return Ok(rating);
        }

        let generation = self.purges.load(Ordering::SeqCst);
        let rating = match self.read_durable_rating(&key).await {
            Some(rating) => f64::from(rating),
            None => {
                let attributes = self.compute(&key, request.beatmap_id).await?;
                self.memoize(&self.attributes, &key, Arc::clone(&attributes), generation);
                attributes.star_rating()
            }
        };

        self.memoize(&self.ratings, &key, rating, generation);
        Ok(rating)
    }

    /// Full attributes for the request; the unknown sentinel when the beatmap
    /// md5 is blank.
    pub async fn get_attributes(
        &self,
        request: &DifficultyRequest,
    ) -> Result<Arc<DifficultyAttributes>, DifficultyError> {
        let Some(key) = request.key()? else {
            return Ok(Arc::clone(&self.unknown));
        };

        if let Some(attributes) = self.attributes.get(&key) {
            return Ok(attributes);
        }

        let generation = self.purges.load(Ordering::SeqCst);
        let attributes = match self.read_durable_attributes(&key, request.beatmap_id).await? {
            Some(attributes) => attributes,
            None => {
                let attributes = self.compute(&key, request.beatmap_id).await?;
                self.memoize(&self.ratings, &key, attributes.star_rating(), generation);
                attributes
            }
        };

        self.memoize(&self.attributes, &key, Arc::clone(&attributes), generation);
        Ok(attributes)
    }

    /// Drops every in-process entry for the beatmap, across all rulesets and
    /// mod sets. The durable store is left alone.
    pub fn purge(&self, beatmap_md5: &str) {
        let beatmap_md5 = beatmap_md5.trim();
        log::info!("CACHE: Purging (beatmap: {})", beatmap_md5);

        self.purges.fetch_add(1, Ordering::SeqCst);
        let matches = |key: &RequestKey| key.beatmap_md5() == beatmap_md5;
        let flights = self.flights.purge_where(matches);
        let attributes = self.attributes.purge_where(matches);
        let ratings = self.ratings.purge_where(matches);

        log::debug!(
            "CACHE: Purged {} flights, {} attribute and {} rating entries",
            flights,
            attributes,
            ratings
        );
    }

    /// Memoizes `value` unless a purge ran since `generation` was read. The
    /// second check undoes an insert that raced a purge.
    fn memoize<V: Clone>(
        &self,
        memo: &MemoMap<RequestKey, V>,
        key: &RequestKey,
        value: V,
        generation: u64,
    ) {
        if self.purges.load(Ordering::SeqCst) != generation {
            return;
        }
        memo.insert(key.clone(), value);
        if self.purges.load(Ordering::SeqCst) != generation {
            memo.remove(key);
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            flights: self.flights.len(),
            ratings: self.ratings.len(),
            attributes: self.attributes.len(),
        }
    }

    #[cfg(test)]
    pub fn flight_state(&self, key: &RequestKey) -> Option<FlightState> {
        self.flights.state(key)
    }

    fn count_lookup(&self, key: &RequestKey) {
        let total = self.lookups.fetch_add(1, Ordering::Relaxed) + 1;
        if self.lookup_log_interval > 0 && total % self.lookup_log_interval == 0 {
            log::info!(
                "CACHE: difficulty lookup for (beatmap: {}, ruleset: {}, mods: {})",
                key.beatmap_md5(),
                key.ruleset().id(),
                key.mod_bitmask()
            );
        }
    }

    /// Read failures are logged and treated as a miss.
    async fn read_durable_rating(&self, key: &RequestKey) -> Option<f32> {
        self.count_lookup(key);

        match self.collaborators.store.read_rating(&RecordKey::from(key)).await {
            Ok(rating) => rating,
            Err(e) => {
                log::warn!("CACHE: Rating read failed for ({}): {}", key, e);
                None
            }
        }
    }

    async fn read_durable_attributes(
        &self,
        key: &RequestKey,
        beatmap_id: u32,
    ) -> Result<Option<Arc<DifficultyAttributes>>, DifficultyError> {
        self.count_lookup(key);

        let rows = match self.collaborators.store.read_attributes(&RecordKey::from(key)).await {
            Ok(Some(rows)) => rows,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("CACHE: Attribute read failed for ({}): {}", key, e);
                return Ok(None);
            }
        };

        let metadata = if difficulty::needs_metadata(key.ruleset()) {
            let beatmap = self.collaborators.beatmaps.fetch(beatmap_id).await?;
            Some(difficulty::metadata::extract_metadata(&beatmap)?)
        } else {
            None
        };

        let values: HashMap<u16, f64> = rows
            .iter()
            .map(|row| (row.attribute_id, f64::from(row.value)))
            .collect();

        let attributes =
            DifficultyAttributes::from_database_attributes(key.ruleset(), &values, metadata.as_ref())?;
        Ok(Some(Arc::new(attributes)))
    }

    async fn compute(
        &self,
        key: &RequestKey,
        beatmap_id: u32,
    ) -> Result<Arc<DifficultyAttributes>, DifficultyError> {
        let collaborators = Arc::clone(&self.collaborators);
        let flight_key = key.clone();

        self.flights
            .resolve_or_join(key.clone(), move || collaborators.compute(flight_key, beatmap_id))
            .await
    }
}

impl Collaborators {
    async fn compute(
        self: Arc<Self>,
        key: RequestKey,
        beatmap_id: u32,
    ) -> Result<Arc<DifficultyAttributes>, DifficultyError> {
        let result = self.calculate(&key, beatmap_id).await;
        match &result {
            Ok(attributes) => self.persist(&key, attributes).await,
            Err(e) => log::warn!("CACHE: Request failed with \"{}\" ({})", e, key),
        }

        result
    }

    async fn calculate(
        &self,
        key: &RequestKey,
        beatmap_id: u32,
    ) -> Result<Arc<DifficultyAttributes>, DifficultyError> {
        let calculator = self.registry.resolve(key.ruleset())?;
        log::info!("CACHE: Computing difficulty ({}) with {}", key, calculator.full_id());

        let beatmap = self.beatmaps.fetch(beatmap_id).await?;

        let file_md5 = beatmap.md5();
        if !file_md5.eq_ignore_ascii_case(key.beatmap_md5()) {
            log::warn!(
                "CACHE: Beatmap {} hashes to {}, request asked for {}",
                beatmap.beatmap_id(),
                file_md5,
                key.beatmap_md5()
            );
        }

        let mods = key.mods().clone();
        let attributes = tokio::task::spawn_blocking(move || calculator.calculate(&beatmap, &mods))
            .await
            .map_err(|e| CalcError::CalculationFailed(format!("calculation task failed: {}", e)))??;

        Ok(Arc::new(attributes))
    }

    /// Durability is best effort: failures are logged and the result is still
    /// served.
    async fn persist(&self, key: &RequestKey, attributes: &DifficultyAttributes) {
        let record = RecordKey::from(key);

        if let Err(e) = self
            .store
            .write_rating(&record, attributes.star_rating() as f32)
            .await
        {
            log::warn!("CACHE: Rating write failed for ({}): {}", key, e);
        }

        let rows: Vec<AttributeRow> = attributes
            .to_database_attributes()
            .into_iter()
            .map(|(id, value)| AttributeRow::new(id, value as f32))
            .collect();

        if let Err(e) = self.store.write_attributes(&record, &rows).await {
            log::warn!("CACHE: Attribute write failed for ({}): {}", key, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod stubs {
    //! Hand-written collaborators with call counters.

    use super::*;
    use crate::beatmap::BeatmapFile;
    use crate::database::StoreError;
    use crate::difficulty::metadata::tests::SAMPLE_OSU;
    use crate::difficulty::{DifficultyCalculator, ManiaAttributes, OsuAttributes};
    use crate::error::FetchError;
    use crate::request::{ModSet, Ruleset};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[derive(Default)]
    pub struct MemoryStore {
        pub ratings: Mutex<HashMap<RecordKey, f32>>,
        pub attributes: Mutex<HashMap<RecordKey, Vec<AttributeRow>>>,
        pub reads: AtomicUsize,
        pub writes: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl MemoryStore {
        pub fn clear(&self) {
            self.ratings.lock().unwrap().clear();
            self.attributes.lock().unwrap().clear();
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Sqlx(sqlx::Error::PoolClosed));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DifficultyStore for MemoryStore {
        async fn read_rating(&self, key: &RecordKey) -> Result<Option<f32>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.ratings.lock().unwrap().get(key).copied())
        }

        async fn read_attributes(
            &self,
            key: &RecordKey,
        ) -> Result<Option<Vec<AttributeRow>>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.attributes.lock().unwrap().get(key).cloned())
        }

        async fn write_rating(&self, key: &RecordKey, rating: f32) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.ratings.lock().unwrap().insert(key.clone(), rating);
            Ok(())
        }

        async fn write_attributes(
            &self,
            key: &RecordKey,
            rows: &[AttributeRow],
        ) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.attributes
                .lock()
                .unwrap()
                .insert(key.clone(), rows.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct StubSource {
        pub fetches: AtomicUsize,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl BeatmapSource for StubSource {
        async fn fetch(&self, beatmap_id: u32) -> Result<BeatmapFile, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Empty(beatmap_id));
            }
            Ok(BeatmapFile::new(beatmap_id, SAMPLE_OSU.as_bytes().to_vec()))
        }
    }

    #[derive(Debug)]
    pub struct StubCalculator {
        pub ruleset: Ruleset,
        pub star_rating: f64,
        pub calls: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl StubCalculator {
        pub fn new(ruleset: Ruleset, star_rating: f64) -> Self {
            Self {
                ruleset,
                star_rating,
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl DifficultyCalculator for StubCalculator {
        fn ruleset(&self) -> Ruleset {
            self.ruleset
        }

        fn display_name(&self) -> &str {
            "stub"
        }

        fn version(&self) -> &str {
            "test"
        }

        fn calculate(
            &self,
            _beatmap: &BeatmapFile,
            _mods: &ModSet,
        ) -> Result<DifficultyAttributes, CalcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CalcError::CalculationFailed("stub failure".to_string()));
            }
            Ok(match self.ruleset {
                Ruleset::Mania => DifficultyAttributes::Mania(ManiaAttributes {
                    star_rating: self.star_rating,
                    max_combo: 1500,
                }),
                _ => DifficultyAttributes::Osu(OsuAttributes {
                    star_rating: self.star_rating,
                    max_combo: 812,
                    aim_difficulty: 2.5,
                    speed_difficulty: 2.0,
                    approach_rate: 9.0,
                    hit_circle_count: 2,
                    slider_count: 1,
                    spinner_count: 1,
                    ..Default::default()
                }),
            })
        }
    }

    pub struct Harness {
        pub cache: Arc<DifficultyCache>,
        pub store: Arc<MemoryStore>,
        pub source: Arc<StubSource>,
        pub osu: Arc<StubCalculator>,
        pub mania: Arc<StubCalculator>,
    }

    impl Harness {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::default());
            let source = Arc::new(StubSource::default());
            let osu = Arc::new(StubCalculator::new(Ruleset::Osu, 5.25));
            let mania = Arc::new(StubCalculator::new(Ruleset::Mania, 3.5));

            let mut registry = RulesetRegistry::empty();
            registry.register(osu.clone());
            registry.register(mania.clone());

            let cache = Arc::new(DifficultyCache::new(
                store.clone(),
                source.clone(),
                Arc::new(registry),
            ));

            Self {
                cache,
                store,
                source,
                osu,
                mania,
            }
        }

        pub fn reads(&self) -> usize {
            self.store.reads.load(Ordering::SeqCst)
        }

        pub fn fetches(&self) -> usize {
            self.source.fetches.load(Ordering::SeqCst)
        }

        pub fn osu_calls(&self) -> usize {
            self.osu.calls.load(Ordering::SeqCst)
        }
    }
}
