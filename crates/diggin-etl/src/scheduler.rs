//! The ingestion scheduler.
//!
//! A sweep walks every configured tag in order, lists the tag's top albums
//! on a randomly chosen page, and for each album: derives its id, fetches
//! best-effort details, builds a description, embeds it, and upserts the
//! record. The scheduler repeats sweeps on a fixed cycle until its
//! cancellation token fires.
//!
//! ```text
//!            warm-up
//!   start ──────────► Sweeping ──ok──► Idle ──cycle──► Sweeping ...
//!                        │                               ▲
//!                        └──err──► Faulted ──recovery────┘
//! ```
//!
//! Failures are contained at the level they concern: a failed embedding
//! skips one album, a tag that cannot be listed contributes no albums, and
//! only a vector store failure (or a panic) ends the sweep early. Nothing
//! short of cancellation ends the loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use diggin_core::{AlbumId, AlbumRecord};
use diggin_search::{StoreError, VectorCollection};

use crate::config::Config;
use crate::describe::build_description;
use crate::embed::Embedder;
use crate::error::{IngestError, IngestResult};
use crate::resilience::pause;
use crate::source::{AlbumCandidate, AlbumSource};

/// Attempts at `ensure_collection` per sweep before giving up on it.
const ENSURE_COLLECTION_ATTEMPTS: usize = 3;

/// Where the scheduler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting: warm-up, between sweeps, or stopped.
    Idle,
    /// A sweep is running.
    Sweeping,
    /// The last sweep failed; waiting out the recovery delay.
    Faulted,
}

/// How the result page is chosen for each tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    /// Uniformly random in `1..max_page`, so repeated sweeps see more than
    /// the head of each tag's list.
    Random { max_page: u32 },
    /// Always the same page.
    Fixed(u32),
}

impl PageSelector {
    pub fn next_page(&self) -> u32 {
        match *self {
            Self::Random { max_page } => rand::rng().random_range(1..max_page.max(2)),
            Self::Fixed(page) => page.max(1),
        }
    }
}

/// Everything the scheduler needs to know from configuration.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tags: Vec<String>,
    pub warmup: Duration,
    pub politeness: Duration,
    pub cycle: Duration,
    pub recovery: Duration,
    pub pages: PageSelector,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        let schedule = &config.schedule;
        Self {
            tags: config.tags(),
            warmup: schedule.warmup(),
            politeness: schedule.politeness(),
            cycle: schedule.cycle(),
            recovery: schedule.recovery(),
            pages: PageSelector::Random {
                max_page: schedule.max_page,
            },
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    /// Tags whose listing was requested.
    pub tags: usize,
    /// Albums returned across all tags.
    pub candidates: usize,
    /// Records upserted.
    pub stored: usize,
    /// Albums dropped for an incomplete natural key.
    pub skipped: usize,
    /// Albums dropped because embedding (or validation) failed.
    pub failed: usize,
    /// The sweep stopped early because of cancellation.
    pub cancelled: bool,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tags, {} albums found, {} stored, {} skipped, {} failed",
            self.tags, self.candidates, self.stored, self.skipped, self.failed
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Periodic Last.fm-to-vector-store ingestion.
#[derive(Debug)]
pub struct IngestScheduler {
    source: Arc<dyn AlbumSource>,
    embedder: Arc<dyn Embedder>,
    collection: Arc<dyn VectorCollection>,
    settings: SchedulerSettings,
    cancel: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl IngestScheduler {
    pub fn new(
        source: Arc<dyn AlbumSource>,
        embedder: Arc<dyn Embedder>,
        collection: Arc<dyn VectorCollection>,
        settings: SchedulerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            source,
            embedder,
            collection,
            settings,
            cancel,
            state,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    /// Run sweeps until cancelled. Returns the number of sweeps that
    /// completed without error.
    ///
    /// Each sweep runs on its own task so that a panic inside one is
    /// treated like any other failed sweep.
    pub async fn run(self: Arc<Self>) -> usize {
        log::info!(
            "Ingestion scheduler starting, waiting {:?} for dependencies",
            self.settings.warmup
        );
        if !pause(&self.cancel, self.settings.warmup).await {
            log::info!("Ingestion scheduler cancelled during warm-up");
            return 0;
        }

        let mut completed = 0;
        loop {
            self.set_state(SchedulerState::Sweeping);
            let this = Arc::clone(&self);
            let outcome = tokio::spawn(async move { this.sweep().await }).await;

            let wait = match outcome {
                Ok(Ok(report)) => {
                    completed += 1;
                    self.set_state(SchedulerState::Idle);
                    if report.cancelled {
                        log::info!("Sweep cancelled: {}", report);
                        break;
                    }
                    log::info!(
                        "Crates refreshed: {}. Sleeping for {:?}",
                        report,
                        self.settings.cycle
                    );
                    self.settings.cycle
                }
                Ok(Err(e)) => {
                    self.set_state(SchedulerState::Faulted);
                    log::error!(
                        "Sweep failed: {}. Retrying in {:?}",
                        e,
                        self.settings.recovery
                    );
                    self.settings.recovery
                }
                Err(join_error) => {
                    self.set_state(SchedulerState::Faulted);
                    log::error!(
                        "Sweep crashed: {}. Retrying in {:?}",
                        join_error,
                        self.settings.recovery
                    );
                    self.settings.recovery
                }
            };

            if !pause(&self.cancel, wait).await {
                break;
            }
            self.set_state(SchedulerState::Idle);
        }

        self.set_state(SchedulerState::Idle);
        log::info!(
            "Ingestion scheduler stopped after {} completed sweeps",
            completed
        );
        completed
    }

    /// Perform one sweep over all configured tags.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StoreUnavailable`] when the vector collection
    /// cannot be created or written to. Every other failure is absorbed
    /// and counted in the report.
    pub async fn sweep(&self) -> IngestResult<SweepReport> {
        let mut report = SweepReport {
            started_at: Utc::now(),
            ..SweepReport::default()
        };

        self.ensure_collection().await?;

        for tag in &self.settings.tags {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            log::info!("Digging for tag: {}", tag);
            self.ingest_tag(tag, &mut report).await?;
            if report.cancelled {
                return Ok(report);
            }

            // Be polite to the API
            if !pause(&self.cancel, self.settings.politeness).await {
                report.cancelled = true;
                return Ok(report);
            }
        }

        Ok(report)
    }

    async fn ensure_collection(&self) -> IngestResult<()> {
        let collection = &self.collection;
        (|| async move { collection.ensure_collection().await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_times(ENSURE_COLLECTION_ATTEMPTS - 1),
            )
            .sleep(tokio::time::sleep)
            .when(StoreError::is_transient)
            .notify(|err: &StoreError, delay: Duration| {
                log::warn!(
                    "Vector collection {} not ready ({}), retrying in {:?}",
                    collection.name(),
                    err,
                    delay
                );
            })
            .await?;
        Ok(())
    }

    async fn ingest_tag(&self, tag: &str, report: &mut SweepReport) -> IngestResult<()> {
        let page = self.settings.pages.next_page();
        let candidates = self.source.top_albums(tag, page).await;
        report.tags += 1;
        report.candidates += candidates.len();
        log::debug!(
            "Tag {} page {} returned {} albums",
            tag,
            page,
            candidates.len()
        );

        for candidate in &candidates {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }
            if !candidate.has_natural_key() {
                log::debug!("Skipping album without artist/title: {:?}", candidate);
                report.skipped += 1;
                continue;
            }

            match self.ingest_album(tag, candidate).await {
                Ok(record) => {
                    report.stored += 1;
                    log::info!("Stored: {} - {} ({})", record.artist, record.title, record.id);
                }
                Err(e) if e.is_item_scoped() => {
                    report.failed += 1;
                    log::warn!(
                        "Skipping {} - {}: {}",
                        candidate.artist,
                        candidate.title,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn ingest_album(&self, tag: &str, candidate: &AlbumCandidate) -> IngestResult<AlbumRecord> {
        let id = AlbumId::from_natural_key(&candidate.artist, &candidate.title);

        let details = self
            .source
            .album_details(&candidate.artist, &candidate.title)
            .await;
        let description = build_description(tag, candidate, details.as_ref());
        if description.trim().is_empty() {
            return Err(IngestError::EmptyDescription {
                natural_key: diggin_core::model::ids::natural_key(
                    &candidate.artist,
                    &candidate.title,
                ),
            });
        }

        let vector = self.embedder.embed(&description).await?;

        let record = AlbumRecord {
            id,
            artist: candidate.artist.clone(),
            title: candidate.title.clone(),
            description,
            cover_url: candidate.cover_url.clone(),
            source_url: candidate.source_url.clone(),
            vector,
        };
        self.collection.upsert(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use diggin_core::SearchHit;
    use diggin_search::{InMemoryCollection, StoreResult};
    use tokio::time::Instant;

    use crate::source::AlbumDetails;

    const DIMS: usize = 4;

    #[derive(Debug, Default)]
    struct StubSource {
        albums: Vec<AlbumCandidate>,
        listings: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl AlbumSource for StubSource {
        async fn top_albums(&self, tag: &str, page: u32) -> Vec<AlbumCandidate> {
            self.listings.lock().unwrap().push((tag.to_string(), page));
            self.albums.clone()
        }

        async fn album_details(&self, _artist: &str, _title: &str) -> Option<AlbumDetails> {
            None
        }
    }

    #[derive(Debug)]
    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> IngestResult<Vec<f32>> {
            Ok(vec![1.0; DIMS])
        }
    }

    /// Fails `ensure_collection` a fixed number of times, then delegates.
    #[derive(Debug)]
    struct FlakyCollection {
        inner: InMemoryCollection,
        failures_left: AtomicUsize,
        ensure_calls: AtomicUsize,
    }

    impl FlakyCollection {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemoryCollection::new("albums", DIMS),
                failures_left: AtomicUsize::new(failures),
                ensure_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorCollection for FlakyCollection {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn ensure_collection(&self) -> StoreResult<()> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Api {
                    status: 400,
                    message: "bad request".to_string(),
                });
            }
            self.inner.ensure_collection().await
        }

        async fn upsert(&self, record: &AlbumRecord) -> StoreResult<()> {
            self.inner.upsert(record).await
        }

        async fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
            self.inner.search(query, top_k).await
        }

        async fn get(&self, id: &AlbumId) -> StoreResult<Option<AlbumRecord>> {
            self.inner.get(id).await
        }

        async fn count(&self) -> StoreResult<usize> {
            self.inner.count().await
        }
    }

    fn settings(tags: &[&str]) -> SchedulerSettings {
        SchedulerSettings {
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            warmup: Duration::from_secs(10),
            politeness: Duration::from_secs(2),
            cycle: Duration::from_secs(3600),
            recovery: Duration::from_secs(60),
            pages: PageSelector::Fixed(4),
        }
    }

    fn scheduler(
        source: Arc<StubSource>,
        collection: Arc<dyn VectorCollection>,
        tags: &[&str],
        cancel: CancellationToken,
    ) -> Arc<IngestScheduler> {
        Arc::new(IngestScheduler::new(
            source,
            Arc::new(ConstantEmbedder),
            collection,
            settings(tags),
            cancel,
        ))
    }

    #[test]
    fn test_random_pages_stay_in_range() {
        let selector = PageSelector::Random { max_page: 20 };
        for _ in 0..200 {
            let page = selector.next_page();
            assert!((1..20).contains(&page), "page {page} out of range");
        }
        assert_eq!(PageSelector::Random { max_page: 0 }.next_page(), 1);
        assert_eq!(PageSelector::Fixed(0).next_page(), 1);
        assert_eq!(PageSelector::Fixed(7).next_page(), 7);
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            tags: vec!["dub".to_string()],
            ..Config::default()
        };
        let settings = SchedulerSettings::from_config(&config);
        assert_eq!(settings.tags, vec!["dub"]);
        assert_eq!(settings.warmup, Duration::from_secs(10));
        assert_eq!(settings.pages, PageSelector::Random { max_page: 20 });
    }

    #[test]
    fn test_report_display() {
        let report = SweepReport {
            tags: 2,
            candidates: 5,
            stored: 3,
            skipped: 1,
            failed: 1,
            cancelled: true,
            ..SweepReport::default()
        };
        assert_eq!(
            report.to_string(),
            "2 tags, 5 albums found, 3 stored, 1 skipped, 1 failed (cancelled)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_processes_tags_in_order() {
        let source = Arc::new(StubSource {
            albums: vec![AlbumCandidate::new("Nas", "Illmatic")],
            ..StubSource::default()
        });
        let collection = Arc::new(InMemoryCollection::new("albums", DIMS));
        let scheduler = scheduler(
            Arc::clone(&source),
            collection.clone(),
            &["jazz", "soul", "rock"],
            CancellationToken::new(),
        );

        let start = Instant::now();
        let report = scheduler.sweep().await.unwrap();

        assert_eq!(report.tags, 3);
        assert_eq!(report.stored, 3);
        assert_eq!(collection.count().await.unwrap(), 1);
        let listings = source.listings.lock().unwrap().clone();
        assert_eq!(
            listings,
            vec![
                ("jazz".to_string(), 4),
                ("soul".to_string(), 4),
                ("rock".to_string(), 4)
            ]
        );
        // One politeness pause per tag.
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_incomplete_natural_keys() {
        let source = Arc::new(StubSource {
            albums: vec![
                AlbumCandidate::new("", "Untitled"),
                AlbumCandidate::new("Daft Punk", "Homework"),
            ],
            ..StubSource::default()
        });
        let collection = Arc::new(InMemoryCollection::new("albums", DIMS));
        let scheduler = scheduler(source, collection.clone(), &["house"], CancellationToken::new());

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.stored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_fails_when_store_unavailable() {
        let source = Arc::new(StubSource::default());
        let collection = Arc::new(FlakyCollection::new(1));
        let scheduler = scheduler(source, collection, &["jazz"], CancellationToken::new());

        let err = scheduler.sweep().await.unwrap_err();
        assert!(matches!(err, IngestError::StoreUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_store_errors_are_retried_within_sweep() {
        #[derive(Debug)]
        struct WarmingUp {
            inner: InMemoryCollection,
            calls: AtomicUsize,
        }

        #[async_trait]
        impl VectorCollection for WarmingUp {
            fn name(&self) -> &str {
                "warming-up"
            }
            async fn ensure_collection(&self) -> StoreResult<()> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(StoreError::Unavailable {
                        endpoint: "http://localhost:6333".to_string(),
                        message: "connection refused".to_string(),
                    });
                }
                self.inner.ensure_collection().await
            }
            async fn upsert(&self, record: &AlbumRecord) -> StoreResult<()> {
                self.inner.upsert(record).await
            }
            async fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
                self.inner.search(query, top_k).await
            }
            async fn get(&self, id: &AlbumId) -> StoreResult<Option<AlbumRecord>> {
                self.inner.get(id).await
            }
            async fn count(&self) -> StoreResult<usize> {
                self.inner.count().await
            }
        }

        let collection = Arc::new(WarmingUp {
            inner: InMemoryCollection::new("albums", DIMS),
            calls: AtomicUsize::new(0),
        });
        let source = Arc::new(StubSource {
            albums: vec![AlbumCandidate::new("Nas", "Illmatic")],
            ..StubSource::default()
        });
        let scheduler = scheduler(source, collection.clone(), &["hip hop"], CancellationToken::new());

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(collection.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancelled_during_warmup() {
        let source = Arc::new(StubSource::default());
        let collection = Arc::new(InMemoryCollection::new("albums", DIMS));
        let cancel = CancellationToken::new();
        let scheduler = scheduler(Arc::clone(&source), collection, &["jazz"], cancel.clone());

        cancel.cancel();
        let start = Instant::now();
        assert_eq!(scheduler.run().await, 0);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(source.listings.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_sweeps_until_cancelled() {
        let source = Arc::new(StubSource {
            albums: vec![AlbumCandidate::new("Nas", "Illmatic")],
            ..StubSource::default()
        });
        let collection = Arc::new(InMemoryCollection::new("albums", DIMS));
        let cancel = CancellationToken::new();
        let scheduler = scheduler(Arc::clone(&source), collection.clone(), &["jazz"], cancel.clone());

        let handle = tokio::spawn(Arc::clone(&scheduler).run());

        // warm-up (10s) + sweep (2s politeness) + cycle (3600s) + second sweep
        tokio::time::sleep(Duration::from_secs(10 + 2 + 3600 + 1)).await;
        cancel.cancel();
        let completed = handle.await.unwrap();

        assert_eq!(completed, 2);
        assert_eq!(source.listings.lock().unwrap().len(), 2);
        assert_eq!(collection.count().await.unwrap(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers_after_failed_sweep() {
        let source = Arc::new(StubSource {
            albums: vec![AlbumCandidate::new("Nas", "Illmatic")],
            ..StubSource::default()
        });
        let collection = Arc::new(FlakyCollection::new(1));
        let cancel = CancellationToken::new();
        let scheduler = scheduler(Arc::clone(&source), collection.clone(), &["jazz"], cancel.clone());
        let mut states = scheduler.subscribe();

        let handle = tokio::spawn(Arc::clone(&scheduler).run());

        // First sweep fails right after warm-up.
        states.wait_for(|s| *s == SchedulerState::Faulted).await.unwrap();
        assert!(source.listings.lock().unwrap().is_empty());

        // After the 60s recovery delay the next sweep succeeds.
        states.wait_for(|s| *s == SchedulerState::Sweeping).await.unwrap();
        states.wait_for(|s| *s == SchedulerState::Idle).await.unwrap();
        cancel.cancel();

        let completed = handle.await.unwrap();
        assert_eq!(completed, 1);
        assert_eq!(collection.ensure_calls.load(Ordering::SeqCst), 2);
        assert_eq!(collection.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_cycle_wait() {
        let source = Arc::new(StubSource::default());
        let collection = Arc::new(InMemoryCollection::new("albums", DIMS));
        let cancel = CancellationToken::new();
        let scheduler = scheduler(source, collection, &["jazz"], cancel.clone());
        let mut states = scheduler.subscribe();

        let start = Instant::now();
        let handle = tokio::spawn(Arc::clone(&scheduler).run());
        states.wait_for(|s| *s == SchedulerState::Sweeping).await.unwrap();
        states.wait_for(|s| *s == SchedulerState::Idle).await.unwrap();
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), 1);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }
}
