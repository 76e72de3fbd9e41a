//! Crawl coordinator - listener pool orchestration
//!
//! A crawl seeds the work queue, launches the fetcher pool and starts one
//! listener task per fetcher. Each listener loops:
//!
//! 1. Pop a work item (a `Stop` is pushed back and ends the listener)
//! 2. Lease a fetcher from the pool
//! 3. Fetch and parse the page
//! 4. Return the fetcher
//! 5. Route the result: successes go to the persistence task, failures go
//!    back to the queue until they run out of attempts
//!
//! The `Stop` sentinel enters the queue once every submitted page has been
//! handed off or abandoned, so retried pages are never stranded behind it.

use crate::config::CrawlerConfig;
use crate::crawler::extractor::{extract, ExtractionResult, Extractor};
use crate::crawler::fetcher::{FetcherFactory, PageFetcher};
use crate::crawler::pool::ResourcePool;
use crate::crawler::queue::{WorkItem, WorkQueue};
use crate::model::{PlayerImage, PlayerRecord};
use crate::output::CrawlReport;
use crate::search::{SearchIndex, SyncedStore};
use crate::storage::{RunStatus, Session, StorageResult};
use crate::{CourtsideError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A record the persistence task knows how to write
pub trait Stage: Send + 'static {
    /// Writes the record into the open session; returns whether a row changed
    fn stage(self, session: &mut Session<'_>) -> StorageResult<bool>;
}

impl Stage for PlayerRecord {
    fn stage(self, session: &mut Session<'_>) -> StorageResult<bool> {
        session.add(self)?;
        Ok(true)
    }
}

impl Stage for PlayerImage {
    fn stage(self, session: &mut Session<'_>) -> StorageResult<bool> {
        let Some(mut player) = session.find_by_name(&self.player_name)? else {
            tracing::debug!(player = %self.player_name, "No stored player for image");
            return Ok(false);
        };
        if player.record.player_image.as_deref() == Some(self.file_name.as_str()) {
            return Ok(false);
        }
        player.record.player_image = Some(self.file_name);
        session.update(&player)?;
        Ok(true)
    }
}

impl<T: Stage> Stage for Option<T> {
    fn stage(self, session: &mut Session<'_>) -> StorageResult<bool> {
        match self {
            Some(record) => record.stage(session),
            None => Ok(false),
        }
    }
}

/// Tunables for one crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub workers: usize,

    /// Attempts per page before it is abandoned; 0 means no limit
    pub max_attempts: u32,

    /// Base of the linear backoff before a failed page is requeued
    pub retry_delay: Duration,

    pub extraction_timeout: Duration,

    pub commit_batch_size: usize,
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            workers: config.worker_count(),
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            extraction_timeout: Duration::from_secs(config.extraction_timeout_secs),
            commit_batch_size: config.commit_batch_size,
        }
    }

    /// Whether a page that has now failed `attempts` times gets another try
    fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }

    fn backoff(&self, attempts: u32) -> Duration {
        self.retry_delay.saturating_mul(attempts)
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// State shared by the listeners of one crawl
struct CrawlState {
    queue: WorkQueue,

    /// Pages neither handed to persistence nor abandoned
    outstanding: AtomicUsize,
    stop_released: AtomicBool,
    aborted: AtomicBool,
    failures: AtomicUsize,
    abandoned: AtomicUsize,
}

impl CrawlState {
    fn new(urls: Vec<String>) -> Self {
        let submitted = urls.len();
        let state = Self {
            queue: WorkQueue::seeded(urls),
            outstanding: AtomicUsize::new(submitted),
            stop_released: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            failures: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
        };
        if submitted == 0 {
            state.release_stop();
        }
        state
    }

    /// Pushes the sentinel, once per crawl
    fn release_stop(&self) {
        if !self.stop_released.swap(true, Ordering::SeqCst) {
            tracing::debug!("All pages settled, releasing stop");
            self.queue.push(WorkItem::Stop);
        }
    }

    /// Marks one page as done with, for better or worse
    fn settle(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.release_stop();
        }
    }

    fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::error!("Aborting crawl, remaining pages will be skipped");
        }
        self.release_stop();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Releases the sentinel if a listener unwinds, so its peers still stop
struct PanicGuard(Arc<CrawlState>);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

/// Main crawl orchestration structure
pub struct CrawlCoordinator<I> {
    store: Arc<SyncedStore<I>>,
    settings: CrawlSettings,
    run: Option<(String, String)>,
}

impl<I: SearchIndex + 'static> CrawlCoordinator<I> {
    /// Creates a coordinator writing into `store`
    ///
    /// # Arguments
    ///
    /// * `store` - Player store, mirrored into its search index on commit
    /// * `settings` - Worker count, retry and batching behaviour
    pub fn new(store: Arc<SyncedStore<I>>, settings: CrawlSettings) -> Self {
        Self {
            store,
            settings,
            run: None,
        }
    }

    /// Records each crawl in the `crawl_runs` table under `kind`
    pub fn with_run_record(mut self, kind: impl Into<String>, config_hash: impl Into<String>) -> Self {
        self.run = Some((kind.into(), config_hash.into()));
        self
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls every URL and persists what the extractor produces
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Every page was persisted or abandoned
    /// * `Err(CourtsideError)` - The pool could not start, persistence
    ///   failed, or a listener panicked
    pub async fn run<Fa, E>(&self, urls: Vec<String>, factory: &Fa, extractor: E) -> Result<CrawlReport>
    where
        Fa: FetcherFactory,
        E: Extractor,
        E::Output: Stage,
    {
        let run_id = match &self.run {
            Some((kind, hash)) => Some(self.store.with_store(|s| s.create_run(kind, hash))?),
            None => None,
        };

        let result = self.crawl(urls, factory, extractor).await;

        if let Some(run_id) = run_id {
            let (status, report) = match &result {
                Ok(report) => (RunStatus::Completed, Some(report)),
                Err(_) => (RunStatus::Aborted, None),
            };
            if let Err(e) = self
                .store
                .with_store(|s| s.finish_run(run_id, status, report))
            {
                tracing::warn!(run_id, error = %e, "Failed to record crawl run");
            }
        }

        result
    }

    async fn crawl<Fa, E>(&self, urls: Vec<String>, factory: &Fa, extractor: E) -> Result<CrawlReport>
    where
        Fa: FetcherFactory,
        E: Extractor,
        E::Output: Stage,
    {
        let started = Instant::now();
        let workers = self.settings.workers.max(1);
        let submitted = urls.len();

        tracing::info!(workers, pages = submitted, "Starting crawl");

        let pool = Arc::new(ResourcePool::launch(workers, factory).await?);
        let state = Arc::new(CrawlState::new(urls));
        let extractor = Arc::new(extractor);

        let (tx, rx) = mpsc::channel(self.settings.commit_batch_size.max(1) * 2);
        let persistence = tokio::spawn(persist(
            self.store.clone(),
            rx,
            self.settings.commit_batch_size.max(1),
            state.clone(),
        ));

        let mut listeners = Vec::with_capacity(workers);
        for id in 0..workers {
            listeners.push(tokio::spawn(listen(
                id,
                state.clone(),
                pool.clone(),
                extractor.clone(),
                tx.clone(),
                self.settings.clone(),
            )));
        }
        drop(tx);

        let mut panicked = None;
        for listener in listeners {
            if let Err(e) = listener.await {
                tracing::error!(error = %e, "Listener task failed");
                panicked.get_or_insert(e.to_string());
            }
        }

        let closed = pool.shutdown().await;
        tracing::debug!(closed, "Fetcher pool shut down");

        let leftover = state.queue.drain();
        if leftover.iter().any(|item| matches!(item, WorkItem::Fetch(_))) {
            tracing::warn!(count = leftover.len(), "Work items left in queue at teardown");
        }

        let (persisted, unchanged) = match persistence.await {
            Ok(Ok(counts)) => counts,
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => return Err(CourtsideError::Persistence(e.to_string())),
        };

        if let Some(reason) = panicked {
            return Err(CourtsideError::WorkerPanicked(reason));
        }

        let report = CrawlReport {
            workers,
            submitted,
            persisted,
            unchanged,
            failures: state.failures.load(Ordering::SeqCst),
            abandoned: state.abandoned.load(Ordering::SeqCst),
            elapsed: started.elapsed(),
        };

        tracing::info!(
            persisted = report.persisted,
            failures = report.failures,
            abandoned = report.abandoned,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Crawl finished"
        );
        Ok(report)
    }
}

/// One listener: pop, lease, extract, release, route
async fn listen<F, E>(
    id: usize,
    state: Arc<CrawlState>,
    pool: Arc<ResourcePool<F>>,
    extractor: Arc<E>,
    tx: mpsc::Sender<E::Output>,
    settings: CrawlSettings,
) where
    F: PageFetcher,
    E: Extractor,
{
    let _guard = PanicGuard(state.clone());

    loop {
        let descriptor = match state.queue.pop().await {
            WorkItem::Stop => {
                state.queue.push(WorkItem::Stop);
                tracing::debug!(listener = id, "Stop received");
                break;
            }
            WorkItem::Fetch(descriptor) => descriptor,
        };

        if state.is_aborted() {
            state.settle();
            continue;
        }

        let result = {
            let mut lease = pool.acquire().await;
            tracing::debug!(listener = id, slot = lease.slot(), url = %descriptor.url, "Extracting");
            extract(&mut *lease, &*extractor, descriptor, settings.extraction_timeout).await
        };

        match result {
            ExtractionResult::Success(output) => {
                if tx.send(output).await.is_err() {
                    state.abort();
                }
                state.settle();
            }
            ExtractionResult::Failure { cause, item } => {
                state.failures.fetch_add(1, Ordering::SeqCst);
                let attempts = item.attempts + 1;

                if !settings.allows_retry(attempts) || state.is_aborted() {
                    tracing::error!(url = %item.url, attempts, error = %cause, "Abandoning page");
                    state.abandoned.fetch_add(1, Ordering::SeqCst);
                    state.settle();
                    continue;
                }

                tracing::warn!(url = %item.url, attempts, error = %cause, "Extraction failed, requeueing");
                let delay = settings.backoff(attempts);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                state.queue.push(WorkItem::Fetch(item.retried()));
            }
        }
    }
}

/// Single writer: commits received records in batches
///
/// Returns the rows written and the records that changed nothing.
async fn persist<I, T>(
    store: Arc<SyncedStore<I>>,
    mut rx: mpsc::Receiver<T>,
    batch_size: usize,
    state: Arc<CrawlState>,
) -> StorageResult<(usize, usize)>
where
    I: SearchIndex,
    T: Stage,
{
    let mut persisted = 0;
    let mut received = 0;
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(record) = rx.recv().await {
        received += 1;
        batch.push(record);
        if batch.len() >= batch_size {
            match commit_batch(&store, std::mem::take(&mut batch)).await {
                Ok(written) => persisted += written,
                Err(e) => {
                    tracing::error!(error = %e, "Batch commit failed");
                    state.abort();
                    return Err(e);
                }
            }
            tracing::info!(persisted, "Persisted batch");
        }
    }

    if !batch.is_empty() {
        match commit_batch(&store, batch).await {
            Ok(written) => persisted += written,
            Err(e) => {
                tracing::error!(error = %e, "Final commit failed");
                state.abort();
                return Err(e);
            }
        }
    }

    Ok((persisted, received - persisted))
}

async fn commit_batch<I, T>(store: &SyncedStore<I>, batch: Vec<T>) -> StorageResult<usize>
where
    I: SearchIndex,
    T: Stage,
{
    let size = batch.len();
    let (written, outcome) = store
        .transaction(move |session| {
            let mut written = 0;
            for record in batch {
                if record.stage(session)? {
                    written += 1;
                }
            }
            Ok(written)
        })
        .await?;

    tracing::debug!(
        size,
        written,
        indexed = outcome.upserted,
        index_failures = outcome.failed,
        "Committed batch"
    );
    Ok(written)
}
