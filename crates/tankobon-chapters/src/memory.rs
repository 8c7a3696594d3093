//! In-memory collaborators.
//!
//! Storage backed by a `watch` channel (every write re-emits the live
//! query), a scriptable remote source and a download queue whose status
//! changes are driven by hand. Used by the CLI and the test suites.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tankobon_model::{Chapter, ChapterId, Download, DownloadStatus, Manga, MangaId, SourceId};
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::error::BoxError;
use crate::ports::{
    ChapterCounter, ChapterReconciler, ChapterSource, ChapterStore, Collaborators,
    DownloadManager,
};

/// Failure injected into an in-memory collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InjectedFailure(pub String);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn chapter_key(chapter: &Chapter) -> &str {
    if chapter.url.is_empty() {
        &chapter.name
    } else {
        &chapter.url
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Chapter storage with a live query. Also reconciles remote lists.
#[derive(Debug)]
pub struct MemoryStore {
    chapters: watch::Sender<Vec<Chapter>>,
    flags: Mutex<HashMap<MangaId, u32>>,
    fail_writes: AtomicBool,
    fail_reconcile: AtomicBool,
    progress_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new(chapters: Vec<Chapter>) -> Self {
        let (chapters, _) = watch::channel(chapters);
        Self {
            chapters,
            flags: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_reconcile: AtomicBool::new(false),
            progress_writes: AtomicUsize::new(0),
        }
    }

    /// Stored chapters of one manga, in insertion order.
    pub fn chapters(&self, manga: MangaId) -> Vec<Chapter> {
        self.chapters
            .borrow()
            .iter()
            .filter(|chapter| chapter.manga_id == manga)
            .cloned()
            .collect()
    }

    pub fn all_chapters(&self) -> Vec<Chapter> {
        self.chapters.borrow().clone()
    }

    /// Replace one manga's chapters, notifying live queries.
    pub fn replace_chapters(&self, manga: MangaId, chapters: Vec<Chapter>) {
        self.chapters.send_modify(|all| {
            all.retain(|chapter| chapter.manga_id != manga);
            all.extend(chapters);
        });
    }

    /// Last flags written for a manga.
    pub fn flags(&self, manga: MangaId) -> Option<u32> {
        lock(&self.flags).get(&manga).copied()
    }

    /// Make progress and flag writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn fail_reconcile(&self, fail: bool) {
        self.fail_reconcile.store(fail, Ordering::Release);
    }

    /// Number of successful progress batches.
    pub fn progress_writes(&self) -> usize {
        self.progress_writes.load(Ordering::Acquire)
    }

    fn check_writable(&self) -> Result<(), BoxError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(Box::new(InjectedFailure("storage is read-only".into())));
        }
        Ok(())
    }
}

#[async_trait]
impl ChapterStore for MemoryStore {
    fn live_chapters(&self, manga: &Manga) -> BoxStream<'static, Vec<Chapter>> {
        let manga_id = manga.id;
        let rx = self.chapters.subscribe();
        stream::unfold((rx, true), move |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let chapters: Vec<Chapter> = rx
                .borrow_and_update()
                .iter()
                .filter(|chapter| chapter.manga_id == manga_id)
                .cloned()
                .collect();
            Some((chapters, (rx, false)))
        })
        .boxed()
    }

    async fn update_progress(&self, chapters: &[Chapter]) -> Result<(), BoxError> {
        self.check_writable()?;
        self.chapters.send_modify(|all| {
            for update in chapters {
                if let Some(stored) = all.iter_mut().find(|chapter| chapter.id == update.id) {
                    stored.read = update.read;
                    stored.last_page_read = update.last_page_read;
                }
            }
        });
        self.progress_writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn update_flags(&self, manga: &Manga) -> Result<(), BoxError> {
        self.check_writable()?;
        lock(&self.flags).insert(manga.id, manga.chapter_flags);
        Ok(())
    }
}

#[async_trait]
impl ChapterReconciler for MemoryStore {
    async fn sync_chapters_with_source(
        &self,
        remote: Vec<Chapter>,
        manga: &Manga,
        _source: SourceId,
    ) -> Result<Vec<Chapter>, BoxError> {
        if self.fail_reconcile.load(Ordering::Acquire) {
            return Err(Box::new(InjectedFailure("reconciliation failed".into())));
        }
        let mut merged = Vec::with_capacity(remote.len());
        self.chapters.send_modify(|all| {
            let mut next_id = all.iter().map(|chapter| chapter.id.get()).max().unwrap_or(0) + 1;
            let stored: HashMap<String, Chapter> = all
                .iter()
                .filter(|chapter| chapter.manga_id == manga.id)
                .map(|chapter| (chapter_key(chapter).to_string(), chapter.clone()))
                .collect();
            for mut chapter in remote {
                chapter.manga_id = manga.id;
                match stored.get(chapter_key(&chapter)) {
                    Some(existing) => {
                        chapter.id = existing.id;
                        chapter.read = existing.read;
                        chapter.last_page_read = existing.last_page_read;
                    }
                    None => {
                        chapter.id = ChapterId::new(next_id);
                        next_id += 1;
                    }
                }
                merged.push(chapter);
            }
            all.retain(|chapter| chapter.manga_id != manga.id);
            all.extend(merged.iter().cloned());
        });
        Ok(merged)
    }
}

// ============================================================================
// Remote source
// ============================================================================

#[derive(Debug)]
struct ScriptedResponse {
    delay: Duration,
    result: Result<Vec<Chapter>, String>,
}

/// Remote source returning a fixed catalog, or scripted responses first.
#[derive(Debug, Default)]
pub struct MemorySource {
    catalog: Mutex<Vec<Chapter>>,
    scripted: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(catalog: Vec<Chapter>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ..Default::default()
        }
    }

    pub fn set_catalog(&self, catalog: Vec<Chapter>) {
        *lock(&self.catalog) = catalog;
    }

    /// Queue a response for the next fetch, returned after `delay`.
    pub fn respond_with(&self, delay: Duration, result: Result<Vec<Chapter>, String>) {
        lock(&self.scripted).push_back(ScriptedResponse { delay, result });
    }

    /// Number of fetches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ChapterSource for MemorySource {
    async fn fetch_chapter_list(&self, _manga: &Manga) -> Result<Vec<Chapter>, BoxError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let scripted = lock(&self.scripted).pop_front();
        match scripted {
            Some(response) => {
                tokio::time::sleep(response.delay).await;
                response
                    .result
                    .map_err(|message| Box::new(InjectedFailure(message)) as BoxError)
            }
            None => Ok(lock(&self.catalog).clone()),
        }
    }
}

// ============================================================================
// Download queue
// ============================================================================

type StatusEvent = Result<Arc<Download>, String>;

/// Download queue whose workers are simulated by [`MemoryDownloads::set_status`].
#[derive(Debug)]
pub struct MemoryDownloads {
    queue: Mutex<Vec<Arc<Download>>>,
    downloaded: Mutex<HashSet<ChapterId>>,
    failing_deletes: Mutex<HashSet<ChapterId>>,
    deleted: Mutex<Vec<ChapterId>>,
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    events: broadcast::Sender<StatusEvent>,
}

impl Default for MemoryDownloads {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDownloads {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            queue: Mutex::new(Vec::new()),
            downloaded: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            deleted: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            events,
        }
    }

    /// Record a chapter as already on disk.
    pub fn mark_downloaded(&self, chapter: ChapterId) {
        lock(&self.downloaded).insert(chapter);
    }

    /// Put a chapter in the queue and announce it.
    pub fn enqueue(&self, manga: &Manga, chapter: Chapter) -> Arc<Download> {
        let download = Arc::new(Download::new(manga, chapter));
        download.set_status(DownloadStatus::Queued);
        lock(&self.queue).push(Arc::clone(&download));
        self.emit(Ok(Arc::clone(&download)));
        download
    }

    /// Move a queued download to `status` and announce it.
    ///
    /// A finished download leaves the queue and counts as on disk.
    pub fn set_status(&self, chapter: ChapterId, status: DownloadStatus) -> bool {
        let Some(download) = self.find(chapter) else {
            return false;
        };
        download.set_status(status);
        if status == DownloadStatus::Downloaded {
            lock(&self.queue).retain(|queued| queued.chapter_id() != chapter);
            lock(&self.downloaded).insert(chapter);
        }
        self.emit(Ok(download));
        true
    }

    /// Push an error through the status stream.
    pub fn emit_error(&self, message: impl Into<String>) {
        self.emit(Err(message.into()));
    }

    pub fn fail_delete_of(&self, chapter: ChapterId) {
        lock(&self.failing_deletes).insert(chapter);
    }

    pub fn queued(&self) -> Vec<ChapterId> {
        lock(&self.queue).iter().map(|d| d.chapter_id()).collect()
    }

    /// Chapters on disk, in id order.
    pub fn downloaded(&self) -> Vec<ChapterId> {
        let mut ids: Vec<ChapterId> = lock(&self.downloaded).iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn deleted(&self) -> Vec<ChapterId> {
        lock(&self.deleted).clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }

    fn emit(&self, event: StatusEvent) {
        // No subscriber is not an error for a queue.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl DownloadManager for MemoryDownloads {
    fn find(&self, chapter: ChapterId) -> Option<Arc<Download>> {
        lock(&self.queue)
            .iter()
            .find(|download| download.chapter_id() == chapter)
            .cloned()
    }

    fn status_events(&self) -> BoxStream<'static, Result<Arc<Download>, BoxError>> {
        let rx = self.events.subscribe();
        stream::unfold(rx, |mut rx| async move {
            let event = match rx.recv().await {
                Ok(Ok(download)) => Ok(download),
                Ok(Err(message)) => Err(Box::new(InjectedFailure(message)) as BoxError),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    Err(format!("missed {missed} download status events").into())
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            Some((event, rx))
        })
        .boxed()
    }

    fn remove(&self, chapter: ChapterId) {
        lock(&self.queue).retain(|download| download.chapter_id() != chapter);
    }

    fn is_chapter_downloaded(&self, _source: SourceId, _manga: &Manga, chapter: &Chapter) -> bool {
        lock(&self.downloaded).contains(&chapter.id)
    }

    fn download_chapters(&self, manga: &Manga, chapters: Vec<Chapter>) {
        for chapter in chapters {
            let on_disk = lock(&self.downloaded).contains(&chapter.id);
            if on_disk || self.find(chapter.id).is_some() {
                continue;
            }
            self.enqueue(manga, chapter);
        }
    }

    async fn delete_chapter(
        &self,
        _source: SourceId,
        _manga: &Manga,
        chapter: &Chapter,
    ) -> Result<(), BoxError> {
        tokio::task::yield_now().await;
        if lock(&self.failing_deletes).contains(&chapter.id) {
            return Err(Box::new(InjectedFailure(format!(
                "permission denied removing chapter {}",
                chapter.id
            ))));
        }
        lock(&self.downloaded).remove(&chapter.id);
        lock(&self.deleted).push(chapter.id);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn start(&self) {
        self.running.store(true, Ordering::Release);
        self.starts.fetch_add(1, Ordering::AcqRel);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.stops.fetch_add(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Counter and bundle
// ============================================================================

/// Keeps the last reported chapter count per manga.
#[derive(Debug, Default)]
pub struct MemoryCounter {
    counts: Mutex<HashMap<MangaId, usize>>,
}

impl MemoryCounter {
    pub fn count(&self, manga: MangaId) -> Option<usize> {
        lock(&self.counts).get(&manga).copied()
    }
}

impl ChapterCounter for MemoryCounter {
    fn report(&self, manga: MangaId, count: usize) {
        lock(&self.counts).insert(manga, count);
    }
}

/// All in-memory collaborators wired together.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pub store: Arc<MemoryStore>,
    pub source: Arc<MemorySource>,
    pub downloads: Arc<MemoryDownloads>,
    pub counter: Arc<MemoryCounter>,
}

impl MemoryBackend {
    /// Backend with `stored` chapters in storage and `remote` at the source.
    pub fn new(stored: Vec<Chapter>, remote: Vec<Chapter>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new(stored)),
            source: Arc::new(MemorySource::new(remote)),
            downloads: Arc::new(MemoryDownloads::new()),
            counter: Arc::new(MemoryCounter::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            source: self.source.clone(),
            reconciler: self.store.clone(),
            downloads: self.downloads.clone(),
            counter: Some(self.counter.clone() as Arc<dyn ChapterCounter>),
        }
    }
}
