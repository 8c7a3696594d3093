//! Remote sync controller.
//!
//! At most one sync is current at a time. Each start bumps a generation
//! counter and aborts the task in flight. A sync writes to storage and
//! publishes its outcome only while its generation is still the latest, so a
//! superseded sync is never observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tankobon_model::{Chapter, Manga};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::ChaptersError;
use crate::ports::{ChapterReconciler, ChapterSource};
use crate::publisher::{Publisher, Subscription};

/// Result of a completed remote sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Generation of the sync that produced this report.
    pub generation: u64,
    /// Number of chapters the source returned.
    pub fetched: usize,
    /// Stored chapter list after reconciliation.
    pub chapters: Vec<Chapter>,
}

/// What a sync reports to its observer, exactly once.
pub type SyncOutcome = Result<SyncReport, ChaptersError>;

#[derive(Debug)]
pub(crate) struct SyncController {
    generation: Mutex<u64>,
    has_requested: AtomicBool,
    outcomes: Publisher<SyncOutcome>,
    task: Mutex<Option<AbortHandle>>,
}

impl SyncController {
    pub(crate) fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            has_requested: AtomicBool::new(false),
            outcomes: Publisher::until_delivered(),
            task: Mutex::new(None),
        }
    }

    /// Whether any sync was ever started. Never cleared.
    pub(crate) fn has_requested(&self) -> bool {
        self.has_requested.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe(&self) -> Subscription<SyncOutcome> {
        self.outcomes.subscribe()
    }

    fn begin(&self) -> u64 {
        self.has_requested.store(true, Ordering::Release);
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        *generation
    }

    fn is_current(&self, generation: u64) -> bool {
        *self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == generation
    }

    /// Publish an outcome if its sync is still current.
    fn finish(&self, generation: u64, outcome: SyncOutcome) -> bool {
        // Held across publish so a new start cannot slip in between.
        let current = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!(generation, current = *current, "dropping superseded sync result");
            return false;
        }
        self.outcomes.publish(outcome);
        true
    }

    /// Start a sync, superseding any sync in flight. Returns its generation.
    pub(crate) fn start(
        self: &Arc<Self>,
        runtime: &Handle,
        source: Arc<dyn ChapterSource>,
        reconciler: Arc<dyn ChapterReconciler>,
        manga: Manga,
    ) -> u64 {
        let generation = self.begin();
        info!(manga_id = %manga.id, generation, "fetching chapters from source");
        let controller = Arc::clone(self);
        let handle = runtime.spawn(async move {
            let Some(outcome) = controller
                .fetch_and_reconcile(source.as_ref(), reconciler.as_ref(), &manga, generation)
                .await
            else {
                return;
            };
            match &outcome {
                Ok(report) => info!(
                    manga_id = %manga.id,
                    generation,
                    fetched = report.fetched,
                    "chapter sync finished"
                ),
                Err(error) => warn!(manga_id = %manga.id, generation, error = ?error, "chapter sync failed"),
            }
            controller.finish(generation, outcome);
        });
        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
        generation
    }

    /// Fetch and write back one sync.
    ///
    /// Returns `None` when a newer sync started while the fetch was in
    /// flight; storage is left untouched in that case.
    async fn fetch_and_reconcile(
        &self,
        source: &dyn ChapterSource,
        reconciler: &dyn ChapterReconciler,
        manga: &Manga,
        generation: u64,
    ) -> Option<SyncOutcome> {
        let fetched = match source.fetch_chapter_list(manga).await {
            Ok(fetched) => fetched,
            Err(source) => {
                return Some(Err(ChaptersError::Fetch {
                    manga: manga.id,
                    source_id: manga.source,
                    source,
                }));
            }
        };
        if !self.is_current(generation) {
            debug!(generation, "skipping write back of superseded sync");
            return None;
        }
        let count = fetched.len();
        let outcome = reconciler
            .sync_chapters_with_source(fetched, manga, manga.source)
            .await
            .map(|chapters| SyncReport {
                generation,
                fetched: count,
                chapters,
            })
            .map_err(|source| ChaptersError::Reconcile {
                manga: manga.id,
                source,
            });
        Some(outcome)
    }
}
