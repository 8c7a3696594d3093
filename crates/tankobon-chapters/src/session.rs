//! Chapter session for one manga.
//!
//! A [`ChapterSession`] ties the canonical list store, the download status
//! merger, the remote sync controller and the mutation operations to one
//! projected view. Projection and publication always happen while the
//! session state lock is held, so observers see projected lists in the
//! order the inputs changed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tankobon_model::{
    ChapterDisplay, ChapterId, DisplayMode, Download, DownloadedFilter, Manga, MangaId,
    ReadFilter, SortField,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chapter_model::ChapterModel;
use crate::config::SessionConfig;
use crate::error::{ChaptersError, Result};
use crate::ports::Collaborators;
use crate::projector;
use crate::publisher::{Publisher, Subscription};
use crate::sync::{SyncController, SyncOutcome};
use crate::{merger, mutations, store};

/// Mutable state guarded by the session lock.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) manga: Manga,
    pub(crate) display: ChapterDisplay,
    /// Unfiltered, unsorted.
    pub(crate) chapters: Vec<ChapterModel>,
    /// Whether storage has emitted at least once.
    pub(crate) loaded: bool,
}

/// State shared between the session handle and its background tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) manga_id: MangaId,
    pub(crate) collaborators: Collaborators,
    pub(crate) config: SessionConfig,
    pub(crate) runtime: Handle,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) view: Publisher<Vec<ChapterModel>>,
    pub(crate) status_changes: Publisher<Download>,
    pub(crate) sync: Arc<SyncController>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn manga(&self) -> Manga {
        self.lock_state().manga.clone()
    }

    /// Project and publish. The caller holds the state lock.
    pub(crate) fn refresh_locked(&self, state: &SessionState) {
        let projected = projector::project(&state.chapters, &state.display);
        let visible = projected.len();
        let listeners = self.view.publish(projected);
        debug!(manga_id = %self.manga_id, visible, listeners, "published chapter view");
    }

    pub(crate) fn refresh(&self) {
        let state = self.lock_state();
        self.refresh_locked(&state);
    }

    pub(crate) fn fetch_from_source(&self) -> u64 {
        self.start_sync(self.manga())
    }

    /// Start a sync for `manga`. Does not take the state lock.
    pub(crate) fn start_sync(&self, manga: Manga) -> u64 {
        self.sync.start(
            &self.runtime,
            Arc::clone(&self.collaborators.source),
            Arc::clone(&self.collaborators.reconciler),
            manga,
        )
    }

    /// Change the display flags, persist them, and optionally re-project.
    ///
    /// Nothing changes in memory if the write fails.
    fn update_display(
        &self,
        reproject: bool,
        change: impl FnOnce(&mut ChapterDisplay),
    ) -> Result<()> {
        let mut state = self.lock_state();
        let mut display = state.display;
        change(&mut display);
        let mut manga = state.manga.clone();
        manga.set_display(&display);
        self.collaborators
            .store
            .update_flags(&manga)
            .map_err(|source| ChaptersError::Persist {
                operation: "save chapter display settings",
                source,
            })?;
        state.manga = manga;
        state.display = display;
        if reproject {
            self.refresh_locked(&state);
        }
        Ok(())
    }
}

/// Live chapter list of one manga.
///
/// Dropping the session stops following storage and the download queue.
/// Mutations already started run to completion.
#[derive(Debug)]
pub struct ChapterSession {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChapterSession {
    /// Open a session and start following storage and the download queue.
    ///
    /// # Errors
    ///
    /// - [`ChaptersError::Configuration`] if the manga's chapter flags do not
    ///   decode.
    /// - [`ChaptersError::Runtime`] if called outside a Tokio runtime.
    pub fn open(manga: Manga, collaborators: Collaborators, config: SessionConfig) -> Result<Self> {
        let display = manga.display()?;
        let runtime = Handle::try_current()?;
        info!(manga_id = %manga.id, title = %manga.title, "opening chapter session");

        let shared = Arc::new(Shared {
            manga_id: manga.id,
            collaborators,
            config,
            runtime,
            state: Mutex::new(SessionState {
                manga,
                display,
                chapters: Vec::new(),
                loaded: false,
            }),
            view: Publisher::latest(),
            status_changes: Publisher::latest(),
            sync: Arc::new(SyncController::new()),
        });

        let tasks = vec![
            merger::spawn(Arc::clone(&shared)),
            store::spawn(Arc::clone(&shared)),
        ];
        Ok(Self { shared, tasks })
    }

    /// The manga with its current flags.
    pub fn manga(&self) -> Manga {
        self.shared.manga()
    }

    pub fn display(&self) -> ChapterDisplay {
        self.shared.lock_state().display
    }

    /// Snapshot of the canonical list, unfiltered and unsorted.
    pub fn chapters(&self) -> Vec<ChapterModel> {
        self.shared.lock_state().chapters.clone()
    }

    /// Follow the projected chapter list.
    ///
    /// The last projected list, if any, arrives first; nothing is
    /// recomputed for a new subscriber.
    pub fn subscribe(&self) -> Subscription<Vec<ChapterModel>> {
        self.shared.view.subscribe()
    }

    /// The last projected list.
    pub fn current_view(&self) -> Option<Arc<Vec<ChapterModel>>> {
        self.shared.view.current()
    }

    /// Follow remote sync outcomes.
    ///
    /// An outcome that finished while nobody listened is handed to the next
    /// subscriber.
    pub fn sync_outcomes(&self) -> Subscription<SyncOutcome> {
        self.shared.sync.subscribe()
    }

    /// Follow download status changes of this manga's chapters.
    ///
    /// A new subscriber first receives the most recent event, if any, which
    /// may predate the subscription. Each event carries the live
    /// [`Download`], so read its status when handling it.
    pub fn status_changes(&self) -> Subscription<Download> {
        self.shared.status_changes.subscribe()
    }

    /// Whether a remote sync was ever requested in this session.
    pub fn has_requested(&self) -> bool {
        self.shared.sync.has_requested()
    }

    /// Fetch the chapter list from the source and merge it into storage.
    ///
    /// Supersedes any sync still in flight. Returns the sync generation.
    pub fn fetch_chapters_from_source(&self) -> u64 {
        self.shared.fetch_from_source()
    }

    /// Re-project the canonical list and publish it.
    pub fn refresh(&self) {
        self.shared.refresh();
    }

    /// First unread chapter walking from the oldest upload to the newest.
    pub fn next_unread_chapter(&self) -> Option<ChapterModel> {
        let state = self.shared.lock_state();
        // Reversed so the earliest of equally ordered chapters wins.
        state
            .chapters
            .iter()
            .rev()
            .filter(|model| !model.chapter().read)
            .max_by_key(|model| model.chapter().source_order)
            .cloned()
    }

    /// Mark chapters read or unread and persist them in one batch.
    pub fn mark_chapters_read(
        &self,
        chapters: &[ChapterId],
        read: bool,
    ) -> JoinHandle<Result<usize>> {
        mutations::mark_read(&self.shared, chapters, read)
    }

    /// Mark every chapter numbered below `reference` as read.
    pub fn mark_previous_chapters_read(&self, reference: ChapterId) -> JoinHandle<Result<usize>> {
        mutations::mark_previous_read(&self.shared, reference)
    }

    /// Queue chapters for download. Returns how many were queued.
    pub fn download_chapters(&self, chapters: &[ChapterId]) -> usize {
        mutations::download(&self.shared, chapters)
    }

    /// Delete downloaded chapters. Resolves to the number deleted.
    pub fn delete_chapters(&self, chapters: &[ChapterId]) -> JoinHandle<Result<usize>> {
        mutations::delete(&self.shared, chapters)
    }

    pub fn set_read_filter(&self, only_unread: bool) -> Result<()> {
        self.shared.update_display(true, |display| {
            display.read_filter = if only_unread {
                ReadFilter::UnreadOnly
            } else {
                ReadFilter::All
            };
        })
    }

    pub fn set_downloaded_filter(&self, only_downloaded: bool) -> Result<()> {
        self.shared.update_display(true, |display| {
            display.downloaded_filter = if only_downloaded {
                DownloadedFilter::DownloadedOnly
            } else {
                DownloadedFilter::All
            };
        })
    }

    /// Show every chapter again.
    pub fn remove_filters(&self) -> Result<()> {
        self.shared.update_display(true, |display| {
            display.read_filter = ReadFilter::All;
            display.downloaded_filter = DownloadedFilter::All;
        })
    }

    pub fn set_sorting(&self, field: SortField) -> Result<()> {
        self.shared
            .update_display(true, |display| display.sort_field = field)
    }

    /// Flip between ascending and descending.
    pub fn revert_sort_order(&self) -> Result<()> {
        self.shared
            .update_display(true, |display| display.direction = display.direction.reversed())
    }

    /// Persist the display mode. Rendering only; the view is not re-projected.
    pub fn set_display_mode(&self, mode: DisplayMode) -> Result<()> {
        self.shared
            .update_display(false, |display| display.display_mode = mode)
    }
}

impl Drop for ChapterSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!(manga_id = %self.shared.manga_id, "chapter session closed");
    }
}
