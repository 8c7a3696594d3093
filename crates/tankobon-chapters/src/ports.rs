//! Collaborator ports.
//!
//! The engine owns none of storage, the remote source or the download
//! queue. It talks to them through these traits, which front ends implement
//! and hand to [`ChapterSession::open`](crate::ChapterSession::open) as a
//! [`Collaborators`] bundle.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tankobon_model::{Chapter, ChapterId, Download, Manga, MangaId, SourceId};

use crate::error::BoxError;

/// Persistent chapter storage.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Live query of a manga's chapters.
    ///
    /// Emits the current list on subscription and again after every write
    /// that touches it.
    fn live_chapters(&self, manga: &Manga) -> BoxStream<'static, Vec<Chapter>>;

    /// Write read flags and reading positions in one batch.
    async fn update_progress(&self, chapters: &[Chapter]) -> Result<(), BoxError>;

    /// Write the manga's chapter flags. Blocking; these writes are small.
    fn update_flags(&self, manga: &Manga) -> Result<(), BoxError>;
}

/// The remote source a manga was added from.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    async fn fetch_chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>, BoxError>;
}

/// Merges a remote chapter list into storage.
///
/// Adds new chapters, drops removed ones and keeps read state and progress
/// of chapters present on both sides. Returns the stored result.
#[async_trait]
pub trait ChapterReconciler: Send + Sync {
    async fn sync_chapters_with_source(
        &self,
        chapters: Vec<Chapter>,
        manga: &Manga,
        source: SourceId,
    ) -> Result<Vec<Chapter>, BoxError>;
}

/// Download queue and downloaded-content manager.
#[async_trait]
pub trait DownloadManager: Send + Sync {
    /// Active download of a chapter, if queued.
    fn find(&self, chapter: ChapterId) -> Option<Arc<Download>>;

    /// Every status change of every queued download, all manga included.
    fn status_events(&self) -> BoxStream<'static, Result<Arc<Download>, BoxError>>;

    /// Drop a chapter from the queue. No-op if it is not queued.
    fn remove(&self, chapter: ChapterId);

    /// Whether the chapter's pages are already on disk.
    fn is_chapter_downloaded(&self, source: SourceId, manga: &Manga, chapter: &Chapter) -> bool;

    /// Queue chapters for download.
    fn download_chapters(&self, manga: &Manga, chapters: Vec<Chapter>);

    /// Remove a chapter's downloaded content from disk.
    async fn delete_chapter(
        &self,
        source: SourceId,
        manga: &Manga,
        chapter: &Chapter,
    ) -> Result<(), BoxError>;

    fn is_running(&self) -> bool;

    fn start(&self);

    fn stop(&self);
}

/// Receives the chapter count of the active manga after each storage emission.
pub trait ChapterCounter: Send + Sync {
    fn report(&self, manga: MangaId, count: usize);
}

/// Everything a session needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ChapterStore>,
    pub source: Arc<dyn ChapterSource>,
    pub reconciler: Arc<dyn ChapterReconciler>,
    pub downloads: Arc<dyn DownloadManager>,
    pub counter: Option<Arc<dyn ChapterCounter>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("has_counter", &self.counter.is_some())
            .finish_non_exhaustive()
    }
}
