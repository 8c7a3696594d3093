//! Download status merger.
//!
//! Pairs chapters with download state when the canonical list is rebuilt,
//! then follows the queue's status stream for the active manga.

use std::sync::Arc;

use futures_util::StreamExt;
use tankobon_model::{Chapter, Download, DownloadStatus, Manga};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chapter_model::ChapterModel;
use crate::error::ChaptersError;
use crate::ports::DownloadManager;
use crate::session::Shared;

/// Build the model of a stored chapter.
///
/// An active download is attached as is; otherwise the status comes from
/// whether the chapter is already on disk.
pub fn pair(chapter: Chapter, manga: &Manga, downloads: &dyn DownloadManager) -> ChapterModel {
    if let Some(download) = downloads.find(chapter.id) {
        return ChapterModel::with_download(chapter, download);
    }
    let status = if downloads.is_chapter_downloaded(manga.source, manga, &chapter) {
        DownloadStatus::Downloaded
    } else {
        DownloadStatus::NotDownloaded
    };
    ChapterModel::new(chapter, status)
}

pub(crate) fn spawn(shared: Arc<Shared>) -> JoinHandle<()> {
    let mut events = shared.collaborators.downloads.status_events();
    let runtime = shared.runtime.clone();
    runtime.spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(download) if download.manga_id() == shared.manga_id => {
                    shared.on_status_change(download);
                }
                Ok(_) => {}
                Err(source) => {
                    let error = ChaptersError::StatusStream(source);
                    warn!(manga_id = %shared.manga_id, error = ?error, "ignoring download queue error");
                }
            }
        }
        debug!(manga_id = %shared.manga_id, "download status stream ended");
    })
}

impl Shared {
    /// Apply one status event of this manga.
    ///
    /// Events carry the live `Download`, so the status read here may already
    /// be past the one that triggered the event. A download that finished
    /// before any of its events was handled is recorded as on disk.
    pub(crate) fn on_status_change(&self, download: Arc<Download>) {
        let status = download.status();
        let chapter_id = download.chapter_id();
        {
            let mut state = self.lock_state();
            if let Some(model) = state.chapters.iter_mut().find(|m| m.id() == chapter_id)
                && model.download().is_none()
            {
                match status {
                    DownloadStatus::Queued | DownloadStatus::Downloading => {
                        model.attach_download(Arc::clone(&download));
                        debug!(%chapter_id, %status, "attached active download");
                    }
                    DownloadStatus::Downloaded => {
                        model.mark_downloaded();
                        debug!(%chapter_id, "download finished before it was attached");
                    }
                    DownloadStatus::NotDownloaded | DownloadStatus::Error => {}
                }
            }
            // A finished download may now pass the downloaded-only filter.
            if status == DownloadStatus::Downloaded && state.display.only_downloaded() {
                self.refresh_locked(&state);
            }
        }
        self.status_changes.publish_shared(download);
    }
}
