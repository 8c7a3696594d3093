//! Chapter plus transient download state.

use std::sync::Arc;

use tankobon_model::{Chapter, ChapterId, Download, DownloadStatus};

/// A stored chapter paired with its download state.
///
/// Rebuilt from scratch on every storage emission. The status is derived on
/// read: an attached [`Download`] always wins over the stored value, so the
/// two can never disagree.
#[derive(Debug, Clone)]
pub struct ChapterModel {
    chapter: Chapter,
    stored_status: DownloadStatus,
    download: Option<Arc<Download>>,
}

impl ChapterModel {
    pub fn new(chapter: Chapter, status: DownloadStatus) -> Self {
        Self {
            chapter,
            stored_status: status,
            download: None,
        }
    }

    pub fn with_download(chapter: Chapter, download: Arc<Download>) -> Self {
        Self {
            chapter,
            stored_status: DownloadStatus::NotDownloaded,
            download: Some(download),
        }
    }

    #[inline]
    pub fn id(&self) -> ChapterId {
        self.chapter.id
    }

    #[inline]
    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub(crate) fn chapter_mut(&mut self) -> &mut Chapter {
        &mut self.chapter
    }

    pub fn download(&self) -> Option<&Arc<Download>> {
        self.download.as_ref()
    }

    /// Current download status.
    pub fn status(&self) -> DownloadStatus {
        match &self.download {
            Some(download) => download.status(),
            None => self.stored_status,
        }
    }

    #[inline]
    pub fn is_downloaded(&self) -> bool {
        self.status() == DownloadStatus::Downloaded
    }

    /// Attach a download unless one is already attached.
    ///
    /// Returns whether the download was attached.
    pub(crate) fn attach_download(&mut self, download: Arc<Download>) -> bool {
        if self.download.is_some() {
            return false;
        }
        self.download = Some(download);
        true
    }

    /// Record the chapter as on disk without an active download.
    pub(crate) fn mark_downloaded(&mut self) {
        self.stored_status = DownloadStatus::Downloaded;
        self.download = None;
    }

    /// Forget any download and mark the chapter as not on disk.
    pub(crate) fn clear_download(&mut self) {
        self.stored_status = DownloadStatus::NotDownloaded;
        self.download = None;
    }

    pub fn into_chapter(self) -> Chapter {
        self.chapter
    }
}
