//! Download queue entries.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::chapter::Chapter;
use crate::ids::{ChapterId, MangaId, SourceId};
use crate::manga::Manga;

/// Download state of a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DownloadStatus {
    #[default]
    NotDownloaded = 0,
    Queued = 1,
    Downloading = 2,
    Downloaded = 3,
    Error = 4,
}

impl DownloadStatus {
    pub const ALL: [Self; 5] = [
        Self::NotDownloaded,
        Self::Queued,
        Self::Downloading,
        Self::Downloaded,
        Self::Error,
    ];

    const fn from_repr(value: u8) -> Self {
        match value {
            1 => Self::Queued,
            2 => Self::Downloading,
            3 => Self::Downloaded,
            4 => Self::Error,
            _ => Self::NotDownloaded,
        }
    }

    /// Short label for listings.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotDownloaded => "-",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A chapter in the download queue.
///
/// The queue owns every `Download` and updates its status from worker
/// threads; everyone else holds it behind an `Arc` and reads the status live.
#[derive(Debug)]
pub struct Download {
    chapter: Chapter,
    manga_id: MangaId,
    source: SourceId,
    status: AtomicU8,
}

impl Download {
    pub fn new(manga: &Manga, chapter: Chapter) -> Self {
        Self {
            chapter,
            manga_id: manga.id,
            source: manga.source,
            status: AtomicU8::new(DownloadStatus::NotDownloaded as u8),
        }
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter.id
    }

    pub fn manga_id(&self) -> MangaId {
        self.manga_id
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Current status, read at call time.
    pub fn status(&self) -> DownloadStatus {
        DownloadStatus::from_repr(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: DownloadStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}
