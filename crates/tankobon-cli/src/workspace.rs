//! An open library: the file, its in-memory collaborators and a live session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tankobon_chapters::memory::MemoryBackend;
use tankobon_chapters::{ChapterSession, SessionConfig, SyncOutcome};
use tankobon_model::DownloadStatus;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::library::Library;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    library: Library,
    backend: MemoryBackend,
    session: ChapterSession,
}

impl Workspace {
    /// Load a library and open a session on it.
    ///
    /// Returns once the first view is published and, when storage was
    /// empty, the automatic sync has landed.
    ///
    /// # Errors
    ///
    /// Fails if the library cannot be loaded, its display flags are corrupt,
    /// or the session does not settle in time.
    pub async fn open(path: &Path, config: SessionConfig) -> Result<Self> {
        let library = Library::load(path)?;
        let backend = library.backend();
        let session = ChapterSession::open(library.manga.clone(), backend.collaborators(), config)
            .context("open chapter session")?;

        let mut view = session.subscribe();
        timeout(SETTLE_TIMEOUT, view.recv())
            .await
            .context("waiting for the chapter list")?
            .context("chapter session closed")?;

        let workspace = Self {
            path: path.to_path_buf(),
            library,
            backend,
            session,
        };
        if workspace.session.has_requested() {
            let outcome = workspace.next_sync_outcome().await?;
            if let Err(error) = &*outcome {
                warn!(error = %error, "automatic chapter sync failed");
            }
        }
        workspace.settle().await?;
        Ok(workspace)
    }

    pub fn session(&self) -> &ChapterSession {
        &self.session
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Wait for the outcome of the current sync.
    ///
    /// # Errors
    ///
    /// Fails if no outcome arrives in time.
    pub async fn next_sync_outcome(&self) -> Result<Arc<SyncOutcome>> {
        let mut outcomes = self.session.sync_outcomes();
        timeout(SETTLE_TIMEOUT, outcomes.recv())
            .await
            .context("waiting for the chapter sync")?
            .context("chapter session closed")
    }

    /// Wait until the session's list matches what storage holds.
    ///
    /// # Errors
    ///
    /// Fails if storage writes are not echoed back in time.
    pub async fn settle(&self) -> Result<()> {
        timeout(SETTLE_TIMEOUT, async {
            while !self.caught_up() {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .context("chapter list did not catch up with storage")
    }

    fn caught_up(&self) -> bool {
        let stored = self.backend.store.chapters(self.library.manga.id);
        let live = self.session.chapters();
        stored.len() == live.len()
            && stored
                .iter()
                .zip(&live)
                .all(|(stored, model)| stored == model.chapter())
    }

    /// Run every queued download to completion. Returns how many finished.
    pub fn run_downloads(&self) -> usize {
        let queued = self.backend.downloads.queued();
        for &chapter in &queued {
            self.backend
                .downloads
                .set_status(chapter, DownloadStatus::Downloading);
            self.backend
                .downloads
                .set_status(chapter, DownloadStatus::Downloaded);
            debug!(%chapter, "download finished");
        }
        queued.len()
    }

    /// Write the library back with the session's flags and storage state.
    ///
    /// # Errors
    ///
    /// See [`Library::save`].
    pub fn save(mut self) -> Result<()> {
        let manga = self.session.manga();
        self.library.absorb(manga, &self.backend);
        self.library.save(&self.path)
    }
}
