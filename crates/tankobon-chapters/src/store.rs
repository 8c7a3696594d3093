//! Canonical list store.
//!
//! Drains the storage live query for the active manga. Every emission is
//! paired with download state, swapped in as the new canonical list and
//! projected, all before the next emission is looked at.

use std::sync::Arc;

use futures_util::StreamExt;
use tankobon_model::Chapter;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chapter_model::ChapterModel;
use crate::merger;
use crate::session::Shared;

pub(crate) fn spawn(shared: Arc<Shared>) -> JoinHandle<()> {
    let manga = shared.manga();
    let mut emissions = shared.collaborators.store.live_chapters(&manga);
    let runtime = shared.runtime.clone();
    runtime.spawn(async move {
        while let Some(chapters) = emissions.next().await {
            shared.on_chapters(chapters);
        }
        debug!(manga_id = %shared.manga_id, "storage live query ended");
    })
}

impl Shared {
    /// Replace the canonical list with a fresh storage emission.
    pub(crate) fn on_chapters(&self, chapters: Vec<Chapter>) {
        let manga = self.manga();
        let downloads = self.collaborators.downloads.as_ref();
        let models: Vec<ChapterModel> = chapters
            .into_iter()
            .map(|chapter| merger::pair(chapter, &manga, downloads))
            .collect();
        let count = models.len();
        if let Some(counter) = &self.collaborators.counter {
            counter.report(self.manga_id, count);
        }

        {
            let mut state = self.lock_state();
            let first_load = !state.loaded;
            state.loaded = true;
            state.chapters = models;
            // Before publishing, so this view's observers see `has_requested`.
            if first_load
                && count == 0
                && self.config.auto_fetch_when_empty
                && !self.sync.has_requested()
            {
                info!(manga_id = %self.manga_id, "no stored chapters, fetching from source");
                self.start_sync(state.manga.clone());
            }
            self.refresh_locked(&state);
        }
        debug!(manga_id = %self.manga_id, count, "canonical chapter list replaced");
    }
}
