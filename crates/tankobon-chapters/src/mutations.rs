//! Bulk chapter commands.
//!
//! Chapters are selected by id from the canonical list; ids the list does
//! not hold are skipped. Work that suspends (storage writes, file deletion)
//! runs on a spawned task. Dropping the returned handle detaches from the
//! task without cancelling it.

use std::collections::HashSet;
use std::sync::Arc;

use tankobon_model::{Chapter, ChapterId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chapter_model::ChapterModel;
use crate::error::{ChaptersError, DeleteFailure, Result};
use crate::session::{SessionState, Shared};

pub(crate) fn mark_read(
    shared: &Arc<Shared>,
    chapters: &[ChapterId],
    read: bool,
) -> JoinHandle<Result<usize>> {
    let wanted: HashSet<ChapterId> = chapters.iter().copied().collect();
    let updated = {
        let mut state = shared.lock_state();
        update_chapters(
            shared,
            &mut state,
            |model| wanted.contains(&model.id()),
            |chapter| chapter.set_read(read),
        )
    };
    if updated.len() < wanted.len() {
        debug!(
            requested = wanted.len(),
            found = updated.len(),
            "some selected chapters are not in the list"
        );
    }
    persist_progress(shared, updated)
}

pub(crate) fn mark_previous_read(
    shared: &Arc<Shared>,
    reference: ChapterId,
) -> JoinHandle<Result<usize>> {
    let updated = {
        let mut state = shared.lock_state();
        let threshold = state
            .chapters
            .iter()
            .find(|model| model.id() == reference)
            .map(ChapterModel::chapter)
            .filter(|chapter| chapter.is_recognized_number())
            .map(Chapter::sort_number);
        match threshold {
            Some(number) => update_chapters(
                shared,
                &mut state,
                |model| {
                    model.chapter().is_recognized_number() && model.chapter().sort_number() < number
                },
                |chapter| chapter.read = true,
            ),
            None => {
                debug!(%reference, "reference chapter missing or unnumbered");
                Vec::new()
            }
        }
    };
    persist_progress(shared, updated)
}

/// Apply `change` to the selected chapters in memory and return copies
/// of the changed chapters.
fn update_chapters(
    shared: &Shared,
    state: &mut SessionState,
    mut select: impl FnMut(&ChapterModel) -> bool,
    mut change: impl FnMut(&mut Chapter),
) -> Vec<Chapter> {
    let mut updated = Vec::new();
    for model in state.chapters.iter_mut().filter(|model| select(model)) {
        change(model.chapter_mut());
        updated.push(model.chapter().clone());
    }
    if !updated.is_empty() && shared.config.reproject_after_mark_read {
        shared.refresh_locked(state);
    }
    updated
}

fn persist_progress(shared: &Arc<Shared>, chapters: Vec<Chapter>) -> JoinHandle<Result<usize>> {
    let store = Arc::clone(&shared.collaborators.store);
    let manga_id = shared.manga_id;
    shared.runtime.spawn(async move {
        if chapters.is_empty() {
            return Ok(0);
        }
        store.update_progress(&chapters).await.map_err(|source| {
            let error = ChaptersError::Persist {
                operation: "save reading progress",
                source,
            };
            warn!(%manga_id, error = ?error, "progress write failed");
            error
        })?;
        debug!(%manga_id, count = chapters.len(), "saved reading progress");
        Ok(chapters.len())
    })
}

pub(crate) fn download(shared: &Shared, chapters: &[ChapterId]) -> usize {
    let wanted: HashSet<ChapterId> = chapters.iter().copied().collect();
    let (manga, selected) = {
        let state = shared.lock_state();
        let selected: Vec<Chapter> = state
            .chapters
            .iter()
            .filter(|model| wanted.contains(&model.id()))
            .map(|model| model.chapter().clone())
            .collect();
        (state.manga.clone(), selected)
    };
    if selected.is_empty() {
        return 0;
    }

    let downloads = &shared.collaborators.downloads;
    if !downloads.is_running() {
        downloads.start();
    }
    let count = selected.len();
    downloads.download_chapters(&manga, selected);
    info!(manga_id = %manga.id, count, "queued chapters for download");
    count
}

pub(crate) fn delete(shared: &Arc<Shared>, chapters: &[ChapterId]) -> JoinHandle<Result<usize>> {
    let wanted: HashSet<ChapterId> = chapters.iter().copied().collect();
    let (manga, targets) = {
        let state = shared.lock_state();
        let targets: Vec<Chapter> = state
            .chapters
            .iter()
            .filter(|model| wanted.contains(&model.id()))
            .map(|model| model.chapter().clone())
            .collect();
        (state.manga.clone(), targets)
    };
    let shared = Arc::clone(shared);
    let runtime = shared.runtime.clone();

    runtime.spawn(async move {
        let downloads = Arc::clone(&shared.collaborators.downloads);
        // Stop the queue so no worker writes into a chapter being deleted.
        let was_running = downloads.is_running();
        if was_running {
            downloads.stop();
        }

        let mut deleted = 0;
        let mut failures = Vec::new();
        for chapter in &targets {
            downloads.remove(chapter.id);
            match downloads.delete_chapter(manga.source, &manga, chapter).await {
                Ok(()) => {
                    deleted += 1;
                    clear_download_state(&shared, chapter.id);
                }
                Err(error) => {
                    warn!(chapter_id = %chapter.id, error = %error, "failed to delete chapter");
                    failures.push(DeleteFailure {
                        chapter: chapter.id,
                        error,
                    });
                }
            }
        }

        {
            let state = shared.lock_state();
            if state.display.only_downloaded() {
                shared.refresh_locked(&state);
            }
        }

        if was_running && shared.config.restart_queue_after_delete {
            downloads.start();
        }
        info!(manga_id = %manga.id, deleted, failed = failures.len(), "deleted chapters");

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(ChaptersError::Delete {
                total: targets.len(),
                failures,
            })
        }
    })
}

fn clear_download_state(shared: &Shared, chapter: ChapterId) {
    let mut state = shared.lock_state();
    if let Some(model) = state.chapters.iter_mut().find(|model| model.id() == chapter) {
        model.clear_download();
    }
}
