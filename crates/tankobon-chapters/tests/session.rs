//! End-to-end session tests against the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use tankobon_chapters::memory::MemoryBackend;
use tankobon_chapters::{
    ChapterModel, ChapterSession, ChaptersError, DownloadManager, SessionConfig, Subscription,
};
use tankobon_model::{
    Chapter, ChapterDisplay, ChapterId, Download, DownloadStatus, Manga, MangaId, SortDirection,
    SortField, SourceId,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn manga(display: ChapterDisplay) -> Manga {
    let mut manga = Manga::new(MangaId::new(1), SourceId::new(7), "Knights of Sidonia");
    manga.set_display(&display);
    manga
}

fn by_number_ascending() -> ChapterDisplay {
    ChapterDisplay {
        sort_field: SortField::Number,
        direction: SortDirection::Ascending,
        ..ChapterDisplay::default()
    }
}

/// Chapters numbered `1..=count`, the highest number being the newest upload.
fn numbered(count: u64) -> Vec<Chapter> {
    (1..=count)
        .map(|n| {
            let mut chapter = Chapter::new(
                ChapterId::new(n),
                MangaId::new(1),
                format!("Chapter {n}"),
                (count - n) as i32,
                Some(n as f32),
            );
            chapter.url = format!("/chapter/{n}");
            chapter
        })
        .collect()
}

fn ids(view: &[ChapterModel]) -> Vec<u64> {
    view.iter().map(|model| model.id().get()).collect()
}

/// Wait for a published view matching `accept`.
async fn view_where(
    view: &mut Subscription<Vec<ChapterModel>>,
    accept: impl Fn(&[ChapterModel]) -> bool,
) -> Arc<Vec<ChapterModel>> {
    timeout(WAIT, async {
        loop {
            let next = view.recv().await.expect("session still open");
            if accept(next.as_slice()) {
                return next;
            }
        }
    })
    .await
    .expect("expected view was published")
}

/// Wait for a status event of `chapter` that has reached `status`.
///
/// Skips the replayed event a new subscriber gets first.
async fn status_where(
    statuses: &mut Subscription<Download>,
    chapter: u64,
    status: DownloadStatus,
) -> Arc<Download> {
    timeout(WAIT, async {
        loop {
            let next = statuses.recv().await.expect("session still open");
            if next.chapter_id() == ChapterId::new(chapter) && next.status() == status {
                return next;
            }
        }
    })
    .await
    .expect("expected status event was published")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn view_is_replayed_on_reattach_without_recompute() {
    let backend = MemoryBackend::new(numbered(3), Vec::new());
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();

    let mut first = session.subscribe();
    let shown = view_where(&mut first, |view| view.len() == 3).await;
    assert_eq!(ids(&shown), vec![1, 2, 3]);
    drop(first);

    let mut again = session.subscribe();
    let replayed = again.try_recv().expect("cached view is replayed");
    assert!(Arc::ptr_eq(&replayed, &session.current_view().unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unread_filter_by_number_ascending() {
    let mut chapters = numbered(3);
    chapters[1].read = true;
    let backend = MemoryBackend::new(chapters, Vec::new());
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.len() == 3).await;

    session.set_read_filter(true).unwrap();
    let shown = view_where(&mut view, |view| view.len() == 2).await;
    assert_eq!(ids(&shown), vec![1, 3]);
    assert!(session.display().only_unread());
    assert_eq!(
        backend.store.flags(MangaId::new(1)),
        Some(session.manga().chapter_flags)
    );

    session.revert_sort_order().unwrap();
    let shown = view_where(&mut view, |view| ids(view) == [3, 1]).await;
    assert_eq!(shown.len(), 2);

    session.remove_filters().unwrap();
    view_where(&mut view, |view| ids(view) == [3, 2, 1]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_flag_write_leaves_display_unchanged() {
    let backend = MemoryBackend::new(numbered(2), Vec::new());
    let session = ChapterSession::open(
        manga(ChapterDisplay::default()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    backend.store.fail_writes(true);

    let error = session.set_sorting(SortField::Number).unwrap_err();
    assert!(matches!(error, ChaptersError::Persist { .. }));
    assert_eq!(session.display().sort_field, SortField::Source);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mark_previous_read_marks_lower_numbers_only() {
    let backend = MemoryBackend::new(numbered(4), Vec::new());
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.len() == 4).await;

    let marked = session
        .mark_previous_chapters_read(ChapterId::new(3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(marked, 2);

    let read: Vec<bool> = backend
        .store
        .chapters(MangaId::new(1))
        .iter()
        .map(|chapter| chapter.read)
        .collect();
    assert_eq!(read, vec![true, true, false, false]);
    assert_eq!(backend.store.progress_writes(), 1);

    let shown = view_where(&mut view, |view| view[1].chapter().read).await;
    assert!(shown[0].chapter().read);
    assert!(!shown[3].chapter().read);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mark_unread_rewinds_progress() {
    let mut chapters = numbered(2);
    chapters[0].read = true;
    chapters[0].last_page_read = 12;
    let backend = MemoryBackend::new(chapters, Vec::new());
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.len() == 2).await;

    let changed = session
        .mark_chapters_read(&[ChapterId::new(1), ChapterId::new(99)], false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(changed, 1);
    let stored = &backend.store.chapters(MangaId::new(1))[0];
    assert!(!stored.read);
    assert_eq!(stored.last_page_read, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn next_unread_walks_from_oldest_upload() {
    let mut chapters = numbered(4);
    chapters[0].read = true;
    let backend = MemoryBackend::new(chapters, Vec::new());
    let session = ChapterSession::open(
        manga(ChapterDisplay::default()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.len() == 4).await;

    let next = session.next_unread_chapter().unwrap();
    assert_eq!(next.id(), ChapterId::new(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn newer_sync_supersedes_older_one() {
    let backend = MemoryBackend::new(numbered(1), numbered(3));
    backend
        .source
        .respond_with(Duration::from_millis(300), Ok(numbered(2)));
    backend
        .source
        .respond_with(Duration::from_millis(10), Ok(numbered(3)));
    let session = ChapterSession::open(
        manga(ChapterDisplay::default()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    assert!(!session.has_requested());

    let first = session.fetch_chapters_from_source();
    // Let the slow fetch get under way before superseding it.
    timeout(WAIT, async {
        while backend.source.calls() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    let second = session.fetch_chapters_from_source();
    assert!(second > first);
    assert!(session.has_requested());

    let mut outcomes = session.sync_outcomes();
    let outcome = timeout(WAIT, outcomes.recv()).await.unwrap().unwrap();
    match &*outcome {
        Ok(report) => assert_eq!(report.generation, second),
        Err(error) => panic!("sync failed: {error}"),
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(outcomes.try_recv().is_none(), "superseded sync was delivered");
    assert_eq!(backend.source.calls(), 2);
    assert_eq!(
        backend.store.chapters(MangaId::new(1)).len(),
        3,
        "superseded sync overwrote storage"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_failure_is_delivered_once_to_late_observer() {
    let backend = MemoryBackend::new(numbered(1), Vec::new());
    backend
        .source
        .respond_with(Duration::ZERO, Err("HTTP 503".to_string()));
    let session = ChapterSession::open(
        manga(ChapterDisplay::default()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();

    session.fetch_chapters_from_source();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut outcomes = session.sync_outcomes();
    let outcome = timeout(WAIT, outcomes.recv()).await.unwrap().unwrap();
    assert!(matches!(&*outcome, Err(ChaptersError::Fetch { .. })));

    let mut later = session.sync_outcomes();
    assert!(later.try_recv().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_storage_triggers_one_fetch() {
    let backend = MemoryBackend::new(Vec::new(), numbered(3));
    let session = ChapterSession::open(
        manga(ChapterDisplay::default()),
        backend.collaborators(),
        SessionConfig::default(),
    )
    .unwrap();
    let mut view = session.subscribe();

    let shown = view_where(&mut view, |view| view.len() == 3).await;
    assert_eq!(ids(&shown), vec![3, 2, 1]);
    assert!(session.has_requested());
    assert_eq!(backend.source.calls(), 1);
    assert_eq!(backend.counter.count(MangaId::new(1)), Some(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_downloading_chapter_under_downloaded_filter() {
    let backend = MemoryBackend::new(numbered(3), Vec::new());
    backend.downloads.mark_downloaded(ChapterId::new(1));
    let display = ChapterDisplay {
        downloaded_filter: tankobon_model::DownloadedFilter::DownloadedOnly,
        ..by_number_ascending()
    };
    let session = ChapterSession::open(
        manga(display),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    let mut statuses = session.status_changes();
    view_where(&mut view, |view| ids(view) == [1]).await;

    assert_eq!(session.download_chapters(&[ChapterId::new(2)]), 1);
    status_where(&mut statuses, 2, DownloadStatus::Queued).await;
    backend
        .downloads
        .set_status(ChapterId::new(2), DownloadStatus::Downloading);
    assert!(backend.downloads.is_running());

    let deleted = session
        .delete_chapters(&[ChapterId::new(1), ChapterId::new(2)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deleted, 2);

    assert!(session.current_view().unwrap().is_empty());
    assert!(
        session
            .chapters()
            .iter()
            .all(|model| model.status() == DownloadStatus::NotDownloaded)
    );
    assert!(backend.downloads.queued().is_empty());
    assert_eq!(backend.downloads.stops(), 1);
    assert_eq!(backend.downloads.starts(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_reports_failures_and_keeps_going() {
    let backend = MemoryBackend::new(numbered(3), Vec::new());
    for id in 1..=3 {
        backend.downloads.mark_downloaded(ChapterId::new(id));
    }
    backend.downloads.fail_delete_of(ChapterId::new(2));
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.len() == 3).await;

    let error = session
        .delete_chapters(&[ChapterId::new(1), ChapterId::new(2), ChapterId::new(3)])
        .await
        .unwrap()
        .unwrap_err();
    match error {
        ChaptersError::Delete { total, failures } => {
            assert_eq!(total, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].chapter, ChapterId::new(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        backend.downloads.deleted(),
        vec![ChapterId::new(1), ChapterId::new(3)]
    );
    let statuses: Vec<DownloadStatus> = session.chapters().iter().map(ChapterModel::status).collect();
    assert_eq!(
        statuses,
        vec![
            DownloadStatus::NotDownloaded,
            DownloadStatus::Downloaded,
            DownloadStatus::NotDownloaded
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_stream_errors_are_not_surfaced() {
    let backend = MemoryBackend::new(numbered(2), Vec::new());
    let session = ChapterSession::open(
        manga(by_number_ascending()),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    let mut statuses = session.status_changes();
    view_where(&mut view, |view| view.len() == 2).await;

    backend.downloads.emit_error("worker crashed");
    session.download_chapters(&[ChapterId::new(1)]);

    // The stream keeps going after the error.
    let queued = status_where(&mut statuses, 1, DownloadStatus::Queued).await;
    assert_eq!(queued.manga_id(), MangaId::new(1));

    let mut outcomes = session.sync_outcomes();
    assert!(outcomes.try_recv().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn finished_download_enters_downloaded_view() {
    let backend = MemoryBackend::new(numbered(2), Vec::new());
    let display = ChapterDisplay {
        downloaded_filter: tankobon_model::DownloadedFilter::DownloadedOnly,
        ..by_number_ascending()
    };
    let session = ChapterSession::open(
        manga(display),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    let mut statuses = session.status_changes();
    view_where(&mut view, |view| view.is_empty()).await;

    session.download_chapters(&[ChapterId::new(2)]);
    status_where(&mut statuses, 2, DownloadStatus::Queued).await;
    backend
        .downloads
        .set_status(ChapterId::new(2), DownloadStatus::Downloaded);

    let shown = view_where(&mut view, |view| view.len() == 1).await;
    assert_eq!(ids(&shown), vec![2]);
    assert_eq!(shown[0].status(), DownloadStatus::Downloaded);
}

#[tokio::test]
async fn download_finished_before_first_event_enters_downloaded_view() {
    let backend = MemoryBackend::new(numbered(2), Vec::new());
    let display = ChapterDisplay {
        downloaded_filter: tankobon_model::DownloadedFilter::DownloadedOnly,
        ..by_number_ascending()
    };
    let session = ChapterSession::open(
        manga(display),
        backend.collaborators(),
        SessionConfig::manual(),
    )
    .unwrap();
    let mut view = session.subscribe();
    view_where(&mut view, |view| view.is_empty()).await;

    // No yield in between: the merger sees every event with the final status.
    assert_eq!(session.download_chapters(&[ChapterId::new(2)]), 1);
    backend
        .downloads
        .set_status(ChapterId::new(2), DownloadStatus::Downloading);
    backend
        .downloads
        .set_status(ChapterId::new(2), DownloadStatus::Downloaded);

    let shown = view_where(&mut view, |view| view.len() == 1).await;
    assert_eq!(ids(&shown), vec![2]);
    assert_eq!(shown[0].status(), DownloadStatus::Downloaded);
    assert!(shown[0].download().is_none());
}

#[tokio::test]
async fn open_rejects_corrupt_flags() {
    let backend = MemoryBackend::new(numbered(1), Vec::new());
    let mut manga = manga(ChapterDisplay::default());
    manga.chapter_flags = 0x200;

    let error = ChapterSession::open(manga, backend.collaborators(), SessionConfig::default())
        .unwrap_err();
    assert!(matches!(error, ChaptersError::Configuration(_)));
    assert!(!error.is_recoverable());
}
