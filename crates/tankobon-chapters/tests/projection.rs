//! Property tests for the filter and sort projection.

use std::cmp::Ordering;

use proptest::prelude::*;
use tankobon_chapters::{ChapterModel, comparator, matches, project};
use tankobon_model::{
    Chapter, ChapterDisplay, ChapterId, DownloadStatus, DownloadedFilter, MangaId, ReadFilter,
    SortDirection, SortField,
};

fn number_strategy() -> impl Strategy<Value = Option<f32>> {
    prop_oneof![
        Just(None),
        Just(Some(-1.0_f32)),
        (0u16..40).prop_map(|n| Some(f32::from(n) / 2.0)),
    ]
}

fn chapters_strategy() -> impl Strategy<Value = Vec<ChapterModel>> {
    prop::collection::vec(
        (0i32..30, number_strategy(), any::<bool>(), any::<bool>()),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (source_order, number, read, downloaded))| {
                let mut chapter = Chapter::new(
                    ChapterId::new(index as u64 + 1),
                    MangaId::new(1),
                    format!("Chapter {index}"),
                    source_order,
                    number,
                );
                chapter.read = read;
                let status = if downloaded {
                    DownloadStatus::Downloaded
                } else {
                    DownloadStatus::NotDownloaded
                };
                ChapterModel::new(chapter, status)
            })
            .collect()
    })
}

fn display_strategy() -> impl Strategy<Value = ChapterDisplay> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(by_number, ascending, only_unread, only_downloaded)| ChapterDisplay {
            sort_field: if by_number {
                SortField::Number
            } else {
                SortField::Source
            },
            direction: if ascending {
                SortDirection::Ascending
            } else {
                SortDirection::Descending
            },
            read_filter: if only_unread {
                ReadFilter::UnreadOnly
            } else {
                ReadFilter::All
            },
            downloaded_filter: if only_downloaded {
                DownloadedFilter::DownloadedOnly
            } else {
                DownloadedFilter::All
            },
            ..ChapterDisplay::default()
        },
    )
}

fn ids(models: &[ChapterModel]) -> Vec<ChapterId> {
    models.iter().map(ChapterModel::id).collect()
}

proptest! {
    /// Everything shown passes the filters and nothing that passes is hidden.
    #[test]
    fn prop_filters_are_sound_and_complete(
        chapters in chapters_strategy(),
        display in display_strategy(),
    ) {
        let projected = project(&chapters, &display);

        for model in &projected {
            prop_assert!(!(display.only_unread() && model.chapter().read));
            prop_assert!(!(display.only_downloaded() && !model.is_downloaded()));
        }
        let expected = chapters.iter().filter(|m| matches(m, &display)).count();
        prop_assert_eq!(projected.len(), expected);
    }

    /// The output is ordered by the comparator and equal keys keep input order.
    #[test]
    fn prop_output_is_sorted_and_stable(
        chapters in chapters_strategy(),
        display in display_strategy(),
    ) {
        let projected = project(&chapters, &display);
        let compare = comparator(display.sort_field, display.direction);

        for pair in projected.windows(2) {
            match compare(&pair[0], &pair[1]) {
                Ordering::Greater => prop_assert!(false, "out of order: {:?}", ids(pair)),
                // Ids were assigned in input order.
                Ordering::Equal => prop_assert!(pair[0].id() < pair[1].id()),
                Ordering::Less => {}
            }
        }
    }

    /// The comparator is antisymmetric and flipping the direction twice is
    /// a no-op.
    #[test]
    fn prop_direction_flip_inverts_order(
        chapters in chapters_strategy(),
        by_number in any::<bool>(),
    ) {
        let field = if by_number { SortField::Number } else { SortField::Source };
        let ascending = comparator(field, SortDirection::Ascending);
        let descending = comparator(field, SortDirection::Descending.reversed().reversed());

        for a in &chapters {
            for b in &chapters {
                prop_assert_eq!(ascending(a, b), descending(b, a));
                prop_assert_eq!(ascending(a, b), ascending(b, a).reverse());
            }
        }
    }

    /// Projection never touches its input.
    #[test]
    fn prop_input_is_untouched(
        chapters in chapters_strategy(),
        display in display_strategy(),
    ) {
        let before = ids(&chapters);
        let _ = project(&chapters, &display);
        prop_assert_eq!(ids(&chapters), before);
    }
}

#[test]
fn unread_by_number_ascending() {
    let chapters: Vec<ChapterModel> = [(1.0, false), (2.0, true), (3.0, false)]
        .into_iter()
        .enumerate()
        .map(|(index, (number, read))| {
            let mut chapter = Chapter::new(
                ChapterId::new(index as u64 + 1),
                MangaId::new(1),
                format!("Chapter {number}"),
                2 - index as i32,
                Some(number),
            );
            chapter.read = read;
            ChapterModel::new(chapter, DownloadStatus::NotDownloaded)
        })
        .collect();
    let display = ChapterDisplay {
        sort_field: SortField::Number,
        direction: SortDirection::Ascending,
        read_filter: ReadFilter::UnreadOnly,
        ..ChapterDisplay::default()
    };

    let numbers: Vec<Option<f32>> = project(&chapters, &display)
        .iter()
        .map(|model| model.chapter().number)
        .collect();
    assert_eq!(numbers, vec![Some(1.0), Some(3.0)]);
}
