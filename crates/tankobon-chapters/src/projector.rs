//! Filter and sort projection of the canonical chapter list.
//!
//! Pure: the input is never touched and every call returns a fresh vector.
//!
//! Sources number their chapters from the newest upload (index 0) back to
//! the oldest, so a descending list in source order is an ascending walk of
//! the index.

use std::cmp::Ordering;

use tankobon_model::{Chapter, ChapterDisplay, SortDirection, SortField};

use crate::chapter_model::ChapterModel;

/// Whether a chapter passes the display filters.
pub fn matches(model: &ChapterModel, display: &ChapterDisplay) -> bool {
    if display.only_unread() && model.chapter().read {
        return false;
    }
    if display.only_downloaded() && !model.is_downloaded() {
        return false;
    }
    true
}

/// Comparator for a sort field and direction.
///
/// Descending flips the argument order of the ascending comparator. Both
/// are total, and with a stable sort equal keys keep their input order.
pub fn comparator(
    field: SortField,
    direction: SortDirection,
) -> impl Fn(&ChapterModel, &ChapterModel) -> Ordering {
    let ascending: fn(&Chapter, &Chapter) -> Ordering = match field {
        SortField::Source => oldest_upload_first,
        SortField::Number => lowest_number_first,
    };
    move |a, b| match direction {
        SortDirection::Ascending => ascending(a.chapter(), b.chapter()),
        SortDirection::Descending => ascending(b.chapter(), a.chapter()),
    }
}

fn oldest_upload_first(a: &Chapter, b: &Chapter) -> Ordering {
    b.source_order.cmp(&a.source_order)
}

fn lowest_number_first(a: &Chapter, b: &Chapter) -> Ordering {
    a.sort_number().total_cmp(&b.sort_number())
}

/// Filter then sort the canonical list for display.
pub fn project(chapters: &[ChapterModel], display: &ChapterDisplay) -> Vec<ChapterModel> {
    let mut projected: Vec<ChapterModel> = chapters
        .iter()
        .filter(|model| matches(model, display))
        .cloned()
        .collect();
    projected.sort_by(comparator(display.sort_field, display.direction));
    projected
}
