//! Tests for tankobon-model types.

use tankobon_model::{
    Chapter, ChapterDisplay, ChapterId, ConfigurationError, DisplayMode, Manga, MangaId,
    ReadFilter, SortField, SourceId,
};

#[test]
fn manga_display_roundtrip_through_flags() {
    let mut manga = Manga::new(MangaId::new(1), SourceId::new(2), "Blame!");
    let mut display = manga.display().expect("default flags decode");
    display.sort_field = SortField::Number;
    display.read_filter = ReadFilter::UnreadOnly;
    display.display_mode = DisplayMode::Number;
    manga.set_display(&display);

    assert_eq!(manga.display().expect("encoded flags decode"), display);
}

#[test]
fn manga_with_corrupt_flags_reports_configuration_error() {
    let mut manga = Manga::new(MangaId::new(1), SourceId::new(2), "Blame!");
    manga.chapter_flags = 0x300;
    assert!(matches!(
        manga.display(),
        Err(ConfigurationError::UnknownSortField(0x300))
    ));
}

#[test]
fn chapter_deserializes_with_defaults() {
    let json = r#"{"id": 4, "manga_id": 1, "name": "Log 4", "source_order": 2}"#;
    let chapter: Chapter = serde_json::from_str(json).expect("deserialize chapter");
    assert_eq!(chapter.id, ChapterId::new(4));
    assert_eq!(chapter.number, None);
    assert!(!chapter.read);
    assert_eq!(chapter.last_page_read, 0);
    assert!(!chapter.is_recognized_number());
}

#[test]
fn display_serializes_snake_case() {
    let display = ChapterDisplay {
        sort_field: SortField::Number,
        ..Default::default()
    };
    let json = serde_json::to_string(&display).expect("serialize display");
    assert!(json.contains("\"sort_field\":\"number\""));
    assert!(json.contains("\"direction\":\"descending\""));
}
