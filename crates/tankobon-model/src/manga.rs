//! Parent entity and its chapter display configuration.
//!
//! The display configuration is persisted as one packed `u32`
//! (`chapter_flags`) next to the manga row:
//!
//! ```text
//! bit  0        sort direction      0 = descending, 1 = ascending
//! bits 1..=2    read filter         0 = all, 0x2 = unread only
//! bit  3        downloaded filter   0 = all, 0x8 = downloaded only
//! bits 8..=9    sort field          0 = source order, 0x100 = chapter number
//! bit  20       display mode        0 = chapter name, 0x100000 = chapter number
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::ids::{MangaId, SourceId};

const SORT_DIRECTION_MASK: u32 = 0x1;
const SORT_ASCENDING: u32 = 0x1;

const READ_MASK: u32 = 0x6;
const SHOW_UNREAD: u32 = 0x2;

const DOWNLOADED_MASK: u32 = 0x8;
const SHOW_DOWNLOADED: u32 = 0x8;

const SORTING_MASK: u32 = 0x300;
const SORTING_SOURCE: u32 = 0x000;
const SORTING_NUMBER: u32 = 0x100;

const DISPLAY_MASK: u32 = 0x10_0000;
const DISPLAY_NUMBER: u32 = 0x10_0000;

/// Field the chapter list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Order assigned by the source.
    #[default]
    Source,
    /// Parsed chapter number.
    Number,
}

impl SortField {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Number => "number",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Descending,
    Ascending,
}

impl SortDirection {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Descending => Self::Ascending,
            Self::Ascending => Self::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFilter {
    #[default]
    All,
    UnreadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadedFilter {
    #[default]
    All,
    DownloadedOnly,
}

/// How chapter rows are titled. A rendering concern only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Name,
    Number,
}

/// Decoded chapter display configuration of a manga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterDisplay {
    pub sort_field: SortField,
    pub direction: SortDirection,
    pub read_filter: ReadFilter,
    pub downloaded_filter: DownloadedFilter,
    pub display_mode: DisplayMode,
}

impl ChapterDisplay {
    /// Decode packed flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the sort field or read filter bits
    /// hold a value with no meaning.
    pub fn decode(flags: u32) -> Result<Self, ConfigurationError> {
        let sort_field = match flags & SORTING_MASK {
            SORTING_SOURCE => SortField::Source,
            SORTING_NUMBER => SortField::Number,
            other => return Err(ConfigurationError::UnknownSortField(other)),
        };
        let read_filter = match flags & READ_MASK {
            0 => ReadFilter::All,
            SHOW_UNREAD => ReadFilter::UnreadOnly,
            other => return Err(ConfigurationError::UnknownReadFilter(other)),
        };
        let direction = if flags & SORT_DIRECTION_MASK == SORT_ASCENDING {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        let downloaded_filter = if flags & DOWNLOADED_MASK == SHOW_DOWNLOADED {
            DownloadedFilter::DownloadedOnly
        } else {
            DownloadedFilter::All
        };
        let display_mode = if flags & DISPLAY_MASK == DISPLAY_NUMBER {
            DisplayMode::Number
        } else {
            DisplayMode::Name
        };
        Ok(Self {
            sort_field,
            direction,
            read_filter,
            downloaded_filter,
            display_mode,
        })
    }

    /// Pack into `flags`, keeping bits this type does not own.
    pub fn encode_into(&self, flags: u32) -> u32 {
        let mut flags =
            flags & !(SORT_DIRECTION_MASK | READ_MASK | DOWNLOADED_MASK | SORTING_MASK | DISPLAY_MASK);
        if self.direction == SortDirection::Ascending {
            flags |= SORT_ASCENDING;
        }
        if self.read_filter == ReadFilter::UnreadOnly {
            flags |= SHOW_UNREAD;
        }
        if self.downloaded_filter == DownloadedFilter::DownloadedOnly {
            flags |= SHOW_DOWNLOADED;
        }
        flags |= match self.sort_field {
            SortField::Source => SORTING_SOURCE,
            SortField::Number => SORTING_NUMBER,
        };
        if self.display_mode == DisplayMode::Number {
            flags |= DISPLAY_NUMBER;
        }
        flags
    }

    #[inline]
    pub fn only_unread(&self) -> bool {
        self.read_filter == ReadFilter::UnreadOnly
    }

    #[inline]
    pub fn only_downloaded(&self) -> bool {
        self.downloaded_filter == DownloadedFilter::DownloadedOnly
    }

    #[inline]
    pub fn sort_descending(&self) -> bool {
        self.direction == SortDirection::Descending
    }
}

/// The parent entity of a chapter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: MangaId,
    pub source: SourceId,
    #[serde(default)]
    pub url: String,
    pub title: String,
    /// Packed [`ChapterDisplay`] plus any bits owned by other features.
    #[serde(default)]
    pub chapter_flags: u32,
}

impl Manga {
    pub fn new(id: MangaId, source: SourceId, title: impl Into<String>) -> Self {
        Self {
            id,
            source,
            url: String::new(),
            title: title.into(),
            chapter_flags: 0,
        }
    }

    /// Decode the chapter display configuration.
    ///
    /// # Errors
    ///
    /// See [`ChapterDisplay::decode`].
    pub fn display(&self) -> Result<ChapterDisplay, ConfigurationError> {
        ChapterDisplay::decode(self.chapter_flags)
    }

    pub fn set_display(&mut self, display: &ChapterDisplay) {
        self.chapter_flags = display.encode_into(self.chapter_flags);
    }
}
