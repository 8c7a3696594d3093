//! Canonical chapter record.

use serde::{Deserialize, Serialize};

use crate::ids::{ChapterId, MangaId};

/// A chapter as stored by the persistence layer.
///
/// The engine treats this as the source of truth and only changes it by
/// writing through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub manga_id: MangaId,
    /// Location of the chapter at its source.
    #[serde(default)]
    pub url: String,
    /// Display title.
    pub name: String,
    /// Position assigned by the source. Index 0 is the newest upload.
    pub source_order: i32,
    /// Parsed chapter number, `None` when the title did not contain one.
    #[serde(default)]
    pub number: Option<f32>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub last_page_read: u32,
}

impl Chapter {
    /// Create an unread chapter with no reading progress.
    pub fn new(
        id: ChapterId,
        manga_id: MangaId,
        name: impl Into<String>,
        source_order: i32,
        number: Option<f32>,
    ) -> Self {
        Self {
            id,
            manga_id,
            url: String::new(),
            name: name.into(),
            source_order,
            number,
            read: false,
            last_page_read: 0,
        }
    }

    /// Whether the chapter number could be parsed from the source title.
    #[inline]
    pub fn is_recognized_number(&self) -> bool {
        self.number.is_some_and(|n| n >= 0.0)
    }

    /// Number used for ordering; unrecognized numbers order as zero.
    #[inline]
    pub fn sort_number(&self) -> f32 {
        match self.number {
            Some(n) if n >= 0.0 => n,
            _ => 0.0,
        }
    }

    /// Set the read flag. Marking unread also rewinds the reading position.
    pub fn set_read(&mut self, read: bool) {
        self.read = read;
        if !read {
            self.last_page_read = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(number: Option<f32>) -> Chapter {
        Chapter::new(ChapterId::new(1), MangaId::new(1), "Ch", 0, number)
    }

    #[test]
    fn test_recognized_number() {
        assert!(chapter(Some(3.5)).is_recognized_number());
        assert!(chapter(Some(0.0)).is_recognized_number());
        assert!(!chapter(None).is_recognized_number());
        assert!(!chapter(Some(-1.0)).is_recognized_number());
    }

    #[test]
    fn test_sort_number_defaults_to_zero() {
        assert_eq!(chapter(None).sort_number(), 0.0);
        assert_eq!(chapter(Some(-1.0)).sort_number(), 0.0);
        assert_eq!(chapter(Some(12.0)).sort_number(), 12.0);
    }

    #[test]
    fn test_mark_unread_resets_progress() {
        let mut ch = chapter(Some(1.0));
        ch.read = true;
        ch.last_page_read = 14;

        ch.set_read(true);
        assert_eq!(ch.last_page_read, 14);

        ch.set_read(false);
        assert!(!ch.read);
        assert_eq!(ch.last_page_read, 0);
    }
}
