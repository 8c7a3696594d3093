//! Persisted data types shared by the chapter engine and its front ends.
//!
//! - [`Chapter`] is the canonical record owned by storage.
//! - [`Manga`] is the parent entity; it carries the packed chapter display
//!   flags which decode into a typed [`ChapterDisplay`].
//! - [`Download`] is owned by the download queue and exposes a live status.

#![deny(unsafe_code)]

pub mod chapter;
pub mod download;
pub mod error;
pub mod ids;
pub mod manga;

pub use chapter::Chapter;
pub use download::{Download, DownloadStatus};
pub use error::ConfigurationError;
pub use ids::{ChapterId, MangaId, SourceId};
pub use manga::{
    ChapterDisplay, DisplayMode, DownloadedFilter, Manga, ReadFilter, SortDirection, SortField,
};
