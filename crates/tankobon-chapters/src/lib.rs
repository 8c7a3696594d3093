//! Reactive chapter list engine.
//!
//! Keeps one manga's chapter list in sync with three inputs (local storage,
//! the remote source and the download queue) and publishes a filtered,
//! sorted view of it. The front end opens a [`ChapterSession`], subscribes
//! to its view and issues mutations; storage and the download queue are
//! reached through the traits in [`ports`].
//!
//! ```no_run
//! # async fn run(manga: tankobon_model::Manga, collaborators: tankobon_chapters::Collaborators)
//! # -> tankobon_chapters::Result<()> {
//! use tankobon_chapters::{ChapterSession, SessionConfig};
//!
//! let session = ChapterSession::open(manga, collaborators, SessionConfig::default())?;
//! let mut view = session.subscribe();
//! while let Some(chapters) = view.recv().await {
//!     println!("{} chapters visible", chapters.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod chapter_model;
pub mod config;
pub mod error;
pub mod memory;
mod merger;
mod mutations;
pub mod ports;
pub mod projector;
pub mod publisher;
mod session;
mod store;
mod sync;

pub use chapter_model::ChapterModel;
pub use config::SessionConfig;
pub use error::{BoxError, ChaptersError, DeleteFailure, Result};
pub use merger::pair;
pub use ports::{
    ChapterCounter, ChapterReconciler, ChapterSource, ChapterStore, Collaborators,
    DownloadManager,
};
pub use projector::{comparator, matches, project};
pub use publisher::{Publisher, ReplayPolicy, Subscription};
pub use session::ChapterSession;
pub use sync::{SyncOutcome, SyncReport};
