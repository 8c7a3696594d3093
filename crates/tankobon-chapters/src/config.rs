//! Session configuration.

use serde::{Deserialize, Serialize};

/// Behaviour switches of a [`ChapterSession`](crate::ChapterSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Start a remote sync when storage first reports no chapters and no
    /// sync has been requested yet.
    pub auto_fetch_when_empty: bool,

    /// Re-project right after marking chapters read or unread.
    ///
    /// When `false` the view only changes once storage echoes the write
    /// back through its live query.
    pub reproject_after_mark_read: bool,

    /// Start the download queue again after a bulk delete if it was
    /// running before the delete stopped it.
    pub restart_queue_after_delete: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_fetch_when_empty: true,
            reproject_after_mark_read: true,
            restart_queue_after_delete: true,
        }
    }
}

impl SessionConfig {
    /// A configuration that never starts work on its own.
    pub fn manual() -> Self {
        Self {
            auto_fetch_when_empty: false,
            ..Default::default()
        }
    }
}
