//! Library file.
//!
//! A JSON document holding one manga, its stored chapters, the ids of the
//! chapters on disk and the chapter list its source currently serves:
//!
//! ```json
//! {
//!   "manga": { "id": 1, "source": 7, "title": "Blame!", "chapter_flags": 0 },
//!   "chapters": [{ "id": 1, "manga_id": 1, "name": "Log 1", "source_order": 0 }],
//!   "downloaded": [1],
//!   "remote": []
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tankobon_chapters::memory::MemoryBackend;
use tankobon_model::{Chapter, ChapterId, Manga};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub manga: Manga,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub downloaded: Vec<ChapterId>,
    /// What a sync fetches.
    #[serde(default)]
    pub remote: Vec<Chapter>,
}

impl Library {
    /// Read a library file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("read library {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parse library {}", path.display()))
    }

    /// Write the library, replacing the file only once the write succeeded.
    ///
    /// # Errors
    ///
    /// Fails if the temporary file cannot be written or renamed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("serialize library")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, content).with_context(|| format!("write {}", temp.display()))?;
        fs::rename(&temp, path).with_context(|| format!("replace library {}", path.display()))?;
        Ok(())
    }

    /// In-memory collaborators seeded from this library.
    pub fn backend(&self) -> MemoryBackend {
        let backend = MemoryBackend::new(self.chapters.clone(), self.remote.clone());
        for &chapter in &self.downloaded {
            backend.downloads.mark_downloaded(chapter);
        }
        backend
    }

    /// Take back stored chapters, flags and download state.
    pub fn absorb(&mut self, manga: Manga, backend: &MemoryBackend) {
        self.chapters = backend.store.chapters(manga.id);
        self.downloaded = backend.downloads.downloaded();
        self.manga = manga;
    }
}
