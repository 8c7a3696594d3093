//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use tankobon_model::{ChapterId, DisplayMode, SortField};

#[derive(Parser)]
#[command(
    name = "tankobon",
    version,
    about = "Browse and manage the chapter list of a manga library file",
    long_about = "Browse and manage the chapter list of a manga library file.\n\n\
                  The library is a JSON file holding one manga, its stored chapters,\n\
                  the chapters on disk and the chapter list its source serves."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (overrides the settings file).
    #[arg(long = "log-format", value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Settings file (TOML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the chapter list, optionally changing how it is filtered and sorted.
    List(ListArgs),

    /// Show the next chapter to read.
    Next(LibraryArgs),

    /// Mark chapters as read, or unread with --unread.
    MarkRead(MarkReadArgs),

    /// Mark every chapter numbered below the given chapter as read.
    MarkPrevious(MarkPreviousArgs),

    /// Queue chapters for download and run the queue.
    Download(ChaptersArgs),

    /// Delete downloaded chapters.
    Delete(ChaptersArgs),

    /// Fetch the chapter list from the source and merge it into the library.
    Sync(LibraryArgs),
}

#[derive(Parser)]
pub struct LibraryArgs {
    /// Path to the library file.
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Path to the library file.
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// Show unread chapters only.
    #[arg(long = "unread-only")]
    pub unread_only: bool,

    /// Show downloaded chapters only.
    #[arg(long = "downloaded-only")]
    pub downloaded_only: bool,

    /// Clear the read and downloaded filters before applying others.
    #[arg(long = "no-filters")]
    pub no_filters: bool,

    /// Field to sort by.
    #[arg(long = "sort", value_enum)]
    pub sort: Option<SortArg>,

    /// Flip the sort direction.
    #[arg(long = "reverse")]
    pub reverse: bool,

    /// Title chapters by name or by number.
    #[arg(long = "display", value_enum)]
    pub display: Option<DisplayArg>,
}

impl ListArgs {
    /// Whether any flag changes the stored display settings.
    pub fn changes_display(&self) -> bool {
        self.unread_only
            || self.downloaded_only
            || self.no_filters
            || self.sort.is_some()
            || self.reverse
            || self.display.is_some()
    }
}

#[derive(Parser)]
pub struct MarkReadArgs {
    /// Path to the library file.
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// Chapter ids.
    #[arg(value_name = "CHAPTER", required = true)]
    pub chapters: Vec<u64>,

    /// Mark unread instead, rewinding reading progress.
    #[arg(long = "unread")]
    pub unread: bool,
}

#[derive(Parser)]
pub struct MarkPreviousArgs {
    /// Path to the library file.
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// Id of the reference chapter.
    #[arg(value_name = "CHAPTER")]
    pub chapter: u64,
}

#[derive(Parser)]
pub struct ChaptersArgs {
    /// Path to the library file.
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// Chapter ids.
    #[arg(value_name = "CHAPTER", required = true)]
    pub chapters: Vec<u64>,
}

pub fn chapter_ids(ids: &[u64]) -> Vec<ChapterId> {
    ids.iter().copied().map(ChapterId::new).collect()
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortArg {
    Source,
    Number,
}

impl From<SortArg> for SortField {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Source => SortField::Source,
            SortArg::Number => SortField::Number,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DisplayArg {
    Name,
    Number,
}

impl From<DisplayArg> for DisplayMode {
    fn from(value: DisplayArg) -> Self {
        match value {
            DisplayArg::Name => DisplayMode::Name,
            DisplayArg::Number => DisplayMode::Number,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
