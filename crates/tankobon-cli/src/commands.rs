use anyhow::{Result, bail};
use tankobon_chapters::{ChaptersError, SessionConfig};
use tracing::{Instrument, info_span};

use tankobon_cli::workspace::Workspace;

use crate::cli::{
    ChaptersArgs, Command, LibraryArgs, ListArgs, MarkPreviousArgs, MarkReadArgs, chapter_ids,
};
use crate::summary::{chapter_title, print_chapters};

pub async fn run(command: Command, config: SessionConfig) -> Result<()> {
    match command {
        Command::List(args) => run_list(&args, config).await,
        Command::Next(args) => run_next(&args, config).await,
        Command::MarkRead(args) => run_mark_read(&args, config).await,
        Command::MarkPrevious(args) => run_mark_previous(&args, config).await,
        Command::Download(args) => run_download(&args, config).await,
        Command::Delete(args) => run_delete(&args, config).await,
        Command::Sync(args) => {
            let span = info_span!("sync", library = %args.library.display());
            run_sync(&args, config).instrument(span).await
        }
    }
}

async fn run_list(args: &ListArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let session = workspace.session();
    if args.no_filters {
        session.remove_filters()?;
    }
    if args.unread_only {
        session.set_read_filter(true)?;
    }
    if args.downloaded_only {
        session.set_downloaded_filter(true)?;
    }
    if let Some(sort) = args.sort {
        session.set_sorting(sort.into())?;
    }
    if args.reverse {
        session.revert_sort_order()?;
    }
    if let Some(mode) = args.display {
        session.set_display_mode(mode.into())?;
    }

    let view = session.current_view().unwrap_or_default();
    print_chapters(&view, &session.display(), session.chapters().len());
    if args.changes_display() {
        workspace.save()?;
    }
    Ok(())
}

async fn run_next(args: &LibraryArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let session = workspace.session();
    match session.next_unread_chapter() {
        Some(model) => println!(
            "Next: {} (id {})",
            chapter_title(model.chapter(), session.display().display_mode),
            model.id()
        ),
        None => println!("No unread chapters."),
    }
    Ok(())
}

async fn run_mark_read(args: &MarkReadArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let ids = chapter_ids(&args.chapters);
    let read = !args.unread;
    let changed = workspace.session().mark_chapters_read(&ids, read).await??;
    workspace.settle().await?;
    println!(
        "Marked {changed} chapters as {}.",
        if read { "read" } else { "unread" }
    );
    workspace.save()
}

async fn run_mark_previous(args: &MarkPreviousArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let changed = workspace
        .session()
        .mark_previous_chapters_read(args.chapter.into())
        .await??;
    workspace.settle().await?;
    println!("Marked {changed} earlier chapters as read.");
    workspace.save()
}

async fn run_download(args: &ChaptersArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let ids = chapter_ids(&args.chapters);
    let selected = workspace.session().download_chapters(&ids);
    let finished = workspace.run_downloads();
    println!("Downloaded {finished} of {selected} selected chapters.");
    workspace.save()
}

async fn run_delete(args: &ChaptersArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let ids = chapter_ids(&args.chapters);
    match workspace.session().delete_chapters(&ids).await? {
        Ok(deleted) => {
            println!("Deleted {deleted} chapters.");
            workspace.save()
        }
        Err(error) => {
            if let ChaptersError::Delete { failures, .. } = &error {
                for failure in failures {
                    eprintln!("  chapter {}: {}", failure.chapter, failure.error);
                }
            }
            // Chapters that were removed stay removed.
            workspace.save()?;
            Err(anyhow::Error::new(error).context("delete chapters"))
        }
    }
}

async fn run_sync(args: &LibraryArgs, config: SessionConfig) -> Result<()> {
    let workspace = Workspace::open(&args.library, config).await?;
    let generation = workspace.session().fetch_chapters_from_source();
    let outcome = workspace.next_sync_outcome().await?;
    let report = match &*outcome {
        Ok(report) if report.generation == generation => report,
        Ok(report) => bail!("sync {} finished in place of {generation}", report.generation),
        Err(error) => bail!("{} ({error})", error.user_message()),
    };
    workspace.settle().await?;

    let session = workspace.session();
    println!(
        "Fetched {} chapters from source; the library now holds {}.",
        report.fetched,
        report.chapters.len()
    );
    let view = session.current_view().unwrap_or_default();
    print_chapters(&view, &session.display(), session.chapters().len());
    workspace.save()
}
