use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use tankobon_chapters::ChapterModel;
use tankobon_model::{Chapter, ChapterDisplay, DisplayMode, DownloadStatus, SortDirection};

pub fn print_chapters(view: &[ChapterModel], display: &ChapterDisplay, total: usize) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Id"),
        header_cell("Chapter"),
        header_cell("Read"),
        header_cell("Page"),
        header_cell("Download"),
    ]);
    apply_chapter_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Center);
    align_column(&mut table, 4, CellAlignment::Right);
    for (position, model) in view.iter().enumerate() {
        let chapter = model.chapter();
        let title = chapter_title(chapter, display.display_mode);
        let title_cell = if chapter.read {
            dim_cell(title)
        } else {
            Cell::new(title)
        };
        table.add_row(vec![
            dim_cell(position + 1),
            Cell::new(model.id()),
            title_cell,
            read_cell(chapter.read),
            page_cell(chapter.last_page_read),
            status_cell(model.status()),
        ]);
    }
    println!("{table}");
    println!(
        "{} of {} chapters shown (sort: {} {}, filters: {})",
        view.len(),
        total,
        display.sort_field,
        direction_label(display.direction),
        filter_label(display)
    );
}

/// Title shown for a chapter under the given display mode.
pub fn chapter_title(chapter: &Chapter, mode: DisplayMode) -> String {
    match (mode, chapter.number) {
        (DisplayMode::Number, Some(number)) if chapter.is_recognized_number() => {
            format!("Chapter {number}")
        }
        _ => chapter.name.clone(),
    }
}

fn apply_chapter_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn direction_label(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ascending",
        SortDirection::Descending => "descending",
    }
}

fn filter_label(display: &ChapterDisplay) -> &'static str {
    match (display.only_unread(), display.only_downloaded()) {
        (false, false) => "none",
        (true, false) => "unread",
        (false, true) => "downloaded",
        (true, true) => "unread, downloaded",
    }
}

fn read_cell(read: bool) -> Cell {
    if read {
        Cell::new("✓").fg(Color::Green)
    } else {
        dim_cell("-")
    }
}

fn page_cell(page: u32) -> Cell {
    if page == 0 {
        dim_cell("-")
    } else {
        Cell::new(page)
    }
}

fn status_cell(status: DownloadStatus) -> Cell {
    let color = match status {
        DownloadStatus::NotDownloaded => return dim_cell("-"),
        DownloadStatus::Queued => Color::Yellow,
        DownloadStatus::Downloading => Color::Cyan,
        DownloadStatus::Downloaded => Color::Green,
        DownloadStatus::Error => Color::Red,
    };
    Cell::new(status.label()).fg(color)
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
