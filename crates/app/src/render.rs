//! Plain-text rendering of listings and heatmaps.

use services::{CourseSummary, Heatmap};
use tracker_core::calendar::{CalendarCell, DAYS_PER_WEEK, MeterCell, WEEK};
use tracker_core::model::{CourseStatus, Settings};

const SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

fn status_label(status: CourseStatus) -> &'static str {
    match status {
        CourseStatus::Completed => "completed",
        CourseStatus::Started => "started",
        CourseStatus::New => "new",
        CourseStatus::Reference => "reference",
    }
}

fn shade(level: Option<u8>, levels: u8) -> char {
    match level {
        None => ' ',
        Some(0) => SHADES[0],
        Some(level) => {
            let top = SHADES.len() - 1;
            let index = usize::from(level) * top / usize::from(levels.max(1));
            SHADES[index.clamp(1, top)]
        }
    }
}

#[must_use]
pub fn meter(cells: &[MeterCell]) -> String {
    cells
        .iter()
        .map(|cell| match cell {
            MeterCell::Finished => '█',
            MeterCell::Partial => '▌',
            MeterCell::Empty => '·',
        })
        .collect()
}

#[must_use]
pub fn course_line(summary: &CourseSummary) -> String {
    let progress = &summary.progress;
    let mut line = format!(
        "{}  {:<32} {:<10}",
        summary.course.id,
        summary.course.title,
        status_label(summary.status)
    );
    for (index, book) in progress.completion.iter().enumerate() {
        if book.is_completable() {
            line.push_str(&format!(
                "  [{index}] {}/{}",
                book.completed_chapters, book.completable_chapters
            ));
        }
    }
    if let Some(clock) = &summary.clock {
        line.push_str("  ");
        line.push_str(&meter(clock));
    }
    line
}

/// One row per weekday, oldest week on the left.
#[must_use]
pub fn heatmap(map: &Heatmap) -> String {
    let mut oldest_first: Vec<Option<u8>> = map.levels.iter().rev().copied().collect();
    let padding = (DAYS_PER_WEEK - oldest_first.len() % DAYS_PER_WEEK) % DAYS_PER_WEEK;
    let mut columns = vec![None; padding];
    columns.append(&mut oldest_first);

    let mut out = String::new();
    for (row, weekday) in WEEK.iter().enumerate() {
        out.push_str(&format!("{weekday} "));
        for week in columns.chunks(DAYS_PER_WEEK) {
            out.push(shade(week.get(row).copied().flatten(), map.scale.levels));
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn today_total(map: &Heatmap) -> f64 {
    map.series
        .active_index
        .and_then(|index| map.series.cells.get(index))
        .and_then(CalendarCell::value)
        .unwrap_or_default()
}

#[must_use]
pub fn settings(settings: &Settings) -> String {
    format!(
        "show_course_clock = {}\nmaximum_course_time = {} min\nmaximum_daily_time = {} min\nmaximum_daily_chapters = {}\nweeks_displayed = {}\ntick_interval_secs = {}",
        settings.show_course_clock(),
        settings.maximum_course_time(),
        settings.maximum_daily_time(),
        settings.maximum_daily_chapters(),
        settings.weeks_displayed(),
        settings.tick_interval_secs(),
    )
}
