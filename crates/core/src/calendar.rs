//! Dense, weekday-aligned series for fixed-width history heatmaps.
//!
//! The series is emitted newest-first. Trailing days of the current week that
//! have not happened yet come first as [`CalendarCell::NoData`], then one cell
//! per calendar day walking back from today until the oldest recorded entry or
//! the window is full.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// Canonical day ordering for every heatmap row. Monday is index 0.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub const DAYS_PER_WEEK: usize = WEEK.len();

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalendarCell {
    /// A day that has not been reached, or predates any recorded history.
    NoData,
    Value(f64),
}

impl CalendarCell {
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            CalendarCell::NoData => None,
            CalendarCell::Value(v) => Some(*v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSeries {
    /// Newest first.
    pub cells: Vec<CalendarCell>,
    /// Position of today's cell in `cells`, if the window has room for it.
    pub active_index: Option<usize>,
}

/// Position of `date` in [`WEEK`].
#[must_use]
pub fn day_index(date: NaiveDate) -> usize {
    let weekday = date.weekday();
    WEEK.iter().position(|day| *day == weekday).unwrap_or_default()
}

/// Days of `today`'s week that come after it.
#[must_use]
pub fn unelapsed_days(today: NaiveDate) -> usize {
    DAYS_PER_WEEK - 1 - day_index(today)
}

/// Build the dense series for one metric.
///
/// Dates after `today` are ignored; duplicate dates are summed. An empty
/// history still yields an explicit zero for today.
pub fn aggregate<I>(values: I, weeks: u32, today: NaiveDate) -> CalendarSeries
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let capacity = usize::try_from(weeks)
        .unwrap_or(usize::MAX)
        .saturating_mul(DAYS_PER_WEEK);

    let mut history: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in values {
        if date <= today {
            *history.entry(date).or_insert(0.0) += value;
        }
    }

    let mut cells = Vec::with_capacity(capacity);
    for _ in 0..unelapsed_days(today) {
        if cells.len() >= capacity {
            break;
        }
        cells.push(CalendarCell::NoData);
    }

    if cells.len() >= capacity {
        return CalendarSeries {
            cells,
            active_index: None,
        };
    }
    let active_index = Some(cells.len());

    let mut entries = history.iter().rev().peekable();
    if entries.peek().is_none() {
        cells.push(CalendarCell::Value(0.0));
        return CalendarSeries {
            cells,
            active_index,
        };
    }

    let mut cursor = today;
    while cells.len() < capacity {
        let Some((date, value)) = entries.peek() else {
            break;
        };
        if **date == cursor {
            cells.push(CalendarCell::Value(**value));
            entries.next();
        } else {
            cells.push(CalendarCell::Value(0.0));
        }
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }

    CalendarSeries {
        cells,
        active_index,
    }
}

/// Linear bucketing of values into discrete heatmap levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapScale {
    pub min: f64,
    pub max: f64,
    pub levels: u8,
}

impl HeatmapScale {
    #[must_use]
    pub fn new(min: f64, max: f64, levels: u8) -> Self {
        Self { min, max, levels }
    }

    /// Level for a cell; `None` for [`CalendarCell::NoData`].
    #[must_use]
    pub fn level(&self, cell: CalendarCell) -> Option<u8> {
        cell.value().map(|value| self.level_of(value))
    }

    /// Level in `0..=levels` for a raw value.
    ///
    /// A value that floors to level 0 but is at least halfway to level 1 is
    /// promoted to level 1, so tiny nonzero activity never renders empty.
    #[must_use]
    pub fn level_of(&self, value: f64) -> u8 {
        let span = self.max - self.min;
        if self.levels == 0 || !span.is_finite() || span <= 0.0 || !value.is_finite() {
            return 0;
        }

        let levels = f64::from(self.levels);
        let normalized = ((value - self.min) / (span / levels)).clamp(0.0, levels);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut level = normalized.floor() as u8;
        if level == 0 && normalized >= 0.5 {
            level = 1;
        }
        level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterCell {
    Finished,
    /// Within half a cell of being reached.
    Partial,
    Empty,
}

/// Single-line progress meter, e.g. today's study clock against a daily target.
#[must_use]
pub fn meter(value: f64, min: f64, max: f64, size: usize) -> Vec<MeterCell> {
    let span = max - min;
    if size == 0 || !span.is_finite() || span <= 0.0 {
        return vec![MeterCell::Empty; size];
    }

    #[allow(clippy::cast_precision_loss)]
    let normalized = (value - min) / (span / size as f64);
    let lower = normalized.floor();
    let upper = (normalized + 0.5).floor();

    (0..size)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let i = i as f64;
            if lower > i {
                MeterCell::Finished
            } else if upper > i {
                MeterCell::Partial
            } else {
                MeterCell::Empty
            }
        })
        .collect()
}
