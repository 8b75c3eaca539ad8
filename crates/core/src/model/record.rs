use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::course::Course;

/// The mutable progress record for one course.
///
/// `time_spent` is sparse: an absent date means "no recorded activity", which
/// the calendar view distinguishes from an explicit zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseCompletionData {
    /// Seconds studied, keyed by local calendar date.
    pub time_spent: BTreeMap<NaiveDate, u64>,
    /// Per-textbook completion, keyed by textbook index within the course.
    pub books: BTreeMap<usize, TextbookCompletion>,
}

/// Completion state for one textbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextbookCompletion {
    /// Completed chapter roots and leaf sections.
    pub completed_sections: BTreeSet<String>,
    /// Viewer position, opaque to the tracker and replayed verbatim.
    pub position: Option<String>,
}

impl CourseCompletionData {
    /// A record marking every root and leaf of every textbook complete.
    #[must_use]
    pub fn completed(course: &Course) -> Self {
        let books = course
            .books
            .iter()
            .enumerate()
            .map(|(index, book)| {
                let completed_sections = book.identifiers().map(str::to_string).collect();
                (
                    index,
                    TextbookCompletion {
                        completed_sections,
                        position: None,
                    },
                )
            })
            .collect();

        Self {
            time_spent: BTreeMap::new(),
            books,
        }
    }

    #[must_use]
    pub fn book(&self, index: usize) -> Option<&TextbookCompletion> {
        self.books.get(&index)
    }

    /// Mutable access to a textbook's completion, creating an empty entry if missing.
    pub fn book_mut(&mut self, index: usize) -> &mut TextbookCompletion {
        self.books.entry(index).or_default()
    }

    /// Add seconds to the bucket for `date`, returning the new total for that date.
    ///
    /// Values only ever grow; overflow saturates.
    pub fn add_time(&mut self, date: NaiveDate, seconds: u64) -> u64 {
        let entry = self.time_spent.entry(date).or_insert(0);
        *entry = entry.saturating_add(seconds);
        *entry
    }

    #[must_use]
    pub fn time_on(&self, date: NaiveDate) -> u64 {
        self.time_spent.get(&date).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_time(&self) -> u64 {
        self.time_spent
            .values()
            .fold(0_u64, |acc, secs| acc.saturating_add(*secs))
    }

    /// Replay the changes that lead from `base` to `self` on top of `stored`.
    ///
    /// Per-date time differences are added to (or taken from) the stored
    /// buckets. Sections checked since `base` are added and sections
    /// unchecked since `base` are removed. A position that moved since `base`
    /// replaces the stored one. Anything unchanged keeps its stored value.
    #[must_use]
    pub fn rebase(&self, base: &Self, stored: &Self) -> Self {
        let mut merged = stored.clone();

        let dates: BTreeSet<NaiveDate> = base
            .time_spent
            .keys()
            .chain(self.time_spent.keys())
            .copied()
            .collect();
        for date in dates {
            let before = base.time_on(date);
            let after = self.time_on(date);
            if after > before {
                merged.add_time(date, after - before);
            } else if after < before {
                if let Some(seconds) = merged.time_spent.get_mut(&date) {
                    *seconds = seconds.saturating_sub(before - after);
                    if *seconds == 0 && !self.time_spent.contains_key(&date) {
                        merged.time_spent.remove(&date);
                    }
                }
            }
        }

        let empty = TextbookCompletion::default();
        let indices: BTreeSet<usize> = base.books.keys().chain(self.books.keys()).copied().collect();
        for index in indices {
            let before = base.book(index).unwrap_or(&empty);
            let after = self.book(index).unwrap_or(&empty);
            if before == after {
                continue;
            }
            let target = merged.book_mut(index);
            for id in after.completed_sections.difference(&before.completed_sections) {
                target.completed_sections.insert(id.clone());
            }
            for id in before.completed_sections.difference(&after.completed_sections) {
                target.completed_sections.remove(id);
            }
            if after.position != before.position {
                target.position.clone_from(&after.position);
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::fixtures::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_time_accumulates_per_date() {
        let mut data = CourseCompletionData::default();
        data.add_time(date(2024, 1, 1), 5);
        assert_eq!(data.add_time(date(2024, 1, 1), 3), 8);
        data.add_time(date(2024, 1, 2), 1);
        assert_eq!(data.time_on(date(2024, 1, 1)), 8);
        assert_eq!(data.time_on(date(2024, 1, 3)), 0);
        assert_eq!(data.total_time(), 9);
    }

    #[test]
    fn add_time_saturates() {
        let mut data = CourseCompletionData::default();
        data.add_time(date(2024, 1, 1), u64::MAX);
        assert_eq!(data.add_time(date(2024, 1, 1), 10), u64::MAX);
    }

    #[test]
    fn completed_record_includes_roots_and_leaves() {
        let course = course(vec![
            textbook(vec![chapter(Some("ch1"), vec![group(&["s1", "s2"])])]),
            textbook(vec![chapter(None, vec![group(&["a"])])]),
        ]);
        let data = CourseCompletionData::completed(&course);
        let first = &data.book(0).unwrap().completed_sections;
        assert!(first.contains("ch1") && first.contains("s1") && first.contains("s2"));
        assert!(data.book(1).unwrap().completed_sections.contains("a"));
    }

    #[test]
    fn serializes_dates_and_indexes_as_json_keys() {
        let mut data = CourseCompletionData::default();
        data.add_time(date(2024, 1, 3), 60);
        data.book_mut(0).completed_sections.insert("s1".into());
        data.book_mut(0).position = Some("{\"cfi\":\"/6/4\"}".into());

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"2024-01-03\":60"));

        let back: CourseCompletionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn rebase_replays_local_changes_onto_stored_record() {
        let mut stored = CourseCompletionData::default();
        stored.add_time(date(2024, 1, 2), 500);
        stored.book_mut(0).completed_sections.insert("s2".into());
        stored.book_mut(0).position = Some("page=40".into());

        let base = CourseCompletionData::default();
        let mut local = base.clone();
        local.add_time(date(2024, 1, 2), 20);
        local.add_time(date(2024, 1, 3), 5);
        local.book_mut(0).completed_sections.insert("s1".into());

        let merged = local.rebase(&base, &stored);
        assert_eq!(merged.time_on(date(2024, 1, 2)), 520);
        assert_eq!(merged.time_on(date(2024, 1, 3)), 5);
        let book = merged.book(0).unwrap();
        assert!(book.completed_sections.contains("s1"));
        assert!(book.completed_sections.contains("s2"));
        assert_eq!(book.position.as_deref(), Some("page=40"));
    }

    #[test]
    fn rebase_applies_unchecks_and_moved_positions() {
        let mut base = CourseCompletionData::default();
        base.add_time(date(2024, 1, 2), 100);
        base.book_mut(0).completed_sections.insert("s1".into());
        base.book_mut(0).completed_sections.insert("s2".into());

        let mut stored = base.clone();
        stored.add_time(date(2024, 1, 2), 50);
        stored.book_mut(1).completed_sections.insert("a".into());

        let mut local = base.clone();
        local.time_spent.clear();
        local.book_mut(0).completed_sections.remove("s2");
        local.book_mut(0).position = Some("page=2".into());

        let merged = local.rebase(&base, &stored);
        assert_eq!(merged.time_on(date(2024, 1, 2)), 50);
        let book = merged.book(0).unwrap();
        assert!(book.completed_sections.contains("s1"));
        assert!(!book.completed_sections.contains("s2"));
        assert_eq!(book.position.as_deref(), Some("page=2"));
        assert!(merged.book(1).unwrap().completed_sections.contains("a"));
    }

    #[test]
    fn missing_fields_default() {
        let back: CourseCompletionData = serde_json::from_str("{}").unwrap();
        assert_eq!(back, CourseCompletionData::default());
    }
}
