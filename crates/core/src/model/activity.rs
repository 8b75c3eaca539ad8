use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::model::{Course, CourseCompletionData, CourseProgress};

/// Change in study activity between two stored versions of a course record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivityDelta {
    pub seconds: i64,
    pub chapters: f64,
}

impl ActivityDelta {
    /// Difference in total study time and completed chapters from `before` to `after`.
    #[must_use]
    pub fn between(
        course: &Course,
        before: &CourseCompletionData,
        after: &CourseCompletionData,
        today: NaiveDate,
    ) -> Self {
        let seconds = i128::from(after.total_time()) - i128::from(before.total_time());
        let seconds = i64::try_from(seconds).unwrap_or(if seconds.is_negative() {
            i64::MIN
        } else {
            i64::MAX
        });

        let before_chapters = CourseProgress::calculate(course, before, today).completed_chapters();
        let after_chapters = CourseProgress::calculate(course, after, today).completed_chapters();
        #[allow(clippy::cast_precision_loss)]
        let chapters = after_chapters as f64 - before_chapters as f64;

        Self { seconds, chapters }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seconds == 0 && self.chapters == 0.0
    }
}

/// Study history across every course, by local date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityHistory {
    pub chapters_completed: BTreeMap<NaiveDate, f64>,
    pub time_spent: BTreeMap<NaiveDate, u64>,
}

impl ActivityHistory {
    /// Fold a delta into the entry for `date`.
    ///
    /// Negative changes reduce an existing entry but never below zero, and
    /// never create an entry on their own.
    pub fn apply(&mut self, date: NaiveDate, delta: ActivityDelta) {
        if delta.chapters.is_normal() {
            match self.chapters_completed.entry(date) {
                Entry::Occupied(mut entry) => {
                    let value = (*entry.get() + delta.chapters).max(0.0);
                    entry.insert(value);
                }
                Entry::Vacant(entry) => {
                    if delta.chapters.is_sign_positive() {
                        entry.insert(delta.chapters);
                    }
                }
            }
        }

        match self.time_spent.entry(date) {
            Entry::Occupied(mut entry) => {
                let value = if delta.seconds.is_negative() {
                    entry.get().saturating_sub(delta.seconds.unsigned_abs())
                } else {
                    entry.get().saturating_add(delta.seconds.unsigned_abs())
                };
                entry.insert(value);
            }
            Entry::Vacant(entry) => {
                if delta.seconds.is_positive() {
                    entry.insert(delta.seconds.unsigned_abs());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::fixtures::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn delta_counts_time_and_chapters() {
        let course = course(vec![textbook(vec![
            chapter(Some("ch1"), vec![group(&["s1"])]),
            chapter(Some("ch2"), vec![]),
        ])]);
        let before = CourseCompletionData::default();
        let mut after = CourseCompletionData::default();
        after.add_time(date(1), 40);
        after.book_mut(0).completed_sections.insert("ch2".into());

        let delta = ActivityDelta::between(&course, &before, &after, date(1));
        assert_eq!(delta.seconds, 40);
        assert!((delta.chapters - 1.0).abs() < f64::EPSILON);

        let reverse = ActivityDelta::between(&course, &after, &before, date(1));
        assert_eq!(reverse.seconds, -40);
        assert!((reverse.chapters + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_deltas_never_create_or_underflow() {
        let mut history = ActivityHistory::default();
        history.apply(
            date(2),
            ActivityDelta {
                seconds: -10,
                chapters: -1.0,
            },
        );
        assert!(history.time_spent.is_empty());
        assert!(history.chapters_completed.is_empty());

        history.apply(
            date(2),
            ActivityDelta {
                seconds: 5,
                chapters: 1.0,
            },
        );
        history.apply(
            date(2),
            ActivityDelta {
                seconds: -50,
                chapters: -3.0,
            },
        );
        assert_eq!(history.time_spent.get(&date(2)), Some(&0));
        assert_eq!(history.chapters_completed.get(&date(2)), Some(&0.0));
    }
}
