use chrono::NaiveDate;

use crate::completion::CompletionModel;
use crate::model::{Course, CourseCompletionData};

/// Displayed progress through a [`Course`].
#[derive(Debug, Clone, PartialEq)]
pub struct CourseProgress {
    /// One entry per textbook, in course order.
    pub completion: Vec<TextbookProgress>,
    /// Seconds studied on the reference date.
    pub time_spent_today: u64,
}

/// Displayed progress through a single textbook.
#[derive(Debug, Clone, PartialEq)]
pub struct TextbookProgress {
    /// Complete chapters over completable chapters, in `[0, 1]`.
    pub overall_completion: f64,
    /// Binary completion of every chapter, in document order.
    pub chapter_completion: Vec<f64>,
    pub completed_chapters: usize,
    pub completable_chapters: usize,
    pub started: bool,
}

/// Listing category for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseStatus {
    Completed,
    Started,
    New,
    /// Nothing to complete; reference material.
    Reference,
}

impl TextbookProgress {
    fn from_model(model: &CompletionModel) -> Self {
        Self {
            overall_completion: model.overall_fraction(),
            chapter_completion: (0..model.chapter_count())
                .map(|index| model.chapter_fraction(index))
                .collect(),
            completed_chapters: model.completed_chapters(),
            completable_chapters: model.completable_chapters(),
            started: model.is_started(),
        }
    }

    #[must_use]
    pub fn is_completable(&self) -> bool {
        self.completable_chapters > 0
    }
}

impl CourseProgress {
    /// Derive per-textbook progress from a completion record.
    #[must_use]
    pub fn calculate(course: &Course, data: &CourseCompletionData, today: NaiveDate) -> Self {
        let completion = course
            .books
            .iter()
            .enumerate()
            .map(|(index, book)| {
                let completed = data
                    .book(index)
                    .map(|b| b.completed_sections.iter().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                TextbookProgress::from_model(&CompletionModel::new(book, completed))
            })
            .collect();

        Self {
            completion,
            time_spent_today: data.time_on(today),
        }
    }

    /// Overall fraction for one textbook; `0.0` if the index is out of range.
    #[must_use]
    pub fn overall_fraction(&self, textbook_index: usize) -> f64 {
        self.completion
            .get(textbook_index)
            .map_or(0.0, |book| book.overall_completion)
    }

    #[must_use]
    pub fn completed_chapters(&self) -> usize {
        self.completion.iter().map(|b| b.completed_chapters).sum()
    }

    /// Every completable textbook is fully complete, and there is at least one.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let mut completable = self
            .completion
            .iter()
            .filter(|book| book.is_completable())
            .peekable();
        completable.peek().is_some()
            && completable.all(|book| book.completed_chapters == book.completable_chapters)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        !self.is_complete() && self.completion.iter().any(|book| book.started)
    }

    #[must_use]
    pub fn status(&self, course: &Course) -> CourseStatus {
        if !course.is_completable() {
            CourseStatus::Reference
        } else if self.is_complete() {
            CourseStatus::Completed
        } else if self.is_started() {
            CourseStatus::Started
        } else {
            CourseStatus::New
        }
    }
}
