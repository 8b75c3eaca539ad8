use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::ids::CourseId;

/// A course bundle: one or more textbooks studied together.
///
/// Courses are authored externally and are immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// The unique ID of the course. Assigned from the file name, never from the file body.
    #[serde(skip)]
    pub id: CourseId,
    /// Title for the course
    pub title: String,
    /// Optional description for the course
    #[serde(default)]
    pub description: Option<String>,
    /// The textbooks which are a part of this course.
    #[serde(default)]
    pub books: Vec<Textbook>,
}

/// A textbook within a [`Course`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Textbook {
    /// Label for the textbook when displayed as part of a larger course.
    pub label: String,
    /// Reference to the document content, resolved by a viewer adapter.
    pub file: PathBuf,
    /// Chapters in document order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// A chapter within a [`Textbook`].
///
/// A chapter with neither a root nor any sections is not completable and is
/// ignored by progress tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Section id representing the chapter itself as a checkable unit.
    ///
    /// When omitted on a chapter with groups, the chapter's root is implicit and
    /// complete iff every section in every group is complete.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub groups: Vec<SectionGroup>,
}

/// An ordered group of leaf sections within a [`Chapter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionGroup {
    /// Relative emphasis for display. Never used for completion math.
    #[serde(default)]
    pub weight: Option<f32>,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl SectionGroup {
    /// Display weight, defaulting to 1 and clamped to be non-negative.
    #[must_use]
    pub fn weight(&self) -> f32 {
        let weight = self.weight.unwrap_or(1.0);
        if weight.is_finite() { weight.max(0.0) } else { 1.0 }
    }
}

impl Chapter {
    /// Every leaf section across every group, in document order.
    pub fn leaves(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.sections.iter().map(String::as_str))
    }

    #[must_use]
    pub fn has_leaves(&self) -> bool {
        self.leaves().next().is_some()
    }

    #[must_use]
    pub fn is_completable(&self) -> bool {
        self.root.is_some() || self.has_leaves()
    }
}

impl Textbook {
    /// Number of chapters that participate in progress tracking.
    #[must_use]
    pub fn completable_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_completable()).count()
    }

    #[must_use]
    pub fn is_completable(&self) -> bool {
        self.chapters.iter().any(Chapter::is_completable)
    }

    /// Every checkable identifier (explicit roots and leaves) in document order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.root.as_deref().into_iter().chain(chapter.leaves()))
    }
}

impl Course {
    /// A course is completable when at least one textbook has a completable chapter.
    ///
    /// Non-completable courses are reference material and are listed separately.
    #[must_use]
    pub fn is_completable(&self) -> bool {
        self.books.iter().any(Textbook::is_completable)
    }

    #[must_use]
    pub fn textbook(&self, index: usize) -> Option<&Textbook> {
        self.books.get(index)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn group(sections: &[&str]) -> SectionGroup {
        SectionGroup {
            weight: None,
            sections: sections.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub(crate) fn chapter(root: Option<&str>, groups: Vec<SectionGroup>) -> Chapter {
        Chapter {
            root: root.map(str::to_string),
            groups,
        }
    }

    pub(crate) fn textbook(chapters: Vec<Chapter>) -> Textbook {
        Textbook {
            label: "Book".into(),
            file: PathBuf::from("book.epub"),
            chapters,
        }
    }

    pub(crate) fn course(books: Vec<Textbook>) -> Course {
        Course {
            id: CourseId::default(),
            title: "Course".into(),
            description: None,
            books,
        }
    }
}
