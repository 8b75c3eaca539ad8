//! Hierarchical completion state for a single textbook.
//!
//! Leaf sections roll up into their chapter's root: for a chapter with groups,
//! the root is in the completion set iff every leaf is. Toggling a root with
//! groups toggles all of its leaves.

use std::collections::{BTreeSet, HashMap, hash_map::Entry};

use crate::model::Textbook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Root,
    Leaf,
}

#[derive(Debug, Clone)]
struct ChapterNode {
    root: Option<String>,
    leaves: Vec<String>,
}

impl ChapterNode {
    fn is_completable(&self) -> bool {
        self.root.is_some() || !self.leaves.is_empty()
    }
}

/// Completion state for one open textbook, plus the derived views the listing UI consumes.
#[derive(Debug, Clone)]
pub struct CompletionModel {
    chapters: Vec<ChapterNode>,
    owners: HashMap<String, (usize, Role)>,
    completed: BTreeSet<String>,
}

impl CompletionModel {
    /// Index the textbook hierarchy and adopt an existing completion set.
    ///
    /// Identifiers that are not part of the hierarchy are kept (so stale data is
    /// not destroyed) but never influence any derived value. Loaded data is
    /// reconciled so that the roll-up invariant holds from the start: a
    /// completed root completes its leaves, and fully completed leaves complete
    /// their root.
    pub fn new<I>(textbook: &Textbook, completed: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut chapters = Vec::with_capacity(textbook.chapters.len());
        let mut owners = HashMap::new();

        for (index, chapter) in textbook.chapters.iter().enumerate() {
            if let Some(root) = &chapter.root {
                register(&mut owners, root, index, Role::Root);
            }
            let leaves: Vec<String> = chapter.leaves().map(str::to_string).collect();
            for leaf in &leaves {
                register(&mut owners, leaf, index, Role::Leaf);
            }
            chapters.push(ChapterNode {
                root: chapter.root.clone(),
                leaves,
            });
        }

        let mut model = Self {
            chapters,
            owners,
            completed: completed.into_iter().collect(),
        };
        model.reconcile();
        model
    }

    fn reconcile(&mut self) {
        for node in &self.chapters {
            let Some(root) = &node.root else { continue };
            if node.leaves.is_empty() {
                continue;
            }
            if self.completed.contains(root) {
                for leaf in &node.leaves {
                    self.completed.insert(leaf.clone());
                }
            } else if node.leaves.iter().all(|leaf| self.completed.contains(leaf)) {
                self.completed.insert(root.clone());
            }
        }
    }

    /// Mark `identifier` complete or incomplete.
    ///
    /// Returns whether the owning chapter's completion changed. Unknown
    /// identifiers are ignored and return `false`.
    pub fn toggle(&mut self, identifier: &str, checked: bool) -> bool {
        let Some(&(chapter, role)) = self.owners.get(identifier) else {
            log::debug!("ignoring toggle for unknown section {identifier:?}");
            return false;
        };

        let before = self.is_chapter_complete(chapter);
        let node = &self.chapters[chapter];

        match role {
            Role::Leaf => {
                set_membership(&mut self.completed, identifier, checked);
                if let Some(root) = &node.root {
                    let all_done = node.leaves.iter().all(|leaf| self.completed.contains(leaf));
                    set_membership(&mut self.completed, root, all_done);
                }
            }
            Role::Root => {
                for leaf in &node.leaves {
                    set_membership(&mut self.completed, leaf, checked);
                }
                set_membership(&mut self.completed, identifier, checked);
            }
        }

        before != self.is_chapter_complete(chapter)
    }

    /// Whether the chapter at `index` is complete. Non-completable or
    /// out-of-range chapters are never complete.
    #[must_use]
    pub fn is_chapter_complete(&self, index: usize) -> bool {
        let Some(node) = self.chapters.get(index) else {
            return false;
        };
        match &node.root {
            Some(root) => self.completed.contains(root),
            None => {
                !node.leaves.is_empty()
                    && node.leaves.iter().all(|leaf| self.completed.contains(leaf))
            }
        }
    }

    /// Binary per-chapter completion: `1.0` if complete, otherwise `0.0`.
    #[must_use]
    pub fn chapter_fraction(&self, index: usize) -> f64 {
        if self.is_chapter_complete(index) { 1.0 } else { 0.0 }
    }

    /// Complete completable chapters over all completable chapters.
    ///
    /// Always within `[0, 1]`; `0.0` for a textbook with nothing to complete.
    #[must_use]
    pub fn overall_fraction(&self) -> f64 {
        let total = self.completable_chapters();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.completed_chapters() as f64 / total as f64;
        fraction.clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn completable_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_completable()).count()
    }

    #[must_use]
    pub fn completed_chapters(&self) -> usize {
        (0..self.chapters.len())
            .filter(|index| self.is_chapter_complete(*index))
            .count()
    }

    /// The first incomplete chapter in document order.
    ///
    /// Yields the chapter's root, or for a chapter without an explicit root,
    /// its first incomplete leaf. `None` once everything is complete.
    #[must_use]
    pub fn next_actionable_item(&self) -> Option<&str> {
        self.chapters
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_completable())
            .find(|(index, _)| !self.is_chapter_complete(*index))
            .and_then(|(_, node)| match &node.root {
                Some(root) => Some(root.as_str()),
                None => node
                    .leaves
                    .iter()
                    .find(|leaf| !self.completed.contains(*leaf))
                    .map(String::as_str),
            })
    }

    /// Index of the chapter owning `identifier`, if it is part of the hierarchy.
    #[must_use]
    pub fn chapter_of(&self, identifier: &str) -> Option<usize> {
        self.owners.get(identifier).map(|(chapter, _)| *chapter)
    }

    #[must_use]
    pub fn is_checked(&self, identifier: &str) -> bool {
        self.completed.contains(identifier)
    }

    /// The raw completion set, including any stale identifiers that were loaded.
    #[must_use]
    pub fn completed_sections(&self) -> &BTreeSet<String> {
        &self.completed
    }

    #[must_use]
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// A textbook with no completable chapters is never considered complete.
    #[must_use]
    pub fn is_completable(&self) -> bool {
        self.completable_chapters() > 0
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_completable() && self.completed_chapters() == self.completable_chapters()
    }

    /// Whether any known identifier is complete. Never true for a
    /// non-completable textbook.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.is_completable() && self.completed.iter().any(|id| self.owners.contains_key(id))
    }
}

fn register(owners: &mut HashMap<String, (usize, Role)>, id: &str, chapter: usize, role: Role) {
    match owners.entry(id.to_string()) {
        Entry::Vacant(entry) => {
            entry.insert((chapter, role));
        }
        Entry::Occupied(_) => {
            log::warn!("duplicate section id {id:?} in chapter {chapter}; keeping first owner");
        }
    }
}

fn set_membership(set: &mut BTreeSet<String>, id: &str, present: bool) {
    if present {
        if !set.contains(id) {
            set.insert(id.to_string());
        }
    } else {
        set.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::fixtures::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn single_chapter() -> Textbook {
        textbook(vec![chapter(Some("ch1"), vec![group(&["s1", "s2"])])])
    }

    fn assert_roll_up(model: &CompletionModel, book: &Textbook) {
        for chapter in &book.chapters {
            let (Some(root), true) = (&chapter.root, chapter.has_leaves()) else {
                continue;
            };
            let all = chapter.leaves().all(|leaf| model.is_checked(leaf));
            assert_eq!(model.is_checked(root), all, "roll-up broken for {root}");
        }
    }

    #[test]
    fn end_to_end_leaf_toggles_drive_root() {
        let book = single_chapter();
        let mut model = CompletionModel::new(&book, Vec::new());

        assert!(!model.toggle("s1", true));
        assert!(!model.is_checked("ch1"));
        assert!(model.overall_fraction().abs() < f64::EPSILON);

        assert!(model.toggle("s2", true));
        assert!(model.is_checked("ch1"));
        assert!((model.overall_fraction() - 1.0).abs() < f64::EPSILON);

        assert!(model.toggle("s1", false));
        assert!(!model.is_checked("ch1"));
        assert!(model.overall_fraction().abs() < f64::EPSILON);
    }

    #[test]
    fn root_toggle_cascades_to_leaves() {
        let book = single_chapter();
        let mut model = CompletionModel::new(&book, Vec::new());

        assert!(model.toggle("ch1", true));
        assert!(model.is_checked("s1") && model.is_checked("s2"));

        assert!(model.toggle("ch1", false));
        assert!(model.completed_sections().is_empty());
    }

    #[test]
    fn root_only_chapter_sets_membership_directly() {
        let book = textbook(vec![chapter(Some("intro"), vec![])]);
        let mut model = CompletionModel::new(&book, Vec::new());
        assert!(model.toggle("intro", true));
        assert!(model.is_chapter_complete(0));
        assert!(!model.toggle("intro", true));
    }

    #[test]
    fn implicit_root_completes_when_all_sections_do() {
        let book = textbook(vec![chapter(None, vec![group(&["a"]), group(&["b"])])]);
        let mut model = CompletionModel::new(&book, Vec::new());

        assert!(!model.toggle("a", true));
        assert!(!model.is_chapter_complete(0));
        assert!(model.toggle("b", true));
        assert!(model.is_chapter_complete(0));
        assert!((model.chapter_fraction(0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_identifier_is_a_no_op() {
        let book = single_chapter();
        let mut model = CompletionModel::new(&book, Vec::new());
        assert!(!model.toggle("missing", true));
        assert!(model.completed_sections().is_empty());
    }

    #[test]
    fn stale_entries_survive_but_do_not_count() {
        let book = single_chapter();
        let model = CompletionModel::new(&book, vec!["gone".to_string()]);
        assert!(model.is_checked("gone"));
        assert!(!model.is_started());
        assert!(model.overall_fraction().abs() < f64::EPSILON);
    }

    #[test]
    fn toggle_is_idempotent() {
        let book = single_chapter();
        let mut once = CompletionModel::new(&book, Vec::new());
        let mut twice = CompletionModel::new(&book, Vec::new());

        once.toggle("s1", true);
        twice.toggle("s1", true);
        assert!(!twice.toggle("s1", true));
        assert_eq!(once.completed_sections(), twice.completed_sections());
    }

    #[test]
    fn loaded_data_is_reconciled() {
        let book = textbook(vec![
            chapter(Some("ch1"), vec![group(&["s1", "s2"])]),
            chapter(Some("ch2"), vec![group(&["t1"])]),
        ]);
        let model = CompletionModel::new(
            &book,
            vec!["ch1".to_string(), "t1".to_string()],
        );
        assert!(model.is_checked("s1") && model.is_checked("s2"));
        assert!(model.is_checked("ch2"));
        assert_roll_up(&model, &book);
    }

    #[test]
    fn next_actionable_item_follows_document_order() {
        let book = textbook(vec![
            chapter(Some("ch1"), vec![group(&["s1"])]),
            chapter(None, vec![]),
            chapter(None, vec![group(&["a", "b"])]),
            chapter(Some("ch4"), vec![]),
        ]);
        let mut model = CompletionModel::new(&book, Vec::new());
        assert_eq!(model.next_actionable_item(), Some("ch1"));

        model.toggle("s1", true);
        assert_eq!(model.next_actionable_item(), Some("a"));

        model.toggle("a", true);
        assert_eq!(model.next_actionable_item(), Some("b"));

        model.toggle("b", true);
        assert_eq!(model.next_actionable_item(), Some("ch4"));

        model.toggle("ch4", true);
        assert_eq!(model.next_actionable_item(), None);
        assert!(model.is_complete());
    }

    #[test]
    fn empty_textbook_is_neither_complete_nor_started() {
        let book = textbook(vec![chapter(None, vec![])]);
        let model = CompletionModel::new(&book, vec!["x".to_string()]);
        assert!(!model.is_completable());
        assert!(!model.is_complete());
        assert!(!model.is_started());
        assert!(model.overall_fraction().abs() < f64::EPSILON);
        assert_eq!(model.next_actionable_item(), None);
    }

    #[test]
    fn duplicate_ids_do_not_crash() {
        let book = textbook(vec![
            chapter(Some("ch1"), vec![group(&["dup"])]),
            chapter(Some("ch2"), vec![group(&["dup", "x"])]),
        ]);
        let mut model = CompletionModel::new(&book, Vec::new());
        model.toggle("dup", true);
        assert_eq!(model.chapter_of("dup"), Some(0));
        assert!(model.is_checked("ch1"));
    }

    #[test]
    fn randomized_toggles_preserve_roll_up_and_bounds() {
        let book = textbook(vec![
            chapter(Some("ch1"), vec![group(&["a1", "a2"]), group(&["a3"])]),
            chapter(None, vec![group(&["b1", "b2"])]),
            chapter(Some("ch3"), vec![]),
            chapter(Some("ch4"), vec![group(&["d1", "d2", "d3", "d4"])]),
            chapter(None, vec![]),
        ]);
        let ids: Vec<String> = book
            .identifiers()
            .map(str::to_string)
            .chain(std::iter::once("stale".to_string()))
            .collect();

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut model = CompletionModel::new(&book, Vec::new());

        for _ in 0..2_000 {
            let id = &ids[rng.random_range(0..ids.len())];
            let checked = rng.random_bool(0.6);
            model.toggle(id, checked);

            assert_roll_up(&model, &book);
            let overall = model.overall_fraction();
            assert!((0.0..=1.0).contains(&overall));
            assert_eq!(
                (overall - 1.0).abs() < f64::EPSILON,
                model.is_complete(),
                "overall fraction of 1 must match completion"
            );
        }
    }
}
