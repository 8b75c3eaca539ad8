//! Contract between a study session and a document renderer.
//!
//! Renderers live outside this crate. The session only consumes item
//! identifiers and opaque position strings, replayed verbatim.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracker_core::model::Course;

use crate::error::ViewerError;

/// An entry in a document's navigation tree, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationItem {
    pub label: String,
    /// Stable identifier matching a section id in the course, when resolvable.
    pub identifier: Option<String>,
    pub subitems: Vec<NavigationItem>,
}

impl NavigationItem {
    #[must_use]
    pub fn new(label: impl Into<String>, identifier: Option<&str>) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.map(str::to_string),
            subitems: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subitems(mut self, subitems: Vec<NavigationItem>) -> Self {
        self.subitems = subitems;
        self
    }

    /// Identifiers of this item and its descendants, depth first.
    pub fn identifiers(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(
            self.identifier
                .as_deref()
                .into_iter()
                .chain(self.subitems.iter().flat_map(NavigationItem::identifiers)),
        )
    }
}

/// Emitted whenever user navigation settles on a new location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChanged {
    /// Renderer-specific encoding, stored and restored verbatim.
    pub position: String,
    /// Identifier of the smallest enclosing navigation item, if any.
    pub identifier: Option<String>,
}

#[async_trait]
pub trait ViewerSyncAdapter: Send {
    /// Load a textbook and return its navigation tree.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Open` if the document cannot be rendered.
    async fn open(
        &mut self,
        course: &Course,
        textbook_index: usize,
    ) -> Result<Vec<NavigationItem>, ViewerError>;

    /// Take the stream of location events. Yields `None` once taken.
    fn location_events(&mut self) -> Option<mpsc::Receiver<LocationChanged>>;

    /// Jump to a position previously emitted in a [`LocationChanged`].
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Restore` if the position cannot be applied.
    async fn restore_position(&mut self, position: &str) -> Result<(), ViewerError>;

    /// Release renderer resources. No events are emitted afterwards.
    async fn teardown(&mut self);
}
