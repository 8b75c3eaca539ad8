//! Course files on disk.
//!
//! Each course lives in `<courses dir>/<uuid>.toml`. The id is taken from the
//! file stem and never from the file body.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracker_core::model::{Course, CourseId};

const COURSE_EXTENSION: &str = "toml";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("course {0} not found")]
    NotFound(CourseId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid course file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Read-only access to the course files in one directory.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    root: PathBuf,
}

impl CourseCatalog {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, id: CourseId) -> PathBuf {
        self.root.join(format!("{id}.{COURSE_EXTENSION}"))
    }

    /// Load and parse a single course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no file exists for `id`, or
    /// `CatalogError::Parse` if the file is not a valid course.
    pub async fn load(&self, id: CourseId) -> Result<Course, CatalogError> {
        let path = self.path_for(id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(id));
            }
            Err(err) => return Err(err.into()),
        };
        parse_course(id, &text)
    }

    /// Ids of every course file in the directory, sorted.
    ///
    /// Files whose stem is not a course id are skipped. A missing directory
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the directory cannot be read.
    pub async fn scan(&self) -> Result<Vec<CourseId>, CatalogError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("course directory {} does not exist", self.root.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(COURSE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem.parse::<CourseId>() {
                Ok(id) => ids.push(id),
                Err(err) => log::warn!("skipping {}: {err}", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load every course in the directory. Files that fail to parse are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the directory cannot be read.
    pub async fn load_all(&self) -> Result<Vec<Course>, CatalogError> {
        let mut courses = Vec::new();
        for id in self.scan().await? {
            match self.load(id).await {
                Ok(course) => courses.push(course),
                Err(err) => log::warn!("failed to load course {id}: {err}"),
            }
        }
        Ok(courses)
    }
}

/// Parse a course body and stamp it with `id`.
///
/// # Errors
///
/// Returns `CatalogError::Parse` if `text` is not a valid course.
pub fn parse_course(id: CourseId, text: &str) -> Result<Course, CatalogError> {
    let mut course: Course = toml::from_str(text)?;
    course.id = id;
    for book in &mut course.books {
        book.file = normalize_relative(&book.file);
    }
    Ok(course)
}

/// Strip roots and resolve `.`/`..` so the result never leaves the course directory.
fn normalize_relative(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}
