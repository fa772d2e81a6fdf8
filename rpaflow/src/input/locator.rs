//! Locating the dated input folder and classifying the files in it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::fs::{is_text_file, FileSystem};
use crate::errors::RpaError;

/// The three kinds of input file the job recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    /// Balance file (category A).
    Sal,
    /// Supplier file (category B).
    Forn,
    /// Statement file (category C).
    Extrel,
}

impl FileCategory {
    /// All categories in slot order.
    pub const ALL: [Self; 3] = [Self::Sal, Self::Forn, Self::Extrel];

    /// The case-sensitive substring that identifies this category.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Sal => "SAL",
            Self::Forn => "FORN",
            Self::Extrel => "EXTREL",
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Sal => 0,
            Self::Forn => 1,
            Self::Extrel => 2,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// What to do when several files carry the same marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// Later entries in listing order replace earlier ones.
    #[default]
    Overwrite,
    /// The first entry in listing order is kept.
    KeepFirst,
    /// Fail with `RpaError::AmbiguousFiles`.
    Reject,
}

/// One optional file name per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFileSet {
    slots: [Option<String>; 3],
}

impl ClassifiedFileSet {
    /// Builds a set from explicit slot values.
    #[must_use]
    pub fn new(sal: Option<String>, forn: Option<String>, extrel: Option<String>) -> Self {
        Self {
            slots: [sal, forn, extrel],
        }
    }

    /// The file assigned to `category`, if any.
    #[must_use]
    pub fn get(&self, category: FileCategory) -> Option<&str> {
        self.slots[category.slot()].as_deref()
    }

    /// Returns true if no slot is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The three slots in order (SAL, FORN, EXTREL).
    #[must_use]
    pub fn as_slots(&self) -> &[Option<String>; 3] {
        &self.slots
    }

    /// Populated file names, in slot order. A file that filled several slots
    /// appears once per slot.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(Option::as_deref)
    }

    fn set(&mut self, category: FileCategory, name: &str) {
        self.slots[category.slot()] = Some(name.to_string());
    }
}

impl fmt::Display for ClassifiedFileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = FileCategory::ALL
            .iter()
            .map(|c| format!("{c}={}", self.get(*c).unwrap_or("None")))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// A dated folder that exists and holds at least one recognized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedInput {
    /// The dated folder.
    pub folder: PathBuf,
    /// The recognized files.
    pub files: ClassifiedFileSet,
}

/// Builds `<root>/<MM>.<YYYY>/<DD>` for `date`.
#[must_use]
pub fn dated_folder(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%m.%Y").to_string())
        .join(date.format("%d").to_string())
}

/// Assigns each `.txt` entry to every category whose marker it contains.
///
/// # Errors
///
/// Returns `RpaError::NoFilesFound` when nothing matches, and
/// `RpaError::AmbiguousFiles` when a marker repeats under
/// [`DuplicatePolicy::Reject`].
pub fn classify_files<S: AsRef<str>>(
    folder: &Path,
    entries: &[S],
    policy: DuplicatePolicy,
) -> Result<ClassifiedFileSet, RpaError> {
    let mut set = ClassifiedFileSet::default();
    let mut matches: [Vec<String>; 3] = Default::default();

    for name in entries.iter().map(AsRef::as_ref).filter(|n| is_text_file(n)) {
        for category in FileCategory::ALL {
            if !name.contains(category.marker()) {
                continue;
            }
            matches[category.slot()].push(name.to_string());
            let keep_existing = policy == DuplicatePolicy::KeepFirst && set.get(category).is_some();
            if !keep_existing {
                set.set(category, name);
            }
        }
    }

    for category in FileCategory::ALL {
        let found = &matches[category.slot()];
        if found.len() > 1 {
            if policy == DuplicatePolicy::Reject {
                return Err(RpaError::AmbiguousFiles {
                    marker: category.marker().to_string(),
                    files: found.clone(),
                });
            }
            warn!(
                marker = category.marker(),
                files = ?found,
                kept = ?set.get(category),
                "Several files match the same marker"
            );
        }
    }

    if set.is_empty() {
        return Err(RpaError::no_files_found(folder));
    }
    Ok(set)
}

/// Finds the dated input folder on the network share.
pub struct InputLocator {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    policy: DuplicatePolicy,
}

impl InputLocator {
    /// Creates a locator rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            policy: DuplicatePolicy::default(),
        }
    }

    /// Sets the duplicate-marker policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The network root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves and scans the folder for `date`.
    ///
    /// # Errors
    ///
    /// `RpaError::NotFound` if the folder is missing or cannot be listed,
    /// `RpaError::NoFilesFound` if nothing in it is recognized.
    pub fn locate(&self, date: NaiveDate) -> Result<LocatedInput, RpaError> {
        let folder = dated_folder(&self.root, date);
        debug!(folder = %folder.display(), "Checking input folder");

        if !self.fs.is_dir(&folder) {
            return Err(RpaError::not_found(folder));
        }

        let entries = self.fs.list_files(&folder).map_err(|e| {
            warn!(folder = %folder.display(), error = %e, "Input folder could not be listed");
            RpaError::not_found(&folder)
        })?;

        let files = classify_files(&folder, &entries, self.policy)?;
        Ok(LocatedInput { folder, files })
    }
}

impl fmt::Debug for InputLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputLocator")
            .field("root", &self.root)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
