//! Filesystem port used by the locator and the stager.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The filesystem operations input discovery and staging need.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Returns true if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Names of the regular files directly inside `dir`, sorted by name.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Creates `dir` and any missing parents.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Removes a single file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Copies `from` to `to`, preserving permissions and modification time.
    fn copy_preserving(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Makes `path` absolute without requiring it to exist.
    fn absolute(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Non-UTF-8 names cannot carry a marker; skip them.
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn copy_preserving(&self, from: &Path, to: &Path) -> io::Result<()> {
        let metadata = fs::metadata(from)?;
        let mut source = fs::File::open(from)?;
        let mut target = fs::File::create(to)?;
        io::copy(&mut source, &mut target)?;
        // Permissions go last: a read-only source would otherwise leave no
        // writable handle for the timestamp.
        target.set_modified(metadata.modified()?)?;
        drop(target);
        fs::set_permissions(to, metadata.permissions())
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        std::path::absolute(path)
    }
}

/// Returns true if `name` has a `.txt` extension, ignoring case.
#[must_use]
pub fn is_text_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}
