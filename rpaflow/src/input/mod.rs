//! Input discovery and staging.
//!
//! The locator finds the dated folder on the network share and classifies
//! its files; the stager mirrors them into the local scratch directory.

pub mod fs;
mod locator;
mod stager;

pub use fs::{is_text_file, FileSystem, StdFileSystem};
pub use locator::{
    classify_files, dated_folder, ClassifiedFileSet, DuplicatePolicy, FileCategory, InputLocator,
    LocatedInput,
};
pub use stager::LocalStager;
