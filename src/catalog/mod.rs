//! Local catalog: the human-edited files describing course content.
//!
//! [`YamlCatalog`] stores each item as a tagged YAML document
//! (`!Assignment`, `!Quiz`, ...) under a per-kind directory. Nested kinds have
//! no files of their own; quiz questions can live in question-bank files that
//! quizzes reference.

mod file;
#[cfg(test)]
pub mod memory;
mod yaml;

pub use file::atomic_write;
pub use yaml::YamlCatalog;

use crate::error::{Error, Result};
use crate::model::{Fields, Item, ItemKind};

/// Local name of the navigation tab list.
pub const NAVIGATION_FILE: &str = "navigation.yaml";

/// Local name of the course syllabus, pushed as authored.
pub const SYLLABUS_FILE: &str = "syllabus.md";

/// Read/write access to the on-disk item representation.
///
/// Writing an item and reading it back yields the same field set.
pub trait Catalog {
    /// Read one item. `Ok(None)` when no such file exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem`/`UnknownKind` for malformed files and
    /// `AmbiguousLocalMatch` when a file holds several documents.
    fn read(&self, local_name: &str) -> Result<Option<Item>>;

    /// Persist one item under its local name.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be serialized or written.
    fn write(&self, item: &Item) -> Result<()>;

    /// Local names of every item of `kind`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind's directory cannot be read.
    fn list(&self, kind: ItemKind) -> Result<Vec<String>>;

    /// Questions held by a question file: one mapping or a list of them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem` if the file is missing or malformed.
    fn read_questions(&self, local_name: &str) -> Result<Vec<Fields>>;

    /// Visible navigation tab labels, in order. `Ok(None)` without a file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem` if the file is malformed.
    fn read_navigation(&self) -> Result<Option<Vec<String>>>;

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_navigation(&self, labels: &[String]) -> Result<()>;

    /// Syllabus body. `Ok(None)` without a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    fn read_syllabus(&self) -> Result<Option<String>>;
}

/// Find the local item of `kind` that `reference` points at.
///
/// A reference is either a local name (`assignment_groups/hw.yaml`) or the
/// item's display name (`Homework`).
///
/// # Errors
///
/// Returns `AmbiguousLocalMatch` when several items share the display name.
pub fn resolve_reference(
    catalog: &dyn Catalog,
    kind: ItemKind,
    reference: &str,
) -> Result<Option<String>> {
    if let Some(item) = catalog.read(reference)? {
        if item.kind == kind {
            return Ok(Some(item.local_name));
        }
    }

    let mut matches = Vec::new();
    for local_name in catalog.list(kind)? {
        if let Some(item) = catalog.read(&local_name)? {
            if item.display_name() == reference {
                matches.push(local_name);
            }
        }
    }

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => Err(Error::AmbiguousLocalMatch {
            name: reference.to_string(),
            matches,
        }),
    }
}
