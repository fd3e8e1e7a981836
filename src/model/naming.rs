//! Local name conventions.

use super::kind::ItemKind;

/// Joins a parent's local name to a child discriminator.
pub const CHILD_DELIMITER: &str = "--";

/// File name for an item pulled without a local counterpart.
///
/// Lowercased, spaces become `_` and slashes become `-`, placed under the
/// kind's directory. Kinds without a directory get a bare file name.
#[must_use]
pub fn synthesize_local_name(kind: ItemKind, display: &str) -> String {
    let slug: String = display
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            c => c,
        })
        .collect();

    match kind.dir() {
        Some(dir) => format!("{dir}/{slug}.yaml"),
        None => format!("{slug}.yaml"),
    }
}

#[must_use]
pub fn child_name(parent: &str, discriminator: &str) -> String {
    format!("{parent}{CHILD_DELIMITER}{discriminator}")
}

/// Prefix shared by every child of `parent`.
#[must_use]
pub fn child_prefix(parent: &str) -> String {
    format!("{parent}{CHILD_DELIMITER}")
}

/// Split a child name into parent and discriminator.
///
/// The parent is always a complete file name, so a `--` inside a plain
/// file name such as `pages/week--1.yaml` does not make it a child.
#[must_use]
pub fn split_child(local_name: &str) -> Option<(&str, &str)> {
    let at = local_name.find(&format!(".yaml{CHILD_DELIMITER}"))? + ".yaml".len();
    Some((&local_name[..at], &local_name[at + CHILD_DELIMITER.len()..]))
}

/// Kind implied by a local name's location.
///
/// Top-level names resolve through their directory; child names resolve to
/// the nested kind of their parent.
#[must_use]
pub fn kind_of(local_name: &str) -> Option<ItemKind> {
    if let Some((parent, _)) = split_child(local_name) {
        return kind_of(parent).and_then(|kind| kind.child_kind());
    }
    let (dir, _) = local_name.split_once('/')?;
    ItemKind::from_dir(dir)
}
