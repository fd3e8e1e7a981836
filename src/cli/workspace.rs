//! Shared setup for commands that work inside a course content directory.

use std::collections::HashSet;
use std::path::PathBuf;

use colored::Colorize;
use tracing::debug;

use crate::catalog::{Catalog, NAVIGATION_FILE, SYLLABUS_FILE};
use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::model::{naming, Course, Item, ItemKind};
use crate::reconcile::{BatchReport, PullTarget, PushTarget};
use crate::storage::SqliteStorage;

/// Open the tracking database, which `easel init` must have created.
///
/// # Errors
///
/// Returns `NotInitialized` if the database file does not exist.
pub fn open_storage(db: Option<&PathBuf>) -> Result<SqliteStorage> {
    let path = resolve_db_path(db.map(PathBuf::as_path));
    if !path.exists() {
        return Err(Error::NotInitialized);
    }
    SqliteStorage::open(&path)
}

/// Courses selected by the `-c` searches, or every linked course.
///
/// # Errors
///
/// Returns `CourseNotFound` for a search that matches nothing and
/// `InvalidArgument` when no course is linked at all.
pub fn select_courses(storage: &SqliteStorage, searches: &[String]) -> Result<Vec<Course>> {
    if searches.is_empty() {
        let courses = storage.list_courses()?;
        if courses.is_empty() {
            return Err(Error::InvalidArgument(
                "no courses are linked here; run `easel course add <url>` first".to_string(),
            ));
        }
        return Ok(courses);
    }

    let mut seen = HashSet::new();
    let mut courses = Vec::new();
    for search in searches {
        let matches = storage.match_courses(search)?;
        if matches.is_empty() {
            return Err(Error::CourseNotFound {
                search: search.clone(),
            });
        }
        for course in matches {
            if seen.insert(course.canvas_id) {
                courses.push(course);
            }
        }
    }
    Ok(courses)
}

/// `./pages/*` and `pages/` both mean `pages`.
fn normalize(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_end_matches('*').trim_end_matches('/')
}

/// Every item file of one kind directory.
fn items_of_kind(catalog: &dyn Catalog, kind: ItemKind) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    for local_name in catalog.list(kind)? {
        match catalog.read(&local_name)? {
            Some(item) if item.kind == kind => items.push(item),
            Some(other) => debug!(local_name, kind = ?other.kind, "skipping non-item file"),
            None => {}
        }
    }
    Ok(items)
}

/// Items to push: the named files and directories, or everything.
///
/// # Errors
///
/// Returns `InvalidItem` for a path that is neither an item file nor a
/// kind directory.
pub fn push_items(catalog: &dyn Catalog, paths: &[String]) -> Result<Vec<PushTarget>> {
    if paths.is_empty() {
        let mut targets = Vec::new();
        if catalog.read_syllabus()?.is_some() {
            targets.push(PushTarget::Syllabus);
        }
        for kind in ItemKind::ALL.into_iter().filter(ItemKind::catalog_tracked) {
            targets.extend(items_of_kind(catalog, kind)?.into_iter().map(PushTarget::Item));
        }
        if catalog.read_navigation()?.is_some() {
            targets.push(PushTarget::Item(Item::new(ItemKind::NavigationTab, NAVIGATION_FILE)));
        }
        return Ok(targets);
    }

    let mut targets = Vec::new();
    for path in paths {
        if normalize(path) == SYLLABUS_FILE {
            targets.push(PushTarget::Syllabus);
        } else {
            targets.extend(expand(catalog, std::slice::from_ref(path), false)?.into_iter().map(PushTarget::Item));
        }
    }
    Ok(targets)
}

/// Items to remove. Files that no longer exist locally are still accepted
/// when their kind can be told from the name.
///
/// # Errors
///
/// Returns `InvalidArgument` for a name whose kind cannot be told.
pub fn remove_items(catalog: &dyn Catalog, paths: &[String]) -> Result<Vec<Item>> {
    expand(catalog, paths, true)
}

/// What to pull: the named files and directories, or every kind.
///
/// # Errors
///
/// Returns `InvalidArgument` for a name whose kind cannot be told.
pub fn pull_targets(catalog: &dyn Catalog, paths: &[String]) -> Result<Vec<PullTarget>> {
    if paths.is_empty() {
        return Ok(ItemKind::ALL
            .into_iter()
            .filter(|kind| kind.catalog_tracked() || *kind == ItemKind::NavigationTab)
            .map(PullTarget::Kind)
            .collect());
    }

    let mut targets = Vec::new();
    for path in paths {
        let path = normalize(path);
        match ItemKind::from_dir(path) {
            Some(kind) => targets.push(PullTarget::Kind(kind)),
            None => targets.extend(expand(catalog, &[path.to_string()], true)?.into_iter().map(PullTarget::Item)),
        }
    }
    Ok(targets)
}

fn expand(catalog: &dyn Catalog, paths: &[String], allow_missing: bool) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    for path in paths {
        let path = normalize(path);
        if path == SYLLABUS_FILE {
            return Err(Error::InvalidArgument(format!(
                "{SYLLABUS_FILE} is pushed as a whole and cannot be removed or pulled"
            )));
        }
        if path == NAVIGATION_FILE {
            items.push(Item::new(ItemKind::NavigationTab, NAVIGATION_FILE));
            continue;
        }
        if let Some(kind) = ItemKind::from_dir(path) {
            items.extend(items_of_kind(catalog, kind)?);
            continue;
        }

        match catalog.read(path)? {
            Some(item) if item.kind.catalog_tracked() => items.push(item),
            Some(item) => {
                return Err(Error::InvalidItem {
                    path: path.to_string(),
                    reason: format!("{} files are not items of their own", item.kind.tag()),
                });
            }
            None if allow_missing => {
                let kind = naming::kind_of(path).ok_or_else(|| {
                    Error::InvalidArgument(format!("cannot tell what kind of item {path} is"))
                })?;
                items.push(Item::new(kind, path));
            }
            None => {
                return Err(Error::InvalidItem {
                    path: path.to_string(),
                    reason: "file not found".to_string(),
                });
            }
        }
    }
    Ok(items)
}

/// Print a batch report and turn its failures into the command's error.
///
/// # Errors
///
/// Returns `BatchFailed` if any item failed.
pub fn print_report(report: &BatchReport, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return report.to_error().map_or(Ok(()), Err);
    }

    for line in &report.planned {
        println!("DRYRUN - {line}");
    }
    if !quiet {
        for done in &report.succeeded {
            println!("{} {} [{}]: {}", "ok".green(), done.item, done.course_id, done.outcome);
        }
    }
    for failure in &report.failed {
        eprintln!(
            "{} {} [{}]: {}",
            "failed".red().bold(),
            failure.item,
            failure.course_id,
            failure.message
        );
        if let Some(hint) = &failure.hint {
            eprintln!("  Hint: {hint}");
        }
    }

    report.to_error().map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use serde_json::json;

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        for (kind, name, fields) in [
            (ItemKind::Page, "pages/intro.yaml", json!({"title": "Intro"})),
            (ItemKind::Page, "pages/syllabus.yaml", json!({"title": "Syllabus"})),
            (ItemKind::AssignmentGroup, "assignment_groups/hw.yaml", json!({"name": "Homework"})),
            (ItemKind::Module, "modules/week1.yaml", json!({"name": "Week 1"})),
        ] {
            let serde_json::Value::Object(fields) = fields else { unreachable!() };
            catalog.write(&Item::with_fields(kind, name, fields)).unwrap();
        }
        catalog
    }

    fn names(targets: &[PushTarget]) -> Vec<&str> {
        targets.iter().map(PushTarget::label).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("./pages/*"), "pages");
        assert_eq!(normalize("pages/"), "pages");
        assert_eq!(normalize("pages/intro.yaml"), "pages/intro.yaml");
    }

    #[test]
    fn test_push_everything_in_push_order() {
        let catalog = catalog();
        let items = push_items(&catalog, &[]).unwrap();
        assert_eq!(
            names(&items),
            vec![
                "assignment_groups/hw.yaml",
                "pages/intro.yaml",
                "pages/syllabus.yaml",
                "modules/week1.yaml",
            ]
        );

        catalog.set_navigation(&["Modules"]);
        catalog.set_syllabus("Welcome");
        let targets = push_items(&catalog, &[]).unwrap();
        assert!(matches!(targets.first(), Some(PushTarget::Syllabus)));
        assert!(matches!(targets.last(), Some(PushTarget::Item(item)) if item.kind == ItemKind::NavigationTab));
        assert_eq!(targets.len(), 6);
    }

    #[test]
    fn test_push_named_syllabus() {
        let catalog = catalog();
        let targets = push_items(&catalog, &["./syllabus.md".to_string(), "pages/intro.yaml".to_string()]).unwrap();
        assert_eq!(names(&targets), vec!["syllabus.md", "pages/intro.yaml"]);
        assert!(matches!(targets[0], PushTarget::Syllabus));
    }

    #[test]
    fn test_push_expands_directories() {
        let catalog = catalog();
        let items = push_items(&catalog, &["./pages/*".to_string(), "modules/week1.yaml".to_string()]).unwrap();
        assert_eq!(
            names(&items),
            vec!["pages/intro.yaml", "pages/syllabus.yaml", "modules/week1.yaml"]
        );
        assert!(matches!(
            push_items(&catalog, &["pages/gone.yaml".to_string()]),
            Err(Error::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_remove_accepts_deleted_files() {
        let catalog = catalog();
        let items = remove_items(&catalog, &["pages/gone.yaml".to_string()]).unwrap();
        assert_eq!(items[0].kind, ItemKind::Page);
        assert!(matches!(
            remove_items(&catalog, &["notes/todo.yaml".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            remove_items(&catalog, &["syllabus.md".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pull_targets() {
        let catalog = catalog();
        let all = pull_targets(&catalog, &[]).unwrap();
        assert_eq!(all.len(), 7);
        assert!(matches!(all.last(), Some(PullTarget::Kind(ItemKind::NavigationTab))));

        let some = pull_targets(&catalog, &["pages/".to_string(), "pages/intro.yaml".to_string()]).unwrap();
        assert!(matches!(some[0], PullTarget::Kind(ItemKind::Page)));
        assert!(matches!(&some[1], PullTarget::Item(item) if item.local_name == "pages/intro.yaml"));
    }

    #[test]
    fn test_select_courses() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(select_courses(&storage, &[]), Err(Error::InvalidArgument(_))));

        for (id, code) in [(101, "CS 101-01"), (202, "CS 101-02"), (303, "MATH 2")] {
            let course = Course {
                canvas_id: id,
                name: format!("Course {id}"),
                code: code.to_string(),
                workflow_state: "available".to_string(),
            };
            storage.add_course(&course, "test").unwrap();
        }

        assert_eq!(select_courses(&storage, &[]).unwrap().len(), 3);
        let picked = select_courses(&storage, &["CS 101".to_string(), "202".to_string()]).unwrap();
        let ids: Vec<i64> = picked.iter().map(|c| c.canvas_id).collect();
        assert_eq!(ids, vec![101, 202]);
        assert!(matches!(
            select_courses(&storage, &["BIO".to_string()]),
            Err(Error::CourseNotFound { .. })
        ));
    }
}
