//! Multi-item, multi-course drivers.
//!
//! A failing item is reported and the batch moves on; store-level failures
//! abort the whole batch. Work already done is kept either way.

use serde::Serialize;
use tracing::warn;

use super::{Outcome, Reconciler};
use crate::catalog::{NAVIGATION_FILE, SYLLABUS_FILE};
use crate::error::{Error, Result};
use crate::model::{Course, Item, ItemKind};

/// What to push: one catalog item, or the course syllabus.
#[derive(Debug, Clone)]
pub enum PushTarget {
    Item(Item),
    Syllabus,
}

impl PushTarget {
    /// Local name reported for this target.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Item(item) => &item.local_name,
            Self::Syllabus => SYLLABUS_FILE,
        }
    }
}

/// What to pull: every remote item of a kind, or one tracked local item.
#[derive(Debug, Clone)]
pub enum PullTarget {
    Kind(ItemKind),
    Item(Item),
}

#[derive(Debug, Clone, Serialize)]
pub struct Done {
    pub item: String,
    pub course_id: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub item: String,
    pub course_id: i64,
    pub code: String,
    pub exit_code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Failure {
    fn new(item: &str, course_id: i64, error: &Error) -> Self {
        Self {
            item: item.to_string(),
            course_id,
            code: error.error_code().as_str().to_string(),
            exit_code: error.exit_code(),
            message: error.to_string(),
            hint: error.hint(),
        }
    }
}

/// Per-item results of a batch command.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<Done>,
    pub failed: Vec<Failure>,
    /// Dry-run statements, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<String>,
}

impl BatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// `BatchFailed` carrying the first failure's exit code, if anything failed.
    #[must_use]
    pub fn to_error(&self) -> Option<Error> {
        self.failed.first().map(|first| Error::BatchFailed {
            failed: self.failed.len(),
            total: self.failed.len() + self.succeeded.len(),
            exit_code: first.exit_code,
        })
    }

    fn record(&mut self, item: &str, course_id: i64, result: Result<Outcome>) -> Result<()> {
        match result {
            Ok(outcome) => self.succeeded.push(Done {
                item: item.to_string(),
                course_id,
                outcome,
            }),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(item, course_id, error = %e, "item failed");
                self.failed.push(Failure::new(item, course_id, &e));
            }
        }
        Ok(())
    }
}

/// Push every target to every course, target by target.
///
/// # Errors
///
/// Returns the first fatal (store-level) error.
pub fn push_batch(reconciler: &mut Reconciler<'_>, targets: &[PushTarget], courses: &[Course]) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for target in targets {
        for course in courses {
            let result = match target {
                PushTarget::Item(item) => reconciler.push(item, course),
                PushTarget::Syllabus => reconciler.push_syllabus(course),
            };
            report.planned.extend(reconciler.take_planned());
            report.record(target.label(), course.canvas_id, result)?;
        }
    }
    Ok(report)
}

/// Remove every item from every course.
///
/// # Errors
///
/// Returns the first fatal (store-level) error.
pub fn remove_batch(reconciler: &mut Reconciler<'_>, items: &[Item], courses: &[Course]) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for item in items {
        for course in courses {
            let result = reconciler.remove(item, course);
            report.planned.extend(reconciler.take_planned());
            report.record(&item.local_name, course.canvas_id, result)?;
        }
    }
    Ok(report)
}

/// Pull every target from every course.
///
/// # Errors
///
/// Returns the first fatal (store-level) error.
pub fn pull_batch(
    reconciler: &mut Reconciler<'_>,
    targets: &[PullTarget],
    courses: &[Course],
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for target in targets {
        for course in courses {
            let course_id = course.canvas_id;
            match target {
                PullTarget::Kind(ItemKind::NavigationTab) => {
                    let result = reconciler.pull_navigation(course).map(|_| Outcome::Pulled);
                    report.planned.extend(reconciler.take_planned());
                    report.record(NAVIGATION_FILE, course_id, result)?;
                }
                PullTarget::Item(item) if item.kind == ItemKind::NavigationTab => {
                    let result = reconciler.pull_navigation(course).map(|_| Outcome::Pulled);
                    report.planned.extend(reconciler.take_planned());
                    report.record(&item.local_name, course_id, result)?;
                }
                PullTarget::Kind(kind) => {
                    let label = kind.dir().unwrap_or(kind.collection());
                    match reconciler.pull_all(*kind, course) {
                        Ok(pulled) => {
                            for result in pulled {
                                match result {
                                    Ok(item) => report.record(&item.local_name, course_id, Ok(Outcome::Pulled))?,
                                    Err(e) => report.record(label, course_id, Err(e))?,
                                }
                            }
                        }
                        Err(e) => report.record(label, course_id, Err(e))?,
                    }
                    report.planned.extend(reconciler.take_planned());
                }
                PullTarget::Item(item) => {
                    let result = reconciler.pull_item(item, course).map(|_| Outcome::Pulled);
                    report.planned.extend(reconciler.take_planned());
                    report.record(&item.local_name, course_id, result)?;
                }
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::config::SyncContext;
    use crate::gateway::recording::RecordingGateway;
    use crate::model::RemoteId;
    use crate::storage::SqliteStorage;
    use serde_json::{json, Value};

    fn course(canvas_id: i64) -> Course {
        Course {
            canvas_id,
            name: format!("Section {canvas_id}"),
            code: format!("CS 101-{canvas_id}"),
            workflow_state: "available".to_string(),
        }
    }

    fn item(kind: ItemKind, local_name: &str, fields: Value) -> Item {
        match fields {
            Value::Object(fields) => Item::with_fields(kind, local_name, fields),
            _ => Item::new(kind, local_name),
        }
    }

    #[test]
    fn test_push_batch_continues_past_failures() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        gateway.reply("POST", "/api/v1/courses/101/pages", json!({"url": "intro"}));
        gateway.reply("POST", "/api/v1/courses/202/pages", json!({"url": "intro"}));

        let targets = vec![
            PushTarget::Item(item(
                ItemKind::Assignment,
                "assignments/lab.yaml",
                json!({"name": "Lab", "assignment_group": "Labs"}),
            )),
            PushTarget::Item(item(ItemKind::Page, "pages/intro.yaml", json!({"title": "Intro"}))),
        ];
        let courses = vec![course(101), course(202)];

        let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let report = push_batch(&mut reconciler, &targets, &courses).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].code, "REFERENCE_RESOLUTION");
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(
            report.succeeded[1].outcome,
            Outcome::Created { remote_id: RemoteId::from("intro") }
        );
        assert_eq!(report.succeeded[1].course_id, 202);
        assert_eq!(storage.list_identities(None).unwrap().len(), 2);
    }

    #[test]
    fn test_push_batch_sends_syllabus_to_each_course() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog.set_syllabus("Welcome");

        let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let report = push_batch(&mut reconciler, &[PushTarget::Syllabus], &[course(101), course(202)]).unwrap();

        assert!(report.is_success());
        let items: Vec<(&str, i64)> = report
            .succeeded
            .iter()
            .map(|done| (done.item.as_str(), done.course_id))
            .collect();
        assert_eq!(items, vec![("syllabus.md", 101), ("syllabus.md", 202)]);
        assert_eq!(gateway.count("PUT", "/api/v1/courses/202"), 1);
    }

    #[test]
    fn test_remove_batch_reports_untracked() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        storage.upsert_identity("pages/intro.yaml", 101, &RemoteId::from("intro"), "test").unwrap();

        let items = vec![Item::new(ItemKind::Page, "pages/intro.yaml")];
        let courses = vec![course(101), course(202)];
        let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let report = remove_batch(&mut reconciler, &items, &courses).unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "NOT_TRACKED");
        assert_eq!(report.failed[0].course_id, 202);
        assert!(matches!(
            report.to_error(),
            Some(Error::BatchFailed { failed: 1, total: 2, exit_code: 3 })
        ));
        assert_eq!(gateway.writes().len(), 1);
    }

    #[test]
    fn test_pull_batch_collects_planned_statements() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::new(true, false, "test");
        gateway.reply(
            "GET",
            "/api/v1/courses/101/assignment_groups",
            json!([{"id": 7, "name": "Homework"}]),
        );

        let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let report = pull_batch(
            &mut reconciler,
            &[PullTarget::Kind(ItemKind::AssignmentGroup)],
            &[course(101)],
        )
        .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].item, "assignment_groups/homework.yaml");
        assert_eq!(report.planned.len(), 2);
        assert_eq!(catalog.writes(), 0);
        assert!(storage.list_identities(None).unwrap().is_empty());
    }
}
