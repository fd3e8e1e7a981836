//! Status command implementation.

use crate::cli::workspace::{open_storage, select_courses};
use crate::config::SyncContext;
use crate::error::{Error, Result};
use crate::model::{Course, IdentityRecord};
use crate::storage::events::Event;
use crate::storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    courses: Vec<CourseStatus>,
}

#[derive(Serialize)]
struct CourseStatus {
    #[serde(flatten)]
    course: Course,
    items: Vec<IdentityRecord>,
}

#[derive(Serialize)]
struct HistoryOutput {
    local_name: String,
    courses: Vec<CourseHistory>,
}

#[derive(Serialize)]
struct CourseHistory {
    course_id: i64,
    events: Vec<Event>,
}

#[derive(Serialize)]
struct ForgetOutput {
    local_name: String,
    forgotten: Vec<i64>,
    dry_run: bool,
}

/// Execute status command.
///
/// Without `forget` or `history`, lists the tracked items of each selected
/// course.
///
/// # Errors
///
/// Returns `NotTracked` when `forget` names an item no selected course tracks.
pub fn execute(
    db_path: Option<&PathBuf>,
    searches: &[String],
    forget: Option<&str>,
    history: Option<&str>,
    ctx: &SyncContext,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let courses = select_courses(&storage, searches)?;

    if let Some(local_name) = history {
        let local_name = local_name.strip_prefix("./").unwrap_or(local_name);
        let output = HistoryOutput {
            local_name: local_name.to_string(),
            courses: item_history(&storage, &courses, local_name)?,
        };
        if json {
            println!("{}", serde_json::to_string(&output)?);
            return Ok(());
        }
        if output.courses.is_empty() {
            println!("No history for {local_name}");
        }
        for entry in &output.courses {
            println!("{} in course {}", local_name.bold(), entry.course_id);
            for event in &entry.events {
                let when = chrono::DateTime::from_timestamp_millis(event.created_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                let change = match (&event.old_value, &event.new_value) {
                    (Some(old), Some(new)) => format!("{old} -> {new}"),
                    (None, Some(new)) => new.clone(),
                    (Some(old), None) => old.clone(),
                    (None, None) => String::new(),
                };
                println!("  {}  {:<18} {change}  {}", when.dimmed(), event.event_type, event.actor.dimmed());
            }
        }
        return Ok(());
    }

    if let Some(local_name) = forget {
        let forgotten = forget_item(&mut storage, &courses, local_name, ctx)?;
        if json {
            let output = ForgetOutput {
                local_name: local_name.to_string(),
                forgotten,
                dry_run: ctx.dry_run,
            };
            println!("{}", serde_json::to_string(&output)?);
        } else {
            let prefix = if ctx.dry_run { "DRYRUN - forget" } else { "Forgot" };
            for course_id in forgotten {
                println!("{prefix} {local_name} in course {course_id}");
            }
        }
        return Ok(());
    }

    let mut statuses = Vec::new();
    for course in courses {
        let items = storage.list_identities(Some(course.canvas_id))?;
        statuses.push(CourseStatus { course, items });
    }

    if json {
        let output = StatusOutput { courses: statuses };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    for (i, status) in statuses.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!(
            "{} {} ({} tracked)",
            status.course.code.bold(),
            status.course.name,
            status.items.len()
        );
        let width = status.items.iter().map(|r| r.local_name.len()).max().unwrap_or(0);
        for record in &status.items {
            println!("  {:<width$}  {}", record.local_name, record.remote_id.to_string().dimmed());
        }
    }
    Ok(())
}

/// Audit events of `local_name` in each selected course that has any.
fn item_history(storage: &SqliteStorage, courses: &[Course], local_name: &str) -> Result<Vec<CourseHistory>> {
    let mut history = Vec::new();
    for course in courses {
        let events = storage.identity_history(local_name, course.canvas_id, None)?;
        if !events.is_empty() {
            history.push(CourseHistory {
                course_id: course.canvas_id,
                events,
            });
        }
    }
    Ok(history)
}

/// Drop the tracking record of `local_name` in every selected course that
/// has one. Returns those course ids.
fn forget_item(
    storage: &mut SqliteStorage,
    courses: &[Course],
    local_name: &str,
    ctx: &SyncContext,
) -> Result<Vec<i64>> {
    let local_name = local_name.strip_prefix("./").unwrap_or(local_name);
    let mut forgotten = Vec::new();
    for course in courses {
        let tracked = if ctx.dry_run {
            storage.find_identity(local_name, course.canvas_id)?.is_some()
        } else {
            storage.remove_identity(local_name, course.canvas_id, &ctx.actor)?
        };
        if tracked {
            forgotten.push(course.canvas_id);
        }
    }

    match (forgotten.is_empty(), courses) {
        (true, [only]) => Err(Error::NotTracked {
            item: local_name.to_string(),
            course_id: only.canvas_id,
        }),
        (true, _) => Err(Error::InvalidArgument(format!(
            "{local_name} is not tracked in any selected course"
        ))),
        (false, _) => Ok(forgotten),
    }
}
