//! Course registry commands: list, add, remove.

use crate::cli::workspace::open_storage;
use crate::cli::CourseCommands;
use crate::config::{Config, SyncContext};
use crate::error::{Error, Result};
use crate::gateway::{course_path, Gateway, HttpGateway};
use crate::model::{parse_course_id, Course};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct CourseListOutput {
    courses: Vec<Course>,
    count: usize,
}

#[derive(Serialize)]
struct CourseChangeOutput<'a> {
    action: &'a str,
    course: Course,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleared_identities: Option<usize>,
    dry_run: bool,
}

/// Execute a course command.
///
/// # Errors
///
/// Returns an error if the database is missing or the operation fails.
pub fn execute(command: &CourseCommands, db_path: Option<&PathBuf>, ctx: &SyncContext, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    match command {
        CourseCommands::List => {
            let courses = storage.list_courses()?;
            if json {
                let output = CourseListOutput {
                    count: courses.len(),
                    courses,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else if courses.is_empty() {
                println!("No courses linked. Add one with `easel course add <url>`.");
            } else {
                for course in &courses {
                    println!("{course}");
                }
            }
            Ok(())
        }
        CourseCommands::Add { url } => {
            let gateway = HttpGateway::new(Config::load()?)?;
            let course = add(&mut storage, &gateway, url, ctx)?;
            print_change("add", course, None, ctx, json)
        }
        CourseCommands::Remove { search } => {
            let (course, cleared) = remove(&mut storage, search, ctx)?;
            print_change("remove", course, Some(cleared), ctx, json)
        }
    }
}

fn print_change(action: &str, course: Course, cleared: Option<usize>, ctx: &SyncContext, json: bool) -> Result<()> {
    if json {
        let output = CourseChangeOutput {
            action,
            course,
            cleared_identities: cleared,
            dry_run: ctx.dry_run,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if ctx.dry_run {
        println!("DRYRUN - {action} course {course}");
    } else {
        match cleared {
            Some(n) => println!("Removed course {} ({n} tracked items forgotten)", course.code),
            None => println!("Added course {}: {}", course.canvas_id, course.name),
        }
    }
    Ok(())
}

/// Look the course up remotely and register it.
fn add(storage: &mut SqliteStorage, gateway: &dyn Gateway, url: &str, ctx: &SyncContext) -> Result<Course> {
    let canvas_id = parse_course_id(url)?;
    if storage.get_course(canvas_id)?.is_some() {
        return Err(Error::InvalidArgument(format!("Course {canvas_id} is already added")));
    }

    let course = Course::from_remote(&gateway.get(&course_path(canvas_id), &[])?)?;
    if !ctx.dry_run {
        storage.add_course(&course, &ctx.actor)?;
    }
    Ok(course)
}

/// Unregister exactly one course and forget its tracked items.
fn remove(storage: &mut SqliteStorage, search: &str, ctx: &SyncContext) -> Result<(Course, usize)> {
    let course = storage.resolve_course(search)?;
    let cleared = if ctx.dry_run {
        storage.list_identities(Some(course.canvas_id))?.len()
    } else {
        storage.remove_course(course.canvas_id, &ctx.actor)?
    };
    Ok((course, cleared))
}
