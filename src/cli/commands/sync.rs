//! Push, pull and remove commands.
//!
//! Each one opens the tracking database, selects courses, expands the
//! command-line paths against the content directory, and hands the batch to
//! the reconciler. Per-item failures are printed and turned into the exit
//! code once the batch is done.

use crate::catalog::YamlCatalog;
use crate::cli::workspace::{open_storage, print_report, pull_targets, push_items, remove_items, select_courses};
use crate::config::{Config, SyncContext};
use crate::error::{Error, Result};
use crate::gateway::HttpGateway;
use crate::reconcile::{pull_batch, push_batch, remove_batch, Reconciler};
use std::path::PathBuf;
use tracing::info;

/// Where a sync command runs: database, courses, output switches.
pub struct Target<'a> {
    pub db_path: Option<&'a PathBuf>,
    pub courses: &'a [String],
    pub json: bool,
    pub quiet: bool,
}

/// Execute the push command.
///
/// # Errors
///
/// Returns `BatchFailed` if any item failed, or the first store-level error.
pub fn execute_push(paths: &[String], target: &Target<'_>, ctx: &SyncContext) -> Result<()> {
    let mut storage = open_storage(target.db_path)?;
    let courses = select_courses(&storage, target.courses)?;
    let catalog = YamlCatalog::new(".");
    let targets = push_items(&catalog, paths)?;
    info!(items = targets.len(), courses = courses.len(), "push");

    let gateway = HttpGateway::new(Config::load()?)?;
    let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, ctx);
    let report = push_batch(&mut reconciler, &targets, &courses)?;
    print_report(&report, target.json, target.quiet)
}

/// Execute the pull command. Pulling writes local files, so exactly one
/// course must be selected.
///
/// # Errors
///
/// Returns `InvalidArgument` when more than one course is selected.
pub fn execute_pull(paths: &[String], target: &Target<'_>, ctx: &SyncContext) -> Result<()> {
    let mut storage = open_storage(target.db_path)?;
    let courses = select_courses(&storage, target.courses)?;
    if courses.len() > 1 {
        let codes: Vec<&str> = courses.iter().map(|c| c.code.as_str()).collect();
        return Err(Error::InvalidArgument(format!(
            "pull needs exactly one course, {} selected ({}); pick one with -c",
            courses.len(),
            codes.join(", ")
        )));
    }

    let catalog = YamlCatalog::new(".");
    let targets = pull_targets(&catalog, paths)?;
    let gateway = HttpGateway::new(Config::load()?)?;
    let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, ctx);
    let report = pull_batch(&mut reconciler, &targets, &courses)?;
    print_report(&report, target.json, target.quiet)
}

/// Execute the remove command.
///
/// # Errors
///
/// Returns `BatchFailed` if any item failed, or the first store-level error.
pub fn execute_remove(paths: &[String], target: &Target<'_>, ctx: &SyncContext) -> Result<()> {
    let mut storage = open_storage(target.db_path)?;
    let courses = select_courses(&storage, target.courses)?;
    let catalog = YamlCatalog::new(".");
    let items = remove_items(&catalog, paths)?;

    let gateway = HttpGateway::new(Config::load()?)?;
    let mut reconciler = Reconciler::new(&mut storage, &gateway, &catalog, ctx);
    let report = remove_batch(&mut reconciler, &items, &courses)?;
    print_report(&report, target.json, target.quiet)
}
