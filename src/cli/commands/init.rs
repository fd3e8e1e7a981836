//! Initialize a course content directory.
//!
//! Creates the tracking database (`.easeldb`) and one directory per item
//! kind in the current directory. Courses are linked afterwards with
//! `easel course add`.

use crate::catalog::YamlCatalog;
use crate::config::{resolve_db_path, SyncContext};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    created_dirs: Vec<&'static str>,
    dry_run: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if a file or directory cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, ctx: &SyncContext, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path));
    let output = init(&db_path, Path::new("."), force, ctx)?;

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else if ctx.dry_run {
        println!("DRYRUN - create tracking database {}", output.database.display());
        for dir in &output.created_dirs {
            println!("DRYRUN - create directory {dir}/");
        }
    } else {
        println!("Initialized easel in {}", current_dir_display());
        println!("  Database: {}", output.database.display());
        if !output.created_dirs.is_empty() {
            println!("  Created: {}", output.created_dirs.join(", "));
        }
        println!();
        println!("Next: link a course with 'easel course add <url>'.");
    }

    Ok(())
}

fn init(db_path: &Path, root: &Path, force: bool, ctx: &SyncContext) -> Result<InitOutput> {
    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized {
            path: db_path.to_path_buf(),
        });
    }

    let catalog = YamlCatalog::new(root);
    if ctx.dry_run {
        let missing = YamlCatalog::dirs()
            .into_iter()
            .filter(|dir| !root.join(dir).is_dir())
            .collect();
        return Ok(InitOutput {
            database: db_path.to_path_buf(),
            created_dirs: missing,
            dry_run: true,
        });
    }

    if db_path.exists() {
        fs::remove_file(db_path)?;
    }
    // Opening applies the schema.
    SqliteStorage::open(db_path)?;
    let created_dirs = catalog.create_dirs()?;

    Ok(InitOutput {
        database: db_path.to_path_buf(),
        created_dirs,
        dry_run: false,
    })
}

fn current_dir_display() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string())
}
