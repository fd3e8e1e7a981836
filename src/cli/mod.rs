//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
mod workspace;

/// Easel - keep a Canvas course in sync with local YAML files
#[derive(Parser, Debug)]
#[command(name = "easel", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracking database path (default: ./.easeldb)
    #[arg(long, global = true, env = "EASEL_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for the audit trail
    #[arg(long, global = true, env = "EASEL_ACTOR")]
    pub actor: Option<String>,

    /// Target course by id or code (repeatable; default: every course)
    #[arg(short, long = "course", global = true)]
    pub courses: Vec<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print what would happen without changing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v requests, -vv bodies)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save the Canvas hostname and API token
    Login {
        /// Canvas hostname, e.g. canvas.example.edu
        hostname: String,

        /// API access token
        token: String,

        /// Overwrite an existing login
        #[arg(long)]
        force: bool,
    },

    /// Create the tracking database and content directories here
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Manage the courses this directory is linked to
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },

    /// Push local items to the selected courses
    Push {
        /// Item files, kind directories or syllabus.md (default: everything)
        paths: Vec<String>,

        /// Push everything unpublished
        #[arg(long)]
        hidden: bool,
    },

    /// Pull remote items into local files
    Pull {
        /// Item files or kind directories (default: everything)
        paths: Vec<String>,
    },

    /// Delete items from the selected courses and stop tracking them
    Remove {
        /// Item files or kind directories
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Show which local items are linked to which remote items
    Status {
        /// Forget the link of one local item (e.g. after it was deleted in Canvas)
        #[arg(long, value_name = "LOCAL_NAME")]
        forget: Option<String>,

        /// Show the tracking history of one local item
        #[arg(long, value_name = "LOCAL_NAME", conflicts_with = "forget")]
        history: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    /// List linked courses
    List,

    /// Link a course by URL or id
    Add {
        /// Course URL (https://host/courses/123) or id
        url: String,
    },

    /// Unlink a course and forget its tracked items
    Remove {
        /// Course id, or terms matched against the course code
        search: String,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_course_flag() {
        let cli = Cli::parse_from(["easel", "push", "-c", "101", "--course", "CS 2", "pages/"]);
        assert_eq!(cli.courses, vec!["101".to_string(), "CS 2".to_string()]);
        match cli.command {
            Commands::Push { paths, hidden } => {
                assert_eq!(paths, vec!["pages/".to_string()]);
                assert!(!hidden);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_status_history_and_forget_conflict() {
        let cli = Cli::parse_from(["easel", "status", "--history", "pages/intro.yaml"]);
        assert!(matches!(
            cli.command,
            Commands::Status { history: Some(ref name), forget: None } if name == "pages/intro.yaml"
        ));
        assert!(Cli::try_parse_from(["easel", "status", "--history", "a.yaml", "--forget", "a.yaml"]).is_err());
    }

    #[test]
    fn test_remove_requires_a_path() {
        assert!(Cli::try_parse_from(["easel", "remove"]).is_err());
    }
}
