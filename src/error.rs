//! Error types for Easel.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Fatal vs per-item classification for batch commands
//! - Context-aware recovery hints
//! - Structured JSON output for `--json` consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Easel operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    CourseNotFound,
    NotTracked,

    // Validation (exit 4)
    AmbiguousCourse,
    AmbiguousLocalMatch,
    ReferenceResolution,
    UnknownKind,
    InvalidItem,
    InvalidArgument,

    // Ordering (exit 5)
    ParentNotPushed,

    // Sync (exit 6)
    RemoteStateDesync,
    UnexpectedResponse,

    // Config (exit 7)
    NotLoggedIn,
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
    YamlError,

    // Remote (exit 9)
    RemoteError,

    // Internal (exit 1)
    InternalError,
    BatchFailed,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CourseNotFound => "COURSE_NOT_FOUND",
            Self::NotTracked => "NOT_TRACKED",
            Self::AmbiguousCourse => "AMBIGUOUS_COURSE",
            Self::AmbiguousLocalMatch => "AMBIGUOUS_LOCAL_MATCH",
            Self::ReferenceResolution => "REFERENCE_RESOLUTION",
            Self::UnknownKind => "UNKNOWN_KIND",
            Self::InvalidItem => "INVALID_ITEM",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ParentNotPushed => "PARENT_NOT_PUSHED",
            Self::RemoteStateDesync => "REMOTE_STATE_DESYNC",
            Self::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            Self::NotLoggedIn => "NOT_LOGGED_IN",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::BatchFailed => "BATCH_FAILED",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError | Self::BatchFailed => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::CourseNotFound | Self::NotTracked => 3,
            Self::AmbiguousCourse
            | Self::AmbiguousLocalMatch
            | Self::ReferenceResolution
            | Self::UnknownKind
            | Self::InvalidItem
            | Self::InvalidArgument => 4,
            Self::ParentNotPushed => 5,
            Self::RemoteStateDesync | Self::UnexpectedResponse => 6,
            Self::NotLoggedIn | Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::RemoteError => 9,
        }
    }

    /// Whether re-running the command after fixing local input can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReferenceResolution
                | Self::ParentNotPushed
                | Self::RemoteStateDesync
                | Self::InvalidItem
                | Self::InvalidArgument
                | Self::AmbiguousCourse
                | Self::RemoteError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Easel operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `easel init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Not logged in: no config found at {path}")]
    NotLoggedIn { path: PathBuf },

    #[error("Course not found: {search}")]
    CourseNotFound { search: String },

    #[error("More than one course matches '{search}'")]
    AmbiguousCourse {
        search: String,
        /// (canvas_id, name) of each matching course.
        matches: Vec<(i64, String)>,
    },

    #[error("Cannot resolve '{reference}' referenced by {item}")]
    ReferenceResolution { item: String, reference: String },

    #[error("{item} cannot be pushed before its parent {parent} exists in course {course_id}")]
    ParentNotPushed {
        item: String,
        parent: String,
        course_id: i64,
    },

    #[error("{item} is tracked as {remote_id} in course {course_id} but no longer exists there")]
    RemoteStateDesync {
        item: String,
        course_id: i64,
        remote_id: String,
    },

    #[error("'{name}' matches more than one local record: {}", matches.join(", "))]
    AmbiguousLocalMatch { name: String, matches: Vec<String> },

    #[error("Unexpected response for {item}: missing remote id")]
    UnexpectedResponse { item: String, body: String },

    #[error("{item} is not tracked in course {course_id}")]
    NotTracked { item: String, course_id: i64 },

    #[error("Unknown item kind: {tag}")]
    UnknownKind { tag: String },

    #[error("Invalid item {path}: {reason}")]
    InvalidItem { path: String, reason: String },

    #[error("{method} {path} failed with status {status}")]
    Remote {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Some items of a batch failed; each was already reported.
    #[error("{failed} of {total} items failed")]
    BatchFailed {
        failed: usize,
        total: usize,
        /// Exit code of the first failure.
        exit_code: u8,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::NotLoggedIn { .. } => ErrorCode::NotLoggedIn,
            Self::CourseNotFound { .. } => ErrorCode::CourseNotFound,
            Self::AmbiguousCourse { .. } => ErrorCode::AmbiguousCourse,
            Self::ReferenceResolution { .. } => ErrorCode::ReferenceResolution,
            Self::ParentNotPushed { .. } => ErrorCode::ParentNotPushed,
            Self::RemoteStateDesync { .. } => ErrorCode::RemoteStateDesync,
            Self::AmbiguousLocalMatch { .. } => ErrorCode::AmbiguousLocalMatch,
            Self::UnexpectedResponse { .. } => ErrorCode::UnexpectedResponse,
            Self::NotTracked { .. } => ErrorCode::NotTracked,
            Self::UnknownKind { .. } => ErrorCode::UnknownKind,
            Self::InvalidItem { .. } => ErrorCode::InvalidItem,
            Self::Remote { .. } | Self::Http(_) => ErrorCode::RemoteError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Yaml(_) => ErrorCode::YamlError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
            Self::BatchFailed { .. } => ErrorCode::BatchFailed,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    ///
    /// A failed batch exits with the code of its first failing item.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::BatchFailed { exit_code, .. } => *exit_code,
            _ => self.error_code().exit_code(),
        }
    }

    /// Store-level failures abort the whole command.
    ///
    /// Everything else only aborts the item being processed; batch
    /// commands report it and move on to the next item.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `easel init` in your course content directory".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "{} already exists. Use `--force` to overwrite it.",
                path.display()
            )),

            Self::NotLoggedIn { .. } => {
                Some("Run `easel login <hostname> <token>` first".to_string())
            }

            Self::CourseNotFound { .. } => Some(
                "Use `easel course list` to see tracked courses, or `easel course add <url>`"
                    .to_string(),
            ),

            Self::AmbiguousCourse { matches, .. } => {
                let mut hint = String::from("Matching courses:\n");
                for (id, name) in matches {
                    hint.push_str(&format!("    {id}  {name}\n"));
                }
                hint.push_str("  Pick one and pass its id with `-c <id>`");
                Some(hint)
            }

            Self::ReferenceResolution { reference, .. } => Some(format!(
                "Make sure '{reference}' exists locally and has been pushed to this course"
            )),

            Self::ParentNotPushed { parent, .. } => Some(format!("Push {parent} first")),

            Self::RemoteStateDesync { item, course_id, .. } => Some(format!(
                "The remote copy was deleted outside easel. Clear the stale link with \
                 `easel status --forget {item} -c {course_id}` and push again."
            )),

            Self::NotTracked { item, .. } => Some(format!(
                "{item} was never pushed to this course. Use `easel status` to see tracked items."
            )),

            Self::UnknownKind { .. } => Some(
                "Valid tags: !Assignment, !AssignmentGroup, !ExternalTool, !Module, \
                 !NavigationTabs, !Page, !Quiz, !QuizQuestion"
                    .to_string(),
            ),

            Self::Remote { status, .. } if *status == 401 => Some(
                "Your token was rejected. Run `easel login --force <hostname> <token>`".to_string(),
            ),

            Self::AmbiguousLocalMatch { .. }
            | Self::UnexpectedResponse { .. }
            | Self::InvalidItem { .. }
            | Self::Remote { .. }
            | Self::Http(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_)
            | Self::BatchFailed { .. } => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
