//! SQLite storage layer for Easel.
//!
//! The tracking database lives beside the course content (`.easeldb`) and
//! holds:
//! - the identity store: one remote id per `(local_name, course_id)`
//! - the course registry
//! - audit events for every write
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, SqliteStorage};
