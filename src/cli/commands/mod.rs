//! Command implementations.

pub mod completions;
pub mod course;
pub mod init;
pub mod login;
pub mod status;
pub mod sync;
pub mod version;
