//! Data models for Easel.
//!
//! - [`ItemKind`] and the per-kind field contracts
//! - [`Item`], a kind plus an ordered field mapping
//! - [`IdentityRecord`], the local↔remote linkage
//! - [`Course`], a registered remote course

pub mod course;
pub mod identity;
pub mod item;
pub mod kind;
pub mod naming;

pub use course::{parse_course_id, Course};
pub use identity::{IdentityRecord, RemoteId};
pub use item::{Fields, Item, Phase};
pub use kind::{IdRule, ItemKind};
