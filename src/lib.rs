//! Easel - keep a Canvas course in sync with a directory of YAML files
//!
//! This crate provides the core functionality for the `easel` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Item kinds, items, identities, courses, local naming
//! - [`storage`] - SQLite tracking database (identity store, course registry)
//! - [`gateway`] - Remote REST API access
//! - [`catalog`] - Local tagged-YAML files
//! - [`reconcile`] - Push, pull and remove between the two
//! - [`config`] - Credentials and per-command switches
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod reconcile;
pub mod storage;

pub use error::{Error, Result};
