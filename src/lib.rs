//! Bulk category import.
//!
//! Validates tabular category rows and applies them to a persistent store
//! with one of three behaviors: append, replace or delete.
//!
//! # Architecture
//!
//! - [`import`] - Validation, error aggregation, reconciliation and runs
//! - [`model`] - Import rows and category records
//! - [`storage`] - SQLite database layer
//! - [`config`] - Run configuration and database location
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod model;
pub mod storage;

pub use error::{Error, Result};
