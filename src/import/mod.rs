//! Bulk category import.
//!
//! # Submodules
//!
//! - [`aggregator`] - Row error collection and the stop-on-error threshold
//! - [`importer`] - Behavior dispatch over a bunch source
//! - [`messages`] - Row error codes and message texts
//! - [`reconcile`] - Create/update/delete against a [`CategoryStore`](crate::storage::CategoryStore)
//! - [`source`] - In-memory and staged bunch sources
//! - [`types`] - Behavior, counters and run reports
//! - [`validate`] - Per-row validation

pub mod aggregator;
pub mod importer;
pub mod messages;
pub mod reconcile;
pub mod source;
pub mod types;
pub mod validate;

pub use aggregator::{ErrorAggregator, ProcessingErrorAggregator, RowError, ValidationStrategy};
pub use importer::{run_import, run_import_rows, Importer};
pub use messages::RowErrorCode;
pub use reconcile::Reconciler;
pub use source::{BunchSource, MemoryBunchSource, StagedBunchSource};
pub use types::{Behavior, ImportOutcome, ImportReport, ImportStats};
pub use validate::RowValidator;
