//! Persistence layer for category import.
//!
//! The importer only talks to a [`CategoryStore`]; [`SqliteStorage`] is the
//! shipped implementation, with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for every category write
//! - Audit events for history
//! - Staging of bunches and a record of finished runs
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{ImportHistoryEntry, MutationContext, SqliteStorage};

use crate::error::Result;
use crate::model::CategoryRecord;

/// Operations the importer needs from a category store.
///
/// Writes take the acting user so implementations can keep an audit trail.
pub trait CategoryStore {
    /// Look up a category by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_category(&self, id: i64) -> Result<Option<CategoryRecord>>;

    /// Insert a new category.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (duplicate id, constraint violation).
    fn create_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()>;

    /// Overwrite an existing category.
    ///
    /// # Errors
    ///
    /// Returns `CategoryNotFound` if the id does not exist.
    fn update_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()>;

    /// Ids of every category except the protected roots, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_sweepable_ids(&self) -> Result<Vec<i64>>;

    /// Delete one category; `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_category(&mut self, id: i64, actor: &str) -> Result<bool>;

    /// Delete exactly `ids` in one statement, returning the rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn bulk_delete_categories(&mut self, ids: &[i64], actor: &str) -> Result<usize>;
}
