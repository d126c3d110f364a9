//! SQLite storage implementation.
//!
//! This module provides the storage backend for category import using SQLite.
//! Every category write goes through [`SqliteStorage::mutate`] so that it is
//! transactional and leaves an audit event behind.

use crate::error::{Error, Result};
use crate::import::Behavior;
use crate::model::category::{Bunch, CategoryRecord, PROTECTED_CATEGORY_IDS, TABLE};
use crate::storage::events::{insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::storage::CategoryStore;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const CATEGORY_COLUMNS: &str = "entity_id, store_id, parent_id, is_active, include_in_menu, name, \
     available_sort_by, url_key, position, created_at, updated_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }

    /// Record an event carrying a free-form comment.
    pub fn record_comment(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

/// One finished import run, as recorded in `import_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportHistoryEntry {
    pub run_id: String,
    pub entity: String,
    pub behavior: String,
    pub actor: String,
    pub processed_rows: usize,
    pub invalid_rows: usize,
    pub error_count: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub started_at: i64,
    pub finished_at: i64,
}

fn map_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<CategoryRecord> {
    Ok(CategoryRecord {
        entity_id: row.get(0)?,
        store_id: row.get(1)?,
        parent_id: row.get(2)?,
        is_active: row.get(3)?,
        include_in_menu: row.get(4)?,
        name: row.get(5)?,
        available_sort_by: row.get(6)?,
        url_key: row.get(7)?,
        position: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(value: i64) -> usize {
    value.max(0) as usize
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database that must already exist.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if there is no file at `path`.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotInitialized {
                path: path.to_path_buf(),
            });
        }
        Self::open(path)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        debug!(op = %ctx.op_name, events = ctx.events.len(), "Mutation committed");

        Ok(result)
    }

    // ==================
    // Category Operations
    // ==================

    /// List all categories ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_categories(&self) -> Result<Vec<CategoryRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM {TABLE} ORDER BY entity_id ASC"
        ))?;
        let rows = stmt.query_map([], map_category)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Count all categories, protected roots included.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_categories(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(to_count(count))
    }

    // ==================
    // Staging Operations
    // ==================

    /// Stage bunches for a later run, one `import_data` row per bunch.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    pub fn stage_bunches(
        &mut self,
        entity: &str,
        behavior: Behavior,
        bunches: &[Bunch],
    ) -> Result<usize> {
        let payloads = bunches
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tx = self.conn.transaction()?;
        for payload in &payloads {
            tx.execute(
                "INSERT INTO import_data (entity, behavior, data) VALUES (?1, ?2, ?3)",
                rusqlite::params![entity, behavior.as_str(), payload],
            )?;
        }
        tx.commit()?;

        Ok(payloads.len())
    }

    /// Fetch the first staged bunch for `entity` with an id above `after_id`.
    ///
    /// # Errors
    ///
    /// Returns `Staging` if the stored JSON cannot be decoded.
    pub fn next_staged_bunch(&self, entity: &str, after_id: i64) -> Result<Option<(i64, Bunch)>> {
        let staged: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, data FROM import_data WHERE entity = ?1 AND id > ?2 ORDER BY id ASC LIMIT 1",
                rusqlite::params![entity, after_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        staged
            .map(|(id, data)| {
                serde_json::from_str::<Bunch>(&data)
                    .map(|bunch| (id, bunch))
                    .map_err(|e| Error::Staging {
                        id,
                        message: e.to_string(),
                    })
            })
            .transpose()
    }

    /// Remove all staged bunches for `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear_staged(&mut self, entity: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM import_data WHERE entity = ?1", [entity])?;
        Ok(removed)
    }

    // ==================
    // Import History
    // ==================

    /// Record a finished import run.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_import_history(&mut self, entry: &ImportHistoryEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO import_history (run_id, entity, behavior, actor, processed_rows, invalid_rows, error_count, created, updated, deleted, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                entry.run_id,
                entry.entity,
                entry.behavior,
                entry.actor,
                entry.processed_rows,
                entry.invalid_rows,
                entry.error_count,
                entry.created,
                entry.updated,
                entry.deleted,
                entry.started_at,
                entry.finished_at,
            ],
        )?;
        Ok(())
    }

    /// List recorded import runs, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_import_history(&self, limit: Option<u32>) -> Result<Vec<ImportHistoryEntry>> {
        let limit = limit.unwrap_or(50);
        let mut stmt = self.conn.prepare(
            "SELECT run_id, entity, behavior, actor, processed_rows, invalid_rows, error_count, created, updated, deleted, started_at, finished_at
             FROM import_history ORDER BY finished_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(ImportHistoryEntry {
                run_id: row.get(0)?,
                entity: row.get(1)?,
                behavior: row.get(2)?,
                actor: row.get(3)?,
                processed_rows: to_count(row.get(4)?),
                invalid_rows: to_count(row.get(5)?),
                error_count: to_count(row.get(6)?),
                created: to_count(row.get(7)?),
                updated: to_count(row.get(8)?),
                deleted: to_count(row.get(9)?),
                started_at: row.get(10)?,
                finished_at: row.get(11)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

impl CategoryStore for SqliteStorage {
    fn get_category(&self, id: i64) -> Result<Option<CategoryRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM {TABLE} WHERE entity_id = ?1"
        ))?;
        let category = stmt.query_row([id], map_category).optional()?;
        Ok(category)
    }

    fn create_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()> {
        self.mutate("create_category", actor, |tx, ctx| {
            tx.execute(
                &format!(
                    "INSERT INTO {TABLE} ({CATEGORY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                rusqlite::params![
                    record.entity_id,
                    record.store_id,
                    record.parent_id,
                    record.is_active,
                    record.include_in_menu,
                    record.name,
                    record.available_sort_by,
                    record.url_key,
                    record.position,
                    record.created_at,
                    record.updated_at,
                ],
            )?;

            ctx.record_event("category", &record.entity_id.to_string(), EventType::CategoryCreated);
            Ok(())
        })
    }

    fn update_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()> {
        self.mutate("update_category", actor, |tx, ctx| {
            let old_name: Option<String> = tx
                .query_row(
                    &format!("SELECT name FROM {TABLE} WHERE entity_id = ?1"),
                    [record.entity_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(old_name) = old_name else {
                return Err(Error::CategoryNotFound {
                    id: record.entity_id,
                });
            };

            tx.execute(
                &format!(
                    "UPDATE {TABLE} SET
                       store_id = ?2,
                       parent_id = ?3,
                       is_active = ?4,
                       include_in_menu = ?5,
                       name = ?6,
                       available_sort_by = ?7,
                       url_key = ?8,
                       position = ?9,
                       updated_at = ?10
                     WHERE entity_id = ?1"
                ),
                rusqlite::params![
                    record.entity_id,
                    record.store_id,
                    record.parent_id,
                    record.is_active,
                    record.include_in_menu,
                    record.name,
                    record.available_sort_by,
                    record.url_key,
                    record.position,
                    record.updated_at,
                ],
            )?;

            ctx.record_change(
                "category",
                &record.entity_id.to_string(),
                EventType::CategoryUpdated,
                Some(old_name),
                Some(record.name.clone()),
            );
            Ok(())
        })
    }

    fn list_sweepable_ids(&self) -> Result<Vec<i64>> {
        let placeholders = vec!["?"; PROTECTED_CATEGORY_IDS.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT entity_id FROM {TABLE} WHERE entity_id NOT IN ({placeholders}) ORDER BY entity_id ASC"
        ))?;
        let ids = stmt.query_map(
            rusqlite::params_from_iter(PROTECTED_CATEGORY_IDS.iter()),
            |row| row.get(0),
        )?;
        ids.collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(Error::from)
    }

    fn delete_category(&mut self, id: i64, actor: &str) -> Result<bool> {
        self.mutate("delete_category", actor, |tx, ctx| {
            let removed = tx.execute(&format!("DELETE FROM {TABLE} WHERE entity_id = ?1"), [id])?;
            if removed > 0 {
                ctx.record_event("category", &id.to_string(), EventType::CategoryDeleted);
            }
            Ok(removed > 0)
        })
    }

    fn bulk_delete_categories(&mut self, ids: &[i64], actor: &str) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        self.mutate("bulk_delete_categories", actor, |tx, ctx| {
            let removed = tx.execute(
                &format!("DELETE FROM {TABLE} WHERE entity_id IN ({placeholders})"),
                rusqlite::params_from_iter(ids.iter()),
            )?;

            ctx.record_comment(
                "category",
                "*",
                EventType::CategoriesBulkDeleted,
                &format!("requested {}, removed {removed}", ids.len()),
            );
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::ImportRow;
    use crate::storage::events::get_events;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn make_category(id: i64, name: &str) -> CategoryRecord {
        CategoryRecord {
            entity_id: id,
            store_id: 0,
            parent_id: 2,
            is_active: true,
            include_in_menu: true,
            name: name.to_string(),
            available_sort_by: None,
            url_key: name.to_lowercase(),
            position: 4,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("missing.db");

        let err = SqliteStorage::open_existing(&db_path).unwrap_err();
        assert!(matches!(err, Error::NotInitialized { .. }));

        SqliteStorage::open(&db_path).unwrap();
        assert!(SqliteStorage::open_existing(&db_path).is_ok());
    }

    #[test]
    fn test_category_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        storage
            .create_category(&make_category(5, "Shoes"), "tester")
            .unwrap();
        let loaded = storage.get_category(5).unwrap().unwrap();
        assert_eq!(loaded.name, "Shoes");
        assert_eq!(loaded.position, 4);

        let mut changed = loaded.clone();
        changed.name = "Boots".to_string();
        storage.update_category(&changed, "tester").unwrap();
        assert_eq!(storage.get_category(5).unwrap().unwrap().name, "Boots");

        assert!(storage.delete_category(5, "tester").unwrap());
        assert!(!storage.delete_category(5, "tester").unwrap());
        assert!(storage.get_category(5).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_category() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .update_category(&make_category(77, "Ghost"), "tester")
            .unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound { id: 77 }));
    }

    #[test]
    fn test_mutations_write_audit_events() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .create_category(&make_category(8, "Hats"), "tester")
            .unwrap();
        let mut renamed = make_category(8, "Caps");
        renamed.updated_at = 2000;
        storage.update_category(&renamed, "tester").unwrap();

        let events = get_events(storage.conn(), "category", "8", None).unwrap();
        assert_eq!(events.len(), 2);
        let update = events
            .iter()
            .find(|e| e.event_type == EventType::CategoryUpdated)
            .unwrap();
        assert_eq!(update.old_value.as_deref(), Some("Hats"));
        assert_eq!(update.new_value.as_deref(), Some("Caps"));
    }

    #[test]
    fn test_sweepable_ids_exclude_roots() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for id in [1, 2, 3, 4] {
            storage
                .create_category(&make_category(id, &format!("C{id}")), "tester")
                .unwrap();
        }

        assert_eq!(storage.list_sweepable_ids().unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_bulk_delete_counts_removed_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for id in [3, 4, 5] {
            storage
                .create_category(&make_category(id, &format!("C{id}")), "tester")
                .unwrap();
        }

        let removed = storage.bulk_delete_categories(&[3, 5, 9], "tester").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.count_categories().unwrap(), 1);
        assert_eq!(storage.bulk_delete_categories(&[], "tester").unwrap(), 0);
    }

    #[test]
    fn test_stage_and_read_bunches() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut first: Bunch = BTreeMap::new();
        first.insert(0, ImportRow::new().with("entity_id", "3"));
        let mut second: Bunch = BTreeMap::new();
        second.insert(1, ImportRow::new().with("entity_id", "4"));

        let staged = storage
            .stage_bunches("import_category", Behavior::Append, &[first.clone(), second.clone()])
            .unwrap();
        assert_eq!(staged, 2);

        let (id, bunch) = storage.next_staged_bunch("import_category", 0).unwrap().unwrap();
        assert_eq!(bunch, first);
        let (id, bunch) = storage.next_staged_bunch("import_category", id).unwrap().unwrap();
        assert_eq!(bunch, second);
        assert!(storage.next_staged_bunch("import_category", id).unwrap().is_none());

        assert_eq!(storage.clear_staged("import_category").unwrap(), 2);
    }

    #[test]
    fn test_corrupt_staged_bunch() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO import_data (entity, behavior, data) VALUES ('import_category', 'append', 'not json')",
                [],
            )
            .unwrap();

        let err = storage.next_staged_bunch("import_category", 0).unwrap_err();
        assert!(matches!(err, Error::Staging { .. }));
    }

    #[test]
    fn test_import_history_round_trip() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let entry = ImportHistoryEntry {
            run_id: "run-1".to_string(),
            entity: "import_category".to_string(),
            behavior: "append".to_string(),
            actor: "tester".to_string(),
            processed_rows: 3,
            invalid_rows: 1,
            error_count: 2,
            created: 1,
            updated: 1,
            deleted: 0,
            started_at: 10,
            finished_at: 20,
        };
        storage.record_import_history(&entry).unwrap();

        let history = storage.list_import_history(Some(5)).unwrap();
        assert_eq!(history, vec![entry]);
    }
}
