//! Persistence reconciliation.
//!
//! Applies validated rows to a [`CategoryStore`] and keeps the run counters.
//! Counters live on the reconciler so they add up across bunches.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::types::ImportStats;
use crate::error::Result;
use crate::model::category::{CategoryRecord, CategoryRow};
use crate::storage::CategoryStore;

pub struct Reconciler<'a, S: CategoryStore + ?Sized> {
    store: &'a mut S,
    actor: String,
    stats: ImportStats,
}

impl<'a, S: CategoryStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a mut S, actor: &str) -> Self {
        Self {
            store,
            actor: actor.to_string(),
            stats: ImportStats::default(),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Update each row's category if it exists, create it otherwise.
    ///
    /// Position is never assigned from a row: updates keep the stored value
    /// and creates start at 0.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error; rows before it stay written.
    pub fn reconcile(&mut self, rows: &[CategoryRow]) -> Result<()> {
        for row in rows {
            match self.store.get_category(row.entity_id)? {
                Some(mut existing) => {
                    existing.apply_row(row)?;
                    self.store.update_category(&existing, &self.actor)?;
                    self.stats.updated += 1;
                    debug!(entity_id = row.entity_id, "Updated category");
                }
                None => {
                    let record = CategoryRecord::from_row(row)?;
                    self.store.create_category(&record, &self.actor)?;
                    self.stats.created += 1;
                    debug!(entity_id = row.entity_id, "Created category");
                }
            }
        }
        Ok(())
    }

    /// Delete every non-protected category whose id is in `candidates`.
    ///
    /// Returns the number deleted by this sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn delete_sweep(&mut self, candidates: &[i64]) -> Result<usize> {
        let wanted: BTreeSet<i64> = candidates.iter().copied().collect();
        let mut removed = 0;

        for id in self.store.list_sweepable_ids()? {
            if !wanted.contains(&id) {
                continue;
            }
            if self.store.delete_category(id, &self.actor)? {
                removed += 1;
            }
        }

        self.stats.deleted += removed;
        debug!(candidates = wanted.len(), removed, "Delete sweep finished");
        Ok(removed)
    }

    /// Delete every non-protected category.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn wipe(&mut self) -> Result<usize> {
        let mut removed = 0;
        for id in self.store.list_sweepable_ids()? {
            if self.store.delete_category(id, &self.actor)? {
                removed += 1;
            }
        }

        self.stats.deleted += removed;
        debug!(removed, "Wiped categories");
        Ok(removed)
    }

    /// Delete exactly `ids` in one statement.
    ///
    /// Returns `false` for empty input, without touching the store, and when
    /// the delete fails. Failures are logged, never propagated.
    pub fn bulk_delete_finish(&mut self, ids: &[i64]) -> bool {
        if ids.is_empty() {
            return false;
        }

        match self.store.bulk_delete_categories(ids, &self.actor) {
            Ok(removed) => {
                self.stats.deleted += removed;
                debug!(requested = ids.len(), removed, "Bulk delete finished");
                true
            }
            Err(e) => {
                warn!(requested = ids.len(), error = %e, "Bulk delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::SqliteStorage;

    /// Store whose bulk delete always fails.
    pub(crate) struct FailingBulkDelete(pub SqliteStorage);

    impl CategoryStore for FailingBulkDelete {
        fn get_category(&self, id: i64) -> Result<Option<CategoryRecord>> {
            self.0.get_category(id)
        }
        fn create_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()> {
            self.0.create_category(record, actor)
        }
        fn update_category(&mut self, record: &CategoryRecord, actor: &str) -> Result<()> {
            self.0.update_category(record, actor)
        }
        fn list_sweepable_ids(&self) -> Result<Vec<i64>> {
            self.0.list_sweepable_ids()
        }
        fn delete_category(&mut self, id: i64, actor: &str) -> Result<bool> {
            self.0.delete_category(id, actor)
        }
        fn bulk_delete_categories(&mut self, _ids: &[i64], _actor: &str) -> Result<usize> {
            Err(Error::Other("bulk delete unavailable".to_string()))
        }
    }

    pub(crate) fn row(id: i64, name: &str) -> CategoryRow {
        CategoryRow {
            entity_id: id,
            store_id: 0,
            parent_id: 2,
            is_active: true,
            include_in_menu: Some("1".to_string()),
            name: name.to_string(),
            available_sort_by: None,
            url_key: name.to_lowercase(),
            position: Some("9".to_string()),
        }
    }

    pub(crate) fn seed(storage: &mut SqliteStorage, ids: &[i64]) {
        for &id in ids {
            let record = CategoryRecord::from_row(&row(id, &format!("Seed {id}"))).unwrap();
            storage.create_category(&record, "seed").unwrap();
        }
    }

    #[test]
    fn test_reconcile_creates_new_ids() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut reconciler = Reconciler::new(&mut storage, "tester");

        reconciler.reconcile(&[row(10, "Garden")]).unwrap();
        assert_eq!(reconciler.stats().created, 1);
        assert_eq!(reconciler.stats().updated, 0);

        let created = storage.get_category(10).unwrap().unwrap();
        assert_eq!(created.name, "Garden");
        assert_eq!(created.position, 0);
    }

    #[test]
    fn test_reconcile_updates_but_keeps_position() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = CategoryRecord::from_row(&row(10, "Old")).unwrap();
        existing.position = 4;
        storage.create_category(&existing, "seed").unwrap();

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        reconciler.reconcile(&[row(10, "New")]).unwrap();
        assert_eq!(reconciler.stats().updated, 1);
        assert_eq!(reconciler.stats().created, 0);

        let updated = storage.get_category(10).unwrap().unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.position, 4);
    }

    #[test]
    fn test_reconcile_propagates_persistence_errors() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut bad = row(11, "Bad");
        bad.include_in_menu = None;

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        let result = reconciler.reconcile(&[row(10, "Good"), bad]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(reconciler.stats().created, 1);
        assert!(storage.get_category(10).unwrap().is_some());
    }

    #[test]
    fn test_delete_sweep_exact_membership() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage, &[1, 2, 5, 50, 55]);

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        let removed = reconciler.delete_sweep(&[1, 5, 7]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(reconciler.stats().deleted, 1);

        assert!(storage.get_category(1).unwrap().is_some());
        assert!(storage.get_category(5).unwrap().is_none());
        assert!(storage.get_category(50).unwrap().is_some());
        assert!(storage.get_category(55).unwrap().is_some());
    }

    #[test]
    fn test_wipe_spares_protected_roots() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage, &[1, 2, 3, 4]);

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        assert_eq!(reconciler.wipe().unwrap(), 2);
        assert_eq!(storage.count_categories().unwrap(), 2);
    }

    #[test]
    fn test_bulk_delete_empty_ids() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage, &[3]);

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        assert!(!reconciler.bulk_delete_finish(&[]));
        assert_eq!(reconciler.stats().deleted, 0);
        assert_eq!(storage.count_categories().unwrap(), 1);
    }

    #[test]
    fn test_bulk_delete_counts_removed() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage, &[3, 4]);

        let mut reconciler = Reconciler::new(&mut storage, "tester");
        assert!(reconciler.bulk_delete_finish(&[3, 4, 9]));
        assert_eq!(reconciler.stats().deleted, 2);
    }

    #[test]
    fn test_bulk_delete_failure_returns_false() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage, &[3]);
        let mut store = FailingBulkDelete(storage);

        let mut reconciler = Reconciler::new(&mut store, "tester");
        assert!(!reconciler.bulk_delete_finish(&[3]));
        assert_eq!(reconciler.stats().deleted, 0);
        assert!(store.get_category(3).unwrap().is_some());
    }
}
