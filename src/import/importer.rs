//! Import orchestration.
//!
//! The [`Importer`] pulls bunches from a [`BunchSource`], validates every
//! row, and hands the valid ones to a [`Reconciler`] according to the run's
//! [`Behavior`]:
//!
//! - **Append**: each bunch is grouped by entity id and reconciled.
//! - **Replace**: after each bunch, every id accepted so far in the run is
//!   bulk-deleted; on success the store is wiped and the bunch is
//!   reconciled, so its rows are created. Only the last bunch survives.
//! - **Delete**: entity ids are collected over the whole run, then swept and
//!   bulk-deleted once at the end.
//!
//! A terminating error aggregator only marks rows to skip; the source is
//! always consumed to the end.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregator::{ErrorAggregator, ProcessingErrorAggregator};
use super::reconcile::Reconciler;
use super::source::{BunchSource, MemoryBunchSource};
use super::types::{Behavior, ImportOutcome, ImportReport, ImportStats};
use super::validate::RowValidator;
use crate::config::ImportConfig;
use crate::error::Result;
use crate::model::category::{
    unknown_columns, CategoryRow, ImportRow, ENTITY_CODE, ENTITY_ID_COLUMN,
};
use crate::storage::{CategoryStore, SqliteStorage};

/// Runs one import against a store.
///
/// Counters accumulate for the lifetime of the importer, so use one importer
/// per run.
pub struct Importer<'a, S, A>
where
    S: CategoryStore + ?Sized,
    A: ErrorAggregator + ?Sized,
{
    reconciler: Reconciler<'a, S>,
    errors: &'a mut A,
    validator: RowValidator,
    behavior: Behavior,
    reported_columns: BTreeSet<String>,
}

impl<'a, S, A> Importer<'a, S, A>
where
    S: CategoryStore + ?Sized,
    A: ErrorAggregator + ?Sized,
{
    #[must_use]
    pub fn new(store: &'a mut S, errors: &'a mut A, behavior: Behavior, actor: &str) -> Self {
        Self {
            reconciler: Reconciler::new(store, actor),
            errors,
            validator: RowValidator::new(),
            behavior,
            reported_columns: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    #[must_use]
    pub fn stats(&self) -> ImportStats {
        self.reconciler.stats()
    }

    /// Validate one row against this run's validator and aggregator.
    pub fn validate_row(&mut self, row: &ImportRow, row_num: usize) -> bool {
        self.validator.validate(row, row_num, &mut *self.errors)
    }

    /// Consume `source` to the end, applying this run's behavior.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or a persistence error other
    /// than a failed bulk delete occurs. Bunches already applied stay written.
    pub fn import_data<B>(&mut self, source: &mut B) -> Result<ImportOutcome>
    where
        B: BunchSource + ?Sized,
    {
        debug!(behavior = %self.behavior, "Importing categories");
        match self.behavior {
            Behavior::Delete => self.delete_categories(source),
            Behavior::Replace | Behavior::Append => self.save_and_replace_categories(source),
        }
    }

    fn delete_categories<B>(&mut self, source: &mut B) -> Result<ImportOutcome>
    where
        B: BunchSource + ?Sized,
    {
        let mut processed_rows = 0;
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        while let Some(bunch) = source.next_bunch()? {
            for (&row_num, row) in &bunch {
                processed_rows += 1;
                self.report_unknown_columns(row);

                if self.validate_row(row, row_num) {
                    match row.value(ENTITY_ID_COLUMN).parse::<i64>() {
                        Ok(id) => {
                            if seen.insert(id) {
                                candidates.push(id);
                            }
                        }
                        // Too large to be a stored id, so nothing to delete.
                        Err(_) => {
                            debug!(row_num, "Out-of-range entity_id matches no category");
                        }
                    }
                }
                if self.errors.has_to_be_terminated() {
                    self.errors.add_row_to_skip(row_num);
                }
            }
        }

        if candidates.is_empty() {
            debug!("No valid rows to delete");
            return Ok(self.outcome(false, processed_rows));
        }

        self.reconciler.delete_sweep(&candidates)?;
        let result = self.reconciler.bulk_delete_finish(&candidates);
        Ok(self.outcome(result, processed_rows))
    }

    fn save_and_replace_categories<B>(&mut self, source: &mut B) -> Result<ImportOutcome>
    where
        B: BunchSource + ?Sized,
    {
        let mut processed_rows = 0;
        let mut replaced_ids = Vec::new();
        let mut seen = HashSet::new();

        while let Some(bunch) = source.next_bunch()? {
            let mut groups = EntityGroups::default();

            for (&row_num, row) in &bunch {
                processed_rows += 1;
                self.report_unknown_columns(row);

                if !self.validate_row(row, row_num) {
                    continue;
                }
                if self.errors.has_to_be_terminated() {
                    self.errors.add_row_to_skip(row_num);
                    continue;
                }
                groups.push(CategoryRow::project(row)?);
            }

            let ids = groups.ids();
            let rows = groups.into_rows();
            debug!(rows = rows.len(), entities = ids.len(), "Bunch grouped");

            if self.behavior == Behavior::Replace {
                replaced_ids.extend(ids.into_iter().filter(|id| seen.insert(*id)));
                if !self.reconciler.bulk_delete_finish(&replaced_ids) {
                    continue;
                }
                self.reconciler.wipe()?;
            }
            self.reconciler.reconcile(&rows)?;
        }

        Ok(self.outcome(true, processed_rows))
    }

    fn outcome(&self, result: bool, processed_rows: usize) -> ImportOutcome {
        ImportOutcome {
            result,
            stats: self.reconciler.stats(),
            processed_rows,
        }
    }

    fn report_unknown_columns(&mut self, row: &ImportRow) {
        for column in unknown_columns(row.columns()) {
            if self.reported_columns.insert(column.clone()) {
                warn!(column = %column, "Ignoring unknown column");
            }
        }
    }
}

/// Valid rows of one bunch grouped by entity id, in first-seen order.
#[derive(Default)]
struct EntityGroups {
    groups: Vec<(i64, Vec<CategoryRow>)>,
    index: HashMap<i64, usize>,
}

impl EntityGroups {
    fn push(&mut self, row: CategoryRow) {
        let id = row.entity_id;
        if let Some(&slot) = self.index.get(&id) {
            self.groups[slot].1.push(row);
        } else {
            self.index.insert(id, self.groups.len());
            self.groups.push((id, vec![row]));
        }
    }

    fn ids(&self) -> Vec<i64> {
        self.groups.iter().map(|(id, _)| *id).collect()
    }

    fn into_rows(self) -> Vec<CategoryRow> {
        self.groups.into_iter().flat_map(|(_, rows)| rows).collect()
    }
}

/// Run a complete import and record it in the import history.
///
/// # Errors
///
/// Returns an error if the import aborts or the history cannot be written.
pub fn run_import<B>(
    storage: &mut SqliteStorage,
    source: &mut B,
    config: &ImportConfig,
) -> Result<ImportReport>
where
    B: BunchSource + ?Sized,
{
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().timestamp_millis();
    let mut errors =
        ProcessingErrorAggregator::new(config.validation_strategy, config.allowed_error_count);

    info!(
        run_id = %run_id,
        behavior = %config.behavior,
        strategy = %config.validation_strategy,
        "Starting category import"
    );

    let outcome = Importer::new(&mut *storage, &mut errors, config.behavior, &config.actor)
        .import_data(source)?;

    let report = ImportReport {
        run_id,
        entity: ENTITY_CODE.to_string(),
        behavior: config.behavior,
        actor: config.actor.clone(),
        result: outcome.result,
        stats: outcome.stats,
        processed_rows: outcome.processed_rows,
        invalid_rows: errors.invalid_rows_count(),
        error_count: errors.errors_count(),
        terminated: errors.has_to_be_terminated(),
        skipped_rows: errors.rows_to_skip().iter().copied().collect(),
        errors: errors.row_messages(),
        started_at,
        finished_at: Utc::now().timestamp_millis(),
    };
    storage.record_import_history(&report.to_history_entry())?;

    info!(
        run_id = %report.run_id,
        result = report.result,
        created = report.stats.created,
        updated = report.stats.updated,
        deleted = report.stats.deleted,
        errors = report.error_count,
        "Category import finished"
    );
    Ok(report)
}

/// Split `rows` into bunches of the configured size and run them.
///
/// # Errors
///
/// See [`run_import`].
pub fn run_import_rows(
    storage: &mut SqliteStorage,
    rows: Vec<ImportRow>,
    config: &ImportConfig,
) -> Result<ImportReport> {
    let mut source = MemoryBunchSource::new(rows, config.bunch_size);
    run_import(storage, &mut source, config)
}
