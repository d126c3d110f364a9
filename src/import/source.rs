//! Upstream bunch sources.
//!
//! A run pulls bunches one at a time until the source is exhausted, so a
//! source only ever has to hold the bunch it is handing out.

use std::path::Path;

use crate::error::Result;
use crate::model::category::{Bunch, ImportRow};
use crate::storage::SqliteStorage;

/// A finite, lazy sequence of bunches.
pub trait BunchSource {
    /// The next bunch, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the bunch cannot be produced.
    fn next_bunch(&mut self) -> Result<Option<Bunch>>;
}

/// Bunches held in memory.
#[derive(Debug, Default)]
pub struct MemoryBunchSource {
    bunches: std::vec::IntoIter<Bunch>,
}

impl MemoryBunchSource {
    /// Split `rows` into bunches of `bunch_size`, numbering rows from 0.
    ///
    /// A `bunch_size` of 0 is treated as 1.
    #[must_use]
    pub fn new(rows: Vec<ImportRow>, bunch_size: usize) -> Self {
        let bunch_size = bunch_size.max(1);
        let mut bunches = Vec::new();
        let mut current = Bunch::new();

        for (row_num, row) in rows.into_iter().enumerate() {
            current.insert(row_num, row);
            if current.len() == bunch_size {
                bunches.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            bunches.push(current);
        }

        Self::from_bunches(bunches)
    }

    /// Use prepared bunches as-is.
    #[must_use]
    pub fn from_bunches(bunches: Vec<Bunch>) -> Self {
        Self {
            bunches: bunches.into_iter(),
        }
    }
}

impl BunchSource for MemoryBunchSource {
    fn next_bunch(&mut self) -> Result<Option<Bunch>> {
        Ok(self.bunches.next())
    }
}

/// Bunches previously staged with [`SqliteStorage::stage_bunches`].
///
/// Owns its own connection so the importer can write through another.
#[derive(Debug)]
pub struct StagedBunchSource {
    storage: SqliteStorage,
    entity: String,
    cursor: i64,
}

impl StagedBunchSource {
    #[must_use]
    pub fn new(storage: SqliteStorage, entity: &str) -> Self {
        Self {
            storage,
            entity: entity.to_string(),
            cursor: 0,
        }
    }

    /// Open a reader connection on the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the database does not exist.
    pub fn open(path: &Path, entity: &str) -> Result<Self> {
        Ok(Self::new(SqliteStorage::open_existing(path)?, entity))
    }
}

impl BunchSource for StagedBunchSource {
    fn next_bunch(&mut self) -> Result<Option<Bunch>> {
        match self.storage.next_staged_bunch(&self.entity, self.cursor)? {
            Some((id, bunch)) => {
                self.cursor = id;
                Ok(Some(bunch))
            }
            None => Ok(None),
        }
    }
}
