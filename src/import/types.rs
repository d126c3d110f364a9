//! Types shared by the import pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::ImportHistoryEntry;

/// What an import run does with its rows. Fixed for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Create new ids, update existing ones.
    #[default]
    Append,
    /// Wipe every non-protected category, then insert the rows.
    Replace,
    /// Delete the categories the rows name.
    Delete,
}

impl Behavior {
    /// Storage/config string for this behavior.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Behavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidBehavior(other.to_string())),
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Categories inserted.
    pub created: usize,
    /// Categories overwritten in place.
    pub updated: usize,
    /// Categories removed by sweeps, wipes and bulk deletes.
    pub deleted: usize,
}

impl ImportStats {
    /// Total records touched.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Outcome of [`Importer::import_data`](super::Importer::import_data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// `false` only for a delete run with no valid rows or a failed bulk delete.
    pub result: bool,
    pub stats: ImportStats,
    /// Rows pulled from the source, valid or not.
    pub processed_rows: usize,
}

/// Everything a caller learns about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub entity: String,
    pub behavior: Behavior,
    pub actor: String,
    pub result: bool,
    pub stats: ImportStats,
    pub processed_rows: usize,
    pub invalid_rows: usize,
    pub error_count: usize,
    /// Whether the error limit was reached during the run.
    pub terminated: bool,
    pub skipped_rows: Vec<usize>,
    /// Row number → error messages, in the order they were recorded.
    pub errors: BTreeMap<usize, Vec<String>>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl ImportReport {
    /// Whether any row failed validation.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// The history row persisted for this run.
    #[must_use]
    pub fn to_history_entry(&self) -> ImportHistoryEntry {
        ImportHistoryEntry {
            run_id: self.run_id.clone(),
            entity: self.entity.clone(),
            behavior: self.behavior.as_str().to_string(),
            actor: self.actor.clone(),
            processed_rows: self.processed_rows,
            invalid_rows: self.invalid_rows,
            error_count: self.error_count,
            created: self.stats.created,
            updated: self.stats.updated,
            deleted: self.stats.deleted,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}
