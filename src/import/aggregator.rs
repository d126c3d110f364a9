//! Row error aggregation.
//!
//! The importer records row failures through the [`ErrorAggregator`] trait
//! and asks it two questions: is this row invalid, and has the run collected
//! enough errors that remaining rows should be skipped. The threshold policy
//! belongs to the aggregator, not the importer.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::messages::RowErrorCode;
use crate::error::Error;

/// Error sink consulted by the validator and the importer.
pub trait ErrorAggregator {
    /// Record `code` against `row_num`.
    fn add_error(&mut self, code: RowErrorCode, row_num: usize);

    /// Whether any error has been recorded for `row_num`.
    fn is_row_invalid(&self, row_num: usize) -> bool;

    /// Whether the error limit has been reached.
    fn has_to_be_terminated(&self) -> bool;

    /// Mark a row as skipped because the run was terminating.
    fn add_row_to_skip(&mut self, row_num: usize);
}

/// How the error limit is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationStrategy {
    /// Reaching `allowed_error_count` terminates the run.
    #[default]
    StopOnError,
    /// Record every error, never terminate.
    SkipErrors,
}

impl ValidationStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StopOnError => "stop-on-error",
            Self::SkipErrors => "skip-errors",
        }
    }
}

impl fmt::Display for ValidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "stop-on-error" => Ok(Self::StopOnError),
            "skip-errors" => Ok(Self::SkipErrors),
            other => Err(Error::Config(format!(
                "unknown validation_strategy '{other}'"
            ))),
        }
    }
}

/// A recorded row failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row_num: usize,
    pub code: RowErrorCode,
    pub message: &'static str,
}

/// In-memory aggregator with a stop-on-error threshold.
#[derive(Debug, Clone, Default)]
pub struct ProcessingErrorAggregator {
    strategy: ValidationStrategy,
    allowed_error_count: usize,
    errors: Vec<RowError>,
    seen: HashSet<(usize, RowErrorCode)>,
    invalid_rows: BTreeSet<usize>,
    rows_to_skip: BTreeSet<usize>,
}

impl ProcessingErrorAggregator {
    #[must_use]
    pub fn new(strategy: ValidationStrategy, allowed_error_count: usize) -> Self {
        Self {
            strategy,
            allowed_error_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    /// Number of distinct (row, code) errors recorded.
    #[must_use]
    pub fn errors_count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn invalid_rows_count(&self) -> usize {
        self.invalid_rows.len()
    }

    /// Every recorded error, in recording order.
    #[must_use]
    pub fn all_errors(&self) -> &[RowError] {
        &self.errors
    }

    #[must_use]
    pub fn rows_to_skip(&self) -> &BTreeSet<usize> {
        &self.rows_to_skip
    }

    #[must_use]
    pub fn is_row_skipped(&self, row_num: usize) -> bool {
        self.rows_to_skip.contains(&row_num)
    }

    /// Error messages grouped by row number.
    #[must_use]
    pub fn row_messages(&self) -> BTreeMap<usize, Vec<String>> {
        let mut by_row: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            by_row
                .entry(error.row_num)
                .or_default()
                .push(error.message.to_string());
        }
        by_row
    }

    /// Row numbers grouped by error code.
    #[must_use]
    pub fn errors_by_code(&self) -> BTreeMap<RowErrorCode, Vec<usize>> {
        let mut by_code: BTreeMap<RowErrorCode, Vec<usize>> = BTreeMap::new();
        for error in &self.errors {
            by_code.entry(error.code).or_default().push(error.row_num);
        }
        by_code
    }

    /// Forget everything recorded so far; policy is kept.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.seen.clear();
        self.invalid_rows.clear();
        self.rows_to_skip.clear();
    }
}

impl ErrorAggregator for ProcessingErrorAggregator {
    fn add_error(&mut self, code: RowErrorCode, row_num: usize) {
        if !self.seen.insert((row_num, code)) {
            return;
        }
        self.errors.push(RowError {
            row_num,
            code,
            message: code.message(),
        });
        self.invalid_rows.insert(row_num);
    }

    fn is_row_invalid(&self, row_num: usize) -> bool {
        self.invalid_rows.contains(&row_num)
    }

    fn has_to_be_terminated(&self) -> bool {
        let count = self.errors_count();
        count > 0
            && self.strategy == ValidationStrategy::StopOnError
            && count >= self.allowed_error_count
    }

    fn add_row_to_skip(&mut self, row_num: usize) {
        self.rows_to_skip.insert(row_num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_errors_are_ignored() {
        let mut errors = ProcessingErrorAggregator::new(ValidationStrategy::SkipErrors, 10);
        errors.add_error(RowErrorCode::NameIsRequired, 3);
        errors.add_error(RowErrorCode::NameIsRequired, 3);
        errors.add_error(RowErrorCode::UrlKeyIsRequired, 3);

        assert_eq!(errors.errors_count(), 2);
        assert_eq!(errors.invalid_rows_count(), 1);
        assert!(errors.is_row_invalid(3));
        assert!(!errors.is_row_invalid(4));
    }

    #[test]
    fn test_stop_on_error_threshold() {
        let mut errors = ProcessingErrorAggregator::new(ValidationStrategy::StopOnError, 2);
        assert!(!errors.has_to_be_terminated());

        errors.add_error(RowErrorCode::IdIsRequired, 0);
        assert!(!errors.has_to_be_terminated());

        errors.add_error(RowErrorCode::IdIsRequired, 1);
        assert!(errors.has_to_be_terminated());
    }

    #[test]
    fn test_skip_errors_never_terminates() {
        let mut errors = ProcessingErrorAggregator::new(ValidationStrategy::SkipErrors, 0);
        for row in 0..50 {
            errors.add_error(RowErrorCode::IsActiveFormat, row);
        }
        assert!(!errors.has_to_be_terminated());
    }

    #[test]
    fn test_row_messages_and_codes() {
        let mut errors = ProcessingErrorAggregator::default();
        errors.add_error(RowErrorCode::IdIsNumber, 7);
        errors.add_error(RowErrorCode::ParentIsNumber, 7);
        errors.add_error(RowErrorCode::IdIsNumber, 9);

        let messages = errors.row_messages();
        assert_eq!(
            messages[&7],
            vec![
                "The entity_id must be a number".to_string(),
                "The parent must be a number".to_string()
            ]
        );
        assert_eq!(errors.errors_by_code()[&RowErrorCode::IdIsNumber], vec![7, 9]);
    }

    #[test]
    fn test_rows_to_skip_and_clear() {
        let mut errors = ProcessingErrorAggregator::default();
        errors.add_error(RowErrorCode::NameIsRequired, 1);
        errors.add_row_to_skip(2);
        assert!(errors.is_row_skipped(2));

        errors.clear();
        assert_eq!(errors.errors_count(), 0);
        assert!(errors.rows_to_skip().is_empty());
        assert!(!errors.is_row_invalid(1));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "skip_errors".parse::<ValidationStrategy>().unwrap(),
            ValidationStrategy::SkipErrors
        );
        assert_eq!(
            "Stop-On-Error".parse::<ValidationStrategy>().unwrap(),
            ValidationStrategy::StopOnError
        );
        assert!("lenient".parse::<ValidationStrategy>().is_err());
    }
}
