//! Row validation.
//!
//! Every check runs on every first call for a row number; failures are
//! recorded in the error aggregator, and the verdict is always read back
//! from it. A row number that was already validated in this run is answered
//! from the aggregator without checking again.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::aggregator::ErrorAggregator;
use super::messages::RowErrorCode;
use crate::model::category::{
    ImportRow, ENTITY_ID_COLUMN, IS_ACTIVE, NAME, PARENT, STORE_ID, URL_KEY,
};

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[0-9]+\z").expect("numeric pattern compiles"));

/// Validates import rows, remembering which row numbers it has seen.
#[derive(Debug, Default)]
pub struct RowValidator {
    validated: HashSet<usize>,
}

impl RowValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `row`, recording failures against `row_num`.
    ///
    /// Returns `true` when the aggregator holds no error for `row_num`.
    pub fn validate<A>(&mut self, row: &ImportRow, row_num: usize, errors: &mut A) -> bool
    where
        A: ErrorAggregator + ?Sized,
    {
        if !self.validated.insert(row_num) {
            return !errors.is_row_invalid(row_num);
        }

        check_is_active(row.value(IS_ACTIVE), row_num, errors);
        check_numeric(
            row.value(ENTITY_ID_COLUMN),
            RowErrorCode::IdIsRequired,
            RowErrorCode::IdIsNumber,
            row_num,
            errors,
        );
        check_numeric(
            row.value(STORE_ID),
            RowErrorCode::StoreIdIsRequired,
            RowErrorCode::StoreIdIsNumber,
            row_num,
            errors,
        );
        check_required(row.value(NAME), RowErrorCode::NameIsRequired, row_num, errors);
        check_required(row.value(URL_KEY), RowErrorCode::UrlKeyIsRequired, row_num, errors);
        check_numeric(
            row.value(PARENT),
            RowErrorCode::ParentIsRequired,
            RowErrorCode::ParentIsNumber,
            row_num,
            errors,
        );

        !errors.is_row_invalid(row_num)
    }

    /// Whether `row_num` has been validated in this run.
    #[must_use]
    pub fn is_validated(&self, row_num: usize) -> bool {
        self.validated.contains(&row_num)
    }
}

fn check_required<A>(value: &str, required: RowErrorCode, row_num: usize, errors: &mut A)
where
    A: ErrorAggregator + ?Sized,
{
    if value.is_empty() {
        errors.add_error(required, row_num);
    }
}

fn check_numeric<A>(
    value: &str,
    required: RowErrorCode,
    format: RowErrorCode,
    row_num: usize,
    errors: &mut A,
) where
    A: ErrorAggregator + ?Sized,
{
    if value.is_empty() {
        errors.add_error(required, row_num);
    } else if !NUMERIC.is_match(value) {
        errors.add_error(format, row_num);
    }
}

fn check_is_active<A>(value: &str, row_num: usize, errors: &mut A)
where
    A: ErrorAggregator + ?Sized,
{
    if value.is_empty() {
        errors.add_error(RowErrorCode::IsActiveIsRequired, row_num);
    } else if value != "0" && value != "1" {
        errors.add_error(RowErrorCode::IsActiveFormat, row_num);
    }
}
