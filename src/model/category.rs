//! Category model and the import row shapes that feed it.
//!
//! An [`ImportRow`] is the raw column → value mapping handed over by the
//! upstream source. Rows that pass validation are projected onto the fixed
//! [`CategoryRow`] schema, which is what reconciliation assigns onto a
//! persisted [`CategoryRecord`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Entity type code recorded in import history and staging.
pub const ENTITY_CODE: &str = "import_category";

/// Backing table for persisted categories.
pub const TABLE: &str = "categories";

pub const ENTITY_ID_COLUMN: &str = "entity_id";
pub const STORE_ID: &str = "store_id";
pub const PARENT: &str = "parent";
pub const IS_ACTIVE: &str = "is_active";
pub const INCLUDE_IN_MENU: &str = "include_in_menu";
pub const NAME: &str = "name";
pub const AVAILABLE_SORT_BY: &str = "available_sort_by";
pub const URL_KEY: &str = "url_key";
pub const POSITION: &str = "position";

/// Columns an import row may carry. Anything else is ignored.
pub const VALID_COLUMN_NAMES: [&str; 9] = [
    ENTITY_ID_COLUMN,
    STORE_ID,
    PARENT,
    IS_ACTIVE,
    INCLUDE_IN_MENU,
    NAME,
    AVAILABLE_SORT_BY,
    URL_KEY,
    POSITION,
];

/// Root categories that no sweep or wipe may remove.
pub const PROTECTED_CATEGORY_IDS: [i64; 2] = [1, 2];

/// Column names in `headers` that are not recognized.
#[must_use]
pub fn unknown_columns<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    headers
        .into_iter()
        .filter(|h| !VALID_COLUMN_NAMES.contains(h))
        .map(ToString::to_string)
        .collect()
}

/// One batch of input rows keyed by row number.
pub type Bunch = BTreeMap<usize, ImportRow>;

/// One input record: column name → string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportRow(BTreeMap<String, String>);

impl ImportRow {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, builder style.
    #[must_use]
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.0.insert(column.to_string(), value.to_string());
        self
    }

    /// Value of `column`, or `""` when the column is absent.
    #[must_use]
    pub fn value(&self, column: &str) -> &str {
        self.0.get(column).map_or("", String::as_str)
    }

    /// Value of `column` if present at all.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Column names present in this row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ImportRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A validated row projected onto the recognized columns.
///
/// The numeric and flag columns checked by validation are typed; the
/// unchecked ones stay optional strings and are only interpreted when the
/// row is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub entity_id: i64,
    pub store_id: i64,
    pub parent_id: i64,
    pub is_active: bool,
    pub include_in_menu: Option<String>,
    pub name: String,
    pub available_sort_by: Option<String>,
    pub url_key: String,
    /// Carried through projection but never assigned onto a record.
    pub position: Option<String>,
}

impl CategoryRow {
    /// Project a validated import row onto the fixed schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a numeric column does not fit an `i64`.
    pub fn project(row: &ImportRow) -> Result<Self> {
        Ok(Self {
            entity_id: parse_id(row, ENTITY_ID_COLUMN)?,
            store_id: parse_id(row, STORE_ID)?,
            parent_id: parse_id(row, PARENT)?,
            is_active: row.value(IS_ACTIVE) == "1",
            include_in_menu: row.get(INCLUDE_IN_MENU).map(ToString::to_string),
            name: row.value(NAME).to_string(),
            available_sort_by: row
                .get(AVAILABLE_SORT_BY)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string),
            url_key: row.value(URL_KEY).to_string(),
            position: row.get(POSITION).map(ToString::to_string),
        })
    }
}

fn parse_id(row: &ImportRow, column: &str) -> Result<i64> {
    row.value(column).parse::<i64>().map_err(|e| {
        Error::InvalidArgument(format!("{column} '{}' is out of range: {e}", row.value(column)))
    })
}

fn parse_flag(column: &str, value: Option<&str>) -> Result<bool> {
    match value {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(other) => Err(Error::InvalidArgument(format!(
            "{column} must be 0 or 1, got '{other}'"
        ))),
        None => Err(Error::InvalidArgument(format!("{column} is required"))),
    }
}

/// A persisted category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub entity_id: i64,
    pub store_id: i64,
    pub parent_id: i64,
    pub is_active: bool,
    pub include_in_menu: bool,
    pub name: String,
    pub available_sort_by: Option<String>,
    pub url_key: String,
    pub position: i64,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl CategoryRecord {
    /// Populate a new record from an import row.
    ///
    /// Position starts at 0; the row's position column is not read.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `include_in_menu` is absent or not a flag.
    pub fn from_row(row: &CategoryRow) -> Result<Self> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut record = Self {
            entity_id: row.entity_id,
            store_id: 0,
            parent_id: 0,
            is_active: false,
            include_in_menu: false,
            name: String::new(),
            available_sort_by: None,
            url_key: String::new(),
            position: 0,
            created_at: now,
            updated_at: now,
        };
        record.apply_row(row)?;
        Ok(record)
    }

    /// Assign the row's field values onto this record.
    ///
    /// Position is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `include_in_menu` is absent or not a flag.
    pub fn apply_row(&mut self, row: &CategoryRow) -> Result<()> {
        self.store_id = row.store_id;
        self.parent_id = row.parent_id;
        self.is_active = row.is_active;
        self.include_in_menu = parse_flag(INCLUDE_IN_MENU, row.include_in_menu.as_deref())?;
        self.name.clone_from(&row.name);
        self.available_sort_by.clone_from(&row.available_sort_by);
        self.url_key.clone_from(&row.url_key);
        self.updated_at = chrono::Utc::now().timestamp_millis();
        Ok(())
    }
}
