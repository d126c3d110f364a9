//! Data models for category import.
//!
//! - [`ImportRow`]: raw column → value input record
//! - [`CategoryRow`]: validated row projected onto the recognized columns
//! - [`CategoryRecord`]: the persisted category

pub mod category;

pub use category::{
    unknown_columns, Bunch, CategoryRecord, CategoryRow, ImportRow, ENTITY_CODE,
    PROTECTED_CATEGORY_IDS, VALID_COLUMN_NAMES,
};
