//! Row error codes and their message templates.

use serde::Serialize;

/// Why a row failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RowErrorCode {
    IdIsRequired,
    IdIsNumber,
    StoreIdIsRequired,
    StoreIdIsNumber,
    NameIsRequired,
    UrlKeyIsRequired,
    ParentIsRequired,
    ParentIsNumber,
    IsActiveIsRequired,
    IsActiveFormat,
}

impl RowErrorCode {
    /// Stable code string reported alongside the message.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdIsRequired => "IdIsRequired",
            Self::IdIsNumber => "IdIsNumber",
            Self::StoreIdIsRequired => "StoreIdIsRequired",
            Self::StoreIdIsNumber => "StoreIdIsNumber",
            Self::NameIsRequired => "NameIsRequired",
            Self::UrlKeyIsRequired => "UrlKeyIsRequired",
            Self::ParentIsRequired => "ParentIsRequired",
            Self::ParentIsNumber => "ParentIsNumber",
            Self::IsActiveIsRequired => "IsActiveIsRequired",
            Self::IsActiveFormat => "IsActiveFormat",
        }
    }

    /// Human-readable message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::IdIsRequired => "The entity_id cannot be empty.",
            Self::IdIsNumber => "The entity_id must be a number",
            Self::StoreIdIsRequired => "The store_id cannot be empty.",
            Self::StoreIdIsNumber => "The store_id must be a number",
            Self::NameIsRequired => "The name cannot be empty.",
            Self::UrlKeyIsRequired => "The url_key cannot be empty.",
            Self::ParentIsRequired => "The parent cannot be empty.",
            Self::ParentIsNumber => "The parent must be a number",
            Self::IsActiveIsRequired => "The is_active cannot be empty.",
            Self::IsActiveFormat => "The is_active Wrong format [Format 0 or 1]",
        }
    }
}

impl std::fmt::Display for RowErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
