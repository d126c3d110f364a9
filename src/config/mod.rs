//! Configuration management.
//!
//! An [`ImportConfig`] carries the run options: behavior, bunch size and the
//! error policy. It can be built from defaults, read from a JSON file, or
//! overlaid with `CATEGORY_IMPORT_*` environment variables.
//!
//! The database lives at a single global location unless overridden:
//! `~/.category-import/data/categories.db`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::import::{Behavior, ValidationStrategy};

pub const ENV_BEHAVIOR: &str = "CATEGORY_IMPORT_BEHAVIOR";
pub const ENV_BUNCH_SIZE: &str = "CATEGORY_IMPORT_BUNCH_SIZE";
pub const ENV_VALIDATION_STRATEGY: &str = "CATEGORY_IMPORT_VALIDATION_STRATEGY";
pub const ENV_ALLOWED_ERRORS: &str = "CATEGORY_IMPORT_ALLOWED_ERRORS";
pub const ENV_ACTOR: &str = "CATEGORY_IMPORT_ACTOR";
pub const ENV_DB: &str = "CATEGORY_IMPORT_DB";

/// Rows per bunch when nothing else is configured.
pub const DEFAULT_BUNCH_SIZE: usize = 100;

/// Errors tolerated before a stop-on-error run starts skipping rows.
pub const DEFAULT_ALLOWED_ERROR_COUNT: usize = 10;

const DEFAULT_ACTOR: &str = "importer";

/// Options for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub behavior: Behavior,
    pub bunch_size: usize,
    pub validation_strategy: ValidationStrategy,
    pub allowed_error_count: usize,
    /// Recorded on every audit event and in the import history.
    pub actor: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            behavior: Behavior::default(),
            bunch_size: DEFAULT_BUNCH_SIZE,
            validation_strategy: ValidationStrategy::default(),
            allowed_error_count: DEFAULT_ALLOWED_ERROR_COUNT,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

impl ImportConfig {
    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it sets
    /// a zero bunch size.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup`; unset or empty keys are left alone.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first invalid variable.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_BEHAVIOR) {
            self.behavior = value
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_BEHAVIOR}: unknown behavior '{value}'")))?;
        }
        if let Some(value) = get(ENV_BUNCH_SIZE) {
            self.bunch_size = parse_count(ENV_BUNCH_SIZE, &value)?;
        }
        if let Some(value) = get(ENV_VALIDATION_STRATEGY) {
            self.validation_strategy = value
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_VALIDATION_STRATEGY}: {e}")))?;
        }
        if let Some(value) = get(ENV_ALLOWED_ERRORS) {
            self.allowed_error_count = parse_count(ENV_ALLOWED_ERRORS, &value)?;
        }
        if let Some(value) = get(ENV_ACTOR) {
            self.actor = value.trim().to_string();
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.bunch_size == 0 {
            return Err(Error::Config("bunch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a non-negative integer, got '{value}'")))
}

/// Get the global category-import directory, `~/.category-import/`.
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".category-import"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `CATEGORY_IMPORT_DB` environment variable
/// 3. Global location: `~/.category-import/data/categories.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    resolve_db_path_with(explicit_path, |key| std::env::var(key).ok())
}

fn resolve_db_path_with<F>(explicit_path: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(db_path) = lookup(ENV_DB) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("categories.db"))
}
