use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VersusError};
use crate::record::Record;
use crate::schema::FileSchema;
use crate::store::RecordStore;
use crate::tabular::ImportRow;

/// What to do with a row whose natural key is already persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Skip type checks for the row and import it again.
    #[default]
    ReImport,
    /// Skip type checks and leave the row out of the import pass.
    Skip,
    /// Report the row as an error and leave it out of the import pass.
    Reject,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::ReImport => "re-import",
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Reject => "reject",
        }
    }

    pub fn blocks_import(&self) -> bool {
        !matches!(self, DuplicatePolicy::ReImport)
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = VersusError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "re-import" | "reimport" => Ok(DuplicatePolicy::ReImport),
            "skip" => Ok(DuplicatePolicy::Skip),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(VersusError::Other(format!(
                "unknown duplicate policy {other}"
            ))),
        }
    }
}

pub fn exists<S: RecordStore + ?Sized>(
    store: &S,
    entity: &str,
    natural_key: &str,
) -> Result<Option<Record>> {
    store.find_by_name(entity, natural_key)
}

/// Looks the row's first content cell up against the file's root entity.
/// Files whose root entity does not start with `name` have no natural key.
pub fn find_row_duplicate<S: RecordStore + ?Sized>(
    store: &S,
    file: &FileSchema,
    row: &ImportRow,
) -> Result<Option<Record>> {
    let Some(entity) = file.natural_key_entity() else {
        return Ok(None);
    };
    match row.content().first() {
        Some(key) if !key.is_empty() => exists(store, entity, key),
        _ => Ok(None),
    }
}
