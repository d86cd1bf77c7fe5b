use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::EntityBuilder;
use crate::duplicate::{find_row_duplicate, DuplicatePolicy};
use crate::error::{Result, VersusError};
use crate::schema::{FileSchema, SchemaDescriptor};
use crate::store::RecordStore;
use crate::tabular::{read_rows, ImportRow};
use crate::validate::{ImportError, RowValidator, ValidationResult};

/// When staged records are flushed during an import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionScope {
    #[default]
    PerRow,
    PerFile,
}

impl TransactionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionScope::PerRow => "per-row",
            TransactionScope::PerFile => "per-file",
        }
    }
}

impl fmt::Display for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionScope {
    type Err = VersusError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "per-row" | "row" => Ok(TransactionScope::PerRow),
            "per-file" | "file" => Ok(TransactionScope::PerFile),
            other => Err(VersusError::Other(format!(
                "unknown transaction scope {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub transaction: TransactionScope,
    pub duplicates: DuplicatePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub file: String,
    pub validation: ValidationResult,
    pub rows_read: usize,
    pub rows_imported: usize,
    pub rows_ignored: usize,
    pub rows_duplicate: usize,
    pub records_created: usize,
    pub records_updated: usize,
}

pub struct ImportEngine {
    schema: SchemaDescriptor,
    options: ImportOptions,
}

impl ImportEngine {
    pub fn new(schema: SchemaDescriptor, options: ImportOptions) -> Self {
        Self { schema, options }
    }

    pub fn from_path(path: &Path, options: ImportOptions) -> Result<Self> {
        Ok(Self::new(SchemaDescriptor::from_path(path)?, options))
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn options(&self) -> ImportOptions {
        self.options
    }

    pub fn file(&self, key: &str) -> Result<&FileSchema> {
        self.schema
            .file(key)
            .ok_or_else(|| VersusError::UnknownImportFile(key.to_string()))
    }

    /// Validation only; the store is read for duplicate lookups.
    pub fn validate<S: RecordStore + ?Sized>(
        &self,
        key: &str,
        rows: &[ImportRow],
        store: &S,
    ) -> Result<ValidationResult> {
        let file = self.file(key)?;
        let result = RowValidator::new(file, self.options.duplicates).validate(rows, store)?;
        info!(file = key, rows = rows.len(), errors = result.len(), "validated");
        Ok(result)
    }

    pub fn import_path<S: RecordStore + ?Sized>(
        &self,
        key: &str,
        path: &Path,
        store: &mut S,
    ) -> Result<ImportReport> {
        let rows = read_rows(path)?;
        info!(file = key, path = %path.display(), rows = rows.len(), "read import file");
        self.import_rows(key, &rows, store)
    }

    /// Validates every row first, then imports every `ok` row whatever the
    /// validation found. Errors are returned in the report, never raised.
    pub fn import_rows<S: RecordStore + ?Sized>(
        &self,
        key: &str,
        rows: &[ImportRow],
        store: &mut S,
    ) -> Result<ImportReport> {
        let validation = self.validate(key, rows, &*store)?;
        let file = self.file(key)?;
        let builder = EntityBuilder::new(file);
        let mut report = ImportReport {
            file: key.to_string(),
            validation,
            rows_read: rows.len(),
            ..ImportReport::default()
        };

        for row in rows {
            if !row.is_importable() {
                report.rows_ignored += 1;
                continue;
            }
            if self.options.duplicates.blocks_import() {
                if let Some(existing) = find_row_duplicate(&*store, file, row)? {
                    warn!(
                        file = key,
                        line = row.line,
                        existing = %existing.id,
                        policy = %self.options.duplicates,
                        "duplicate row left out"
                    );
                    // Repeats inside the same file only surface once the first copy is staged.
                    if self.options.duplicates == DuplicatePolicy::Reject
                        && !report.validation.has_duplicate_at(row.line)
                    {
                        report
                            .validation
                            .errors
                            .push(ImportError::duplicate(key, row, existing.entity));
                    }
                    report.rows_duplicate += 1;
                    continue;
                }
            }
            let Some(graph) = builder.build(row, store)? else {
                report.rows_ignored += 1;
                continue;
            };
            graph.persist(store)?;
            report.records_created += graph.records.len();
            report.records_updated += graph.touched.len();
            report.rows_imported += 1;
            if self.options.transaction == TransactionScope::PerRow {
                store.commit()?;
            }
        }
        if self.options.transaction == TransactionScope::PerFile {
            store.commit()?;
        }

        info!(
            file = key,
            imported = report.rows_imported,
            ignored = report.rows_ignored,
            duplicates = report.rows_duplicate,
            created = report.records_created,
            errors = report.validation.len(),
            "import finished"
        );
        Ok(report)
    }

    /// Removes every record of every declared table, in one commit.
    pub fn reset<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        let tables = self.schema.table_names();
        store.delete_all(tables)?;
        store.commit()?;
        info!(tables = tables.len(), "store reset");
        Ok(())
    }
}
