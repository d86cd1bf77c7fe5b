use std::fmt;

use tracing::debug;

use crate::convert::{is_integer, to_boolean};
use crate::duplicate::{find_row_duplicate, DuplicatePolicy};
use crate::error::Result;
use crate::schema::{FieldType, FileSchema};
use crate::store::RecordStore;
use crate::tabular::ImportRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedKind {
    ColumnCount { expected: usize, actual: usize },
    Boolean,
    Integer,
    Unique { entity: String },
}

/// A row-level problem. Never raised; collected into a [`ValidationResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub file: String,
    pub line: usize,
    /// 1-based position after the control flag; 0 for whole-row problems.
    pub column: usize,
    pub raw_value: String,
    pub expected: ExpectedKind,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expected {
            ExpectedKind::ColumnCount { expected, actual } => write!(
                f,
                "file {}: line {} - wrong column count, expected {} versus {}",
                self.file, self.line, expected, actual
            ),
            ExpectedKind::Boolean => write!(
                f,
                "file {}: line {} - column {}: {} is expected to be a boolean",
                self.file, self.line, self.column, self.raw_value
            ),
            ExpectedKind::Integer => write!(
                f,
                "file {}: line {} - column {}: {} is expected to be an integer",
                self.file, self.line, self.column, self.raw_value
            ),
            ExpectedKind::Unique { entity } => write!(
                f,
                "file {}: line {} - column {}: {} already exists as {}",
                self.file, self.line, self.column, self.raw_value, entity
            ),
        }
    }
}

impl ImportError {
    /// A row whose natural key is already taken by a record of `entity`.
    pub fn duplicate(file: &str, row: &ImportRow, entity: String) -> Self {
        Self {
            file: file.to_string(),
            line: row.line,
            column: 1,
            raw_value: row.content().first().cloned().unwrap_or_default(),
            expected: ExpectedKind::Unique { entity },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ImportError>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Whether a natural-key conflict was already reported for `line`.
    pub fn has_duplicate_at(&self, line: usize) -> bool {
        self.errors
            .iter()
            .any(|error| error.line == line && matches!(error.expected, ExpectedKind::Unique { .. }))
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

pub struct RowValidator<'a> {
    file: &'a FileSchema,
    policy: DuplicatePolicy,
}

impl<'a> RowValidator<'a> {
    pub fn new(file: &'a FileSchema, policy: DuplicatePolicy) -> Self {
        Self { file, policy }
    }

    /// Checks every row and keeps going on error. Shape is checked on all
    /// rows; types only on `ok` rows that are not already persisted.
    pub fn validate<S: RecordStore + ?Sized>(
        &self,
        rows: &[ImportRow],
        store: &S,
    ) -> Result<ValidationResult> {
        let expected = self.file.expected_column_count();
        let mut result = ValidationResult::default();
        for row in rows {
            if row.cells.len() != expected {
                result.errors.push(self.error(
                    row,
                    0,
                    String::new(),
                    ExpectedKind::ColumnCount {
                        expected,
                        actual: row.cells.len(),
                    },
                ));
                continue;
            }
            if !row.is_importable() {
                continue;
            }
            if let Some(existing) = find_row_duplicate(store, self.file, row)? {
                debug!(
                    file = %self.file.key,
                    line = row.line,
                    existing = %existing.id,
                    "duplicate natural key, type checks skipped"
                );
                if self.policy == DuplicatePolicy::Reject {
                    result
                        .errors
                        .push(ImportError::duplicate(&self.file.key, row, existing.entity));
                }
                continue;
            }
            self.check_types(row, &mut result);
        }
        Ok(result)
    }

    fn check_types(&self, row: &ImportRow, result: &mut ValidationResult) {
        let fields = self
            .file
            .entities
            .iter()
            .flat_map(|entity| entity.fields.values());
        for (offset, (field_type, cell)) in fields.zip(row.content()).enumerate() {
            let column = offset + 1;
            match field_type {
                FieldType::Boolean => {
                    if !to_boolean(cell).is_valid() {
                        result.errors.push(self.error(
                            row,
                            column,
                            cell.clone(),
                            ExpectedKind::Boolean,
                        ));
                    }
                }
                FieldType::Integer => {
                    if !cell.is_empty() && !is_integer(cell) {
                        result.errors.push(self.error(
                            row,
                            column,
                            cell.clone(),
                            ExpectedKind::Integer,
                        ));
                    }
                }
                FieldType::String | FieldType::TagList | FieldType::RelationReference { .. } => {}
            }
        }
    }

    fn error(
        &self,
        row: &ImportRow,
        column: usize,
        raw_value: String,
        expected: ExpectedKind,
    ) -> ImportError {
        ImportError {
            file: self.file.key.clone(),
            line: row.line,
            column,
            raw_value,
            expected,
        }
    }
}
