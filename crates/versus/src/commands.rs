use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;
use versus_core::{
    read_rows, BoolFeatureSummarizer, ImportEngine, ImportOptions, ImportReport, MemoryStore,
    RecordStore, SchemaDescriptor, SeeAlsoOptions, SharedTagRanker, SimilarityIndexBuilder,
    ValidationResult,
};
use versus_store::SqliteStore;

pub fn load_engine(schema: &Path, options: ImportOptions) -> Result<ImportEngine> {
    let descriptor = SchemaDescriptor::from_path(schema)
        .with_context(|| format!("failed to load schema {}", schema.display()))?;
    Ok(ImportEngine::new(descriptor, options))
}

pub fn open_store(database: &Path) -> Result<SqliteStore> {
    if let Some(parent) = database.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::open(database)
}

/// Validation only: the database, when given, is read for duplicate lookups.
pub fn validate(schema: &Path, database: Option<&Path>, key: &str, file: &Path) -> Result<()> {
    let engine = load_engine(schema, ImportOptions::default())?;
    let rows = read_rows(file).with_context(|| format!("failed to read {}", file.display()))?;
    let result = match database {
        Some(database) => engine.validate(key, &rows, &SqliteStore::open(database)?)?,
        None => engine.validate(key, &rows, &MemoryStore::new())?,
    };
    let errors = print_errors(std::iter::once(&result));
    if errors > 0 {
        bail!("{} failed validation with {errors} error(s)", file.display());
    }
    println!("{}: {} row(s), no error", file.display(), rows.len());
    Ok(())
}

pub fn import(
    schema: &Path,
    database: &Path,
    key: &str,
    file: &Path,
    options: ImportOptions,
    strict: bool,
) -> Result<()> {
    let engine = load_engine(schema, options)?;
    let mut store = open_store(database)?;
    let report = import_file(&engine, key, file, &mut store)?;
    finish(&[report], strict)
}

pub fn import_file<S: RecordStore + ?Sized>(
    engine: &ImportEngine,
    key: &str,
    file: &Path,
    store: &mut S,
) -> Result<ImportReport> {
    engine
        .import_path(key, file, store)
        .with_context(|| format!("failed to import {} as {key}", file.display()))
}

pub fn see_also(database: &Path, options: SeeAlsoOptions) -> Result<()> {
    let mut store = open_store(database)?;
    let built = build_see_also(&options, &mut store)?;
    println!("{built} {} record(s) written", options.record);
    Ok(())
}

pub fn build_see_also<S: RecordStore + ?Sized>(
    options: &SeeAlsoOptions,
    store: &mut S,
) -> Result<usize> {
    let ranker = SharedTagRanker::default();
    let builder = SimilarityIndexBuilder::new(&ranker, &BoolFeatureSummarizer, options.clone());
    Ok(builder.build(store)?)
}

pub fn reset(schema: &Path, database: &Path) -> Result<()> {
    let engine = load_engine(schema, ImportOptions::default())?;
    let mut store = open_store(database)?;
    engine.reset(&mut store)?;
    println!(
        "reset {} table(s): {}",
        engine.schema().table_names().len(),
        engine.schema().table_names().join(", ")
    );
    Ok(())
}

/// Prints every collected error in encounter order and returns how many there were.
pub fn print_errors<'a>(results: impl IntoIterator<Item = &'a ValidationResult>) -> usize {
    let mut count = 0;
    for result in results {
        for message in result.messages() {
            println!("{message}");
            count += 1;
        }
    }
    count
}

/// Prints the run summary; strict mode turns any validation error into a failure.
pub fn finish(reports: &[ImportReport], strict: bool) -> Result<()> {
    let errors = print_errors(reports.iter().map(|report| &report.validation));
    for report in reports {
        println!(
            "{}: {} imported, {} ignored, {} duplicate(s), {} error(s)",
            report.file,
            report.rows_imported,
            report.rows_ignored,
            report.rows_duplicate,
            report.validation.len()
        );
    }
    info!(files = reports.len(), errors, "run finished");
    if strict && errors > 0 {
        bail!("{errors} validation error(s) found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use versus_core::{ExpectedKind, ImportError};

    fn report(errors: usize) -> ImportReport {
        let mut validation = ValidationResult::default();
        for line in 0..errors {
            validation.errors.push(ImportError {
                file: "import-softwares".to_string(),
                line: line + 1,
                column: 3,
                raw_value: "maybe".to_string(),
                expected: ExpectedKind::Boolean,
            });
        }
        ImportReport {
            file: "import-softwares".to_string(),
            validation,
            ..ImportReport::default()
        }
    }

    #[test]
    fn strict_mode_fails_on_errors_only() {
        assert!(finish(&[report(0)], true).is_ok());
        assert!(finish(&[report(2)], false).is_ok());
        assert!(finish(&[report(0), report(1)], true).is_err());
    }

    #[test]
    fn counts_errors_across_reports() {
        let reports = [report(2), report(3)];
        assert_eq!(print_errors(reports.iter().map(|r| &r.validation)), 5);
    }
}
