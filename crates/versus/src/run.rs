use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;
use versus_core::{ImportEngine, ImportReport, RecordStore, SeeAlsoOptions};

use crate::commands;
use crate::config::RunConfig;

pub fn run_from_config(path: &Path, strict: bool) -> Result<()> {
    let config = RunConfig::from_path(path)?;
    let engine = commands::load_engine(&config.schema, config.import_options())?;
    let mut store = commands::open_store(&config.database)?;
    let reports = run_pipeline(
        &config,
        &engine,
        &mut store,
        commands::import_file,
        commands::build_see_also,
    )?;
    commands::finish(&reports, strict)
}

/// Reset (when configured), every import in declared order, then the see-also
/// pass. Every import key is checked against the schema before anything is written.
fn run_pipeline<S, FImport, FSeeAlso>(
    config: &RunConfig,
    engine: &ImportEngine,
    store: &mut S,
    import_fn: FImport,
    see_also_fn: FSeeAlso,
) -> Result<Vec<ImportReport>>
where
    S: RecordStore,
    FImport: Fn(&ImportEngine, &str, &Path, &mut S) -> Result<ImportReport>,
    FSeeAlso: Fn(&SeeAlsoOptions, &mut S) -> Result<usize>,
{
    if config.imports.is_empty() {
        bail!("run config must declare at least one import");
    }
    for import in &config.imports {
        engine.file(&import.key)?;
    }
    if config.reset_before_import {
        engine.reset(&mut *store)?;
    }
    let mut reports = Vec::with_capacity(config.imports.len());
    for (idx, import) in config.imports.iter().enumerate() {
        info!(
            step = idx + 1,
            key = %import.key,
            path = %import.path.display(),
            "importing"
        );
        reports.push(import_fn(engine, &import.key, &import.path, &mut *store)?);
    }
    if config.see_also.enabled {
        let built = see_also_fn(&config.see_also.options(), &mut *store)?;
        info!(records = built, "see-also pass done");
    }
    Ok(reports)
}
