mod cli;
mod commands;
mod config;
mod logging;
mod run;

use anyhow::Result;
use clap::Parser;
use versus_core::{ImportOptions, SeeAlsoOptions};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose || logging::env_flag();
    logging::init(verbose);
    match cli.command {
        Command::Run { config, strict } => run::run_from_config(&config, strict),
        Command::Validate {
            schema,
            database,
            key,
            file,
        } => commands::validate(&schema, database.as_deref(), &key, &file),
        Command::Import {
            schema,
            database,
            key,
            transaction,
            duplicates,
            strict,
            file,
        } => {
            let options = ImportOptions {
                transaction: transaction.into(),
                duplicates: duplicates.into(),
            };
            commands::import(&schema, &database, &key, &file, options, strict)
        }
        Command::SeeAlso {
            database,
            primary,
            record,
            limit,
        } => commands::see_also(
            &database,
            SeeAlsoOptions {
                primary,
                record,
                limit,
            },
        ),
        Command::Reset { schema, database } => commands::reset(&schema, &database),
    }
}
