use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use versus_core::{DuplicatePolicy, TransactionScope};

#[derive(Parser, Debug)]
#[command(name = "versus", about = "Schema-driven CSV importer for the versus catalogue")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reset, import every configured file in order, then build the see-also index.
    Run {
        #[arg(long, default_value = "versus.yaml")]
        config: PathBuf,
        /// Exit with an error when any row failed validation.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Check a file against its schema without writing anything.
    Validate {
        #[arg(long, default_value = "import.yml")]
        schema: PathBuf,
        /// Database used for duplicate lookups; an empty store when omitted.
        #[arg(long)]
        database: Option<PathBuf>,
        #[arg(long)]
        key: String,
        file: PathBuf,
    },
    Import {
        #[arg(long, default_value = "import.yml")]
        schema: PathBuf,
        #[arg(long, default_value = "versus.sqlite")]
        database: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long, value_enum, default_value_t = TransactionArg::PerRow)]
        transaction: TransactionArg,
        #[arg(long, value_enum, default_value_t = DuplicatesArg::ReImport)]
        duplicates: DuplicatesArg,
        #[arg(long, default_value_t = false)]
        strict: bool,
        file: PathBuf,
    },
    SeeAlso {
        #[arg(long, default_value = "versus.sqlite")]
        database: PathBuf,
        #[arg(long, default_value = "SoftMain")]
        primary: String,
        #[arg(long, default_value = "SoftSeeAlso")]
        record: String,
        #[arg(long, default_value_t = 6)]
        limit: usize,
    },
    /// Delete every record of every table named in the schema.
    Reset {
        #[arg(long, default_value = "import.yml")]
        schema: PathBuf,
        #[arg(long, default_value = "versus.sqlite")]
        database: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionArg {
    /// Commit after every imported row.
    PerRow,
    /// Commit once at the end of the file.
    PerFile,
}

impl From<TransactionArg> for TransactionScope {
    fn from(arg: TransactionArg) -> Self {
        match arg {
            TransactionArg::PerRow => TransactionScope::PerRow,
            TransactionArg::PerFile => TransactionScope::PerFile,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatesArg {
    /// Import the row again.
    ReImport,
    /// Leave the row out silently.
    Skip,
    /// Leave the row out and report it as an error.
    Reject,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::ReImport => DuplicatePolicy::ReImport,
            DuplicatesArg::Skip => DuplicatePolicy::Skip,
            DuplicatesArg::Reject => DuplicatePolicy::Reject,
        }
    }
}
