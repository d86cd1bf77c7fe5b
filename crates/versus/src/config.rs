use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use versus_core::{
    DuplicatePolicy, ImportOptions, SeeAlsoOptions, TransactionScope, DEFAULT_LIMIT,
    DEFAULT_PRIMARY, DEFAULT_RECORD,
};

pub const DATABASE_ENV: &str = "VERSUS_DATABASE";
pub const SCHEMA_ENV: &str = "VERSUS_SCHEMA";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportConfig {
    pub key: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeeAlsoConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_record")]
    pub record: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for SeeAlsoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            primary: default_primary(),
            record: default_record(),
            limit: default_limit(),
        }
    }
}

impl SeeAlsoConfig {
    pub fn options(&self) -> SeeAlsoOptions {
        SeeAlsoOptions {
            primary: self.primary.clone(),
            record: self.record.clone(),
            limit: self.limit,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_primary() -> String {
    DEFAULT_PRIMARY.to_string()
}

fn default_record() -> String {
    DEFAULT_RECORD.to_string()
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_schema() -> PathBuf {
    PathBuf::from("import.yml")
}

fn default_database() -> PathBuf {
    PathBuf::from("versus.sqlite")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    #[serde(default = "default_schema")]
    pub schema: PathBuf,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    pub imports: Vec<ImportConfig>,
    #[serde(default)]
    pub transaction: TransactionScope,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    #[serde(default)]
    pub see_also: SeeAlsoConfig,
    #[serde(default)]
    pub reset_before_import: bool,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_yaml_str(&raw)?;
        config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new("")));
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("invalid versus run config")
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            transaction: self.transaction,
            duplicates: self.duplicates,
        }
    }

    /// Relative paths in the config file are taken from the config's directory.
    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.schema);
        resolve(&mut self.database);
        for import in &mut self.imports {
            resolve(&mut import.path);
        }
    }

    fn apply_env(&mut self) {
        self.apply_overrides(env::var(DATABASE_ENV).ok(), env::var(SCHEMA_ENV).ok());
    }

    fn apply_overrides(&mut self, database: Option<String>, schema: Option<String>) {
        if let Some(database) = database.filter(|value| !value.trim().is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(schema) = schema.filter(|value| !value.trim().is_empty()) {
            self.schema = PathBuf::from(schema);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = RunConfig::from_yaml_str(
            r#"
imports:
  - key: import-tags
    path: tags.csv
"#,
        )
        .unwrap();
        assert_eq!(config.schema, PathBuf::from("import.yml"));
        assert_eq!(config.transaction, TransactionScope::PerRow);
        assert_eq!(config.duplicates, DuplicatePolicy::ReImport);
        assert!(config.see_also.enabled);
        assert_eq!(config.see_also.options(), SeeAlsoOptions::default());
        assert!(!config.reset_before_import);
    }

    #[test]
    fn parses_every_option() {
        let config = RunConfig::from_yaml_str(
            r#"
schema: conf/import.yml
database: data/versus.sqlite
transaction: per-file
duplicates: reject
reset-before-import: true
see-also:
  enabled: false
  limit: 3
imports:
  - key: import-tags
    path: tags.csv
  - key: import-softwares
    path: softwares.csv
"#,
        )
        .unwrap();
        assert_eq!(config.imports.len(), 2);
        assert_eq!(config.imports[1].key, "import-softwares");
        assert_eq!(config.import_options().transaction, TransactionScope::PerFile);
        assert_eq!(config.import_options().duplicates, DuplicatePolicy::Reject);
        assert!(config.reset_before_import);
        assert!(!config.see_also.enabled);
        assert_eq!(config.see_also.limit, 3);
        assert_eq!(config.see_also.primary, DEFAULT_PRIMARY);
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("versus.yaml");
        fs::write(
            &path,
            "schema: import.yml\nimports:\n  - key: import-tags\n    path: csv/tags.csv\n",
        )
        .unwrap();
        let mut config = RunConfig::from_yaml_str(&fs::read_to_string(&path).unwrap()).unwrap();
        config.resolve_relative_to(dir.path());
        assert_eq!(config.schema, dir.path().join("import.yml"));
        assert_eq!(config.imports[0].path, dir.path().join("csv/tags.csv"));
    }

    #[test]
    fn overrides_replace_paths_unless_blank() {
        let mut config = RunConfig::from_yaml_str("imports: []\n").unwrap();
        config.apply_overrides(Some("/tmp/other.sqlite".into()), Some("  ".into()));
        assert_eq!(config.database, PathBuf::from("/tmp/other.sqlite"));
        assert_eq!(config.schema, PathBuf::from("import.yml"));
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(RunConfig::from_yaml_str("duplicates: sometimes\nimports: []\n").is_err());
    }
}
