use thiserror::Error;

use crate::record::RecordId;
use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum VersusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("unknown import file: {0}")]
    UnknownImportFile(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VersusError>;

impl From<anyhow::Error> for VersusError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
