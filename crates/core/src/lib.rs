mod builder;
mod convert;
mod duplicate;
mod error;
mod import;
mod record;
mod schema;
mod see_also;
mod slug;
mod store;
mod tabular;
mod validate;

pub use builder::{EntityBuilder, RecordGraph, LOGO_FIELD, SLUG_FIELD, TAG_ENTITY};
pub use convert::{is_integer, split_tags, to_boolean, to_integer, BoolCell, TAG_SEPARATOR};
pub use duplicate::{exists, find_row_duplicate, DuplicatePolicy};
pub use error::{Result, VersusError};
pub use import::{ImportEngine, ImportOptions, ImportReport, TransactionScope};
pub use record::{Record, RecordId, Value};
pub use schema::{
    EntityDescriptor, FieldType, FileSchema, RelationKind, RelationSpec, SchemaDescriptor,
    SchemaError, SlugExceptions, NATURAL_KEY_FIELD,
};
pub use see_also::{
    BoolFeatureSummarizer, FeatureSnapshot, FeatureSummarizer, SeeAlsoOptions, SharedTagRanker,
    SimilarityIndexBuilder, SimilarityRanker, SimilarityRecord, DEFAULT_LIMIT, DEFAULT_PRIMARY,
    DEFAULT_RECORD, FEATURES_FIELD, PRIMARY_LINK, SIMILAR_LINK,
};
pub use slug::{logo_path, slugify};
pub use store::{MemoryStore, RecordStore};
pub use tabular::{read_rows, read_rows_from, ImportRow, CONTROL_OK};
pub use validate::{ExpectedKind, ImportError, RowValidator, ValidationResult};
