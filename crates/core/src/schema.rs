//! Schema descriptor for import files.
//!
//! The descriptor is read once from `import.yml` and is immutable afterwards.
//! Each import file declares an ordered list of entities; every entity
//! consumes a contiguous run of cells (after the control flag) in the order
//! its fields are declared.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::error::Result;

pub const NATURAL_KEY_FIELD: &str = "name";
const TABLE_NAMES_KEY: &str = "table-names";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Integer,
    TagList,
    /// The cell is the natural key of an already persisted `target` record.
    /// Linking also appends the current record to `inverse` on the target.
    RelationReference {
        target: String,
        inverse: String,
    },
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::TagList => "list-tag",
            FieldType::RelationReference { .. } => "relation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToMany,
    OneToOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSpec {
    pub kind: RelationKind,
    /// Position of the owning entity in the file's entity sequence.
    pub source: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlugExceptions {
    pub assign_slug: bool,
    pub assign_logo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub fields: IndexMap<String, FieldType>,
    pub relation: Option<RelationSpec>,
    pub slug_exceptions: SlugExceptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSchema {
    pub key: String,
    pub entities: Vec<EntityDescriptor>,
    pub table_names: Vec<String>,
}

impl FileSchema {
    pub fn field_count(&self) -> usize {
        self.entities.iter().map(|entity| entity.fields.len()).sum()
    }

    /// Control flag plus every declared field.
    pub fn expected_column_count(&self) -> usize {
        1 + self.field_count()
    }

    pub fn root(&self) -> &EntityDescriptor {
        &self.entities[0]
    }

    /// Entity whose `name` is looked up for duplicates, when the root entity
    /// starts with a plain `name` field.
    pub fn natural_key_entity(&self) -> Option<&str> {
        let root = self.root();
        match root.fields.get_index(0) {
            Some((field, FieldType::String)) if field == NATURAL_KEY_FIELD => {
                Some(root.name.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    files: IndexMap<String, FileSchema>,
    table_names: Vec<String>,
}

impl SchemaDescriptor {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let top: IndexMap<String, serde_yaml::Value> = serde_yaml::from_str(raw)?;
        let mut descriptor = SchemaDescriptor::default();
        for (key, value) in top {
            if key == TABLE_NAMES_KEY {
                let names: Vec<String> =
                    serde_yaml::from_value(value).map_err(|err| SchemaError::Malformed {
                        file: key.clone(),
                        message: err.to_string(),
                    })?;
                push_unique(&mut descriptor.table_names, names);
                continue;
            }
            let raw_file: RawFile =
                serde_yaml::from_value(value).map_err(|err| SchemaError::Malformed {
                    file: key.clone(),
                    message: err.to_string(),
                })?;
            let file = raw_file.resolve(&key)?;
            push_unique(&mut descriptor.table_names, file.table_names.clone());
            descriptor.files.insert(key, file);
        }
        Ok(descriptor)
    }

    pub fn file(&self, key: &str) -> Option<&FileSchema> {
        self.files.get(key)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileSchema> {
        self.files.values()
    }

    /// Every storage identifier declared anywhere in the configuration.
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }
}

fn push_unique(into: &mut Vec<String>, names: Vec<String>) {
    for name in names {
        if !into.contains(&name) {
            into.push(name);
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("file '{file}': {message}")]
    Malformed { file: String, message: String },
    #[error("file '{0}' declares no entities")]
    NoEntities(String),
    #[error("file '{0}' declares no fields")]
    NoFields(String),
    #[error("file '{file}', entity '{entity}': unknown type '{value}' for field '{field}'")]
    UnknownFieldType {
        file: String,
        entity: String,
        field: String,
        value: String,
    },
    #[error("file '{file}', entity '{entity}': field '{field}' needs both a target and an inverse")]
    IncompleteReference {
        file: String,
        entity: String,
        field: String,
    },
    #[error("file '{file}', entity '{entity}': unknown relation '{value}'")]
    UnknownRelation {
        file: String,
        entity: String,
        value: String,
    },
    #[error("file '{file}', entity '{entity}': relation source '{source_entity}' is not declared in this file")]
    UnknownRelationSource {
        file: String,
        entity: String,
        source_entity: String,
    },
    #[error("file '{file}', entity '{entity}': an entity cannot be its own relation source")]
    SelfRelation { file: String, entity: String },
}

#[derive(Debug, Deserialize)]
struct RawFile {
    entities: IndexMap<String, RawEntity>,
    #[serde(default, rename = "table-names")]
    table_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    fields: Option<IndexMap<String, RawFieldType>>,
    #[serde(default)]
    links: Option<RawLinks>,
    #[serde(default, rename = "slugExceptions", alias = "slug-exceptions")]
    slug_exceptions: Option<RawSlugExceptions>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFieldType {
    Name(String),
    Reference {
        #[serde(default)]
        target: String,
        #[serde(default, rename = "inversedBy", alias = "inversedby")]
        inversed_by: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawLinks {
    #[serde(default)]
    relation: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSlugExceptions {
    #[serde(default)]
    slug: Option<YesNo>,
    #[serde(default)]
    logo: Option<YesNo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YesNo {
    Bool(bool),
    Text(String),
}

impl YesNo {
    fn enabled(value: &Option<YesNo>) -> bool {
        match value {
            Some(YesNo::Bool(flag)) => *flag,
            Some(YesNo::Text(text)) => {
                matches!(text.trim().to_lowercase().as_str(), "yes" | "oui" | "true")
            }
            None => false,
        }
    }
}

impl RawFile {
    fn resolve(self, key: &str) -> std::result::Result<FileSchema, SchemaError> {
        if self.entities.is_empty() {
            return Err(SchemaError::NoEntities(key.to_string()));
        }
        let names: Vec<String> = self.entities.keys().cloned().collect();
        let mut entities = Vec::with_capacity(self.entities.len());
        for (position, (name, raw)) in self.entities.into_iter().enumerate() {
            let mut fields = IndexMap::new();
            for (field, raw_type) in raw.fields.unwrap_or_default() {
                let field_type = resolve_field_type(key, &name, &field, raw_type)?;
                fields.insert(field, field_type);
            }
            let relation = resolve_relation(key, &name, position, &names, raw.links)?;
            let slug = raw.slug_exceptions.unwrap_or_default();
            entities.push(EntityDescriptor {
                name,
                fields,
                relation,
                slug_exceptions: SlugExceptions {
                    assign_slug: YesNo::enabled(&slug.slug),
                    assign_logo: YesNo::enabled(&slug.logo),
                },
            });
        }
        let file = FileSchema {
            key: key.to_string(),
            entities,
            table_names: self.table_names,
        };
        if file.field_count() == 0 {
            return Err(SchemaError::NoFields(key.to_string()));
        }
        Ok(file)
    }
}

fn resolve_field_type(
    file: &str,
    entity: &str,
    field: &str,
    raw: RawFieldType,
) -> std::result::Result<FieldType, SchemaError> {
    match raw {
        RawFieldType::Name(value) => match value.trim().to_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "boolean" => Ok(FieldType::Boolean),
            "integer" => Ok(FieldType::Integer),
            "list-tag" | "tag-list" => Ok(FieldType::TagList),
            _ => Err(SchemaError::UnknownFieldType {
                file: file.to_string(),
                entity: entity.to_string(),
                field: field.to_string(),
                value,
            }),
        },
        RawFieldType::Reference {
            target,
            inversed_by,
        } => {
            if target.trim().is_empty() || inversed_by.trim().is_empty() {
                return Err(SchemaError::IncompleteReference {
                    file: file.to_string(),
                    entity: entity.to_string(),
                    field: field.to_string(),
                });
            }
            Ok(FieldType::RelationReference {
                target: target.trim().to_string(),
                inverse: inversed_by.trim().to_string(),
            })
        }
    }
}

fn resolve_relation(
    file: &str,
    entity: &str,
    position: usize,
    names: &[String],
    links: Option<RawLinks>,
) -> std::result::Result<Option<RelationSpec>, SchemaError> {
    let Some(links) = links else {
        return Ok(None);
    };
    let relation = links.relation.unwrap_or_default();
    let kind = match relation.trim().to_lowercase().replace('_', "-").as_str() {
        "" | "none" => return Ok(None),
        "many-to-many" => RelationKind::ManyToMany,
        "one-to-one" => RelationKind::OneToOne,
        _ => {
            return Err(SchemaError::UnknownRelation {
                file: file.to_string(),
                entity: entity.to_string(),
                value: relation,
            })
        }
    };
    let source = match links.source.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(source) => names.iter().position(|name| name == source).ok_or_else(|| {
            SchemaError::UnknownRelationSource {
                file: file.to_string(),
                entity: entity.to_string(),
                source_entity: source.to_string(),
            }
        })?,
    };
    if source == position {
        return Err(SchemaError::SelfRelation {
            file: file.to_string(),
            entity: entity.to_string(),
        });
    }
    Ok(Some(RelationSpec { kind, source }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersusError;

    const SOFTWARES: &str = r#"
import-softwares:
  entities:
    SoftMain:
      fields:
        name: string
        description: string
        tags: list-tag
      slugExceptions:
        slug: yes
        logo: yes
    SoftInfo:
      fields:
        opensource: boolean
        creation: integer
      links:
        relation: One-to-One
        source: SoftMain
  table-names: [SoftMain, SoftInfo]
import-versus:
  entities:
    Versus:
      fields:
        softMain1:
          target: SoftMain
          inversedBy: versus1
        description: string
table-names: [Tag]
"#;

    #[test]
    fn parses_ordered_entities_and_fields() {
        let schema = SchemaDescriptor::from_yaml_str(SOFTWARES).unwrap();
        let file = schema.file("import-softwares").unwrap();
        assert_eq!(file.entities.len(), 2);
        assert_eq!(file.root().name, "SoftMain");
        let fields: Vec<&String> = file.root().fields.keys().collect();
        assert_eq!(fields, vec!["name", "description", "tags"]);
        assert_eq!(file.root().fields["tags"], FieldType::TagList);
        assert_eq!(file.expected_column_count(), 6);
        assert!(file.root().slug_exceptions.assign_slug);
        assert!(file.root().slug_exceptions.assign_logo);
        assert_eq!(
            file.entities[1].relation,
            Some(RelationSpec {
                kind: RelationKind::OneToOne,
                source: 0
            })
        );
        assert_eq!(file.natural_key_entity(), Some("SoftMain"));
    }

    #[test]
    fn parses_relation_reference_fields() {
        let schema = SchemaDescriptor::from_yaml_str(SOFTWARES).unwrap();
        let file = schema.file("import-versus").unwrap();
        assert_eq!(
            file.root().fields["softMain1"],
            FieldType::RelationReference {
                target: "SoftMain".to_string(),
                inverse: "versus1".to_string(),
            }
        );
        assert_eq!(file.natural_key_entity(), None);
    }

    #[test]
    fn collects_table_names_from_every_level() {
        let schema = SchemaDescriptor::from_yaml_str(SOFTWARES).unwrap();
        assert_eq!(schema.table_names(), &["SoftMain", "SoftInfo", "Tag"]);
        assert_eq!(schema.files().count(), 2);
    }

    #[test]
    fn unknown_field_type_is_fatal() {
        let raw = "import-tags:\n  entities:\n    Tag:\n      fields:\n        name: float\n";
        let err = SchemaDescriptor::from_yaml_str(raw).unwrap_err();
        assert!(matches!(
            err,
            VersusError::Schema(SchemaError::UnknownFieldType { ref value, .. }) if value == "float"
        ));
    }

    #[test]
    fn undeclared_relation_source_is_fatal() {
        let raw = r#"
import-tags:
  entities:
    Tag:
      fields:
        name: string
      links:
        relation: Many-to-Many
        source: Category
"#;
        let err = SchemaDescriptor::from_yaml_str(raw).unwrap_err();
        assert!(matches!(
            err,
            VersusError::Schema(SchemaError::UnknownRelationSource { .. })
        ));
    }

    #[test]
    fn root_cannot_relate_to_itself() {
        let raw = r#"
import-tags:
  entities:
    Tag:
      fields:
        name: string
      links:
        relation: One-to-One
"#;
        let err = SchemaDescriptor::from_yaml_str(raw).unwrap_err();
        assert!(matches!(err, VersusError::Schema(SchemaError::SelfRelation { .. })));
    }

    #[test]
    fn file_without_fields_is_fatal() {
        let raw = "import-tags:\n  entities:\n    Tag:\n      fields:\n";
        let err = SchemaDescriptor::from_yaml_str(raw).unwrap_err();
        assert!(matches!(err, VersusError::Schema(SchemaError::NoFields(_))));
    }

    #[test]
    fn relation_none_means_no_relation() {
        let raw = r#"
import-tags:
  entities:
    Tag:
      fields:
        name: string
      links:
        relation: none
      slugExceptions:
        slug: no
        logo: no
"#;
        let schema = SchemaDescriptor::from_yaml_str(raw).unwrap();
        let root = schema.file("import-tags").unwrap().root();
        assert_eq!(root.relation, None);
        assert_eq!(root.slug_exceptions, SlugExceptions::default());
    }
}
