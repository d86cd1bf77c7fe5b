//! Entity builder and relation linker.
//!
//! Turns one `ok` row into a [`RecordGraph`]: one fresh record per declared
//! entity, plus every already persisted record that gained a back-link while
//! the row was linked (tags, relation-reference targets).

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::convert::{is_integer, split_tags, to_boolean, to_integer, BoolCell};
use crate::error::Result;
use crate::record::{Record, RecordId, Value};
use crate::schema::{EntityDescriptor, FieldType, FileSchema, RelationKind};
use crate::slug::{logo_path, slugify};
use crate::store::RecordStore;
use crate::tabular::ImportRow;

pub const TAG_ENTITY: &str = "Tag";
pub const SLUG_FIELD: &str = "slug";
pub const LOGO_FIELD: &str = "logoUrl";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordGraph {
    /// Fresh records, indexed by entity position. Index 0 is the root.
    pub records: Vec<Record>,
    /// Existing records updated with back-links, keyed by id.
    pub touched: IndexMap<RecordId, Record>,
}

impl RecordGraph {
    pub fn root(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    /// Stages every record of the graph. Does not commit.
    pub fn persist<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<usize> {
        for record in self.records.iter().chain(self.touched.values()) {
            store.save(record)?;
        }
        Ok(self.records.len() + self.touched.len())
    }

    /// Finds an existing record, preferring the copy already modified by
    /// this row so successive back-links accumulate.
    fn resolve<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        entity: &str,
        name: &str,
    ) -> Result<Option<RecordId>> {
        if let Some(record) = self
            .touched
            .values()
            .find(|record| record.entity == entity && record.name() == Some(name))
        {
            return Ok(Some(record.id));
        }
        match store.find_by_name(entity, name)? {
            Some(record) => {
                let id = record.id;
                self.touched.insert(id, record);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    fn back_link(&mut self, target: RecordId, collection: &str, source: RecordId) {
        if let Some(record) = self.touched.get_mut(&target) {
            record.add_link(collection, source);
        }
    }
}

pub struct EntityBuilder<'a> {
    file: &'a FileSchema,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(file: &'a FileSchema) -> Self {
        Self { file }
    }

    /// Builds the linked records for `row`. Draft rows yield `None`.
    /// Unresolved tags and relation targets are left unlinked.
    pub fn build<S: RecordStore + ?Sized>(
        &self,
        row: &ImportRow,
        store: &mut S,
    ) -> Result<Option<RecordGraph>> {
        if !row.is_importable() {
            return Ok(None);
        }
        let content = row.content();
        if content.len() != self.file.field_count() {
            warn!(
                file = %self.file.key,
                line = row.line,
                expected = self.file.field_count(),
                actual = content.len(),
                "importing a row with the wrong column count"
            );
        }

        let mut graph = RecordGraph::default();
        let mut cells = content.iter().map(String::as_str);
        for entity in &self.file.entities {
            let mut record = Record::new(store.allocate_id()?, entity.name.as_str());
            for (field, field_type) in &entity.fields {
                let cell = cells.next().unwrap_or("");
                self.assign(&mut graph, &*store, row, entity, &mut record, field, field_type, cell)?;
            }
            graph.records.push(record);
        }

        self.link_relations(&mut graph);
        self.assign_slug(&mut graph, content.first().map(String::as_str).unwrap_or(""));
        debug!(
            file = %self.file.key,
            line = row.line,
            created = graph.records.len(),
            touched = graph.touched.len(),
            "row built"
        );
        Ok(Some(graph))
    }

    #[allow(clippy::too_many_arguments)]
    fn assign<S: RecordStore + ?Sized>(
        &self,
        graph: &mut RecordGraph,
        store: &S,
        row: &ImportRow,
        entity: &EntityDescriptor,
        record: &mut Record,
        field: &str,
        field_type: &FieldType,
        cell: &str,
    ) -> Result<()> {
        match field_type {
            FieldType::String => record.set_value(field, Value::Text(cell.to_string())),
            FieldType::Boolean => {
                let value = match to_boolean(cell) {
                    BoolCell::Value(flag) => Value::Bool(flag),
                    BoolCell::Unset => Value::Null,
                    BoolCell::Other(raw) => {
                        warn!(line = row.line, field, value = %raw, "not a boolean, left unset");
                        Value::Null
                    }
                };
                record.set_value(field, value);
            }
            FieldType::Integer => {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    if !is_integer(cell) {
                        warn!(line = row.line, field, value = cell, "not an integer, coerced");
                    }
                    Value::Integer(to_integer(cell))
                };
                record.set_value(field, value);
            }
            FieldType::TagList => {
                for token in split_tags(cell) {
                    match graph.resolve(store, TAG_ENTITY, token)? {
                        Some(tag) => {
                            record.add_link(field, tag);
                            graph.back_link(tag, &entity.name, record.id);
                        }
                        None => debug!(line = row.line, tag = token, "unknown tag dropped"),
                    }
                }
            }
            FieldType::RelationReference { target, inverse } => {
                if cell.is_empty() {
                    return Ok(());
                }
                match graph.resolve(store, target, cell)? {
                    Some(found) => {
                        record.set_link(field, found);
                        graph.back_link(found, inverse, record.id);
                    }
                    None => warn!(
                        line = row.line,
                        target = %target,
                        key = cell,
                        "relation target not found, left unlinked"
                    ),
                }
            }
        }
        Ok(())
    }

    /// Links each related entity to the record at its declared source
    /// position, in both directions.
    fn link_relations(&self, graph: &mut RecordGraph) {
        for (position, entity) in self.file.entities.iter().enumerate() {
            let Some(relation) = entity.relation else {
                continue;
            };
            let (Some(owner), Some(member)) =
                (graph.records.get(relation.source), graph.records.get(position))
            else {
                continue;
            };
            let (owner_id, owner_entity) = (owner.id, owner.entity.clone());
            let member_id = member.id;
            match relation.kind {
                RelationKind::ManyToMany => {
                    graph.records[relation.source].add_link(entity.name.as_str(), member_id);
                    graph.records[position].add_link(owner_entity, owner_id);
                }
                RelationKind::OneToOne => {
                    graph.records[relation.source].set_link(entity.name.as_str(), member_id);
                    graph.records[position].set_link(owner_entity, owner_id);
                }
            }
        }
    }

    fn assign_slug(&self, graph: &mut RecordGraph, key: &str) {
        let slug = slugify(key);
        let Some(root) = graph.records.first_mut() else {
            return;
        };
        for entity in &self.file.entities {
            if entity.slug_exceptions.assign_slug {
                root.set_value(SLUG_FIELD, Value::Text(slug.clone()));
            }
            if entity.slug_exceptions.assign_logo {
                root.set_value(LOGO_FIELD, Value::Text(logo_path(&slug)));
            }
        }
    }
}
