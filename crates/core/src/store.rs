use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::record::{Record, RecordId};

/// Persistence interface consumed by the import engine.
///
/// Writes are staged by `save` and made durable by `commit`. Reads through
/// the same store observe staged writes.
pub trait RecordStore {
    fn allocate_id(&mut self) -> Result<RecordId>;

    fn get(&self, id: RecordId) -> Result<Option<Record>>;

    fn find_by_name(&self, entity: &str, name: &str) -> Result<Option<Record>>;

    fn find_all(&self, entity: &str) -> Result<Vec<Record>>;

    /// Stages an insert or a replacement keyed by `record.id`.
    fn save(&mut self, record: &Record) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Stages removal of every record whose entity is listed. Nothing is
    /// removed until the next `commit`.
    fn delete_all(&mut self, tables: &[String]) -> Result<()>;
}

/// In-memory store. Staged upserts live in an overlay keyed by id; staged
/// deletions hide every committed record of the entity until commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: u64,
    committed: BTreeMap<RecordId, Record>,
    overlay: BTreeMap<RecordId, Record>,
    deleted: HashSet<String>,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits that flushed at least one write.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn pending(&self) -> usize {
        self.overlay.len() + self.deleted.len()
    }

    pub fn rollback(&mut self) {
        self.overlay.clear();
        self.deleted.clear();
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Committed records still visible: not replaced in the overlay and not
    /// wiped by a staged deletion.
    fn visible_committed(&self) -> impl Iterator<Item = &Record> {
        self.committed.values().filter(|record| {
            !self.overlay.contains_key(&record.id) && !self.deleted.contains(&record.entity)
        })
    }
}

impl RecordStore for MemoryStore {
    fn allocate_id(&mut self) -> Result<RecordId> {
        self.next_id += 1;
        Ok(RecordId(self.next_id))
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>> {
        if let Some(record) = self.overlay.get(&id) {
            return Ok(Some(record.clone()));
        }
        Ok(self
            .committed
            .get(&id)
            .filter(|record| !self.deleted.contains(&record.entity))
            .cloned())
    }

    fn find_by_name(&self, entity: &str, name: &str) -> Result<Option<Record>> {
        Ok(self
            .overlay
            .values()
            .chain(self.visible_committed())
            .filter(|record| record.entity == entity && record.name() == Some(name))
            .min_by_key(|record| record.id)
            .cloned())
    }

    fn find_all(&self, entity: &str) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = self
            .overlay
            .values()
            .chain(self.visible_committed())
            .filter(|record| record.entity == entity)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    fn save(&mut self, record: &Record) -> Result<()> {
        self.overlay.insert(record.id, record.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.overlay.is_empty() && self.deleted.is_empty() {
            return Ok(());
        }
        let deleted = std::mem::take(&mut self.deleted);
        self.committed
            .retain(|_, record| !deleted.contains(&record.entity));
        self.committed.append(&mut self.overlay);
        self.commits += 1;
        Ok(())
    }

    fn delete_all(&mut self, tables: &[String]) -> Result<()> {
        for table in tables {
            self.overlay.retain(|_, record| &record.entity != table);
            self.deleted.insert(table.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn named(store: &mut MemoryStore, entity: &str, name: &str) -> Record {
        let mut record = Record::new(store.allocate_id().unwrap(), entity);
        record.set_value("name", Value::Text(name.to_string()));
        record
    }

    #[test]
    fn staged_writes_are_visible_before_commit() {
        let mut store = MemoryStore::new();
        let tag = named(&mut store, "Tag", "Cloud");
        store.save(&tag).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.find_by_name("Tag", "Cloud").unwrap(), Some(tag.clone()));
        store.commit().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.get(tag.id).unwrap(), Some(tag));
    }

    #[test]
    fn save_replaces_by_id() {
        let mut store = MemoryStore::new();
        let mut tag = named(&mut store, "Tag", "Cloud");
        store.save(&tag).unwrap();
        tag.add_link("SoftMain", RecordId(99));
        store.save(&tag).unwrap();
        store.commit().unwrap();
        assert_eq!(store.find_all("Tag").unwrap(), vec![tag]);
    }

    #[test]
    fn rollback_drops_staged_writes() {
        let mut store = MemoryStore::new();
        let tag = named(&mut store, "Tag", "Cloud");
        store.save(&tag).unwrap();
        store.rollback();
        store.commit().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn saves_after_delete_all_survive_the_commit() {
        let mut store = MemoryStore::new();
        let old = named(&mut store, "Tag", "Cloud");
        store.save(&old).unwrap();
        store.commit().unwrap();

        store.delete_all(&["Tag".to_string()]).unwrap();
        assert_eq!(store.get(old.id).unwrap(), None);
        let fresh = named(&mut store, "Tag", "Cloud");
        store.save(&fresh).unwrap();
        assert_eq!(store.find_by_name("Tag", "Cloud").unwrap(), Some(fresh.clone()));
        store.commit().unwrap();
        assert_eq!(store.find_all("Tag").unwrap(), vec![fresh]);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn staged_replacement_hides_the_committed_copy() {
        let mut store = MemoryStore::new();
        let mut tag = named(&mut store, "Tag", "Cloud");
        store.save(&tag).unwrap();
        store.commit().unwrap();
        tag.set_value("name", Value::Text("Sky".to_string()));
        store.save(&tag).unwrap();
        assert!(store.find_by_name("Tag", "Cloud").unwrap().is_none());
        assert_eq!(store.find_all("Tag").unwrap(), vec![tag]);
    }

    #[test]
    fn delete_all_only_touches_listed_entities() {
        let mut store = MemoryStore::new();
        let tag = named(&mut store, "Tag", "Cloud");
        let soft = named(&mut store, "SoftMain", "Nextcloud");
        store.save(&tag).unwrap();
        store.save(&soft).unwrap();
        store.commit().unwrap();
        store.delete_all(&["Tag".to_string()]).unwrap();
        assert_eq!(store.len(), 2);
        store.commit().unwrap();
        assert_eq!(store.find_all("Tag").unwrap(), vec![]);
        assert_eq!(store.find_all("SoftMain").unwrap(), vec![soft]);
    }
}
