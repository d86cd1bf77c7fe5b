//! Post-import "see also" pass.
//!
//! For every primary record, ranks similar records and snapshots boolean
//! features into one similarity record. Runs over the whole persisted set and
//! appends: running it twice yields two similarity records per primary.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::builder::TAG_ENTITY;
use crate::error::Result;
use crate::record::{Record, RecordId, Value};
use crate::store::RecordStore;

pub const DEFAULT_LIMIT: usize = 6;
pub const DEFAULT_PRIMARY: &str = "SoftMain";
pub const DEFAULT_RECORD: &str = "SoftSeeAlso";
pub const PRIMARY_LINK: &str = "primary";
pub const SIMILAR_LINK: &str = "similar";
pub const FEATURES_FIELD: &str = "booleans";

pub type FeatureSnapshot = BTreeMap<String, bool>;

pub trait SimilarityRanker {
    /// Up to `limit` candidates most similar to `record`, best first.
    fn rank_similar(&self, record: &Record, candidates: &[Record], limit: usize) -> Vec<RecordId>;
}

pub trait FeatureSummarizer {
    fn summarize(&self, record: &Record, related: &[Record]) -> FeatureSnapshot;
}

/// Ranks by Jaccard overlap of a tag collection. Ties go to the closer name,
/// then the lower id. Candidates sharing no tag are never returned.
#[derive(Debug, Clone)]
pub struct SharedTagRanker {
    collection: String,
}

impl SharedTagRanker {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

impl Default for SharedTagRanker {
    fn default() -> Self {
        Self::new("tags")
    }
}

impl SimilarityRanker for SharedTagRanker {
    fn rank_similar(&self, record: &Record, candidates: &[Record], limit: usize) -> Vec<RecordId> {
        let own: HashSet<RecordId> = record.linked(&self.collection).iter().copied().collect();
        if own.is_empty() {
            return Vec::new();
        }
        let own_name = record.name().unwrap_or("");
        let mut scored: Vec<(f64, f64, RecordId)> = candidates
            .iter()
            .filter(|candidate| candidate.id != record.id)
            .filter_map(|candidate| {
                let theirs: HashSet<RecordId> =
                    candidate.linked(&self.collection).iter().copied().collect();
                let shared = own.intersection(&theirs).count();
                if shared == 0 {
                    return None;
                }
                let union = own.union(&theirs).count();
                let score = shared as f64 / union as f64;
                let closeness = normalized_levenshtein(own_name, candidate.name().unwrap_or(""));
                Some((score, closeness, candidate.id))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
                .then(a.2.cmp(&b.2))
        });
        scored.into_iter().take(limit).map(|(_, _, id)| id).collect()
    }
}

/// Collects boolean fields of the record, then of its related records.
/// The first value seen for a field name wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolFeatureSummarizer;

impl FeatureSummarizer for BoolFeatureSummarizer {
    fn summarize(&self, record: &Record, related: &[Record]) -> FeatureSnapshot {
        let mut snapshot = FeatureSnapshot::new();
        for source in std::iter::once(record).chain(related) {
            for (field, value) in &source.values {
                if let Value::Bool(flag) = value {
                    snapshot.entry(field.clone()).or_insert(*flag);
                }
            }
        }
        snapshot
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeeAlsoOptions {
    pub primary: String,
    pub record: String,
    pub limit: usize,
}

impl Default for SeeAlsoOptions {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY.to_string(),
            record: DEFAULT_RECORD.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityRecord {
    pub primary: RecordId,
    pub similar: Vec<RecordId>,
    pub features: FeatureSnapshot,
}

impl SimilarityRecord {
    pub fn into_record(self, id: RecordId, entity: &str) -> Record {
        let mut record = Record::new(id, entity);
        record.set_value(FEATURES_FIELD, Value::Flags(self.features));
        record.set_link(PRIMARY_LINK, self.primary);
        record.links.insert(SIMILAR_LINK.to_string(), self.similar);
        record
    }
}

pub struct SimilarityIndexBuilder<'a, R: ?Sized, F: ?Sized> {
    ranker: &'a R,
    summarizer: &'a F,
    options: SeeAlsoOptions,
}

impl<'a, R, F> SimilarityIndexBuilder<'a, R, F>
where
    R: SimilarityRanker + ?Sized,
    F: FeatureSummarizer + ?Sized,
{
    pub fn new(ranker: &'a R, summarizer: &'a F, options: SeeAlsoOptions) -> Self {
        Self {
            ranker,
            summarizer,
            options,
        }
    }

    pub fn compute<S: RecordStore + ?Sized>(
        &self,
        primary: &Record,
        all: &[Record],
        store: &S,
    ) -> Result<SimilarityRecord> {
        let similar = self.ranker.rank_similar(primary, all, self.options.limit);
        let related = related_records(primary, &self.options.primary, store)?;
        Ok(SimilarityRecord {
            primary: primary.id,
            similar,
            features: self.summarizer.summarize(primary, &related),
        })
    }

    /// Persists one similarity record per primary record and commits once.
    pub fn build<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<usize> {
        let primaries = store.find_all(&self.options.primary)?;
        for primary in &primaries {
            let similarity = self.compute(primary, &primaries, &*store)?;
            debug!(
                primary = %primary.id,
                similar = similarity.similar.len(),
                features = similarity.features.len(),
                "similarity computed"
            );
            let id = store.allocate_id()?;
            store.save(&similarity.into_record(id, &self.options.record))?;
        }
        store.commit()?;
        info!(
            primary = %self.options.primary,
            records = primaries.len(),
            "see-also index built"
        );
        Ok(primaries.len())
    }
}

/// Records reached through single-valued link collections, leaving out tags
/// and other primaries.
fn related_records<S: RecordStore + ?Sized>(
    record: &Record,
    primary_entity: &str,
    store: &S,
) -> Result<Vec<Record>> {
    let mut related = Vec::new();
    let mut seen = HashSet::new();
    let single = record
        .links
        .values()
        .filter_map(|ids| match ids.as_slice() {
            [id] => Some(id),
            _ => None,
        });
    for id in single {
        if !seen.insert(*id) {
            continue;
        }
        if let Some(linked) = store.get(*id)? {
            if linked.entity != TAG_ENTITY && linked.entity != primary_entity {
                related.push(linked);
            }
        }
    }
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn soft(id: u64, name: &str, tags: &[u64]) -> Record {
        let mut record = Record::new(RecordId(id), DEFAULT_PRIMARY);
        record.set_value("name", Value::Text(name.to_string()));
        for tag in tags {
            record.add_link("tags", RecordId(*tag));
        }
        record
    }

    #[test]
    fn ranker_orders_by_overlap_and_excludes_self() {
        let target = soft(1, "Nextcloud", &[100, 101, 102]);
        let candidates = vec![
            target.clone(),
            soft(2, "Dropbox", &[100]),
            soft(3, "Owncloud", &[100, 101, 102]),
            soft(4, "Gimp", &[200]),
            soft(5, "Seafile", &[100, 101]),
        ];
        let ranked = SharedTagRanker::default().rank_similar(&target, &candidates, 6);
        assert_eq!(ranked, vec![RecordId(3), RecordId(5), RecordId(2)]);
    }

    #[test]
    fn ranker_respects_limit_and_breaks_ties_by_name() {
        let target = soft(1, "Nextcloud", &[100]);
        let candidates = vec![
            soft(2, "Zzz", &[100]),
            soft(3, "Nextclouds", &[100]),
            soft(4, "Aaa", &[100]),
        ];
        let ranked = SharedTagRanker::default().rank_similar(&target, &candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0], RecordId(3));
    }

    #[test]
    fn untagged_records_have_no_neighbours() {
        let target = soft(1, "Nextcloud", &[]);
        let candidates = vec![soft(2, "Dropbox", &[100])];
        assert!(SharedTagRanker::default()
            .rank_similar(&target, &candidates, 6)
            .is_empty());
    }

    #[test]
    fn summarizer_prefers_the_record_itself() {
        let mut record = soft(1, "Nextcloud", &[]);
        record.set_value("featured", Value::Bool(true));
        let mut info = Record::new(RecordId(2), "SoftInfo");
        info.set_value("featured", Value::Bool(false));
        info.set_value("opensource", Value::Bool(true));
        info.set_value("pricing", Value::Null);
        let snapshot = BoolFeatureSummarizer.summarize(&record, &[info]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["featured"], true);
        assert_eq!(snapshot["opensource"], true);
    }

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for _ in 0..10 {
            store.allocate_id().unwrap();
        }
        let mut info = Record::new(RecordId(9), "SoftInfo");
        info.set_value("opensource", Value::Bool(true));
        let mut nextcloud = soft(1, "Nextcloud", &[100, 101]);
        nextcloud.set_link("SoftInfo", info.id);
        for record in [nextcloud, soft(2, "Owncloud", &[100, 101]), soft(3, "Gimp", &[200]), info] {
            store.save(&record).unwrap();
        }
        store.commit().unwrap();
        store
    }

    #[test]
    fn build_appends_one_record_per_primary() {
        let mut store = seeded_store();
        let ranker = SharedTagRanker::default();
        let builder =
            SimilarityIndexBuilder::new(&ranker, &BoolFeatureSummarizer, SeeAlsoOptions::default());
        assert_eq!(builder.build(&mut store).unwrap(), 3);
        let records = store.find_all(DEFAULT_RECORD).unwrap();
        assert_eq!(records.len(), 3);
        let nextcloud = records
            .iter()
            .find(|record| record.linked(PRIMARY_LINK) == [RecordId(1)])
            .unwrap();
        assert_eq!(nextcloud.linked(SIMILAR_LINK), &[RecordId(2)]);
        let Some(Value::Flags(flags)) = nextcloud.value(FEATURES_FIELD) else {
            panic!("missing feature snapshot");
        };
        assert_eq!(flags.get("opensource"), Some(&true));

        builder.build(&mut store).unwrap();
        assert_eq!(store.find_all(DEFAULT_RECORD).unwrap().len(), 6);
    }

    #[test]
    fn features_ignore_multi_valued_collections() {
        let mut store = seeded_store();
        let mut alt_a = Record::new(RecordId(7), "Alternative");
        alt_a.set_value("hosted", Value::Bool(true));
        let mut alt_b = Record::new(RecordId(8), "Alternative");
        alt_b.set_value("hosted", Value::Bool(false));
        let mut nextcloud = store.get(RecordId(1)).unwrap().unwrap();
        nextcloud.add_link("Alternative", alt_a.id);
        nextcloud.add_link("Alternative", alt_b.id);
        for record in [alt_a, alt_b, nextcloud.clone()] {
            store.save(&record).unwrap();
        }
        store.commit().unwrap();

        let ranker = SharedTagRanker::default();
        let builder =
            SimilarityIndexBuilder::new(&ranker, &BoolFeatureSummarizer, SeeAlsoOptions::default());
        let all = store.find_all(DEFAULT_PRIMARY).unwrap();
        let similarity = builder.compute(&nextcloud, &all, &store).unwrap();
        assert_eq!(similarity.features.get("opensource"), Some(&true));
        assert!(!similarity.features.contains_key("hosted"));
    }

    #[test]
    fn build_is_deterministic() {
        let ranker = SharedTagRanker::default();
        let builder =
            SimilarityIndexBuilder::new(&ranker, &BoolFeatureSummarizer, SeeAlsoOptions::default());
        let store = seeded_store();
        let all = store.find_all(DEFAULT_PRIMARY).unwrap();
        let first = builder.compute(&all[0], &all, &store).unwrap();
        let second = builder.compute(&all[0], &all, &store).unwrap();
        assert_eq!(first, second);
    }
}
