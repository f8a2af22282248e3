//src/taxonomy.rs

use ahash::{AHashMap, AHashSet};

use crate::error::LookupError;
use crate::types::{HitRecord, SummarizedHit, TaxId, TaxonInfo};

/// taxid -> name and lineage
pub type TaxonMap = AHashMap<TaxId, TaxonInfo>;

/// Batch access to a taxonomy store.
///
/// Implementations answer for as many of the requested ids as they know;
/// unknown ids are simply left out of the map. An `Err` means the store
/// itself could not be reached.
pub trait TaxonomyLookup: Send + Sync {
    fn batch_resolve(&self, ids: &[TaxId]) -> Result<TaxonMap, LookupError>;
}

impl TaxonomyLookup for TaxonMap {
    fn batch_resolve(&self, ids: &[TaxId]) -> Result<TaxonMap, LookupError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.get(id).map(|info| (id.clone(), info.clone())))
            .collect())
    }
}

/// Deduplicate ids, keeping first-seen order.
pub fn unique_ids<'a, I: IntoIterator<Item = &'a TaxId>>(ids: I) -> Vec<TaxId> {
    let mut seen: AHashSet<&'a TaxId> = AHashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// One batch call for `ids`. A failed call is logged and treated as an
/// empty answer.
pub fn lookup_or_empty(lookup: &dyn TaxonomyLookup, ids: &[TaxId]) -> TaxonMap {
    if ids.is_empty() {
        return TaxonMap::new();
    }
    match lookup.batch_resolve(ids) {
        Ok(map) => map,
        Err(e) => {
            log::warn!("Taxonomy lookup for {} id(s) failed: {}", ids.len(), e);
            TaxonMap::new()
        }
    }
}

/// Drop the taxon's own id if a store hands back an inclusive lineage.
fn exclusive_lineage(id: &str, mut info: TaxonInfo) -> TaxonInfo {
    if info.ancestors.last().map(|last| last == id).unwrap_or(false) {
        info.ancestors.pop();
    }
    info
}

/// Attach name and lineage to every hit with a single batch lookup.
/// Ids the lookup does not return get the `NotFound` sentinel.
pub fn resolve_hits(hits: Vec<SummarizedHit>, lookup: &dyn TaxonomyLookup) -> Vec<HitRecord> {
    let ids = unique_ids(hits.iter().map(|h| &h.hit.taxid));
    let found = lookup_or_empty(lookup, &ids);

    let missing = ids.iter().filter(|id| !found.contains_key(*id)).count();
    if missing > 0 {
        log::warn!("{} of {} hit taxid(s) not found in taxonomy", missing, ids.len());
    }

    hits.into_iter()
        .map(|hit| {
            let taxon = found
                .get(&hit.hit.taxid)
                .cloned()
                .map(|info| exclusive_lineage(&hit.hit.taxid, info))
                .unwrap_or_else(TaxonInfo::not_found);
            HitRecord::from_parts(hit, taxon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawHit, NOT_FOUND};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and records what was asked for.
    struct CountingLookup {
        inner: TaxonMap,
        calls: AtomicUsize,
    }

    impl TaxonomyLookup for CountingLookup {
        fn batch_resolve(&self, ids: &[TaxId]) -> Result<TaxonMap, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.batch_resolve(ids)
        }
    }

    struct BrokenLookup;

    impl TaxonomyLookup for BrokenLookup {
        fn batch_resolve(&self, _ids: &[TaxId]) -> Result<TaxonMap, LookupError> {
            Err(LookupError::Unavailable("connection refused".to_string()))
        }
    }

    fn summarized(taxid: &str) -> SummarizedHit {
        SummarizedHit {
            hit: RawHit {
                accession: format!("acc_{taxid}"),
                title: String::new(),
                taxid: taxid.to_string(),
                len: 100,
                num: 1,
                hsps: Vec::new(),
            },
            query_cover_percent: 100,
            percent_identity: 100.0,
        }
    }

    fn info(name: &str, ancestors: &[&str]) -> TaxonInfo {
        TaxonInfo {
            name: name.to_string(),
            ancestors: ancestors.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn resolves_with_one_batch_call() {
        let mut inner = TaxonMap::new();
        inner.insert("9606".to_string(), info("Homo sapiens", &["1", "9605"]));
        inner.insert("10090".to_string(), info("Mus musculus", &["1", "10088"]));
        let lookup = CountingLookup { inner, calls: AtomicUsize::new(0) };

        let hits = vec![summarized("9606"), summarized("10090"), summarized("9606")];
        let records = resolve_hits(hits, &lookup);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(records[0].name, "Homo sapiens");
        assert_eq!(records[0].ancestors, vec!["1", "9605"]);
        assert_eq!(records[1].name, "Mus musculus");
        assert_eq!(records[2].name, "Homo sapiens");
    }

    #[test]
    fn missing_ids_get_the_sentinel() {
        let mut inner = TaxonMap::new();
        inner.insert("9606".to_string(), info("Homo sapiens", &["1"]));
        let records = resolve_hits(vec![summarized("9606"), summarized("42")], &inner);
        assert!(records[0].is_resolved());
        assert_eq!(records[1].name, NOT_FOUND);
        assert_eq!(records[1].ancestors, vec![NOT_FOUND]);
        assert!(!records[1].is_resolved());
    }

    #[test]
    fn failed_lookup_degrades_to_sentinels() {
        let records = resolve_hits(vec![summarized("1"), summarized("2")], &BrokenLookup);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.name == NOT_FOUND && r.ancestors == vec![NOT_FOUND]));
    }

    #[test]
    fn inclusive_lineages_are_trimmed() {
        let mut inner = TaxonMap::new();
        inner.insert("9606".to_string(), info("Homo sapiens", &["1", "9605", "9606"]));
        let records = resolve_hits(vec![summarized("9606")], &inner);
        assert_eq!(records[0].ancestors, vec!["1", "9605"]);
    }

    #[test]
    fn unique_ids_keeps_first_seen_order() {
        let ids: Vec<TaxId> = ["3", "1", "3", "2", "1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_ids(&ids), vec!["3", "1", "2"]);
    }
}
