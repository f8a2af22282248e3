//src/taxdb.rs

use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::LookupError;
use crate::taxonomy::{TaxonMap, TaxonomyLookup};
use crate::types::{TaxId, TaxonInfo};

pub type ParentMap = AHashMap<u32, u32>;
pub type NameMap = AHashMap<u32, String>;

/// An in-memory taxonomy built from parent links.
#[derive(Debug, Default, Clone)]
pub struct TaxonomyDb {
    pub parent_map: ParentMap,
    pub name_map: NameMap,
}

impl TaxonomyDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a taxDB file in the format:
    /// ```text
    /// <taxid>\t<parentid>\t<taxname>\t<rank>
    /// ```
    /// Lines with fewer fields or a non-numeric taxid are skipped. The rank
    /// column is not used.
    pub fn from_file<P: AsRef<Path>>(filepath: P) -> io::Result<Self> {
        let file = File::open(filepath)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut db = Self::new();
        let mut skipped = 0usize;

        for line_result in reader.lines() {
            let line = line_result?;
            // e.g. "2759\t1\tEukaryota\tdomain"
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 4 {
                skipped += 1;
                continue;
            }

            let taxid: u32 = parts[0].trim().parse().unwrap_or(0);
            let parentid: u32 = parts[1].trim().parse().unwrap_or(0);
            if taxid == 0 {
                skipped += 1;
                continue;
            }
            db.insert(taxid, parentid, parts[2].trim());
        }

        if skipped > 0 {
            log::debug!("Skipped {} malformed taxonomy line(s)", skipped);
        }
        log::info!("Loaded taxonomy with {} taxa", db.parent_map.len());
        Ok(db)
    }

    pub fn insert(&mut self, taxid: u32, parentid: u32, name: &str) {
        self.parent_map.insert(taxid, parentid);
        self.name_map.insert(taxid, name.to_string());
    }

    pub fn len(&self) -> usize {
        self.parent_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_map.is_empty()
    }

    /// Ancestors of `taxid`, root first, excluding `taxid` itself.
    /// The walk stops at a self-parented node, a `0` parent, an unknown
    /// parent, or a cycle.
    pub fn lineage(&self, taxid: u32) -> Option<Vec<u32>> {
        let mut current = *self.parent_map.get(&taxid)?;
        let mut visited = AHashSet::with_capacity(32);
        visited.insert(taxid);

        let mut chain = Vec::new();
        while current != 0 && visited.insert(current) {
            chain.push(current);
            match self.parent_map.get(&current) {
                Some(&p) if p != current => current = p,
                _ => break,
            }
        }
        chain.reverse();
        Some(chain)
    }

    pub fn taxon_info(&self, taxid: u32) -> Option<TaxonInfo> {
        let name = self.name_map.get(&taxid)?.clone();
        let ancestors = self
            .lineage(taxid)?
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        Some(TaxonInfo { name, ancestors })
    }
}

impl TaxonomyLookup for TaxonomyDb {
    fn batch_resolve(&self, ids: &[TaxId]) -> Result<TaxonMap, LookupError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                let taxid: u32 = id.trim().parse().ok()?;
                self.taxon_info(taxid).map(|info| (id.clone(), info))
            })
            .collect())
    }
}
