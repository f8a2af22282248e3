//src/tree.rs

use ahash::{AHashMap, AHashSet};

use crate::error::TreeError;
use crate::taxonomy::{unique_ids, TaxonomyLookup};
use crate::types::{HitRecord, TaxId, TaxonomyNode, NOT_FOUND};

/// Everything known about one taxon while the forest is assembled.
#[derive(Debug)]
struct Entry {
    ancestors: Vec<TaxId>,
    name: Option<String>,
    count: usize, // distinct hits whose lineage (own id included) holds this taxon
}

/// Id-indexed registry of taxa, in first-seen order.
#[derive(Debug, Default)]
struct Registry {
    order: Vec<TaxId>,
    entries: AHashMap<TaxId, Entry>,
}

impl Registry {
    fn record(&mut self, id: &TaxId, ancestors: &[TaxId], name: Option<&str>) {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.count += 1;
                if entry.name.is_none() {
                    entry.name = name.map(str::to_string);
                }
            }
            None => {
                self.order.push(id.clone());
                self.entries.insert(
                    id.clone(),
                    Entry {
                        ancestors: ancestors.to_vec(),
                        name: name.map(str::to_string),
                        count: 1,
                    },
                );
            }
        }
    }

    /// Count every taxon on each hit's lineage once per hit. An ancestor
    /// at position `i` inherits the first `i` ids of the chain as its own.
    fn from_hits(hits: &[&HitRecord]) -> Self {
        let mut registry = Self::default();
        for hit in hits {
            let mut seen: AHashSet<&TaxId> = AHashSet::with_capacity(hit.ancestors.len() + 1);
            for (i, ancestor) in hit.ancestors.iter().enumerate() {
                if seen.insert(ancestor) {
                    registry.record(ancestor, &hit.ancestors[..i], None);
                }
            }
            if seen.insert(&hit.taxid) {
                registry.record(&hit.taxid, &hit.ancestors, Some(&hit.name));
            }
        }
        registry
    }

    /// Drop taxa shared by every hit; they tell no hit apart.
    fn prune_trunk(&mut self, total: usize) {
        let entries = &mut self.entries;
        self.order.retain(|id| {
            let keep = entries.get(id).map(|e| e.count != total).unwrap_or(false);
            if !keep {
                entries.remove(id);
            }
            keep
        });
    }

    fn depth(&self, id: &TaxId) -> Option<usize> {
        self.entries.get(id).map(|e| e.ancestors.len())
    }

    /// Nearest id on the node's own chain that is still in the registry
    /// and sits strictly higher. Pruned ancestors are skipped over.
    fn parent_of(&self, id: &TaxId) -> Option<&TaxId> {
        let entry = self.entries.get(id)?;
        let depth = entry.ancestors.len();
        entry
            .ancestors
            .iter()
            .rev()
            .find(|a| self.depth(a).map(|d| d < depth).unwrap_or(false))
    }
}

/// Fill in names for taxa only seen as ancestors, with one batch call.
fn name_ancestors(registry: &mut Registry, lookup: &dyn TaxonomyLookup) -> Result<(), TreeError> {
    let unnamed: Vec<TaxId> = registry
        .order
        .iter()
        .filter(|id| registry.entries.get(*id).map(|e| e.name.is_none()).unwrap_or(false))
        .cloned()
        .collect();
    if unnamed.is_empty() {
        return Ok(());
    }

    let found = lookup.batch_resolve(&unnamed)?;
    for id in &unnamed {
        if let Some(entry) = registry.entries.get_mut(id) {
            let name = match found.get(id) {
                Some(info) => info.name.clone(),
                None => {
                    log::debug!("No name for ancestor taxon {}", id);
                    NOT_FOUND.to_string()
                }
            };
            entry.name = Some(name);
        }
    }
    Ok(())
}

fn build_node(
    id: &TaxId,
    registry: &mut Registry,
    children_map: &AHashMap<TaxId, Vec<TaxId>>,
) -> Option<TaxonomyNode> {
    let entry = registry.entries.remove(id)?;
    let mut children = Vec::new();
    if let Some(kids) = children_map.get(id) {
        for kid in kids {
            if let Some(child) = build_node(kid, registry, children_map) {
                children.push(child);
            }
        }
    }

    Some(TaxonomyNode {
        id: id.clone(),
        name: entry.name.unwrap_or_else(|| NOT_FOUND.to_string()),
        ancestors: entry.ancestors,
        count: Some(entry.count),
        children: if children.is_empty() { None } else { Some(children) },
    })
}

/// Build the smallest forest of taxa that tells the hits apart.
///
/// Taxa common to every hit are left out, the shallowest of the rest
/// become roots, and every other taxon hangs under its nearest surviving
/// ancestor. Hits whose taxon did not resolve take no part. A lone taxon
/// comes back as a single bare node.
pub fn synthesize_forest(
    hits: &[HitRecord],
    lookup: &dyn TaxonomyLookup,
) -> Result<Vec<TaxonomyNode>, TreeError> {
    let resolved: Vec<&HitRecord> = hits.iter().filter(|h| h.is_resolved()).collect();
    if resolved.is_empty() {
        return Err(TreeError::NoResolvedHits);
    }
    if resolved.len() < hits.len() {
        log::warn!(
            "Leaving {} unresolved hit(s) out of the taxonomy trees",
            hits.len() - resolved.len()
        );
    }

    let leaf_ids = unique_ids(resolved.iter().copied().map(|h| &h.taxid));
    if leaf_ids.len() == 1 {
        let hit = resolved[0];
        return Ok(vec![TaxonomyNode {
            id: hit.taxid.clone(),
            name: hit.name.clone(),
            ancestors: hit.ancestors.clone(),
            count: None,
            children: None,
        }]);
    }

    let total = resolved.len();
    let mut registry = Registry::from_hits(&resolved);
    registry.prune_trunk(total);

    if registry.order.is_empty() {
        // only possible with lineages that contain each other's taxa
        log::warn!("Every taxon is shared by all hits; listing hit taxa flat");
        return Ok(flat_leaves(&resolved, &leaf_ids));
    }

    name_ancestors(&mut registry, lookup)?;

    let mut roots: Vec<TaxId> = Vec::new();
    let mut children_map: AHashMap<TaxId, Vec<TaxId>> = AHashMap::new();
    for id in &registry.order {
        match registry.parent_of(id) {
            Some(parent) => children_map.entry(parent.clone()).or_default().push(id.clone()),
            None => roots.push(id.clone()),
        }
    }
    log::debug!(
        "Synthesized {} root(s) from {} taxa over {} hit(s)",
        roots.len(),
        registry.order.len(),
        total
    );

    Ok(roots
        .iter()
        .filter_map(|root| build_node(root, &mut registry, &children_map))
        .collect())
}

fn flat_leaves(hits: &[&HitRecord], leaf_ids: &[TaxId]) -> Vec<TaxonomyNode> {
    leaf_ids
        .iter()
        .filter_map(|id| {
            let matching: Vec<&&HitRecord> = hits.iter().filter(|h| &h.taxid == id).collect();
            let first = matching.first()?;
            Some(TaxonomyNode {
                id: id.clone(),
                name: first.name.clone(),
                ancestors: first.ancestors.clone(),
                count: Some(matching.len()),
                children: None,
            })
        })
        .collect()
}
