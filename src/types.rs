//src/types.rs

use serde::Serialize;

/// Taxonomic ids are kept as strings: the lookup store keys them that way
/// and the `NotFound` sentinel has to fit in the same slot.
pub type TaxId = String;

/// Name used for any taxon the lookup could not resolve.
pub const NOT_FOUND: &str = "NotFound";

fn is_sentinel(name: &str, ancestors: &[TaxId]) -> bool {
    name == NOT_FOUND && ancestors.len() == 1 && ancestors[0] == NOT_FOUND
}

/// One local alignment (HSP) between the query and a hit.
/// Coordinates are 1-based and inclusive, as the engine reports them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub num: u32,
    pub query_from: u64,
    pub query_to: u64,
    pub hit_from: u64,
    pub hit_to: u64,
    pub score: f64,
    pub bit_score: f64,
    pub evalue: f64,
    pub identity: u64,
    pub align_len: u64,
    pub qseq: String,
    pub hseq: String,
    pub midline: String,
}

/// A hit as read from the report, before any statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub accession: String,
    pub title: String,
    pub taxid: TaxId,
    pub len: u64,   // subject length
    pub num: u32,   // rank of the hit in the report
    pub hsps: Vec<Segment>,
}

/// A hit with its coverage and identity computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizedHit {
    pub hit: RawHit,
    pub query_cover_percent: u32,
    pub percent_identity: f64,
}

/// Name and lineage of a taxon as handed out by a lookup.
/// `ancestors` runs root first and stops at the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonInfo {
    pub name: String,
    pub ancestors: Vec<TaxId>,
}

impl TaxonInfo {
    /// The record substituted for every id the lookup did not return.
    pub fn not_found() -> Self {
        Self {
            name: NOT_FOUND.to_string(),
            ancestors: vec![NOT_FOUND.to_string()],
        }
    }
}

/// Final per-hit record, as presented to consumers of the bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitRecord {
    pub accession: String,
    pub title: String,
    pub taxid: TaxId,
    pub name: String,
    pub ancestors: Vec<TaxId>,
    pub len: u64,
    pub num: u32,
    pub query_cover_percent: u32,
    pub percent_identity: f64,
    pub hsps: Vec<Segment>,
}

impl HitRecord {
    pub fn from_parts(summary: SummarizedHit, taxon: TaxonInfo) -> Self {
        let SummarizedHit { hit, query_cover_percent, percent_identity } = summary;
        Self {
            accession: hit.accession,
            title: hit.title,
            taxid: hit.taxid,
            name: taxon.name,
            ancestors: taxon.ancestors,
            len: hit.len,
            num: hit.num,
            query_cover_percent,
            percent_identity,
            hsps: hit.hsps,
        }
    }

    /// Whether the taxonomy lookup knew this hit's taxon.
    pub fn is_resolved(&self) -> bool {
        !is_sentinel(&self.name, &self.ancestors)
    }
}

/// A node of a synthesized taxonomy forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyNode {
    pub id: TaxId,
    pub name: String,
    pub ancestors: Vec<TaxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,        // hits whose lineage contains this id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TaxonomyNode>>,
}

/// Report-level fields passed through to the bundle untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub program: String,
    pub version: String,
    pub params: serde_json::Value,
    pub db: String,
    pub query_id: String,
    pub query_len: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_title: Option<String>,
    pub stat: serde_json::Value,
}
