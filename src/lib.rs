// src/lib.rs
pub mod error;
pub mod report;
pub mod summary;
pub mod taxdb;
pub mod taxonomy;
pub mod tree;
pub mod types;
pub mod xml;

use serde::Serialize;
use std::path::Path;

use crate::error::ReportError;
use crate::report::{parse_report, read_report_text, SearchOutcome};
use crate::summary::summarize_hits;
use crate::taxonomy::{resolve_hits, TaxonomyLookup};
use crate::tree::synthesize_forest;
use crate::types::{HitRecord, ReportMetadata, TaxonomyNode};

/// Everything presented for one finished search.
///
/// Exactly one of `hits` and `message` is set: `message` carries the
/// engine's explanation when the search found nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBundle {
    #[serde(flatten)]
    pub metadata: ReportMetadata,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<Vec<HitRecord>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_trees: Option<Vec<TaxonomyNode>>,

    /// Set when the trees could not be built and `taxonomy_trees` is empty
    /// for that reason rather than for lack of hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_warning: Option<String>,
}

impl ResultBundle {
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Turn one report into a result bundle:
///  1) normalize the report into typed hits
///  2) compute coverage and identity per hit
///  3) resolve every hit taxon in one batch
///  4) synthesize the taxonomy forest
///
/// Only a malformed report is an error. Taxonomy trouble degrades to
/// `NotFound` hits and an empty forest.
pub fn format_results(
    report_text: &str,
    lookup: &dyn TaxonomyLookup,
) -> Result<ResultBundle, ReportError> {
    let report = parse_report(report_text)?;
    let metadata = report.metadata;

    let raw_hits = match report.outcome {
        SearchOutcome::NoHits(message) => {
            return Ok(ResultBundle {
                metadata,
                message: Some(message),
                hits: None,
                taxonomy_trees: None,
                taxonomy_warning: None,
            })
        }
        SearchOutcome::Hits(hits) => hits,
    };

    log::info!(
        "Formatting {} hit(s) for query {} against {}",
        raw_hits.len(),
        metadata.query_id,
        metadata.db
    );
    let summarized = summarize_hits(raw_hits, metadata.query_len);
    let hits = resolve_hits(summarized, lookup);

    let (taxonomy_trees, taxonomy_warning) = if hits.is_empty() {
        (Vec::new(), None)
    } else {
        match synthesize_forest(&hits, lookup) {
            Ok(trees) => (trees, None),
            Err(e) => {
                log::warn!("Building taxonomy trees failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        }
    };

    Ok(ResultBundle {
        metadata,
        message: None,
        hits: Some(hits),
        taxonomy_trees: Some(taxonomy_trees),
        taxonomy_warning,
    })
}

/// Same as [`format_results`], reading the report (optionally gzipped) from disk.
pub fn format_report_file<P: AsRef<Path>>(
    path: P,
    lookup: &dyn TaxonomyLookup,
) -> Result<ResultBundle, ReportError> {
    let text = read_report_text(path)?;
    format_results(&text, lookup)
}
