//src/report.rs

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde_json::Value;

use crate::error::ReportError;
use crate::types::{RawHit, ReportMetadata, Segment, TaxId};
use crate::xml::xml_to_compact;

/// Nesting from the document root down to the single `Report`.
const REPORT_PATH: [&str; 4] = ["BlastXML2", "BlastOutput2", "report", "Report"];
/// Nesting from `Report` down to the single query's `Search`.
const SEARCH_PATH: [&str; 4] = ["results", "Results", "search", "Search"];

/// Taxid used when a description carries none.
const UNCLASSIFIED_TAXID: &str = "0";

/// What the search produced: either hits, or the engine's explanation of
/// why there are none.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Hits(Vec<RawHit>),
    NoHits(String),
}

/// A report reduced to typed metadata and typed hits.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReport {
    pub metadata: ReportMetadata,
    pub outcome: SearchOutcome,
}

/// Read a report from disk, gunzipping `.gz` files on the fly.
pub fn read_report_text<P: AsRef<Path>>(path: P) -> Result<String, ReportError> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let mut reader: Box<dyn Read> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Turn report text (XML2, or the same tree already as JSON) into the
/// compact tree the normalizer walks.
pub fn parse_report_tree(text: &str) -> Result<Value, ReportError> {
    let trimmed = text.trim_start();
    match trimmed.chars().next() {
        Some('<') => xml_to_compact(trimmed),
        Some('{') => Ok(serde_json::from_str(trimmed)?),
        _ => Err(ReportError::UnknownFormat(trimmed.chars().take(16).collect())),
    }
}

pub fn parse_report(text: &str) -> Result<NormalizedReport, ReportError> {
    let tree = parse_report_tree(text)?;
    normalize(&tree)
}

/// Coerce a "zero or more" field to a list: absent or null gives an empty
/// list, a bare value a singleton.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

fn kind(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(n) => format!("the number {n}"),
        Value::String(s) => format!("the text {s:?}"),
        Value::Array(items) => format!("a list of {}", items.len()),
        Value::Object(_) => "an object".to_string(),
    }
}

/// Walk `path` below `value`, failing with the first missing level.
fn descend<'a>(value: &'a Value, base: &str, path: &[&str]) -> Result<(&'a Value, String), ReportError> {
    let mut current = value;
    let mut at = base.to_string();
    for key in path {
        let next = match current {
            Value::Object(map) => map.get(*key),
            _ => None,
        };
        let child_path = if at.is_empty() { key.to_string() } else { format!("{at}/{key}") };
        current = match next {
            Some(v) if !v.is_null() => v,
            _ => {
                return Err(ReportError::Shape {
                    path: child_path,
                    expected: "an element",
                    found: next.map(kind).unwrap_or_else(|| format!("nothing under {}", kind(current))),
                })
            }
        };
        at = child_path;
    }
    Ok((current, at))
}

fn text_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(obj: &Value, path: &str, key: &str) -> Result<String, ReportError> {
    text_field(obj, key).ok_or_else(|| ReportError::Shape {
        path: format!("{path}/{key}"),
        expected: "text",
        found: obj.get(key).map(kind).unwrap_or_else(|| "nothing".to_string()),
    })
}

fn number_field<T: std::str::FromStr>(obj: &Value, path: &str, key: &str) -> Result<T, ReportError> {
    let raw = required_text(obj, path, key)?;
    raw.trim().parse::<T>().map_err(|_| ReportError::Shape {
        path: format!("{path}/{key}"),
        expected: "a number",
        found: format!("the text {raw:?}"),
    })
}

/// Validate and type a compact report tree.
pub fn normalize(tree: &Value) -> Result<NormalizedReport, ReportError> {
    let (report, report_path) = descend(tree, "", &REPORT_PATH)?;
    let (target, _) = descend(report, &report_path, &["search-target", "Target"])?;
    let (search, search_path) = descend(report, &report_path, &SEARCH_PATH)?;

    let query_len: u64 = number_field(search, &search_path, "query-len")?;
    if query_len == 0 {
        return Err(ReportError::Invalid {
            path: format!("{search_path}/query-len"),
            reason: "query length must be positive".to_string(),
        });
    }

    let metadata = ReportMetadata {
        program: required_text(report, &report_path, "program")?,
        version: required_text(report, &report_path, "version")?,
        params: report.get("params").cloned().unwrap_or(Value::Null),
        db: required_text(target, &format!("{report_path}/search-target/Target"), "db")?,
        query_id: required_text(search, &search_path, "query-id")?,
        query_len,
        query_title: text_field(search, "query-title"),
        stat: search.get("stat").cloned().unwrap_or(Value::Null),
    };

    if let Some(message) = text_field(search, "message") {
        log::info!("Search for {} found no hits: {}", metadata.query_id, message);
        return Ok(NormalizedReport { metadata, outcome: SearchOutcome::NoHits(message) });
    }

    let hits_path = format!("{search_path}/hits");
    let container = match search.get("hits") {
        Some(Value::Object(map)) => map.get("Hit"),
        Some(Value::Null) => None,
        Some(other) => {
            return Err(ReportError::Shape {
                path: hits_path,
                expected: "a hits container",
                found: kind(other),
            })
        }
        None => {
            return Err(ReportError::Shape {
                path: hits_path,
                expected: "a hits container or a no-hits message",
                found: "neither".to_string(),
            })
        }
    };

    let hits = as_list(container)
        .into_iter()
        .enumerate()
        .map(|(i, raw)| normalize_hit(raw, &format!("{hits_path}/Hit[{i}]"), query_len))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Normalized {} hit(s) for query {}", hits.len(), metadata.query_id);
    Ok(NormalizedReport { metadata, outcome: SearchOutcome::Hits(hits) })
}

fn normalize_hit(raw: &Value, path: &str, query_len: u64) -> Result<RawHit, ReportError> {
    if !raw.is_object() {
        return Err(ReportError::Shape { path: path.to_string(), expected: "a hit", found: kind(raw) });
    }

    // Only the primary description is kept; cross-referenced records are dropped.
    let descriptions = as_list(raw.get("description").and_then(|d| d.get("HitDescr")));
    let descr_path = format!("{path}/description/HitDescr[0]");
    let primary = descriptions.first().ok_or_else(|| ReportError::Invalid {
        path: descr_path.clone(),
        reason: "hit has no description".to_string(),
    })?;
    let accession = required_text(primary, &descr_path, "accession")?;
    let title = text_field(primary, "title").unwrap_or_default();
    let taxid: TaxId = text_field(primary, "taxid")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNCLASSIFIED_TAXID.to_string());

    let hsps = as_list(raw.get("hsps").and_then(|h| h.get("Hsp")))
        .into_iter()
        .enumerate()
        .map(|(i, hsp)| normalize_segment(hsp, &format!("{path}/hsps/Hsp[{i}]"), query_len))
        .collect::<Result<Vec<_>, _>>()?;
    if hsps.is_empty() {
        return Err(ReportError::Invalid {
            path: format!("{path}/hsps"),
            reason: format!("hit {accession} has no alignment segments"),
        });
    }

    Ok(RawHit {
        accession,
        title,
        taxid,
        len: number_field(raw, path, "len")?,
        num: number_field(raw, path, "num")?,
        hsps,
    })
}

fn normalize_segment(raw: &Value, path: &str, query_len: u64) -> Result<Segment, ReportError> {
    if !raw.is_object() {
        return Err(ReportError::Shape { path: path.to_string(), expected: "a segment", found: kind(raw) });
    }
    let segment = Segment {
        num: number_field(raw, path, "num")?,
        query_from: number_field(raw, path, "query-from")?,
        query_to: number_field(raw, path, "query-to")?,
        hit_from: number_field(raw, path, "hit-from")?,
        hit_to: number_field(raw, path, "hit-to")?,
        score: number_field(raw, path, "score")?,
        bit_score: number_field(raw, path, "bit-score")?,
        evalue: number_field(raw, path, "evalue")?,
        identity: number_field(raw, path, "identity")?,
        align_len: number_field(raw, path, "align-len")?,
        qseq: text_field(raw, "qseq").unwrap_or_default(),
        hseq: text_field(raw, "hseq").unwrap_or_default(),
        midline: text_field(raw, "midline").unwrap_or_default(),
    };

    let invalid = |reason: String| ReportError::Invalid { path: path.to_string(), reason };
    if segment.query_from < 1 || segment.query_from > segment.query_to {
        return Err(invalid(format!(
            "query range {}..{} is not a 1-based ascending range",
            segment.query_from, segment.query_to
        )));
    }
    if segment.query_to > query_len {
        return Err(invalid(format!(
            "query range ends at {} past query length {}",
            segment.query_to, query_len
        )));
    }
    if segment.align_len == 0 {
        return Err(invalid("alignment length is zero".to_string()));
    }
    if segment.identity > segment.align_len {
        return Err(invalid(format!(
            "identity {} exceeds alignment length {}",
            segment.identity, segment.align_len
        )));
    }
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hsp(from: u64, to: u64) -> Value {
        json!({
            "num": "1", "bit-score": "90.5", "score": "49", "evalue": "1e-20",
            "identity": "48", "query-from": from.to_string(), "query-to": to.to_string(),
            "hit-from": "101", "hit-to": "150", "align-len": "50",
            "qseq": "ACGT", "hseq": "ACGT", "midline": "||||"
        })
    }

    fn report_with_search(search: Value) -> Value {
        json!({
            "BlastXML2": { "BlastOutput2": { "report": { "Report": {
                "program": "blastn",
                "version": "BLASTN 2.14.0+",
                "params": { "Parameters": { "expect": "10" } },
                "search-target": { "Target": { "db": "nt" } },
                "results": { "Results": { "search": { "Search": search } } }
            }}}}
        })
    }

    fn hit(accession: &str, taxid: &str, hsps: Value) -> Value {
        json!({
            "num": "1",
            "description": { "HitDescr": { "accession": accession, "title": "some title", "taxid": taxid } },
            "len": "500",
            "hsps": { "Hsp": hsps }
        })
    }

    #[test]
    fn as_list_coerces_every_shape() {
        assert!(as_list(None).is_empty());
        assert!(as_list(Some(&Value::Null)).is_empty());
        let single = json!({"a": 1});
        assert_eq!(as_list(Some(&single)), vec![&single]);
        let many = json!([1, 2]);
        assert_eq!(as_list(Some(&many)).len(), 2);
    }

    #[test]
    fn bare_hit_and_single_element_list_normalize_identically() {
        let bare = report_with_search(json!({
            "query-id": "Query_1", "query-len": "100",
            "hits": { "Hit": hit("AB000001", "9606", hsp(1, 50)) }
        }));
        let listed = report_with_search(json!({
            "query-id": "Query_1", "query-len": "100",
            "hits": { "Hit": [hit("AB000001", "9606", json!([hsp(1, 50)]))] }
        }));
        let bare = normalize(&bare).unwrap();
        assert_eq!(bare, normalize(&listed).unwrap());
        match bare.outcome {
            SearchOutcome::Hits(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].hsps.len(), 1);
                assert_eq!(hits[0].taxid, "9606");
            }
            other => panic!("expected hits, got {other:?}"),
        }
    }

    #[test]
    fn only_primary_description_is_kept() {
        let mut raw = hit("PRIMARY", "1", json!([hsp(1, 10)]));
        raw["description"]["HitDescr"] = json!([
            { "accession": "PRIMARY", "title": "first", "taxid": "11" },
            { "accession": "SECONDARY", "title": "second", "taxid": "22" }
        ]);
        let tree = report_with_search(json!({ "query-id": "q", "query-len": "20", "hits": { "Hit": raw } }));
        let SearchOutcome::Hits(hits) = normalize(&tree).unwrap().outcome else { panic!("no hits") };
        assert_eq!(hits[0].accession, "PRIMARY");
        assert_eq!(hits[0].title, "first");
        assert_eq!(hits[0].taxid, "11");
    }

    #[test]
    fn message_is_a_valid_empty_result() {
        let tree = report_with_search(json!({
            "query-id": "Query_1", "query-len": "100",
            "message": "No hits found"
        }));
        let report = normalize(&tree).unwrap();
        assert_eq!(report.outcome, SearchOutcome::NoHits("No hits found".to_string()));
        assert_eq!(report.metadata.db, "nt");
        assert_eq!(report.metadata.query_len, 100);
    }

    #[test]
    fn missing_hits_without_message_is_a_shape_error() {
        let tree = report_with_search(json!({ "query-id": "Query_1", "query-len": "100" }));
        match normalize(&tree) {
            Err(ReportError::Shape { path, .. }) => assert!(path.ends_with("Search/hits")),
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn empty_hits_container_yields_no_hits() {
        let tree = report_with_search(json!({ "query-id": "q", "query-len": "10", "hits": null }));
        assert_eq!(normalize(&tree).unwrap().outcome, SearchOutcome::Hits(Vec::new()));
    }

    #[test]
    fn wrong_nesting_names_the_missing_level() {
        let tree = json!({ "BlastXML2": { "BlastOutput2": { "report": {} } } });
        match normalize(&tree) {
            Err(ReportError::Shape { path, .. }) => assert_eq!(path, "BlastXML2/BlastOutput2/report/Report"),
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn preconditions_are_enforced_at_the_boundary() {
        let zero_len = report_with_search(json!({ "query-id": "q", "query-len": "0", "hits": null }));
        assert!(matches!(normalize(&zero_len), Err(ReportError::Invalid { .. })));

        let no_hsps = report_with_search(json!({
            "query-id": "q", "query-len": "10",
            "hits": { "Hit": { "num": "1", "len": "5",
                "description": { "HitDescr": { "accession": "X", "taxid": "1" } } } }
        }));
        assert!(matches!(normalize(&no_hsps), Err(ReportError::Invalid { .. })));

        let reversed = report_with_search(json!({
            "query-id": "q", "query-len": "100", "hits": { "Hit": hit("X", "1", hsp(60, 10)) }
        }));
        assert!(matches!(normalize(&reversed), Err(ReportError::Invalid { .. })));

        let mut too_identical = hsp(1, 50);
        too_identical["identity"] = json!("51");
        let tree = report_with_search(json!({
            "query-id": "q", "query-len": "100", "hits": { "Hit": hit("X", "1", too_identical) }
        }));
        assert!(matches!(normalize(&tree), Err(ReportError::Invalid { .. })));
    }

    #[test]
    fn segments_past_the_query_end_are_rejected() {
        let tree = report_with_search(json!({
            "query-id": "q", "query-len": "100", "hits": { "Hit": hit("X", "1", hsp(1, 120)) }
        }));
        match normalize(&tree) {
            Err(ReportError::Invalid { path, reason }) => {
                assert!(path.ends_with("Hsp[0]"));
                assert!(reason.contains("past query length 100"));
            }
            other => panic!("expected invalid segment, got {other:?}"),
        }

        let at_the_end = report_with_search(json!({
            "query-id": "q", "query-len": "100", "hits": { "Hit": hit("X", "1", hsp(51, 100)) }
        }));
        assert!(normalize(&at_the_end).is_ok());
    }

    #[test]
    fn non_numeric_fields_are_shape_errors() {
        let mut bad = hsp(1, 50);
        bad["score"] = json!("high");
        let tree = report_with_search(json!({
            "query-id": "q", "query-len": "100", "hits": { "Hit": hit("X", "1", bad) }
        }));
        match normalize(&tree) {
            Err(ReportError::Shape { path, expected, .. }) => {
                assert!(path.ends_with("Hsp[0]/score"));
                assert_eq!(expected, "a number");
            }
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn json_numbers_are_accepted_and_missing_taxid_defaults() {
        let mut raw = hit("X", "1", json!([hsp(1, 10)]));
        raw["description"]["HitDescr"] = json!({ "accession": "X" });
        raw["len"] = json!(500);
        let tree = report_with_search(json!({ "query-id": "q", "query-len": 20, "hits": { "Hit": raw } }));
        let report = normalize(&tree).unwrap();
        assert_eq!(report.metadata.query_len, 20);
        let SearchOutcome::Hits(hits) = report.outcome else { panic!("no hits") };
        assert_eq!(hits[0].taxid, UNCLASSIFIED_TAXID);
        assert_eq!(hits[0].len, 500);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(matches!(parse_report_tree("query,hit\n"), Err(ReportError::UnknownFormat(_))));
    }
}
