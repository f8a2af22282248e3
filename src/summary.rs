//src/summary.rs

use rayon::prelude::*;

use crate::types::{RawHit, Segment, SummarizedHit};

/// A half-open, zero-based span `[start, end)` on the query.
pub type Interval = (u64, u64);

/// Segments report 1-based inclusive coordinates; `[from, to]` covers
/// `[from - 1, to)` in half-open terms.
pub fn query_interval(segment: &Segment) -> Interval {
    (segment.query_from - 1, segment.query_to)
}

/// Merge overlapping intervals. An interval that starts strictly before
/// the end of the current merged one is absorbed into it; touching
/// intervals stay separate, which is harmless since they share no position.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|&(start, _)| start);

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match merged.last_mut() {
            Some(current) if start < current.1 => current.1 = current.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Number of query positions spanned by at least one segment.
pub fn covered_length(segments: &[Segment]) -> u64 {
    let intervals: Vec<Interval> = segments.iter().map(query_interval).collect();
    merge_intervals(&intervals)
        .iter()
        .map(|(start, end)| end - start)
        .sum()
}

/// Coverage is reported as "at least this much": the percentage is rounded
/// up. Integer ceiling division keeps exact percentages exact.
pub fn query_cover_percent(segments: &[Segment], query_len: u64) -> u32 {
    if query_len == 0 {
        return 0;
    }
    let covered = covered_length(segments);
    ((covered * 100 + query_len - 1) / query_len).min(100) as u32
}

/// Length-weighted identity: total identical positions over total aligned
/// length, so long segments count for more than short ones.
pub fn percent_identity(segments: &[Segment]) -> f64 {
    let (identity, align_len) = segments
        .iter()
        .fold((0u64, 0u64), |(i, a), s| (i + s.identity, a + s.align_len));
    if align_len == 0 {
        0.0
    } else {
        identity as f64 / align_len as f64 * 100.0
    }
}

pub fn summarize_hit(hit: RawHit, query_len: u64) -> SummarizedHit {
    let query_cover_percent = query_cover_percent(&hit.hsps, query_len);
    let percent_identity = percent_identity(&hit.hsps);
    SummarizedHit { hit, query_cover_percent, percent_identity }
}

/// Summarize every hit; hits are independent so this runs in parallel.
/// Output order matches input order.
pub fn summarize_hits(hits: Vec<RawHit>, query_len: u64) -> Vec<SummarizedHit> {
    hits.into_par_iter()
        .map(|hit| summarize_hit(hit, query_len))
        .collect()
}
