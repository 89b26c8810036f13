//! Cross-chunk token merge: stitches consecutive windows' timed-token
//! sequences into one monotone stream.
//!
//! Grounded in `melops-asr/src/models/tdt/merge.rs`'s two-chunk fold
//! structure, generalized from frame-overlap truncation to a
//! contiguous-suffix/prefix search with an LCS fallback, expressed as pure
//! functions selected by a policy argument rather than by conditional
//! compilation.

use crate::state::DecoderConfig;
use crate::types::TimedToken;

/// Bound on how many trailing/leading tokens either merge strategy scans.
const MAX_SCAN: usize = 12;

/// Strategy for stitching two chunks' token streams together. Only one
/// variant exists today; the enum is the seam a future strategy would
/// plug into without touching `transcribe`'s call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    #[default]
    ContiguousThenLcs,
}

/// Merge `current`'s tokens onto `previous`'s running transcript.
///
/// Tries the longest contiguous overlap between `previous`'s suffix and
/// `current`'s prefix first; falls back to an LCS alignment over the
/// bounded overlap window when no contiguous run clears the duplicate-
/// suffix guard.
pub fn merge_tokens(
    previous: &[TimedToken],
    current: &[TimedToken],
    policy: MergePolicy,
    config: &DecoderConfig,
) -> Vec<TimedToken> {
    let MergePolicy::ContiguousThenLcs = policy;

    if previous.is_empty() {
        return current.to_vec();
    }
    if current.is_empty() {
        return previous.to_vec();
    }

    let prev_ids: Vec<i32> = previous.iter().map(|t| t.id).collect();
    let curr_ids: Vec<i32> = current.iter().map(|t| t.id).collect();

    if let Some(overlap_len) = longest_contiguous_overlap(&prev_ids, &curr_ids, MAX_SCAN) {
        let boundary_id = curr_ids[overlap_len - 1];
        let threshold = if config.is_punctuation(boundary_id) { 1 } else { 3 };
        if overlap_len >= threshold {
            let mut merged = previous.to_vec();
            merged.extend_from_slice(&current[overlap_len..]);
            return merged;
        }
    }

    lcs_merge(previous, current)
}

/// Longest run that is simultaneously a suffix of `prev_ids` and a prefix
/// of `curr_ids`, scanning at most `max_scan` tokens from each side.
///
/// There is at most one candidate per length (a suffix/prefix pair is
/// either equal or not), so the longest match found is unambiguous — no
/// tie-break among equal-length matches is needed here.
fn longest_contiguous_overlap(prev_ids: &[i32], curr_ids: &[i32], max_scan: usize) -> Option<usize> {
    let limit = max_scan.min(prev_ids.len()).min(curr_ids.len());
    (1..=limit)
        .rev()
        .find(|&len| prev_ids[prev_ids.len() - len..] == curr_ids[..len])
}

/// LCS-anchored merge over the bounded tail/head windows of `previous`
/// and `current`; tokens outside those windows pass through unchanged.
fn lcs_merge(previous: &[TimedToken], current: &[TimedToken]) -> Vec<TimedToken> {
    let prev_split = previous.len().saturating_sub(MAX_SCAN);
    let prev_head = &previous[..prev_split];
    let prev_tail = &previous[prev_split..];

    let curr_split = current.len().min(MAX_SCAN);
    let curr_head = &current[..curr_split];
    let curr_tail = &current[curr_split..];

    let ids_a: Vec<i32> = prev_tail.iter().map(|t| t.id).collect();
    let ids_b: Vec<i32> = curr_head.iter().map(|t| t.id).collect();
    let anchors = lcs_indices(&ids_a, &ids_b);

    let mut region = Vec::new();
    let mut ai = 0usize;
    let mut bi = 0usize;
    for (pa, pb) in anchors {
        push_interleaved(&mut region, &prev_tail[ai..pa], &curr_head[bi..pb]);
        region.push(prev_tail[pa]);
        ai = pa + 1;
        bi = pb + 1;
    }
    push_interleaved(&mut region, &prev_tail[ai..], &curr_head[bi..]);

    let mut result = prev_head.to_vec();
    result.extend(region);
    result.extend_from_slice(curr_tail);
    result
}

/// Interleave two unmatched token runs in ascending `start` timestamp
/// order, preserving each token's original timestamp.
fn push_interleaved(out: &mut Vec<TimedToken>, a: &[TimedToken], b: &[TimedToken]) {
    let mut combined: Vec<TimedToken> = a.iter().chain(b.iter()).copied().collect();
    combined.sort_by(|x, y| x.start.partial_cmp(&y.start).unwrap_or(std::cmp::Ordering::Equal));
    out.extend(combined);
}

/// Longest common subsequence of `a` and `b`, returned as matched index
/// pairs `(index_in_a, index_in_b)` in increasing order.
fn lcs_indices(a: &[i32], b: &[i32]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in 0..n {
        for j in 0..m {
            table[i + 1][j + 1] = if a[i] == b[j] {
                table[i][j] + 1
            } else {
                table[i][j + 1].max(table[i + 1][j])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}
