//! Gap detection over a contiguous round range.

use std::collections::HashSet;

/// Returns every round in `start..=end` that is absent from `present`, ascending.
///
/// Runs in O(end - start). An inverted range yields an empty list.
pub fn detect_missing(start: u32, end: u32, present: &HashSet<u32>) -> Vec<u32> {
    if start > end {
        return Vec::new();
    }
    (start..=end).filter(|id| !present.contains(id)).collect()
}

/// Splits `ids` into consecutive batches of `batch_size`; the last may be shorter.
///
/// A `batch_size` of zero is treated as one.
pub fn partition(ids: &[u32], batch_size: usize) -> Vec<&[u32]> {
    ids.chunks(batch_size.max(1)).collect()
}

/// Human-readable description of still-missing rounds, `None` when nothing is missing.
///
/// At most `shown` ids are listed: `"13 rounds missing (1, 2, ... 10) and 3 more"`.
pub fn summarize_missing(missing: &[u32], shown: usize) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let listed = missing
        .iter()
        .take(shown)
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if missing.len() == 1 { "round" } else { "rounds" };
    let mut summary = format!("{} {} missing ({})", missing.len(), noun, listed);
    if missing.len() > shown {
        summary.push_str(&format!(" and {} more", missing.len() - shown));
    }
    Some(summary)
}
