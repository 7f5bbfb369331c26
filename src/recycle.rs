//! KAPRA bad-leaf recycling.
//!
//! Bad pattern leaves are salvaged level by level, from the finest granularity
//! down: leaves sharing a level and pattern merge into one node at that level;
//! a merged node of at least P members graduates to the good list, the rest
//! are re-encoded one level coarser and retried. Leaves still bad when the
//! loop runs out are suppressed.

use std::collections::BTreeMap;

use tracing::info;

use crate::sax::ShapeOracle;
use crate::tree::PatternLeaf;

/// Recycle `bad` leaves into `good` where possible; returns the suppressed
/// residue. Runs only when the bad total reaches `p`, otherwise everything is
/// suppressed at once.
pub fn recycle_bad_leaves(
    p: usize,
    good: &mut Vec<PatternLeaf>,
    bad: Vec<PatternLeaf>,
    oracle: &dyn ShapeOracle,
) -> Vec<PatternLeaf> {
    let mut remaining: usize = bad.iter().map(PatternLeaf::size).sum();
    if remaining < p {
        info!(
            records = remaining,
            "bad leaves below P, suppressing them all"
        );
        return bad;
    }

    let mut by_level: BTreeMap<usize, Vec<PatternLeaf>> = BTreeMap::new();
    for leaf in bad {
        by_level.entry(leaf.level).or_default().push(leaf);
    }

    let mut level = match by_level.keys().next_back() {
        Some(&top) => top,
        None => return Vec::new(),
    };

    while remaining >= p && level >= 1 {
        let leaves = by_level.remove(&level).unwrap_or_default();

        // Merge same-pattern leaves at this level.
        let mut by_pattern: BTreeMap<String, Vec<PatternLeaf>> = BTreeMap::new();
        for leaf in leaves {
            by_pattern.entry(leaf.pattern.clone()).or_default().push(leaf);
        }
        let mut survivors: Vec<PatternLeaf> = Vec::new();
        for (pattern, mut leaves) in by_pattern {
            if leaves.len() >= 2 {
                let mut members = crate::types::Group::new();
                for leaf in leaves {
                    members.extend(leaf.members);
                }
                let merged = PatternLeaf {
                    level,
                    pattern,
                    members,
                };
                if merged.size() >= p {
                    remaining -= merged.size();
                    info!(size = merged.size(), level, "recycled bad leaves into a good one");
                    good.push(merged);
                } else {
                    survivors.push(merged);
                }
            } else {
                survivors.append(&mut leaves);
            }
        }

        // Re-encode what is left one level coarser and retry there.
        if level > 1 {
            let coarser = level - 1;
            for mut leaf in survivors {
                leaf.pattern = match leaf.members.values().next() {
                    Some(series) => oracle.encode(series, coarser),
                    None => continue,
                };
                leaf.level = coarser;
                by_level.entry(coarser).or_default().push(leaf);
            }
        } else {
            by_level.entry(level).or_default().extend(survivors);
            break;
        }
        level -= 1;
    }

    let suppressed: Vec<PatternLeaf> = by_level.into_values().flatten().collect();
    if !suppressed.is_empty() {
        let records: usize = suppressed.iter().map(PatternLeaf::size).sum();
        info!(leaves = suppressed.len(), records, "suppressing irrecoverable bad leaves");
    }
    suppressed
}
