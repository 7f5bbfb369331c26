//! Bottom-up assembly of k-groups from pattern sub-groups (KAPRA path).
//!
//! Oversized sub-groups are first re-split with the value-loss clusterer,
//! sub-groups already reaching k are promoted, and the rest are greedily
//! merged seed-first, always folding in the union of minimum instant value
//! loss. Ties always go to the lowest-index candidate.

use ordered_float::OrderedFloat;
use rand::Rng;
use tracing::{info, warn};

use crate::cluster::{SplitMetric, TopDownClusterer};
use crate::metrics::instant_value_loss;
use crate::tree::PatternLeaf;
use crate::types::{group_rows, Group, PatternTable, Series};

/// Result of the bottom-up assembly.
#[derive(Debug)]
pub struct KGroupAssembly {
    /// Final k-groups.
    pub k_groups: Vec<Group>,
    /// Pattern tag of every record, fixed before merging.
    pub patterns: PatternTable,
}

/// Assemble `subgroups` (each of size >= P after recycling) into groups of at
/// least `k` records.
pub fn assemble_k_groups<R: Rng>(
    subgroups: Vec<PatternLeaf>,
    p: usize,
    k: usize,
    rng: &mut R,
) -> KGroupAssembly {
    // Oversized sub-groups are re-split into P-sized pieces; the pieces keep
    // the parent's pattern.
    let mut pieces: Vec<PatternLeaf> = Vec::new();
    for leaf in subgroups {
        if leaf.size() >= 2 * p {
            let clusterer = TopDownClusterer::new(SplitMetric::ValueLoss, p);
            let split = clusterer.repair(clusterer.cluster(leaf.members.clone(), rng));
            for piece in split {
                pieces.push(PatternLeaf {
                    level: leaf.level,
                    pattern: leaf.pattern.clone(),
                    members: piece.records,
                });
            }
        } else {
            pieces.push(leaf);
        }
    }

    let mut patterns = PatternTable::new();
    for leaf in &pieces {
        for id in leaf.members.keys() {
            patterns.insert(id.clone(), leaf.pattern.clone());
        }
    }

    // Promotion: sub-groups already at k go straight to the output.
    let mut k_groups: Vec<Group> = Vec::new();
    let mut remaining: Vec<PatternLeaf> = Vec::new();
    for leaf in pieces {
        if leaf.size() >= k {
            k_groups.push(leaf.members);
        } else {
            remaining.push(leaf);
        }
    }
    info!(
        promoted = k_groups.len(),
        remaining = remaining.len(),
        "assembling k-groups bottom-up"
    );

    // Greedy merge: cheapest sub-group seeds a new k-group, then the union of
    // minimum value loss folds in until the group reaches k.
    while remaining.iter().map(PatternLeaf::size).sum::<usize>() >= k {
        let seed_idx = match min_loss_index(&remaining, None) {
            Some(idx) => idx,
            None => break,
        };
        let mut group = remaining.remove(seed_idx).members;
        while group.len() < k && !remaining.is_empty() {
            if let Some(next_idx) = min_loss_index(&remaining, Some(&group)) {
                group.extend(remaining.remove(next_idx).members);
            } else {
                break;
            }
        }
        k_groups.push(group);
    }

    // Leftovers fold into whichever existing k-group grows cheapest.
    if !remaining.is_empty() && k_groups.is_empty() {
        // Nothing reached k at all; keep the records together rather than
        // losing them.
        warn!("no k-group could be formed; emitting one undersized group");
        let mut group = Group::new();
        for leaf in remaining.drain(..) {
            group.extend(leaf.members);
        }
        k_groups.push(group);
    }
    for leaf in remaining {
        let target = k_groups
            .iter()
            .enumerate()
            .min_by_key(|(_, group)| {
                let rows: Vec<&Series> = group.values().chain(leaf.members.values()).collect();
                OrderedFloat(instant_value_loss(&rows))
            })
            .map(|(idx, _)| idx);
        if let Some(idx) = target {
            k_groups[idx].extend(leaf.members);
        }
    }

    KGroupAssembly { k_groups, patterns }
}

/// Index of the sub-group minimizing VL, alone or unioned with `base`.
fn min_loss_index(leaves: &[PatternLeaf], base: Option<&Group>) -> Option<usize> {
    leaves
        .iter()
        .enumerate()
        .min_by_key(|(_, leaf)| {
            let loss = match base {
                Some(group) => {
                    let rows: Vec<&Series> =
                        group.values().chain(leaf.members.values()).collect();
                    instant_value_loss(&rows)
                }
                None => instant_value_loss(&group_rows(&leaf.members)),
            };
            OrderedFloat(loss)
        })
        .map(|(idx, _)| idx)
}
