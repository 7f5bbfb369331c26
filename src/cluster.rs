//! Top-down greedy bipartition clustering and its undersized-group repair.
//!
//! The clusterer recursively splits a record table into balanced groups of at
//! least `target_size` members, choosing splits by Normalized Certainty
//! Penalty or Instant Value Loss. Terminal groups smaller than the target are
//! left to [`TopDownClusterer::repair`], which merges them with a tree sibling
//! or pulls records out of a large donor group, whichever costs less.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::metrics::{instant_value_loss, normalized_certainty_penalty, AttributeBounds};
use crate::types::{Group, RecordId, Series};

/// Alternating far-point rounds used to grow the two split seeds.
pub const DEFAULT_SEED_ROUNDS: usize = 6;

/// Root label of the bipartition path strings.
const ROOT_LABEL: &str = "o";

/// Split-quality measure. NCP needs the global attribute bounds; carrying
/// them in the variant makes a missing-bounds call unrepresentable.
#[derive(Debug, Clone, Copy)]
pub enum SplitMetric<'a> {
    /// Normalized Certainty Penalty against the table-wide bounds.
    Ncp(&'a AttributeBounds),
    /// Instant Value Loss.
    ValueLoss,
}

impl SplitMetric<'_> {
    /// Evaluate the metric over a hypothetical group.
    pub fn evaluate(&self, rows: &[&Series]) -> f64 {
        match self {
            SplitMetric::Ncp(bounds) => normalized_certainty_penalty(rows, bounds),
            SplitMetric::ValueLoss => instant_value_loss(rows),
        }
    }
}

/// A terminal clustering bucket plus its bipartition path label. Two buckets
/// are tree siblings iff their labels differ only in the last character.
#[derive(Debug, Clone)]
pub struct ClusterLeaf {
    /// Path string: root label with one 'a'/'b' appended per split.
    pub label: String,
    /// Records owned by this bucket.
    pub records: Group,
}

/// Recursive top-down greedy bipartition clusterer.
#[derive(Debug)]
pub struct TopDownClusterer<'a> {
    metric: SplitMetric<'a>,
    target_size: usize,
    rounds: usize,
}

impl<'a> TopDownClusterer<'a> {
    /// Clusterer with the default number of seed rounds.
    pub fn new(metric: SplitMetric<'a>, target_size: usize) -> Self {
        Self {
            metric,
            target_size,
            rounds: DEFAULT_SEED_ROUNDS,
        }
    }

    /// Split `records` into terminal buckets of (mostly) >= `target_size`
    /// members. Buckets below the target are repaired afterwards.
    pub fn cluster<R: Rng>(&self, records: Group, rng: &mut R) -> Vec<ClusterLeaf> {
        info!(records = records.len(), "starting top-down clustering");
        let mut out = Vec::new();
        self.bipartition(records, ROOT_LABEL.to_string(), &mut out, rng);
        info!(groups = out.len(), "finished top-down clustering");
        out
    }

    fn bipartition<R: Rng>(
        &self,
        mut pool: Group,
        label: String,
        out: &mut Vec<ClusterLeaf>,
        rng: &mut R,
    ) {
        if pool.len() < 2 * self.target_size {
            out.push(ClusterLeaf {
                label,
                records: pool,
            });
            return;
        }

        // Seed group U with a random record, then grow U and V alternately by
        // pulling the record farthest (by the split metric) from the last
        // record added to the opposite group.
        let keys: Vec<&RecordId> = pool.keys().collect();
        let seed_id = keys[rng.gen_range(0..keys.len())].clone();
        let mut group_u = Group::new();
        let mut group_v = Group::new();
        let seed_row = match pool.remove(&seed_id) {
            Some(row) => row,
            None => return,
        };
        let mut last_row = seed_row.clone();
        group_u.insert(seed_id, seed_row);

        for round in 0..self.rounds {
            if pool.is_empty() {
                break;
            }
            if let Some(pick) = self.farthest_from(&last_row, &pool) {
                if let Some(row) = pool.remove(&pick) {
                    last_row = row.clone();
                    if round % 2 == 0 {
                        group_v.insert(pick, row);
                    } else {
                        group_u.insert(pick, row);
                    }
                }
            }
        }

        // Distribute the rest in random order, each to whichever side grows
        // cheaper. Ties go to U.
        let mut rest: Vec<RecordId> = pool.keys().cloned().collect();
        rest.shuffle(rng);
        for key in rest {
            if let Some(row) = pool.remove(&key) {
                let mut rows_u: Vec<&Series> = group_u.values().collect();
                rows_u.push(&row);
                let mut rows_v: Vec<&Series> = group_v.values().collect();
                rows_v.push(&row);
                if self.metric.evaluate(&rows_v) < self.metric.evaluate(&rows_u) {
                    group_v.insert(key, row);
                } else {
                    group_u.insert(key, row);
                }
            }
        }

        for (child, suffix) in [(group_u, 'a'), (group_v, 'b')] {
            if child.len() >= self.target_size {
                let mut child_label = label.clone();
                child_label.push(suffix);
                self.bipartition(child, child_label, out, rng);
            } else {
                out.push(ClusterLeaf {
                    label: label.clone(),
                    records: child,
                });
            }
        }
    }

    fn farthest_from(&self, pivot: &Series, pool: &Group) -> Option<RecordId> {
        let mut best: Option<(f64, &RecordId)> = None;
        for (id, row) in pool {
            let measure = self.metric.evaluate(&[pivot, row]);
            match best {
                Some((top, _)) if measure < top => {}
                _ => best = Some((measure, id)),
            }
        }
        best.map(|(_, id)| id.clone())
    }

    /// Repair pass: merge every undersized bucket with its tree sibling or
    /// pull records from the best donor, whichever union costs less; repeat
    /// until no bucket is undersized or nothing more can be done.
    ///
    /// An orphan with neither sibling nor donor merges with the unclaimed
    /// bucket of minimum union cost regardless of label; a lone bucket passes
    /// through unchanged.
    pub fn repair(&self, mut leaves: Vec<ClusterLeaf>) -> Vec<ClusterLeaf> {
        loop {
            let undersized = leaves
                .iter()
                .filter(|l| l.records.len() < self.target_size)
                .count();
            if undersized == 0 {
                return leaves;
            }
            info!(undersized, "repairing undersized groups");
            let (next, progressed) = self.repair_pass(leaves);
            leaves = next;
            if !progressed {
                return leaves;
            }
        }
    }

    fn repair_pass(&self, leaves: Vec<ClusterLeaf>) -> (Vec<ClusterLeaf>, bool) {
        let n = leaves.len();
        let mut claimed = vec![false; n];
        let mut rebuilt: Vec<ClusterLeaf> = Vec::new();
        let mut progressed = false;

        for i in 0..n {
            if claimed[i] || leaves[i].records.len() >= self.target_size {
                continue;
            }

            let sibling = (0..n).find(|&j| {
                j != i && !claimed[j] && is_sibling(&leaves[i].label, &leaves[j].label)
            });
            let sibling_measure = sibling
                .map(|j| self.union_measure(&leaves[i].records, &leaves[j].records))
                .unwrap_or(f64::INFINITY);

            let deficit = self.target_size - leaves[i].records.len();
            let mut donor: Option<(f64, usize, Vec<RecordId>)> = None;
            for j in 0..n {
                if j == i
                    || claimed[j]
                    || leaves[j].records.len() < 2 * self.target_size - leaves[i].records.len()
                {
                    continue;
                }
                let (measure, pulled) =
                    self.plan_donation(&leaves[i].records, &leaves[j].records, deficit);
                if pulled.len() < deficit {
                    continue;
                }
                if donor.as_ref().map_or(true, |(top, _, _)| measure < *top) {
                    donor = Some((measure, j, pulled));
                }
            }

            match (sibling, donor) {
                (Some(j), donor_plan) => {
                    let donor_measure =
                        donor_plan.as_ref().map_or(f64::INFINITY, |(m, _, _)| *m);
                    if sibling_measure < donor_measure {
                        claimed[i] = true;
                        claimed[j] = true;
                        rebuilt.push(self.merge_into_parent(&leaves[i], &leaves[j]));
                        progressed = true;
                    } else if let Some((_, dj, pulled)) = donor_plan {
                        claimed[i] = true;
                        claimed[dj] = true;
                        rebuilt.extend(self.apply_donation(&leaves[i], &leaves[dj], &pulled));
                        progressed = true;
                    }
                }
                (None, Some((_, dj, pulled))) => {
                    claimed[i] = true;
                    claimed[dj] = true;
                    rebuilt.extend(self.apply_donation(&leaves[i], &leaves[dj], &pulled));
                    progressed = true;
                }
                (None, None) => {
                    // Orphan fallback: absorb into the cheapest unclaimed
                    // bucket, whatever its label.
                    let nearest = (0..n)
                        .filter(|&j| j != i && !claimed[j])
                        .min_by(|&a, &b| {
                            let ma = self.union_measure(&leaves[i].records, &leaves[a].records);
                            let mb = self.union_measure(&leaves[i].records, &leaves[b].records);
                            ma.partial_cmp(&mb).unwrap_or(std::cmp::Ordering::Equal)
                        });
                    if let Some(j) = nearest {
                        claimed[i] = true;
                        claimed[j] = true;
                        let mut records = leaves[i].records.clone();
                        records.extend(leaves[j].records.clone());
                        rebuilt.push(ClusterLeaf {
                            label: String::new(),
                            records,
                        });
                        progressed = true;
                    }
                    // A lone bucket stays as it is; nothing can fix it.
                }
            }
        }

        let mut next: Vec<ClusterLeaf> = leaves
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(_, l)| l)
            .collect();
        next.append(&mut rebuilt);
        (next, progressed)
    }

    fn union_measure(&self, a: &Group, b: &Group) -> f64 {
        let rows: Vec<&Series> = a.values().chain(b.values()).collect();
        self.metric.evaluate(&rows)
    }

    fn merge_into_parent(&self, small: &ClusterLeaf, sibling: &ClusterLeaf) -> ClusterLeaf {
        let mut records = small.records.clone();
        records.extend(sibling.records.clone());
        let parent = &sibling.label[..sibling.label.len().saturating_sub(1)];
        ClusterLeaf {
            label: parent.to_string(),
            records,
        }
    }

    /// Greedily pick `deficit` records from `donor` minimizing the metric of
    /// the growing union. Returns the final union measure and the picks.
    fn plan_donation(
        &self,
        base: &Group,
        donor: &Group,
        deficit: usize,
    ) -> (f64, Vec<RecordId>) {
        let mut adopted: Vec<(&RecordId, &Series)> = Vec::new();
        let mut measure = f64::INFINITY;
        for _ in 0..deficit {
            let mut best: Option<(f64, (&RecordId, &Series))> = None;
            for (id, row) in donor {
                if adopted.iter().any(|(taken, _)| *taken == id) {
                    continue;
                }
                let mut rows: Vec<&Series> = base.values().collect();
                rows.extend(adopted.iter().map(|(_, r)| *r));
                rows.push(row);
                let m = self.metric.evaluate(&rows);
                if best.as_ref().map_or(true, |(top, _)| m < *top) {
                    best = Some((m, (id, row)));
                }
            }
            match best {
                Some((m, pick)) => {
                    measure = m;
                    adopted.push(pick);
                }
                None => break,
            }
        }
        (measure, adopted.into_iter().map(|(id, _)| id.clone()).collect())
    }

    fn apply_donation(
        &self,
        small: &ClusterLeaf,
        donor: &ClusterLeaf,
        pulled: &[RecordId],
    ) -> Vec<ClusterLeaf> {
        let mut merged = small.records.clone();
        let mut remainder = donor.records.clone();
        for id in pulled {
            if let Some(row) = remainder.remove(id) {
                merged.insert(id.clone(), row);
            }
        }
        vec![
            ClusterLeaf {
                label: String::new(),
                records: merged,
            },
            ClusterLeaf {
                label: donor.label.clone(),
                records: remainder,
            },
        ]
    }
}

fn is_sibling(a: &str, b: &str) -> bool {
    !a.is_empty()
        && !b.is_empty()
        && a.len() == b.len()
        && a[..a.len() - 1] == b[..b.len() - 1]
}
