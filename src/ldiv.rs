//! l-diversity enforcement over the sensitive attribute.
//!
//! Within each k-group, the records sharing one pattern word form an envelope
//! PS(Q); the subset of an envelope sharing one sensitive value is an
//! equivalence class. A class covering more than 1/l of its envelope gets
//! pruned by perturbing randomly chosen members' sensitive values until the
//! bound holds. Perturbed values must not collide with any value already
//! present in the envelope.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::types::{Group, PatternTable, RecordId, SensitiveTable};

/// How far beyond the initial epsilon the offset search may widen before the
/// class is reported as unresolved.
const WIDEN_LIMIT: i64 = 64;

/// Enforce the 1/l bound in place. Returns the number of equivalence classes
/// that could not be fully repaired (non-fatal; their records keep their
/// original values).
pub fn enforce_l_diversity<R: Rng>(
    k_groups: &[Group],
    patterns: &PatternTable,
    sensitive: &mut SensitiveTable,
    l: usize,
    epsilon: i64,
    rng: &mut R,
) -> usize {
    let mut unresolved = 0;
    for group in k_groups {
        let mut envelopes: BTreeMap<&str, Vec<&RecordId>> = BTreeMap::new();
        for id in group.keys() {
            if let Some(pattern) = patterns.get(id) {
                envelopes.entry(pattern).or_default().push(id);
            }
        }
        for envelope in envelopes.values() {
            unresolved += enforce_on_envelope(envelope, sensitive, l, epsilon, rng);
        }
    }
    unresolved
}

fn enforce_on_envelope<R: Rng>(
    envelope: &[&RecordId],
    sensitive: &mut SensitiveTable,
    l: usize,
    epsilon: i64,
    rng: &mut R,
) -> usize {
    let ps = envelope.len();
    let mut classes: BTreeMap<i64, Vec<RecordId>> = BTreeMap::new();
    for id in envelope {
        if let Some(&value) = sensitive.get(*id) {
            classes.entry(value).or_default().push((*id).clone());
        }
    }

    let mut unresolved = 0;
    for (value, class) in &classes {
        // |class| / |PS(Q)| > 1/l, kept in integers.
        if class.len() * l <= ps {
            continue;
        }
        let excess = class.len() - ps / l;
        let victims: Vec<RecordId> = class
            .choose_multiple(rng, excess)
            .cloned()
            .collect();
        let mut failed = false;
        for id in victims {
            let taken: BTreeSet<i64> = envelope
                .iter()
                .filter_map(|e| sensitive.get(*e))
                .copied()
                .collect();
            match perturbed_value(*value, &taken, epsilon, rng) {
                Some(fresh) => {
                    sensitive.insert(id, fresh);
                }
                None => {
                    warn!(
                        value,
                        record = %id,
                        "could not find a non-colliding perturbation; keeping original"
                    );
                    failed = true;
                }
            }
        }
        if failed {
            unresolved += 1;
        }
    }
    unresolved
}

/// Pick `original + offset` with a random non-zero offset in `[-width, width]`
/// that is absent from `taken`, widening the range step by step up to the
/// cap. The search is bounded; exhaustion is reported as `None`.
fn perturbed_value<R: Rng>(
    original: i64,
    taken: &BTreeSet<i64>,
    epsilon: i64,
    rng: &mut R,
) -> Option<i64> {
    let epsilon = epsilon.max(1);
    for width in epsilon..=epsilon + WIDEN_LIMIT {
        let mut offsets: Vec<i64> = (-width..=width).filter(|&o| o != 0).collect();
        offsets.shuffle(rng);
        for offset in offsets {
            let candidate = original + offset;
            if !taken.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}
