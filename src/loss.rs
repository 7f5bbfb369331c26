//! Post-hoc utility-loss reporting: pattern loss and value loss.
//!
//! Never consulted by the engine; only the CLI uses these to compare the two
//! strategies after a run.

use crate::dataset::Dataset;
use crate::metrics::value_loss_from_envelope;
use crate::pipeline::AnonymizationResult;
use crate::sax::{paa, reconstruct_paa, znorm, ZNORM_THRESHOLD};
use crate::types::group_envelope;

const ZERO_NORM: f64 = 1e-12;

/// Cosine distance with the degenerate-vector conventions of the loss
/// literature: two zero vectors are identical (0), a zero against a non-zero
/// vector is maximally distant (1).
pub fn cosine_distance(u: &[f64], v: &[f64]) -> f64 {
    let norm_u = u.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_v = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_u < ZERO_NORM && norm_v < ZERO_NORM {
        return 0.0;
    }
    if norm_u < ZERO_NORM || norm_v < ZERO_NORM {
        return 1.0;
    }
    let dot: f64 = u.iter().zip(v).map(|(x, y)| x * y).sum();
    1.0 - dot / (norm_u * norm_v)
}

/// Pattern loss of one record: cosine distance between the PAA of the
/// original series and the PAA reconstructed from its published pattern word.
pub fn pattern_loss(series: &[f64], pattern: &str) -> f64 {
    let original = paa(&znorm(series, ZNORM_THRESHOLD), pattern.len());
    let reconstructed = reconstruct_paa(pattern);
    cosine_distance(&original, &reconstructed)
}

/// Sum and mean of the pattern loss over the whole table. Suppressed records
/// carry no pattern and contribute nothing to the sum; the mean still divides
/// by the full table size, as the reference evaluation does.
pub fn global_pattern_loss(dataset: &Dataset, result: &AnonymizationResult) -> (f64, f64) {
    let mut total = 0.0;
    for (id, series) in &dataset.records {
        if let Some(pattern) = result.patterns.get(id) {
            total += pattern_loss(series, pattern);
        }
    }
    let mean = if dataset.records.is_empty() {
        0.0
    } else {
        total / dataset.records.len() as f64
    };
    (total, mean)
}

/// Sum and per-group mean of the instant value loss of the published
/// envelopes.
pub fn global_value_loss(result: &AnonymizationResult) -> (f64, f64) {
    let mut total = 0.0;
    for group in &result.k_groups {
        let (min, max) = group_envelope(group);
        total += value_loss_from_envelope(&min, &max, group.len());
    }
    let mean = if result.k_groups.is_empty() {
        0.0
    } else {
        total / result.k_groups.len() as f64
    };
    (total, mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Group;

    #[test]
    fn cosine_distance_conventions() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn faithful_pattern_has_low_loss() {
        // A clean up-ramp against its own 3-letter encoding.
        let series = [1.0, 2.0, 3.0];
        let loss_matching = pattern_loss(&series, "abc");
        let loss_opposite = pattern_loss(&series, "cba");
        assert!(loss_matching < 0.1, "matching loss {loss_matching}");
        assert!(loss_opposite > 1.5, "opposite loss {loss_opposite}");
    }

    #[test]
    fn trivial_pattern_is_maximally_lossy_for_shaped_series() {
        let series = [1.0, 5.0, 2.0];
        // "aaa" reconstructs to the zero vector.
        assert_eq!(pattern_loss(&series, "aaa"), 1.0);
    }

    #[test]
    fn value_loss_of_tight_groups_is_smaller() {
        let tight: Group = [("a", vec![1.0, 1.0]), ("b", vec![1.1, 1.0])]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let wide: Group = [("c", vec![1.0, 1.0]), ("d", vec![9.0, 9.0])]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let result_tight = fake_result(vec![tight]);
        let result_wide = fake_result(vec![wide]);
        assert!(global_value_loss(&result_tight).0 < global_value_loss(&result_wide).0);
    }

    fn fake_result(k_groups: Vec<Group>) -> AnonymizationResult {
        AnonymizationResult {
            k_groups,
            patterns: Default::default(),
            sensitive: Default::default(),
            suppressed: Vec::new(),
            unresolved_classes: 0,
        }
    }
}
