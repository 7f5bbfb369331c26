//! Group-quality measures: Normalized Certainty Penalty and Instant Value
//! Loss.
//!
//! Both are pure aggregate functions over a set of QI vectors. The clustering
//! algorithms call them repeatedly on hypothetical unions, so they take
//! borrowed row slices and never allocate beyond a couple of envelope vectors.

use crate::types::Series;

/// Global per-attribute bounds of the whole table, required by NCP.
#[derive(Debug, Clone)]
pub struct AttributeBounds {
    /// Per-attribute global minimum.
    pub min: Vec<f64>,
    /// Per-attribute global maximum.
    pub max: Vec<f64>,
}

/// NCP(T): sum over attributes of the in-group range width normalized by the
/// global attribute range, scaled by the number of rows. An attribute whose
/// global range is zero contributes nothing.
pub fn normalized_certainty_penalty(rows: &[&Series], bounds: &AttributeBounds) -> f64 {
    let n = match rows.first() {
        Some(first) => first.len(),
        None => return 0.0,
    };
    let mut ncp = 0.0;
    for i in 0..n {
        let span = (bounds.max[i] - bounds.min[i]).abs();
        if span == 0.0 {
            continue;
        }
        let (lo, hi) = attribute_range(rows, i);
        ncp += (hi - lo) / span;
    }
    rows.len() as f64 * ncp
}

/// VL(T): square root of the mean squared in-group range width, scaled by the
/// number of rows.
pub fn instant_value_loss(rows: &[&Series]) -> f64 {
    let n = match rows.first() {
        Some(first) => first.len(),
        None => return 0.0,
    };
    let mut sum_sq = 0.0;
    for i in 0..n {
        let (lo, hi) = attribute_range(rows, i);
        sum_sq += (hi - lo).powi(2) / n as f64;
    }
    rows.len() as f64 * sum_sq.sqrt()
}

/// VL computed from a fixed, externally supplied envelope. Lets the loss
/// reporter evaluate anonymized groups whose published form is the envelope
/// itself.
pub fn value_loss_from_envelope(min: &[f64], max: &[f64], row_count: usize) -> f64 {
    if min.is_empty() {
        return 0.0;
    }
    let n = min.len() as f64;
    let sum_sq: f64 = min
        .iter()
        .zip(max)
        .map(|(lo, hi)| (hi - lo).powi(2) / n)
        .sum();
    row_count as f64 * sum_sq.sqrt()
}

fn attribute_range(rows: &[&Series], attr: usize) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for row in rows {
        let v = row[attr];
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    (lo, hi)
}
