//! Common core types used across the anonymization engine.

use std::collections::BTreeMap;

/// Stable identifier of a single time-series record (the id column of the
/// input table).
pub type RecordId = String;

/// Fixed-length numeric QI vector of one record.
pub type Series = Vec<f64>;

/// A set of records keyed by id. Represents a k-group, a P-subgroup, or an
/// intermediate clustering bucket. A record id belongs to exactly one group at
/// any pipeline stage; ordered keys keep every scan deterministic.
pub type Group = BTreeMap<RecordId, Series>;

/// Sensitive-attribute column: id -> value. Mutated only by the l-diversity
/// enforcer.
pub type SensitiveTable = BTreeMap<RecordId, i64>;

/// Per-record symbolic pattern tags produced by the pattern tree.
pub type PatternTable = BTreeMap<RecordId, String>;

/// Borrow the QI vectors of a group as a row slice for the metric engine.
pub fn group_rows(group: &Group) -> Vec<&Series> {
    group.values().collect()
}

/// Per-attribute (min, max) envelope of a group.
///
/// Returns empty vectors for an empty group.
pub fn group_envelope(group: &Group) -> (Vec<f64>, Vec<f64>) {
    let mut rows = group.values();
    let first = match rows.next() {
        Some(row) => row,
        None => return (Vec::new(), Vec::new()),
    };
    let mut min = first.clone();
    let mut max = first.clone();
    for row in rows {
        for (i, &v) in row.iter().enumerate() {
            if v < min[i] {
                min[i] = v;
            }
            if v > max[i] {
                max[i] = v;
            }
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_of_group() {
        let mut g = Group::new();
        g.insert("a".into(), vec![1.0, 9.0]);
        g.insert("b".into(), vec![4.0, 2.0]);
        let (min, max) = group_envelope(&g);
        assert_eq!(min, vec![1.0, 2.0]);
        assert_eq!(max, vec![4.0, 9.0]);
    }
}
