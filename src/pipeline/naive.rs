//! Naive (k,P)-anonymity: k-groups first, pattern sub-groups second.

use rand::Rng;
use tracing::info;

use crate::cluster::{SplitMetric, TopDownClusterer};
use crate::config::AnonymityParams;
use crate::dataset::Dataset;
use crate::errors::Result;
use crate::ldiv::enforce_l_diversity;
use crate::pipeline::AnonymizationResult;
use crate::sax::SaxOracle;
use crate::tree::{absorb_bad_leaves, PatternTree};
use crate::types::PatternTable;

/// Run the naive strategy: top-down NCP clustering to k-groups, a pattern
/// tree per k-group, bad-leaf absorption, then l-diversity.
pub fn run_naive<R: Rng>(
    dataset: &Dataset,
    params: &AnonymityParams,
    rng: &mut R,
) -> Result<AnonymizationResult> {
    params.validate(dataset.records.len())?;

    info!("starting top-down k-anonymity");
    let clusterer = TopDownClusterer::new(SplitMetric::Ncp(&dataset.bounds), params.k);
    let leaves = clusterer.cluster(dataset.records.clone(), rng);
    info!("starting top-down k-anonymity postprocessing");
    let leaves = clusterer.repair(leaves);
    info!(groups = leaves.len(), "k-anonymity done");

    let oracle = SaxOracle::new(params.paa);
    let tree = PatternTree::new(params.p, params.max_level, &oracle);
    let mut patterns = PatternTable::new();
    let mut k_groups = Vec::new();

    for leaf in leaves {
        let (mut good, bad) = tree.split(leaf.records.clone());
        if !bad.is_empty() {
            absorb_bad_leaves(&mut good, bad);
        }
        for node in &good {
            for id in node.members.keys() {
                patterns.insert(id.clone(), node.pattern.clone());
            }
        }
        k_groups.push(leaf.records);
    }
    info!(groups = k_groups.len(), "pattern trees done");

    let mut sensitive = dataset.sensitive.clone();
    let unresolved_classes = enforce_l_diversity(
        &k_groups,
        &patterns,
        &mut sensitive,
        params.l,
        params.epsilon,
        rng,
    );

    Ok(AnonymizationResult {
        k_groups,
        patterns,
        sensitive,
        suppressed: Vec::new(),
        unresolved_classes,
    })
}
