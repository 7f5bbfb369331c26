//! KAPRA: pattern-first grouping with bad-leaf recycling and bottom-up
//! k-group assembly.

use rand::Rng;
use tracing::info;

use crate::assemble::assemble_k_groups;
use crate::config::AnonymityParams;
use crate::dataset::Dataset;
use crate::errors::Result;
use crate::ldiv::enforce_l_diversity;
use crate::pipeline::AnonymizationResult;
use crate::recycle::recycle_bad_leaves;
use crate::sax::SaxOracle;
use crate::tree::PatternTree;
use crate::types::Group;

/// Run KAPRA: one pattern tree over the whole table, recycle bad leaves,
/// assemble k-groups bottom-up, then l-diversity.
pub fn run_kapra<R: Rng>(
    dataset: &Dataset,
    params: &AnonymityParams,
    rng: &mut R,
) -> Result<AnonymizationResult> {
    params.validate(dataset.records.len())?;

    let oracle = SaxOracle::new(params.paa);
    let tree = PatternTree::new(params.p, params.max_level, &oracle);
    info!("create-tree phase: splitting the whole table");
    let (mut good, bad) = tree.split(dataset.records.clone());
    info!(
        good = good.len(),
        bad = bad.len(),
        "create-tree phase done"
    );

    let suppressed_leaves = recycle_bad_leaves(params.p, &mut good, bad, &oracle);
    let suppressed: Vec<Group> = suppressed_leaves
        .into_iter()
        .map(|leaf| leaf.members)
        .collect();

    let assembly = assemble_k_groups(good, params.p, params.k, rng);
    info!(groups = assembly.k_groups.len(), "k-group assembly done");

    let mut sensitive = dataset.sensitive.clone();
    let unresolved_classes = enforce_l_diversity(
        &assembly.k_groups,
        &assembly.patterns,
        &mut sensitive,
        params.l,
        params.epsilon,
        rng,
    );

    Ok(AnonymizationResult {
        k_groups: assembly.k_groups,
        patterns: assembly.patterns,
        sensitive,
        suppressed,
        unresolved_classes,
    })
}
