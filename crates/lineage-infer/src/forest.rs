//! Batched scoring of independent trees.
//!
//! The surrounding parameter search scores many trees against one
//! parametrization per iteration. Trees are independent, so the fan-out is
//! embarrassingly parallel; each evaluation itself stays single-threaded.

use lineage_model::params::{FixedTypeAssignment, Parametrization};
use lineage_model::tree::LineageTree;
use rayon::prelude::*;

use crate::error::Result;
use crate::pruning::PruningEngine;

/// Offset of each tree's label range in the concatenated assignment
/// array: tree `i` starts after the full label span of the trees before
/// it.
fn label_offsets(trees: &[LineageTree]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(trees.len());
    let mut next = 0;
    for tree in trees {
        offsets.push(next);
        next += tree.max_label() as usize + 1;
    }
    offsets
}

/// Log-likelihood of every tree against one shared assignment array.
///
/// `fixed` covers the concatenated label spaces of all trees (offsets
/// computed as in [`label_offsets`]); any offset already set on it is
/// replaced. With `known_type`, every tree aggregates in known-type mode.
pub fn score_forest(
    trees: &[LineageTree],
    params: &Parametrization,
    fixed: &FixedTypeAssignment,
    known_type: bool,
) -> Result<Vec<f64>> {
    let offsets = label_offsets(trees);
    trees
        .par_iter()
        .zip(offsets)
        .map(|(tree, offset)| {
            let fixed = fixed.clone().with_offset(offset);
            let mut engine = PruningEngine::new(tree, params, &fixed);
            if known_type {
                engine = engine.with_known_type();
            }
            engine.log_likelihood()
        })
        .collect()
}

/// Sum of the per-tree log-likelihoods.
pub fn total_log_likelihood(
    trees: &[LineageTree],
    params: &Parametrization,
    fixed: &FixedTypeAssignment,
    known_type: bool,
) -> Result<f64> {
    Ok(score_forest(trees, params, fixed, known_type)?.iter().sum())
}
