//! Top-down ancestral type sampling.
//!
//! Draws one concrete type per node from the posterior implied by the
//! pruning vectors: the root from the prior-weighted root vector, then
//! each daughter pair jointly from the product of the daughters' vectors
//! and the transition probability of the pair given the sampled mother
//! type.

use lineage_model::params::{FixedTypeAssignment, Parametrization};
use lineage_model::tree::{LineageTree, Node};
use nohash_hasher::IntMap;
use rand::Rng;

use crate::error::{Error, Result};
use crate::pruning::{NodeVectors, PruningEngine, candidates};

/// Draw an index proportional to a slice of nonnegative weights.
///
/// `None` when no weight is positive; the caller decides whether that is
/// fatal. The cumulative scan tolerates floating-point slack by falling
/// back to the last positive weight.
fn sample_index<G: Rng + ?Sized>(rng: &mut G, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }

    let mut remaining = rng.random::<f64>() * total;
    let mut last = None;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        remaining -= w;
        last = Some(i);
        if remaining <= 0.0 {
            break;
        }
    }
    last
}

/// Samples full ancestral type assignments on demand.
///
/// Each call to [`Self::sample`] reruns a store-mode pruning pass first,
/// so the vectors always reflect the current tree and parameters; nothing
/// is reused across calls.
pub struct AncestralTypePainter<'a> {
    tree: &'a LineageTree,
    params: &'a Parametrization,
    fixed: &'a FixedTypeAssignment,
}

impl<'a> AncestralTypePainter<'a> {
    pub fn new(
        tree: &'a LineageTree,
        params: &'a Parametrization,
        fixed: &'a FixedTypeAssignment,
    ) -> Self {
        Self { tree, params, fixed }
    }

    /// Sample one type per node, keyed by label.
    ///
    /// Fixed types are honored verbatim; free ones are drawn top-down.
    /// Failing to reach a declared label (a disconnected arena) or hitting
    /// an all-zero weight vector is a fatal state error.
    pub fn sample<G: Rng + ?Sized>(&self, rng: &mut G) -> Result<IntMap<u32, usize>> {
        let engine = PruningEngine::new(self.tree, self.params, self.fixed);
        let (_, vectors) = engine.compute_and_cache()?;

        let root = self.tree.root_node();
        let root_type = match self.fixed.fixed_type(root.label()) {
            Some(ty) => ty,
            None => {
                let weights: Vec<f64> = self
                    .params
                    .type_prior()
                    .iter()
                    .zip(&vectors[&root.label()])
                    .map(|(prior, v)| prior * v)
                    .collect();
                sample_index(rng, &weights).ok_or(Error::DegenerateWeights(root.label()))?
            }
        };

        let mut painted = IntMap::default();
        self.paint(root, root_type, &vectors, &mut painted, rng)?;

        for label in self.tree.labels() {
            if !painted.contains_key(&label) {
                return Err(Error::UnreachableNode(label));
            }
        }
        Ok(painted)
    }

    fn paint<G: Rng + ?Sized>(
        &self,
        node: &Node,
        ty: usize,
        vectors: &NodeVectors,
        painted: &mut IntMap<u32, usize>,
        rng: &mut G,
    ) -> Result<()> {
        painted.insert(node.label(), ty);

        let Some([c1, c2]) = node.children() else {
            return Ok(());
        };
        let n1 = self.tree.node(c1)?;
        let n2 = self.tree.node(c2)?;

        let (t1, t2) = match (self.fixed.fixed_type(c1), self.fixed.fixed_type(c2)) {
            (Some(t1), Some(t2)) => (t1, t2),
            (f1, f2) => {
                let n_types = self.params.n_types();
                let v1 = &vectors[&c1];
                let v2 = &vectors[&c2];

                // Joint weights over daughter-type pairs, restricted to
                // any fixed side.
                let mut weights = vec![0.0; n_types * n_types];
                for j in candidates(f1, n_types) {
                    for l in candidates(f2, n_types) {
                        weights[j * n_types + l] =
                            v1[j] * v2[l] * self.params.transition(ty, j, l);
                    }
                }
                let pick = sample_index(rng, &weights)
                    .ok_or(Error::DegenerateWeights(node.label()))?;
                (pick / n_types, pick % n_types)
            }
        };

        self.paint(n1, t1, vectors, painted, rng)?;
        self.paint(n2, t2, vectors, painted, rng)
    }
}
