//! Bottom-up pruning over the lineage tree.
//!
//! For every node the engine computes a length-K vector of partial
//! likelihoods, one entry per candidate type; a fixed type leaves a single
//! nonzero entry. Vectors combine multiplicatively toward the root through
//! the division-type transition table, and a single log is taken at the
//! root. Working in natural probability space is adequate for the shallow
//! trees this targets (tens of nodes); much deeper trees would underflow
//! and need a log-domain or rescaled variant.

use lineage_model::params::{FixedTypeAssignment, Parametrization};
use lineage_model::tree::{LineageTree, Node};
use nohash_hasher::IntMap;

use crate::error::{Error, Result};
use crate::value::CellValueModel;

/// Per-node partial-likelihood vectors recorded by a store-mode pass,
/// keyed by node label.
pub type NodeVectors = IntMap<u32, Vec<f64>>;

/// Candidate types of a node: all of them, or the single fixed one.
pub(crate) fn candidates(fixed: Option<usize>, n_types: usize) -> std::ops::Range<usize> {
    match fixed {
        Some(ty) => ty..ty + 1,
        None => 0..n_types,
    }
}

/// Bottom-up dynamic program computing the marginal log-likelihood.
///
/// Every call recomputes the whole tree; there is no dirty tracking and
/// the only cache is the value returned by [`Self::compute_and_cache`].
pub struct PruningEngine<'a> {
    tree: &'a LineageTree,
    params: &'a Parametrization,
    fixed: &'a FixedTypeAssignment,
    known_type: bool,
}

impl<'a> PruningEngine<'a> {
    pub fn new(
        tree: &'a LineageTree,
        params: &'a Parametrization,
        fixed: &'a FixedTypeAssignment,
    ) -> Self {
        Self {
            tree,
            params,
            fixed,
            known_type: false,
        }
    }

    /// Declare the tree part of a batch of uniform, known type.
    ///
    /// Aggregation then requires exactly one type to carry root mass and
    /// reports its log directly, without the type frequency prior.
    pub fn with_known_type(mut self) -> Self {
        self.known_type = true;
        self
    }

    /// Marginal log-likelihood of the tree.
    ///
    /// `-inf` is a legitimate result: it means no type assignment
    /// consistent with the constraints explains the observations.
    pub fn log_likelihood(&self) -> Result<f64> {
        let value = CellValueModel::new(self.params);
        let root = self.node_vector(self.tree.root_node(), &value, &mut None)?;
        self.aggregate(&root)
    }

    /// Store-mode pass: the log-likelihood plus every node's vector.
    ///
    /// The cache is rebuilt from scratch on each call and is not kept
    /// coherent across parameter changes; callers hand it straight to the
    /// ancestral sampler and drop it.
    pub fn compute_and_cache(&self) -> Result<(f64, NodeVectors)> {
        let value = CellValueModel::new(self.params);
        let mut cache = NodeVectors::default();
        let root = {
            let mut store = Some(&mut cache);
            self.node_vector(self.tree.root_node(), &value, &mut store)?
        };
        let log_likelihood = self.aggregate(&root)?;
        Ok((log_likelihood, cache))
    }

    fn node_vector(
        &self,
        node: &Node,
        value: &CellValueModel<'_>,
        store: &mut Option<&mut NodeVectors>,
    ) -> Result<Vec<f64>> {
        let n_types = self.params.n_types();
        let own = candidates(self.fixed.fixed_type(node.label()), n_types);
        let mut v = vec![0.0; n_types];

        match node.children() {
            None => {
                for ty in own {
                    v[ty] = value.value_probability(node, ty);
                }
            }
            Some([c1, c2]) => {
                let n1 = self.tree.node(c1)?;
                let n2 = self.tree.node(c2)?;
                let v1 = self.node_vector(n1, value, store)?;
                let v2 = self.node_vector(n2, value, store)?;
                let f1 = self.fixed.fixed_type(c1);
                let f2 = self.fixed.fixed_type(c2);

                for ty in own {
                    let mut pair_sum = 0.0;
                    for j in candidates(f1, n_types) {
                        for l in candidates(f2, n_types) {
                            pair_sum += self.params.transition(ty, j, l) * v1[j] * v2[l];
                        }
                    }
                    v[ty] = value.value_probability(node, ty) * pair_sum;
                }
            }
        }

        if let Some(cache) = store {
            cache.insert(node.label(), v.clone());
        }
        Ok(v)
    }

    fn aggregate(&self, root: &[f64]) -> Result<f64> {
        if self.known_type {
            let nonzero = root.iter().filter(|&&v| v > 0.0).count();
            if nonzero > 1 {
                return Err(Error::AmbiguousRootType(nonzero));
            }
            // No surviving type is the legitimate -inf case, not an error.
            let mass = root.iter().copied().find(|&v| v > 0.0).unwrap_or(0.0);
            Ok(mass.ln())
        } else {
            let total: f64 = self
                .params
                .type_prior()
                .iter()
                .zip(root)
                .map(|(prior, v)| prior * v)
                .sum();
            Ok(total.ln())
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use lineage_model::measure::{EstimatePolicy, Family, TypeLaw};
    use lineage_model::params::{
        FateProbabilityTable, MeasurementSpec, Parametrization, TypeTransitionTable,
    };
    use lineage_model::tree::{Fate, LineageTree, ROOT_LABEL};

    use super::*;

    const TOL: f64 = 1e-10;

    fn two_type_params(loss: f64) -> Parametrization {
        let normal = |mean: f64| TypeLaw::new(Family::Normal, mean, 1.0).unwrap();
        Parametrization::new(
            vec![MeasurementSpec::new(
                "marker",
                EstimatePolicy::Mean,
                vec![normal(0.5), normal(-0.5)],
            )],
            TypeTransitionTable::new(vec![vec![0.5, 0.4, 0.1], vec![0.0, 0.0, 1.0]]).unwrap(),
            FateProbabilityTable::new(vec![[0.6, 0.1], [0.2, 0.3]]).unwrap(),
            loss,
            vec![0.5, 0.5],
        )
        .unwrap()
    }

    fn three_cell_tree() -> LineageTree {
        let mut tree = LineageTree::root(Fate::Unobserved);
        tree.divide(ROOT_LABEL).unwrap();
        tree.observe(ROOT_LABEL, "marker", 1.0).unwrap();
        tree.set_fate(2, Fate::Apoptoses).unwrap();
        tree.observe(2, "marker", 0.3).unwrap();
        tree.set_fate(3, Fate::NonDividing).unwrap();
        tree.observe(3, "marker", -0.2).unwrap();
        tree
    }

    #[test]
    fn single_cell_fixed_type() {
        let mut tree = LineageTree::root(Fate::Unobserved);
        tree.observe(ROOT_LABEL, "marker", 1.0).unwrap();
        let params = two_type_params(0.0);
        let fixed = FixedTypeAssignment::new(vec![-1, 0]);

        let ll = PruningEngine::new(&tree, &params, &fixed)
            .log_likelihood()
            .unwrap();
        // log(prior_0 * N(0.5, 1).density(1.0)) = log(0.5) - 0.125 - log(sqrt(2 pi))
        assert!((ll - (-1.737_085_713_764_618)).abs() < 1e-6);
    }

    #[test]
    fn fully_fixed_reduction() {
        let tree = three_cell_tree();
        let params = two_type_params(0.2);
        let fixed = FixedTypeAssignment::new(vec![-1, 0, 0, 1]);

        let ll = PruningEngine::new(&tree, &params, &fixed)
            .with_known_type()
            .log_likelihood()
            .unwrap();

        let value = CellValueModel::new(&params);
        let expected = value
            .value_probability(tree.node(1).unwrap(), 0)
            .ln()
            + value.value_probability(tree.node(2).unwrap(), 0).ln()
            + value.value_probability(tree.node(3).unwrap(), 1).ln()
            + params.transition(0, 0, 1).ln();
        assert!((ll - expected).abs() < TOL);
    }

    #[test]
    fn child_order_invariance() {
        let params = two_type_params(0.1);
        let fixed = FixedTypeAssignment::free();

        let tree = three_cell_tree();
        let mut swapped = LineageTree::root(Fate::Unobserved);
        swapped.divide(ROOT_LABEL).unwrap();
        swapped.observe(ROOT_LABEL, "marker", 1.0).unwrap();
        swapped.set_fate(2, Fate::NonDividing).unwrap();
        swapped.observe(2, "marker", -0.2).unwrap();
        swapped.set_fate(3, Fate::Apoptoses).unwrap();
        swapped.observe(3, "marker", 0.3).unwrap();

        let ll = PruningEngine::new(&tree, &params, &fixed)
            .log_likelihood()
            .unwrap();
        let ll_swapped = PruningEngine::new(&swapped, &params, &fixed)
            .log_likelihood()
            .unwrap();
        assert!((ll - ll_swapped).abs() < TOL);
    }

    #[test]
    fn marginal_sums_fixed_slices() {
        // Marginalizing the root equals the prior-weighted sum of the two
        // fixed-root evaluations.
        let tree = three_cell_tree();
        let params = two_type_params(0.1);

        let free = FixedTypeAssignment::free();
        let marginal = PruningEngine::new(&tree, &params, &free)
            .log_likelihood()
            .unwrap();

        let mut slices = 0.0;
        for ty in 0..params.n_types() {
            let mut fixed = FixedTypeAssignment::free();
            fixed.fix(ROOT_LABEL, ty);
            let ll = PruningEngine::new(&tree, &params, &fixed)
                .log_likelihood()
                .unwrap();
            slices += ll.exp();
        }
        assert!((marginal.exp() - slices).abs() < TOL);
    }

    #[test]
    fn infeasible_tree_scores_neg_infinity() {
        let mut tree = LineageTree::root(Fate::NonDividing);
        tree.observe(ROOT_LABEL, "fraction", 1.5).unwrap();

        let beta = |a: f64, b: f64| TypeLaw::new(Family::Beta, a, b).unwrap();
        let params = Parametrization::new(
            vec![MeasurementSpec::new(
                "fraction",
                EstimatePolicy::Mean,
                vec![beta(2.0, 2.0), beta(1.0, 3.0)],
            )],
            TypeTransitionTable::new(vec![vec![0.5, 0.4, 0.1], vec![0.0, 0.0, 1.0]]).unwrap(),
            FateProbabilityTable::new(vec![[0.6, 0.1], [0.2, 0.3]]).unwrap(),
            0.0,
            vec![0.5, 0.5],
        )
        .unwrap();

        // 1.5 is outside every Beta support: zero mass under both types.
        let free = FixedTypeAssignment::free();
        let ll = PruningEngine::new(&tree, &params, &free)
            .log_likelihood()
            .unwrap();
        assert_eq!(ll, f64::NEG_INFINITY);
    }

    #[test]
    fn known_type_aggregation() {
        let tree = three_cell_tree();
        let params = two_type_params(0.0);

        // Both root types carry mass: ambiguous for a known-type batch.
        let free = FixedTypeAssignment::free();
        let err = PruningEngine::new(&tree, &params, &free)
            .with_known_type()
            .log_likelihood();
        assert!(matches!(err, Err(Error::AmbiguousRootType(2))));

        // A fixed root collapses the vector to one entry.
        let mut fixed = FixedTypeAssignment::free();
        fixed.fix(ROOT_LABEL, 0);
        let ll = PruningEngine::new(&tree, &params, &fixed)
            .with_known_type()
            .log_likelihood()
            .unwrap();
        assert!(ll.is_finite());
    }

    #[test]
    fn store_mode_caches_every_node() {
        let tree = three_cell_tree();
        let params = two_type_params(0.1);
        let free = FixedTypeAssignment::free();

        let engine = PruningEngine::new(&tree, &params, &free);
        let (ll, vectors) = engine.compute_and_cache().unwrap();
        assert!((ll - engine.log_likelihood().unwrap()).abs() < TOL);

        assert_eq!(vectors.len(), tree.len());
        for label in tree.labels() {
            let v = &vectors[&label];
            assert_eq!(v.len(), params.n_types());
            // Partial likelihoods are probabilities: nonnegative.
            assert!(v.iter().all(|&x| x >= 0.0));
            assert!(v.iter().any(|&x| x > 0.0));
        }
    }

    #[test]
    fn fixed_child_collapses_the_pair_sum() {
        let tree = three_cell_tree();
        let params = two_type_params(0.1);

        // Fixing a child must equal zeroing the other entries of its vector.
        let fixed = FixedTypeAssignment::new(vec![-1, -1, 1, -1]);
        let ll = PruningEngine::new(&tree, &params, &fixed)
            .log_likelihood()
            .unwrap();

        let free = FixedTypeAssignment::free();
        let (_, vectors) = PruningEngine::new(&tree, &params, &free)
            .compute_and_cache()
            .unwrap();
        let value = CellValueModel::new(&params);

        let v2 = vectors[&2][1];
        let v3 = &vectors[&3];
        let mut root = 0.0;
        for ty in 0..2 {
            let mut pair_sum = 0.0;
            for l in 0..2 {
                pair_sum += params.transition(ty, 1, l) * v2 * v3[l];
            }
            root += params.type_prior()[ty]
                * value.value_probability(tree.node(1).unwrap(), ty)
                * pair_sum;
        }
        assert!((ll - root.ln()).abs() < TOL);
    }
}
