//! Exact enumeration for the restricted two-type model.
//!
//! Instead of marginalizing, this path materializes every feasible
//! boolean type-configuration of the tree, scores each in log space and
//! reduces with log-sum-exp. It exists for the two-type special case
//! where selected leaves ("leaves of interest") are pinned to a known
//! type and the full configuration set is small enough to enumerate.

use std::collections::BTreeSet;

use lineage_model::measure::{Family, Measure};
use lineage_model::params::FateProbabilityTable;
use lineage_model::tree::{Fate, LineageTree, Node};
use nohash_hasher::IntMap;

use crate::error::{Error, Result};

/// Log of a sum of exponentials with the running max factored out.
///
/// Never exponentiates a positive argument, so scores of any magnitude
/// reduce without overflow; an empty or all `-inf` input is `-inf`.
pub fn log_sum_exp(scores: &[f64]) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = scores.iter().map(|&s| (s - max).exp()).sum();
    max + sum.ln()
}

/// One full type assignment over the tree: the set of labels carrying the
/// distinguished type. Every label outside the set carries the default
/// type, so a partially resolved candidate is still a complete bitset.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeConfiguration {
    marked: BTreeSet<u32>,
}

impl TypeConfiguration {
    fn with(label: u32, ty: bool) -> Self {
        let mut marked = BTreeSet::new();
        if ty {
            marked.insert(label);
        }
        Self { marked }
    }

    fn union(&self, other: &Self) -> Self {
        let mut marked = self.marked.clone();
        marked.extend(&other.marked);
        Self { marked }
    }

    fn marking(mut self, label: u32) -> Self {
        self.marked.insert(label);
        self
    }

    /// Type of a label under this configuration.
    pub fn type_of(&self, label: u32) -> bool {
        self.marked.contains(&label)
    }

    /// Labels carrying the distinguished type.
    pub fn marked(&self) -> impl Iterator<Item = u32> + '_ {
        self.marked.iter().copied()
    }
}

/// Parameter set of the two-type model.
///
/// Types are booleans, `true` being the distinguished type. Division is
/// weighted not by a pair table but by three weights `q0/q1/q2` selected
/// by how many daughters share the mother's type; lifetimes follow
/// Weibull laws keyed by (type, fate), read from the measurement tag named
/// at construction.
#[derive(Clone, Debug)]
pub struct TwoTypeModel {
    fates: [[f64; 2]; 2],
    lifetimes: Vec<((bool, Fate), Measure)>,
    transition_weights: [f64; 3],
    loss_probability: f64,
    lifetime_tag: String,
}

impl TwoTypeModel {
    /// `fates[ty as usize]` holds P(divides) and P(apoptoses) for that
    /// type; the remainder is the non-dividing mass.
    pub fn new(
        fates: [[f64; 2]; 2],
        transition_weights: [f64; 3],
        loss_probability: f64,
        lifetime_tag: impl Into<String>,
    ) -> Result<Self> {
        // Reuse the K-type fate validation for the two rows.
        FateProbabilityTable::new(fates.to_vec())?;
        if !(0.0..=1.0).contains(&loss_probability) {
            return Err(lineage_model::Error::LossProbability(loss_probability).into());
        }
        Ok(Self {
            fates,
            lifetimes: Vec::new(),
            transition_weights,
            loss_probability,
            lifetime_tag: lifetime_tag.into(),
        })
    }

    /// Attach a Weibull(scale, shape) lifetime law for cells of type `ty`
    /// ending in `fate`.
    pub fn with_lifetime(mut self, ty: bool, fate: Fate, scale: f64, shape: f64) -> Result<Self> {
        let law = Measure::new(Family::WeibullScaleShape, scale, shape)?;
        self.lifetimes.push(((ty, fate), law));
        Ok(self)
    }

    fn fate_weight(&self, ty: bool, fate: Fate) -> f64 {
        let [divides, apoptoses] = self.fates[ty as usize];
        match fate {
            Fate::Divides => divides,
            Fate::Apoptoses => apoptoses,
            Fate::NonDividing => 1.0 - divides - apoptoses,
            // An unobserved fate constrains nothing beyond loss thinning.
            Fate::Unobserved => 1.0,
            // Lost cells never reach here; they score through the loss
            // factor alone.
            Fate::Lost => 1.0,
        }
    }

    fn lifetime_law(&self, ty: bool, fate: Fate) -> Option<&Measure> {
        self.lifetimes
            .iter()
            .find(|((t, f), _)| *t == ty && *f == fate)
            .map(|(_, law)| law)
    }
}

/// Exhaustive enumeration and scoring of two-type configurations.
pub struct ConfigurationEnumerator<'a> {
    tree: &'a LineageTree,
    model: &'a TwoTypeModel,
    leaf_constraints: IntMap<u32, bool>,
    root_constraint: Option<bool>,
}

impl<'a> ConfigurationEnumerator<'a> {
    pub fn new(tree: &'a LineageTree, model: &'a TwoTypeModel) -> Self {
        Self {
            tree,
            model,
            leaf_constraints: IntMap::default(),
            root_constraint: None,
        }
    }

    /// Pin a leaf of interest to a known type.
    pub fn constrain_leaf(mut self, label: u32, ty: bool) -> Self {
        self.leaf_constraints.insert(label, ty);
        self
    }

    /// Declare the root's type known.
    pub fn with_root_type(mut self, ty: bool) -> Self {
        self.root_constraint = Some(ty);
        self
    }

    /// All feasible configurations under the constraints.
    pub fn enumerate(&self) -> Result<BTreeSet<TypeConfiguration>> {
        let root = self.tree.root_node();
        match self.root_constraint {
            Some(ty) => self.enumerate_subtree(root, ty),
            None if root.is_leaf() && root.is_lost() => {
                // A lost singleton scores identically under both types;
                // enumerating one side avoids counting that mass twice.
                self.enumerate_subtree(root, false)
            }
            None => {
                let mut all = self.enumerate_subtree(root, true)?;
                all.extend(self.enumerate_subtree(root, false)?);
                Ok(all)
            }
        }
    }

    /// Configurations of `node`'s subtree consistent with `assumed` at
    /// `node`.
    ///
    /// The recursion is asymmetric: a feasibility probe into both children
    /// with the default type contributes one candidate that leaves the
    /// children unresolved, and only an assumed distinguished type expands
    /// the child cross product (the default/default combination is covered
    /// by the probe). See DESIGN.md for the completeness caveat.
    fn enumerate_subtree(&self, node: &Node, assumed: bool) -> Result<BTreeSet<TypeConfiguration>> {
        let mut out = BTreeSet::new();

        let Some([c1, c2]) = node.children() else {
            match self.leaf_constraints.get(&node.label()) {
                Some(&required) if required != assumed => {}
                _ => {
                    out.insert(TypeConfiguration::with(node.label(), assumed));
                }
            }
            return Ok(out);
        };

        let n1 = self.tree.node(c1)?;
        let n2 = self.tree.node(c2)?;

        // Feasibility probe only; the children's actual types stay
        // unresolved in this candidate.
        if !self.enumerate_subtree(n1, false)?.is_empty()
            && !self.enumerate_subtree(n2, false)?.is_empty()
        {
            out.insert(TypeConfiguration::with(node.label(), assumed));
        }

        if assumed {
            for (t1, t2) in [(true, true), (true, false), (false, true)] {
                let set1 = self.enumerate_subtree(n1, t1)?;
                if set1.is_empty() {
                    continue;
                }
                let set2 = self.enumerate_subtree(n2, t2)?;
                for a1 in &set1 {
                    for a2 in &set2 {
                        out.insert(a1.union(a2).marking(node.label()));
                    }
                }
            }
        }

        Ok(out)
    }

    /// Log-probability of one full configuration.
    pub fn score(&self, configuration: &TypeConfiguration) -> f64 {
        let loss = self.model.loss_probability;
        let mut total = 0.0;

        for node in self.tree.nodes() {
            if node.is_lost() {
                total += loss.ln();
                continue;
            }

            let ty = configuration.type_of(node.label());
            total += self.model.fate_weight(ty, node.fate()).ln();
            if let Some(law) = self.model.lifetime_law(ty, node.fate()) {
                if let Some(elapsed) = node.measured(&self.model.lifetime_tag) {
                    total += law.density(elapsed).ln();
                }
            }
            total += (1.0 - loss).ln();

            if node.fate() == Fate::Divides {
                if let Some(daughters) = node.children() {
                    let matches = daughters
                        .iter()
                        .filter(|&&d| configuration.type_of(d) == ty)
                        .count();
                    total += self.model.transition_weights[matches].ln();
                }
            }
        }

        total
    }

    /// Exact log-likelihood: log-sum-exp over every feasible
    /// configuration's score.
    pub fn log_likelihood(&self) -> Result<f64> {
        let configurations = self.enumerate()?;
        if configurations.is_empty() {
            return Err(Error::NoFeasibleConfiguration);
        }
        let scores: Vec<f64> = configurations.iter().map(|c| self.score(c)).collect();
        Ok(log_sum_exp(&scores))
    }
}
