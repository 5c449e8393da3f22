//! Model parameters for one likelihood evaluation.
//!
//! A [`Parametrization`] bundles everything the inference algorithms need:
//! the per-measurement laws, the division-type transition table, the fate
//! probabilities, the tracking-loss probability and the type frequency
//! prior. All validation happens in the constructors; evaluation code can
//! index the tables without further checks.

use crate::error::{Error, Result};
use crate::measure::{EstimatePolicy, TypeLaw};
use crate::tree::Fate;

const PROB_TOL: f64 = 1e-9;

/// One measured quantity and its per-type laws.
#[derive(Clone, Debug)]
pub struct MeasurementSpec {
    tag: String,
    policy: EstimatePolicy,
    applies_to_root: bool,
    laws: Vec<TypeLaw>,
}

impl MeasurementSpec {
    /// A measurement applicable to every cell, root included.
    pub fn new(tag: impl Into<String>, policy: EstimatePolicy, laws: Vec<TypeLaw>) -> Self {
        Self {
            tag: tag.into(),
            policy,
            applies_to_root: true,
            laws,
        }
    }

    /// Exclude the root cell: the tag contributes no factor there
    /// (not applicable, as opposed to missing data).
    pub fn excluded_from_root(mut self) -> Self {
        self.applies_to_root = false;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn policy(&self) -> EstimatePolicy {
        self.policy
    }

    pub fn applies_to_root(&self) -> bool {
        self.applies_to_root
    }

    pub fn law(&self, ty: usize) -> &TypeLaw {
        &self.laws[ty]
    }
}

/// Probability of an unordered daughter-type pair given the mother's type.
///
/// Each row is flattened row-major over the upper triangle including the
/// diagonal: row length is K·(K+1)/2 and the pair (a, b) with a ≤ b lives
/// at `a·(2K − a + 1)/2 + (b − a)`. Lookup canonicalizes the pair, so
/// callers never pre-sort.
#[derive(Clone, Debug)]
pub struct TypeTransitionTable {
    n_types: usize,
    rows: Vec<Vec<f64>>,
}

fn pair_index(n_types: usize, a: usize, b: usize) -> usize {
    a * (2 * n_types - a + 1) / 2 + (b - a)
}

impl TypeTransitionTable {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_types = rows.len();
        if n_types == 0 {
            return Err(Error::NoTypes);
        }

        let expected = n_types * (n_types + 1) / 2;
        for (parent, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(Error::TransitionRowLength {
                    parent,
                    got: row.len(),
                    expected,
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > PROB_TOL {
                return Err(Error::TransitionRowSum { parent, sum });
            }
        }

        Ok(Self { n_types, rows })
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    /// Probability that a dividing mother of type `parent` yields the
    /// unordered daughter pair {`child_a`, `child_b`}.
    pub fn probability(&self, parent: usize, child_a: usize, child_b: usize) -> f64 {
        let (a, b) = if child_a <= child_b {
            (child_a, child_b)
        } else {
            (child_b, child_a)
        };
        self.rows[parent][pair_index(self.n_types, a, b)]
    }
}

/// Per-type division and death probabilities.
///
/// Stores P(divides) and P(apoptoses) per type; the remainder is the
/// non-dividing mass.
#[derive(Clone, Debug)]
pub struct FateProbabilityTable {
    rows: Vec<[f64; 2]>,
}

impl FateProbabilityTable {
    pub fn new(rows: Vec<[f64; 2]>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::NoTypes);
        }
        for (ty, &[divides, apoptoses]) in rows.iter().enumerate() {
            let mass = divides + apoptoses;
            if divides < 0.0 || apoptoses < 0.0 || mass > 1.0 + PROB_TOL {
                return Err(Error::FateMass { ty, mass });
            }
        }
        Ok(Self { rows })
    }

    pub fn n_types(&self) -> usize {
        self.rows.len()
    }

    pub fn divides(&self, ty: usize) -> f64 {
        self.rows[ty][0]
    }

    pub fn apoptoses(&self, ty: usize) -> f64 {
        self.rows[ty][1]
    }

    pub fn non_dividing(&self, ty: usize) -> f64 {
        1.0 - self.rows[ty][0] - self.rows[ty][1]
    }
}

/// Full parameter set for one likelihood evaluation.
#[derive(Clone, Debug)]
pub struct Parametrization {
    measurements: Vec<MeasurementSpec>,
    transitions: TypeTransitionTable,
    fates: FateProbabilityTable,
    loss_probability: f64,
    type_prior: Vec<f64>,
}

impl Parametrization {
    pub fn new(
        measurements: Vec<MeasurementSpec>,
        transitions: TypeTransitionTable,
        fates: FateProbabilityTable,
        loss_probability: f64,
        type_prior: Vec<f64>,
    ) -> Result<Self> {
        let n_types = transitions.n_types();

        if fates.n_types() != n_types {
            return Err(Error::FateTableSize {
                got: fates.n_types(),
                expected: n_types,
            });
        }
        if !(0.0..=1.0).contains(&loss_probability) {
            return Err(Error::LossProbability(loss_probability));
        }
        if type_prior.len() != n_types {
            return Err(Error::PriorLength {
                got: type_prior.len(),
                expected: n_types,
            });
        }
        let prior_sum: f64 = type_prior.iter().sum();
        if (prior_sum - 1.0).abs() > PROB_TOL || type_prior.iter().any(|&p| p < 0.0) {
            return Err(Error::PriorSum(prior_sum));
        }
        for spec in &measurements {
            if spec.laws.len() != n_types {
                return Err(Error::LawCount {
                    tag: spec.tag.clone(),
                    got: spec.laws.len(),
                    expected: n_types,
                });
            }
        }

        Ok(Self {
            measurements,
            transitions,
            fates,
            loss_probability,
            type_prior,
        })
    }

    pub fn n_types(&self) -> usize {
        self.transitions.n_types()
    }

    pub fn measurements(&self) -> &[MeasurementSpec] {
        &self.measurements
    }

    pub fn transition(&self, parent: usize, child_a: usize, child_b: usize) -> f64 {
        self.transitions.probability(parent, child_a, child_b)
    }

    pub fn loss_probability(&self) -> f64 {
        self.loss_probability
    }

    pub fn type_prior(&self) -> &[f64] {
        &self.type_prior
    }

    /// Probability of observing `fate` for a cell of type `ty`.
    ///
    /// Loss thins every observable fate: a lost cell contributes the loss
    /// probability itself, everything else its fate mass times the
    /// complement.
    pub fn fate_probability(&self, fate: Fate, ty: usize) -> f64 {
        let kept = 1.0 - self.loss_probability;
        match fate {
            Fate::Lost => self.loss_probability,
            Fate::Unobserved => kept,
            Fate::Divides => self.fates.divides(ty) * kept,
            Fate::Apoptoses => self.fates.apoptoses(ty) * kept,
            Fate::NonDividing => self.fates.non_dividing(ty) * kept,
        }
    }
}

/// Partial node-label → type map with a free sentinel.
///
/// Backed by a raw `i32` array indexed by `offset + label`, −1 meaning
/// free; labels past the end of the array are free too. The offset shifts
/// lookups into a concatenated array covering several trees at once.
#[derive(Clone, Debug, Default)]
pub struct FixedTypeAssignment {
    types: Vec<i32>,
    offset: usize,
}

impl FixedTypeAssignment {
    /// Every node free.
    pub fn free() -> Self {
        Self::default()
    }

    /// From a raw array indexed by node label; −1 marks a free node.
    pub fn new(types: Vec<i32>) -> Self {
        Self { types, offset: 0 }
    }

    /// Shift all label lookups by `offset` (batched multi-tree inference).
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Fix one label's type, growing the array as needed.
    pub fn fix(&mut self, label: u32, ty: usize) {
        let index = self.offset + label as usize;
        if self.types.len() <= index {
            self.types.resize(index + 1, -1);
        }
        self.types[index] = ty as i32;
    }

    pub fn fixed_type(&self, label: u32) -> Option<usize> {
        match self.types.get(self.offset + label as usize) {
            Some(&ty) if ty >= 0 => Some(ty as usize),
            _ => None,
        }
    }
}
