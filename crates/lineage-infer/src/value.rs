//! Per-(cell, type) observation probability.

use lineage_model::params::Parametrization;
use lineage_model::tree::{Fate, Node};

/// Combines the measurement laws, the fate probabilities and the loss
/// probability into one scalar per (node, candidate type).
#[derive(Clone, Copy, Debug)]
pub struct CellValueModel<'a> {
    params: &'a Parametrization,
}

impl<'a> CellValueModel<'a> {
    pub fn new(params: &'a Parametrization) -> Self {
        Self { params }
    }

    /// Probability of the node's observations given the candidate type.
    ///
    /// A lost cell contributes the loss probability alone, measurements
    /// ignored. Otherwise every applicable measurement contributes one
    /// factor (tags not applicable to the root and missing values are
    /// skipped, not scored), and the node's fate contributes its
    /// loss-thinned probability.
    pub fn value_probability(&self, node: &Node, ty: usize) -> f64 {
        if node.is_lost() {
            return self.params.loss_probability();
        }

        let censored = node.is_incomplete() || node.fate() == Fate::Unobserved;
        let mut p = 1.0;
        for spec in self.params.measurements() {
            if node.is_root() && !spec.applies_to_root() {
                continue;
            }
            let Some(value) = node.measured(spec.tag()) else {
                continue;
            };
            p *= spec.law(ty).probability(value, censored, spec.policy());
        }
        p * self.params.fate_probability(node.fate(), ty)
    }
}
