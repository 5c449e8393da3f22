#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Likelihood inference over cell-lineage trees.
//!
//! Three algorithms share the data model of the `lineage-model` crate:
//!
//! - [`pruning::PruningEngine`] — the bottom-up dynamic program
//!   marginalizing the latent per-cell type, O(N·K²) per evaluation;
//! - [`enumerate::ConfigurationEnumerator`] — the exact two-type
//!   alternative that materializes every feasible boolean configuration
//!   and reduces with log-sum-exp;
//! - [`painter::AncestralTypePainter`] — the top-down sampler drawing
//!   concrete ancestral types from the pruning vectors.
//!
//! Everything recomputes fully on every call: the only cache is the
//! per-node vector map a store-mode pruning pass hands to its caller.
//! [`forest`] adds the one parallel seam, scoring independent trees of a
//! batch concurrently.

pub mod enumerate;
pub mod error;
pub mod forest;
pub mod painter;
pub mod pruning;
pub mod value;

pub use error::{Error, Result};

pub mod prelude {
    //! Import of the types most callers need.

    pub use crate::enumerate::{
        ConfigurationEnumerator, TwoTypeModel, TypeConfiguration, log_sum_exp,
    };
    pub use crate::error::{Error, Result};
    pub use crate::forest::{score_forest, total_log_likelihood};
    pub use crate::painter::AncestralTypePainter;
    pub use crate::pruning::{NodeVectors, PruningEngine};
    pub use crate::value::CellValueModel;
}
