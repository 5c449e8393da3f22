#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Data model for cell-lineage likelihood inference.
//!
//! A cell-lineage tree records one life episode per cell: the cell's
//! terminal fate, sparse phenotype measurements and censoring flags,
//! with divisions producing exactly two daughters. This crate owns that
//! tree ([`tree::LineageTree`]), the per-type measurement distributions
//! ([`measure`]) and the full parameter set of the generative model
//! ([`params::Parametrization`]). The inference algorithms themselves
//! live in the `lineage-infer` crate.
//!
//! Trees and parametrizations are constructed by external collaborators
//! (file parsers, the surrounding parameter search) and are immutable for
//! the duration of a likelihood evaluation; every constructor validates
//! eagerly so evaluation code never has to.

pub mod error;
pub mod measure;
pub mod params;
pub mod tree;

pub use error::{Error, Result};

pub mod prelude {
    //! Import of the types most callers need.

    pub use crate::error::{Error, Result};
    pub use crate::measure::{EstimatePolicy, Family, Measure, TypeLaw};
    pub use crate::params::{
        FateProbabilityTable, FixedTypeAssignment, MeasurementSpec, Parametrization,
        TypeTransitionTable,
    };
    pub use crate::tree::{Fate, LineageTree, Node, ROOT_LABEL};
}
