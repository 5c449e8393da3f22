/// Failures raised while assembling a model or a tree.
///
/// Everything here is fatal and surfaces at setup time, before any
/// likelihood evaluation runs. Evaluation itself never produces these:
/// a structurally infeasible configuration scores `-inf`, it does not error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown distribution family tag `{0}`")]
    UnknownFamily(String),

    #[error("unknown estimate policy tag `{0}`")]
    UnknownPolicy(String),

    #[error("{family} requires {parameter} > 0, got {value}")]
    NonPositiveParameter {
        family: &'static str,
        parameter: &'static str,
        value: f64,
    },

    #[error("invalid parameters ({p1}, {p2}) for {family}")]
    InvalidParameters {
        family: &'static str,
        p1: f64,
        p2: f64,
    },

    #[error("zero-inflation weight must lie in [0, 1], got {0}")]
    ZeroInflationWeight(f64),

    #[error("a parametrization needs at least one cell type")]
    NoTypes,

    #[error("measurement `{tag}` declares {got} per-type laws, expected {expected}")]
    LawCount {
        tag: String,
        got: usize,
        expected: usize,
    },

    #[error("transition row for parent type {parent} has {got} entries, expected {expected}")]
    TransitionRowLength {
        parent: usize,
        got: usize,
        expected: usize,
    },

    #[error("transition row for parent type {parent} sums to {sum}, expected 1")]
    TransitionRowSum { parent: usize, sum: f64 },

    #[error("fate probabilities for type {ty} have mass {mass}, must lie in [0, 1]")]
    FateMass { ty: usize, mass: f64 },

    #[error("fate table covers {got} types, transition table covers {expected}")]
    FateTableSize { got: usize, expected: usize },

    #[error("loss probability must lie in [0, 1], got {0}")]
    LossProbability(f64),

    #[error("type prior has {got} entries, expected {expected}")]
    PriorLength { got: usize, expected: usize },

    #[error("type prior sums to {0}, expected 1")]
    PriorSum(f64),

    #[error("node {0} is not part of the tree")]
    UnknownNode(u32),

    #[error("node {0} has already divided")]
    AlreadyDivided(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
