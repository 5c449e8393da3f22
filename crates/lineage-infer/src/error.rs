/// Evaluation-time failures.
///
/// These are state errors: the inputs individually validated, but the
/// combination asked for is contradictory. A merely infeasible
/// configuration is not an error — it scores `-inf`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] lineage_model::Error),

    #[error("known-type aggregation found {0} root types with nonzero mass")]
    AmbiguousRootType(usize),

    #[error("no feasible type configuration under the given constraints")]
    NoFeasibleConfiguration,

    #[error("all candidate type weights vanish at node {0}")]
    DegenerateWeights(u32),

    #[error("node {0} was never reached while painting types")]
    UnreachableNode(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
