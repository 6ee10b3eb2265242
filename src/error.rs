//! Error types for network construction and evolution.
//!
//! Three kinds of failure are distinguished: malformed initialization data
//! (`ConfigurationError`), inconsistent network structure (`TopologyError`),
//! and solver failure during a step (`NumericalError`). All are raised
//! synchronously by the call that detected them; the engine never retries
//! or rolls back on its own. A failed step leaves elevations untouched, so
//! the network stays usable at its last valid state.

use thiserror::Error;

use crate::types::SegmentId;

/// Malformed or missing initialization data.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Per-segment arrays must all have the same length as the positions.
    #[error("segment {segment}: {name} has {actual} entries, expected {expected}")]
    LengthMismatch {
        segment: SegmentId,
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Along-channel positions must be strictly increasing.
    #[error("segment {segment}: positions must be strictly increasing at node {node}")]
    NonMonotonicPositions { segment: SegmentId, node: usize },

    /// A reach needs at least an upstream and a downstream node.
    #[error("segment {segment}: needs at least two nodes, got {nodes}")]
    TooFewNodes { segment: SegmentId, nodes: usize },

    /// NaN or infinity in an input array.
    #[error("segment {segment}: {name} is not finite at node {node}")]
    NonFiniteValue {
        segment: SegmentId,
        name: &'static str,
        node: usize,
    },

    #[error("segment {segment}: discharge must be nonnegative at node {node}")]
    NegativeDischarge { segment: SegmentId, node: usize },

    #[error("segment {segment}: width must be positive at node {node}")]
    NonPositiveWidth { segment: SegmentId, node: usize },

    /// A headwater segment must carry an explicit upstream condition.
    #[error("segment {segment} is a headwater but carries no upstream boundary condition")]
    MissingUpstreamCondition { segment: SegmentId },

    /// An upstream condition on a junction-fed segment is unrecognized input.
    #[error("segment {segment} is fed by tributaries but also has an explicit upstream condition")]
    UnexpectedUpstreamCondition { segment: SegmentId },

    #[error("base level position {base_level_x} lies upstream of the outlet's last node at {outlet_x}")]
    BaseLevelUpstreamOfOutlet { base_level_x: f64, outlet_x: f64 },

    /// A scalar control or closure parameter outside its valid range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("expected {expected} per-segment inputs, got {actual}")]
    SegmentCountMismatch { expected: usize, actual: usize },
}

/// Inconsistent or non-DAG network structure.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Upstream and downstream adjacency lists have different lengths.
    #[error("adjacency lists disagree on segment count: {upstream} upstream vs {downstream} downstream")]
    AdjacencyLengthMismatch { upstream: usize, downstream: usize },

    #[error("segment id {id} is out of range for a network of {len} segments")]
    IdOutOfRange { id: usize, len: usize },

    /// B lists A as downstream but A does not list B as upstream.
    #[error("segment {segment} lists {downstream} as downstream, but {downstream} does not list it as upstream")]
    InconsistentAdjacency {
        segment: SegmentId,
        downstream: SegmentId,
    },

    /// A lists B as upstream but B drains elsewhere (or nowhere).
    #[error("segment {segment} lists {upstream} as upstream, but {upstream} does not drain into it")]
    InconsistentUpstream {
        segment: SegmentId,
        upstream: SegmentId,
    },

    #[error("segment {upstream} appears more than once in the upstream list of {segment}")]
    DuplicateUpstream {
        segment: SegmentId,
        upstream: SegmentId,
    },

    #[error("network has no outlet: every segment has a downstream neighbor")]
    NoOutlet,

    #[error("network has multiple outlets: {outlets:?}")]
    MultipleOutlets { outlets: Vec<SegmentId> },

    /// Topological ordering failed to consume every segment.
    #[error("cycle detected in network: only {ordered} of {total} segments could be ordered")]
    Cycle { ordered: usize, total: usize },
}

/// Solver failure during a timestep. The step is not applied.
#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("step {step}: failed to assemble global system: {reason}")]
    Assembly { step: usize, reason: String },

    #[error("step {step}: assembled system is singular or ill-conditioned")]
    SingularSystem { step: usize },

    #[error("step {step}: non-finite elevation in solution at segment {segment}, node {node}")]
    NonFiniteSolution {
        step: usize,
        segment: SegmentId,
        node: usize,
    },
}

/// Umbrella error returned by network initialization and stepping.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Numerical(#[from] NumericalError),
}
