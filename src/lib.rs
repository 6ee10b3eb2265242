//! # gravel-rs
//!
//! Network-coupled implicit evolution of gravel-bed river long profiles.
//!
//! This crate provides the core building blocks for simulating bed
//! elevation through time across a branching channel network:
//! - Segment (reach) grids with elevation, discharge, and width profiles
//! - DAG topology over segments with a single outlet
//! - Pluggable sediment-transport closures (threshold-width default)
//! - Implicit finite-volume discretization, unconditionally stable in `dt`
//! - Junction coupling (elevation continuity, sediment-flux conservation)
//! - One global sparse direct solve per step, with optional Picard
//!   re-linearization
//! - A time-stepping driver with elevation history recording
//! - Diagnostics for continuity, flux balance, and profile extraction
//!
//! Drivers, plotting, and configuration loading are external: callers
//! construct a [`Topology`] and per-segment [`SegmentInput`]s, initialize
//! a [`Network`], and step it with [`TimeStepper`] or
//! [`Network::advance_one_step`].

pub mod closure;
pub mod diagnostics;
pub mod error;
pub mod network;
pub mod segment;
pub mod stepper;
pub mod types;

mod solve;

// Re-export main types for convenience
pub use closure::{ThresholdWidth, TransportClosure, WidthRule};
pub use error::{ConfigurationError, NetworkError, NumericalError, TopologyError};
pub use network::{BaseLevel, ModelParameters, Network, Topology, UpstreamCondition};
pub use segment::{DownstreamBoundary, Segment, SegmentInput, UpstreamBoundary};
pub use stepper::{ElevationHistory, EvolutionConfig, TimeStepper};
pub use types::SegmentId;

pub use diagnostics::{
    elevation_continuity_error, junction_flux_summary, profile_polylines, steady_state_residual,
    JunctionFluxBalance,
};
