//! Network of coupled segments and the per-step assemble-and-solve engine.
//!
//! The [`Network`] owns an arena of [`Segment`]s plus the [`Topology`]
//! connecting them. Each timestep freezes the prior state, gathers every
//! segment's implicit stencil rows, inserts junction coupling rows at every
//! confluence, solves the single global sparse system, and only then
//! commits the new elevations — a failed solve leaves the network at its
//! last valid state.
//!
//! Assembly across segments reads only the frozen snapshot, so with the
//! `parallel` feature the per-segment row construction fans out across a
//! rayon pool; the solve and the commit remain the single synchronization
//! point.

pub(crate) mod assembly;
pub(crate) mod junction;
pub mod topology;

use log::{debug, trace};

use crate::closure::{TransportClosure, WidthRule};
use crate::error::{ConfigurationError, NetworkError, NumericalError};
use crate::segment::{
    DiscretizeContext, DownstreamBoundary, Segment, SegmentInput, UpstreamBoundary,
};
use crate::solve::solve_sparse;
use crate::types::SegmentId;

use assembly::{build_system, NodeMap, Row};
use junction::assemble_junction_rows;
pub use topology::Topology;

/// Upstream boundary data for a headwater segment, as supplied by the
/// driver. A sediment supply is normalized at initialization to the slope
/// whose transport capacity matches it.
#[derive(Clone, Copy, Debug)]
pub enum UpstreamCondition {
    /// Fixed upstream grade.
    Slope(f64),
    /// Sediment input rate; converted through the closure's equilibrium
    /// slope at the headwater node.
    SedimentSupply(f64),
}

/// The network's downstream datum: position and elevation of base level at
/// the outlet.
#[derive(Clone, Copy, Debug)]
pub struct BaseLevel {
    pub x: f64,
    pub z: f64,
}

impl BaseLevel {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// Physical parameters shared by every segment.
#[derive(Clone, Copy, Debug)]
pub struct ModelParameters {
    /// Bed sediment porosity, in `[0, 1)`.
    pub porosity: f64,
    /// Channel-width behavior between steps.
    pub width_rule: WidthRule,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            porosity: 0.35,
            width_rule: WidthRule::Prescribed,
        }
    }
}

impl ModelParameters {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.porosity.is_finite() && (0.0..1.0).contains(&self.porosity)) {
            return Err(ConfigurationError::InvalidParameter {
                name: "porosity",
                value: self.porosity,
                reason: "must lie in [0, 1)",
            });
        }
        self.width_rule.validate()
    }
}

/// A branching channel network evolving under sediment continuity.
#[derive(Clone, Debug)]
pub struct Network<C: TransportClosure> {
    topology: Topology,
    segments: Vec<Segment>,
    closure: C,
    parameters: ModelParameters,
    base_level: BaseLevel,
    time: f64,
    step: usize,
}

impl<C: TransportClosure> Network<C> {
    /// Validate all initialization data and construct the network.
    ///
    /// `upstream_conditions` must hold `Some` exactly for headwater
    /// segments. The outlet segment's last node is pinned to
    /// `base_level.z`; `base_level.x` must lie at or downstream of that
    /// node.
    pub fn initialize(
        topology: Topology,
        inputs: Vec<SegmentInput>,
        upstream_conditions: Vec<Option<UpstreamCondition>>,
        base_level: BaseLevel,
        parameters: ModelParameters,
        closure: C,
    ) -> Result<Self, NetworkError> {
        if inputs.len() != topology.len() {
            return Err(ConfigurationError::SegmentCountMismatch {
                expected: topology.len(),
                actual: inputs.len(),
            }
            .into());
        }
        if upstream_conditions.len() != topology.len() {
            return Err(ConfigurationError::SegmentCountMismatch {
                expected: topology.len(),
                actual: upstream_conditions.len(),
            }
            .into());
        }
        parameters.validate()?;
        for (name, value) in [("base_level_x", base_level.x), ("base_level_z", base_level.z)] {
            if !value.is_finite() {
                return Err(ConfigurationError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite",
                }
                .into());
            }
        }

        let mut segments = Vec::with_capacity(topology.len());
        for (i, (input, condition)) in inputs.into_iter().zip(upstream_conditions).enumerate() {
            let id = SegmentId::new(i);
            let is_headwater = topology.upstream_of(id).is_empty();
            if input.x.len() < 2 {
                return Err(ConfigurationError::TooFewNodes {
                    segment: id,
                    nodes: input.x.len(),
                }
                .into());
            }

            let upstream = match (is_headwater, condition) {
                (true, None) => {
                    return Err(ConfigurationError::MissingUpstreamCondition { segment: id }.into())
                }
                (false, Some(_)) => {
                    return Err(
                        ConfigurationError::UnexpectedUpstreamCondition { segment: id }.into()
                    )
                }
                (false, None) => UpstreamBoundary::Junction,
                (true, Some(condition)) => {
                    let slope = normalize_upstream(&input, condition, &closure)?;
                    UpstreamBoundary::FixedSlope(slope)
                }
            };

            let downstream = if topology.downstream_of(id).is_none() {
                DownstreamBoundary::BaseLevel(base_level.z)
            } else {
                DownstreamBoundary::Junction
            };

            segments.push(Segment::new(id, input, upstream, downstream)?);
        }

        let outlet = &segments[topology.outlet().get()];
        let outlet_x = *outlet.x().last().expect("segments have at least two nodes");
        if base_level.x < outlet_x {
            return Err(ConfigurationError::BaseLevelUpstreamOfOutlet {
                base_level_x: base_level.x,
                outlet_x,
            }
            .into());
        }

        let mut network = Self {
            topology,
            segments,
            closure,
            parameters,
            base_level,
            time: 0.0,
            step: 0,
        };
        for segment in &mut network.segments {
            segment.update_derived(&network.closure, &network.parameters.width_rule);
        }
        Ok(network)
    }

    /// Advance the whole network by one implicit step: one linear solve
    /// with coefficients frozen at the prior state.
    pub fn advance_one_step(&mut self, dt: f64) -> Result<(), NetworkError> {
        self.advance_linearized(dt, 1)
    }

    /// Advance one step with `iterations` Picard re-linearizations: each
    /// inner pass rebuilds the coefficients from the latest iterate and
    /// re-solves. `iterations == 1` is the reference single-solve scheme.
    pub fn advance_one_step_iterated(
        &mut self,
        dt: f64,
        iterations: usize,
    ) -> Result<(), NetworkError> {
        if iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "picard_iterations",
                value: 0.0,
                reason: "must be at least one",
            }
            .into());
        }
        self.advance_linearized(dt, iterations)
    }

    /// Advance `n_steps` fixed-size steps.
    pub fn run(&mut self, n_steps: usize, dt: f64) -> Result<(), NetworkError> {
        for _ in 0..n_steps {
            self.advance_one_step(dt)?;
        }
        Ok(())
    }

    fn advance_linearized(&mut self, dt: f64, iterations: usize) -> Result<(), NetworkError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "dt",
                value: dt,
                reason: "must be finite and positive",
            }
            .into());
        }

        let counts: Vec<usize> = self.segments.iter().map(Segment::n_nodes).collect();
        let map = NodeMap::new(&counts);
        let step = self.step;

        // Linearization state: committed elevations, then the latest
        // iterate when Picard passes re-freeze the coefficients.
        let mut z_lin: Vec<Vec<f64>> = self.segments.iter().map(|s| s.z().to_vec()).collect();

        for _ in 0..iterations {
            let ctx = DiscretizeContext {
                dt,
                porosity: self.parameters.porosity,
                map: &map,
            };
            let mut rows = self.segment_rows(&z_lin, &ctx);
            rows.extend(assemble_junction_rows(
                &self.topology,
                &self.segments,
                &z_lin,
                &ctx,
                &self.closure,
            ));

            trace!(
                "assembled {} rows for {} unknowns at step {}",
                rows.len(),
                map.total(),
                step
            );
            let (matrix, rhs) = build_system(&rows, &map, step)?;
            let solution = solve_sparse(&matrix, &rhs, step)?;
            if let Some(bad) = solution.iter().position(|v| !v.is_finite()) {
                let (segment, node) = map.locate(bad);
                return Err(NumericalError::NonFiniteSolution {
                    step,
                    segment,
                    node,
                }
                .into());
            }

            for (i, z) in z_lin.iter_mut().enumerate() {
                let offset = map.global(SegmentId::new(i), 0);
                let len = z.len();
                z.copy_from_slice(&solution[offset..offset + len]);
            }
        }

        // Pivoted elimination can leave round-off on the pinned outlet
        // node; re-impose the datum before committing.
        let outlet = self.topology.outlet().get();
        if let Some(last) = z_lin[outlet].last_mut() {
            *last = self.base_level.z;
        }

        // Commit: nothing above mutated the segments, so any early return
        // left the network at its previous state.
        let mut max_dz = 0.0f64;
        for (i, segment) in self.segments.iter_mut().enumerate() {
            for (new, old) in z_lin[i].iter().zip(segment.z()) {
                max_dz = max_dz.max((new - old).abs());
            }
            segment.apply_elevations(&z_lin[i]);
            segment.update_derived(&self.closure, &self.parameters.width_rule);
        }
        self.step += 1;
        self.time += dt;
        debug!(
            "step {} advanced: dt = {:.3e}, max |dz| = {:.3e}",
            self.step, dt, max_dz
        );
        Ok(())
    }

    #[cfg(not(feature = "parallel"))]
    fn segment_rows(&self, z_lin: &[Vec<f64>], ctx: &DiscretizeContext<'_>) -> Vec<Row> {
        self.segments
            .iter()
            .zip(z_lin)
            .flat_map(|(segment, z)| segment.discretize(z, ctx, &self.closure))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn segment_rows(&self, z_lin: &[Vec<f64>], ctx: &DiscretizeContext<'_>) -> Vec<Row> {
        use rayon::prelude::*;
        self.segments
            .par_iter()
            .zip(z_lin.par_iter())
            .map(|(segment, z)| segment.discretize(z, ctx, &self.closure))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// All segments, indexable by [`SegmentId`].
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.get()]
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn base_level(&self) -> BaseLevel {
        self.base_level
    }

    pub fn closure(&self) -> &C {
        &self.closure
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    /// Simulation time accumulated over accepted steps.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of accepted steps.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Total node count across all segments.
    pub fn total_nodes(&self) -> usize {
        self.segments.iter().map(Segment::n_nodes).sum()
    }
}

fn normalize_upstream<C: TransportClosure>(
    input: &SegmentInput,
    condition: UpstreamCondition,
    closure: &C,
) -> Result<f64, NetworkError> {
    match condition {
        UpstreamCondition::Slope(slope) => {
            if !(slope.is_finite() && slope >= 0.0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "upstream_slope",
                    value: slope,
                    reason: "must be finite and nonnegative",
                }
                .into());
            }
            Ok(slope)
        }
        UpstreamCondition::SedimentSupply(supply) => {
            if !(supply.is_finite() && supply >= 0.0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "sediment_supply",
                    value: supply,
                    reason: "must be finite and nonnegative",
                }
                .into());
            }
            // Array lengths are validated by Segment::new after boundary
            // normalization, so index defensively here.
            let q0 = input.discharge.first().copied().unwrap_or(0.0);
            let b0 = input.width.first().copied().unwrap_or(0.0);
            if supply > 0.0 && q0 <= 0.0 {
                return Err(ConfigurationError::InvalidParameter {
                    name: "sediment_supply",
                    value: supply,
                    reason: "requires positive discharge at the headwater node",
                }
                .into());
            }
            Ok(closure.equilibrium_slope(q0, b0, supply))
        }
    }
}
