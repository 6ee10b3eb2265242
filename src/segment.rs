//! Single-reach data and discretization.
//!
//! A [`Segment`] owns one reach: its along-channel grid, bed elevation,
//! discharge, and width profiles, plus derived slope and sediment-flux
//! fields. It contributes the implicit finite-volume rows for its own
//! interior nodes and for whichever of its two ends carries an explicit
//! boundary condition. Junction-adjacent ends are left to junction
//! coupling.
//!
//! The bed evolves by sediment continuity (Exner) with a linearized
//! transport closure:
//!
//! `(1 - porosity) · B · ∂z/∂t = ∂/∂x (K ∂z/∂x)`,  `K = conductance(Q, B, S_prev)`
//!
//! Backward-Euler in time with the conductance frozen at the prior state
//! gives one linear equation per interior node, unconditionally stable for
//! any `dt` — which is what makes geomorphic (multi-year) steps possible.

use crate::closure::{TransportClosure, WidthRule};
use crate::error::ConfigurationError;
use crate::network::assembly::{NodeMap, Row};
use crate::types::SegmentId;

/// Condition at a segment's upstream end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpstreamBoundary {
    /// Headwater: the slope between the first two nodes is held at this
    /// value (sediment feed expressed as a grade).
    FixedSlope(f64),
    /// Fed by tributaries; the junction coupling owns the first node's row.
    Junction,
}

/// Condition at a segment's downstream end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DownstreamBoundary {
    /// Outlet: the last node is pinned to this base-level elevation.
    BaseLevel(f64),
    /// Drains into another segment; continuity with that segment's first
    /// node is owned by the junction coupling.
    Junction,
}

/// Per-segment initialization arrays, as supplied by an external driver.
#[derive(Clone, Debug)]
pub struct SegmentInput {
    /// Along-channel positions, strictly increasing.
    pub x: Vec<f64>,
    /// Initial bed elevation, one per position.
    pub z: Vec<f64>,
    /// Water discharge, one per position, nonnegative.
    pub discharge: Vec<f64>,
    /// Channel/valley width, one per position, positive.
    pub width: Vec<f64>,
}

/// One reach of the network.
#[derive(Clone, Debug)]
pub struct Segment {
    id: SegmentId,
    x: Vec<f64>,
    z: Vec<f64>,
    discharge: Vec<f64>,
    width: Vec<f64>,
    /// Static cell lengths, `dx[i] = x[i+1] - x[i]`.
    dx: Vec<f64>,
    upstream: UpstreamBoundary,
    downstream: DownstreamBoundary,
    /// Face slopes `(z[i] - z[i+1]) / dx[i]`, positive downhill.
    slope: Vec<f64>,
    /// Face transport capacity from the closure, signed with slope.
    sediment_flux: Vec<f64>,
}

/// Shared per-step quantities for row assembly.
#[derive(Clone, Copy)]
pub(crate) struct DiscretizeContext<'a> {
    pub dt: f64,
    pub porosity: f64,
    pub map: &'a NodeMap,
}

impl Segment {
    /// Build and validate a segment from its input arrays.
    pub(crate) fn new(
        id: SegmentId,
        input: SegmentInput,
        upstream: UpstreamBoundary,
        downstream: DownstreamBoundary,
    ) -> Result<Self, ConfigurationError> {
        let SegmentInput {
            x,
            z,
            discharge,
            width,
        } = input;

        let n = x.len();
        if n < 2 {
            return Err(ConfigurationError::TooFewNodes {
                segment: id,
                nodes: n,
            });
        }
        for (name, array) in [("elevation", &z), ("discharge", &discharge), ("width", &width)] {
            if array.len() != n {
                return Err(ConfigurationError::LengthMismatch {
                    segment: id,
                    name,
                    expected: n,
                    actual: array.len(),
                });
            }
        }
        for (name, array) in [
            ("position", &x),
            ("elevation", &z),
            ("discharge", &discharge),
            ("width", &width),
        ] {
            if let Some(node) = array.iter().position(|v| !v.is_finite()) {
                return Err(ConfigurationError::NonFiniteValue {
                    segment: id,
                    name,
                    node,
                });
            }
        }
        for i in 1..n {
            if x[i] <= x[i - 1] {
                return Err(ConfigurationError::NonMonotonicPositions { segment: id, node: i });
            }
        }
        if let Some(node) = discharge.iter().position(|&q| q < 0.0) {
            return Err(ConfigurationError::NegativeDischarge { segment: id, node });
        }
        if let Some(node) = width.iter().position(|&b| b <= 0.0) {
            return Err(ConfigurationError::NonPositiveWidth { segment: id, node });
        }

        let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let n_faces = n - 1;
        Ok(Self {
            id,
            x,
            z,
            discharge,
            width,
            dx,
            upstream,
            downstream,
            slope: vec![0.0; n_faces],
            sediment_flux: vec![0.0; n_faces],
        })
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn n_nodes(&self) -> usize {
        self.x.len()
    }

    /// Along-channel positions. Immutable for the segment's lifetime.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Current bed elevation.
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn discharge(&self) -> &[f64] {
        &self.discharge
    }

    pub fn width(&self) -> &[f64] {
        &self.width
    }

    /// Face slopes, positive downhill, `n_nodes() - 1` values.
    pub fn slope(&self) -> &[f64] {
        &self.slope
    }

    /// Face transport capacity from the closure, `n_nodes() - 1` values.
    pub fn sediment_flux(&self) -> &[f64] {
        &self.sediment_flux
    }

    pub fn upstream_boundary(&self) -> UpstreamBoundary {
        self.upstream
    }

    pub fn downstream_boundary(&self) -> DownstreamBoundary {
        self.downstream
    }

    /// Static cell lengths.
    pub(crate) fn dx(&self) -> &[f64] {
        &self.dx
    }

    /// Linearized conductance at face `i` (between nodes `i` and `i+1`),
    /// with the slope taken from `z` rather than the committed state so
    /// Picard iterations can re-linearize.
    pub(crate) fn face_conductance<C: TransportClosure>(
        &self,
        face: usize,
        z: &[f64],
        closure: &C,
    ) -> f64 {
        let q = 0.5 * (self.discharge[face] + self.discharge[face + 1]);
        let b = 0.5 * (self.width[face] + self.width[face + 1]);
        let s = (z[face] - z[face + 1]) / self.dx[face];
        closure.conductance(q, b, s)
    }

    /// Exner scaling factor `dt / ((1 - porosity) · B_i · w_i)` for node
    /// `i`, with `w_i` the control-volume width. Junction rows use it for
    /// the junction node with their own control volume.
    pub(crate) fn exner_alpha(&self, node: usize, volume: f64, dt: f64, porosity: f64) -> f64 {
        dt / ((1.0 - porosity) * self.width[node] * volume)
    }

    /// Rows for this segment's interior nodes plus its explicitly-bounded
    /// ends. Junction-adjacent ends contribute nothing here.
    pub(crate) fn discretize<C: TransportClosure>(
        &self,
        z_lin: &[f64],
        ctx: &DiscretizeContext<'_>,
        closure: &C,
    ) -> Vec<Row> {
        let n = self.x.len();
        let mut rows = Vec::with_capacity(n);

        if let UpstreamBoundary::FixedSlope(s0) = self.upstream {
            let g0 = ctx.map.global(self.id, 0);
            rows.push(Row {
                row: g0,
                entries: vec![(g0, 1.0), (g0 + 1, -1.0)],
                rhs: s0 * self.dx[0],
            });
        }

        for i in 1..n - 1 {
            rows.push(self.interior_row(i, z_lin, ctx, closure));
        }

        if let DownstreamBoundary::BaseLevel(z_bl) = self.downstream {
            let g = ctx.map.global(self.id, n - 1);
            rows.push(Row {
                row: g,
                entries: vec![(g, 1.0)],
                rhs: z_bl,
            });
        }

        rows
    }

    fn interior_row<C: TransportClosure>(
        &self,
        i: usize,
        z_lin: &[f64],
        ctx: &DiscretizeContext<'_>,
        closure: &C,
    ) -> Row {
        let k_up = self.face_conductance(i - 1, z_lin, closure);
        let k_dn = self.face_conductance(i, z_lin, closure);
        let volume = 0.5 * (self.x[i + 1] - self.x[i - 1]);
        let alpha = self.exner_alpha(i, volume, ctx.dt, ctx.porosity);

        let a = alpha * k_up / self.dx[i - 1];
        let c = alpha * k_dn / self.dx[i];
        let g = ctx.map.global(self.id, i);
        Row {
            row: g,
            entries: vec![(g - 1, -a), (g, 1.0 + a + c), (g + 1, -c)],
            rhs: self.z[i],
        }
    }

    /// Overwrite elevations with a solved step's result.
    pub(crate) fn apply_elevations(&mut self, new_z: &[f64]) {
        debug_assert_eq!(new_z.len(), self.z.len());
        self.z.copy_from_slice(new_z);
    }

    /// Recompute slope, width (under a self-forming rule), and sediment
    /// flux from the current elevations.
    pub(crate) fn update_derived<C: TransportClosure>(
        &mut self,
        closure: &C,
        width_rule: &WidthRule,
    ) {
        let n = self.x.len();
        for i in 0..n - 1 {
            self.slope[i] = (self.z[i] - self.z[i + 1]) / self.dx[i];
        }
        if !matches!(width_rule, WidthRule::Prescribed) {
            for i in 0..n {
                let s = self.node_slope(i);
                if let Some(w) = width_rule.width(self.discharge[i], s) {
                    self.width[i] = w;
                }
            }
        }
        for i in 0..n - 1 {
            let q = 0.5 * (self.discharge[i] + self.discharge[i + 1]);
            let b = 0.5 * (self.width[i] + self.width[i + 1]);
            self.sediment_flux[i] = closure.sediment_flux(q, b, self.slope[i]);
        }
    }

    /// Slope attributed to a node: mean of the adjacent face slopes, or
    /// the single face slope at either end.
    fn node_slope(&self, i: usize) -> f64 {
        let n_faces = self.slope.len();
        if i == 0 {
            self.slope[0]
        } else if i >= n_faces {
            self.slope[n_faces - 1]
        } else {
            0.5 * (self.slope[i - 1] + self.slope[i])
        }
    }
}
