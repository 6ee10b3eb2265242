//! Post-step diagnostics over a network's state.
//!
//! These checks mirror the physical guarantees of the scheme — junction
//! elevation continuity, sediment-flux balance, steady-state behavior —
//! and give external callers the joined long-profile geometry without
//! reaching into segment internals. None of them mutate the network.

use crate::closure::TransportClosure;
use crate::network::Network;
use crate::types::SegmentId;

/// Largest junction elevation mismatch in the network: the downstream-most
/// elevation of any upstream segment minus its receiver's upstream-most
/// elevation. Should sit at solver tolerance after every successful step.
pub fn elevation_continuity_error<C: TransportClosure>(network: &Network<C>) -> f64 {
    let mut worst = 0.0f64;
    for (down, upstream) in network.topology().junctions() {
        let z_junction = network.segment(down).z()[0];
        for &up in upstream {
            let z_up = *network.segment(up).z().last().expect("nonempty segment");
            worst = worst.max((z_up - z_junction).abs());
        }
    }
    worst
}

/// Sediment-flux budget of one junction, evaluated at the current state.
#[derive(Clone, Debug)]
pub struct JunctionFluxBalance {
    /// The receiving segment; its first node is the junction node.
    pub downstream: SegmentId,
    /// Flux delivered by each upstream segment through its final cell.
    pub inflows: Vec<(SegmentId, f64)>,
    /// Flux leaving through the downstream segment's first cell.
    pub outflow: f64,
}

impl JunctionFluxBalance {
    /// The junction node's inherited flux: the sum of all upstream
    /// deliveries.
    pub fn total_inflow(&self) -> f64 {
        self.inflows.iter().map(|&(_, q)| q).sum()
    }

    /// Inflow minus outflow; at equilibrium this vanishes, in transients
    /// it equals the junction node's storage rate times its control
    /// volume.
    pub fn imbalance(&self) -> f64 {
        self.total_inflow() - self.outflow
    }
}

/// Per-junction flux budgets across the network.
pub fn junction_flux_summary<C: TransportClosure>(
    network: &Network<C>,
) -> Vec<JunctionFluxBalance> {
    network
        .topology()
        .junctions()
        .map(|(down, upstream)| {
            let inflows = upstream
                .iter()
                .map(|&up| {
                    let segment = network.segment(up);
                    let last_face = segment.n_nodes() - 2;
                    (up, segment.sediment_flux()[last_face])
                })
                .collect();
            let outflow = network.segment(down).sediment_flux()[0];
            JunctionFluxBalance {
                downstream: down,
                inflows,
                outflow,
            }
        })
        .collect()
}

/// Largest elevation change a step of size `dt` would produce, estimated
/// from the current flux divergence at every evolving node (interior and
/// junction nodes; constraint-held boundary nodes do not evolve).
///
/// Zero, up to round-off, exactly when the network is at transport
/// equilibrium.
pub fn steady_state_residual<C: TransportClosure>(network: &Network<C>, dt: f64) -> f64 {
    let porosity = network.parameters().porosity;
    let mut worst = 0.0f64;

    for segment in network.segments() {
        let n = segment.n_nodes();
        let x = segment.x();
        let qs = segment.sediment_flux();
        for i in 1..n - 1 {
            let volume = 0.5 * (x[i + 1] - x[i - 1]);
            let alpha = segment.exner_alpha(i, volume, dt, porosity);
            worst = worst.max((alpha * (qs[i - 1] - qs[i])).abs());
        }
    }

    for balance in junction_flux_summary(network) {
        let down = network.segment(balance.downstream);
        let mut volume = 0.5 * down.dx()[0];
        for &(up, _) in &balance.inflows {
            let segment = network.segment(up);
            volume += 0.5 * segment.dx()[segment.n_nodes() - 2];
        }
        let alpha = down.exner_alpha(0, volume, dt, porosity);
        worst = worst.max((alpha * balance.imbalance()).abs());
    }

    worst
}

/// Drawable long-profile polylines, one per segment in id order.
///
/// Each non-outlet polyline is extended with the first node of its
/// receiving segment, and the outlet's with the base-level point, so a
/// caller can render a continuous profile across every junction.
pub fn profile_polylines<C: TransportClosure>(network: &Network<C>) -> Vec<Vec<(f64, f64)>> {
    network
        .segments()
        .iter()
        .map(|segment| {
            let mut line: Vec<(f64, f64)> = segment
                .x()
                .iter()
                .zip(segment.z())
                .map(|(&x, &z)| (x, z))
                .collect();
            match network.topology().downstream_of(segment.id()) {
                Some(down) => {
                    let receiver = network.segment(down);
                    line.push((receiver.x()[0], receiver.z()[0]));
                }
                None => {
                    let bl = network.base_level();
                    line.push((bl.x, bl.z));
                }
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ThresholdWidth;
    use crate::network::{BaseLevel, ModelParameters, Topology, UpstreamCondition};
    use crate::segment::SegmentInput;

    /// Equilibrium Y network: uniform slope, trunk discharge equal to the
    /// sum of its tributaries.
    fn equilibrium_y() -> Network<ThresholdWidth> {
        let s = 0.01;
        let seg = |x: Vec<f64>, q: f64| SegmentInput {
            z: x.iter().map(|&xi| s * (5000.0 - xi)).collect(),
            discharge: vec![q; x.len()],
            width: vec![100.0; x.len()],
            x,
        };
        Network::initialize(
            Topology::new(vec![vec![], vec![], vec![0, 1]], vec![Some(2), Some(2), None]).unwrap(),
            vec![
                seg(vec![0.0, 1000.0, 2000.0], 10.0),
                seg(vec![200.0, 1100.0, 2000.0], 10.0),
                seg(vec![2000.0, 3000.0, 4000.0, 5000.0], 20.0),
            ],
            vec![
                Some(UpstreamCondition::Slope(s)),
                Some(UpstreamCondition::Slope(s)),
                None,
            ],
            BaseLevel::new(5000.0, 0.0),
            ModelParameters::default(),
            ThresholdWidth::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_continuity_zero_on_continuous_profile() {
        let network = equilibrium_y();
        assert!(elevation_continuity_error(&network) < 1e-12);
    }

    #[test]
    fn test_equilibrium_fluxes_balance() {
        let network = equilibrium_y();
        let summary = junction_flux_summary(&network);
        assert_eq!(summary.len(), 1);
        let balance = &summary[0];
        assert_eq!(balance.inflows.len(), 2);
        assert!(
            balance.imbalance().abs() < 1e-12 * balance.outflow.abs(),
            "imbalance {}",
            balance.imbalance()
        );
        assert!(steady_state_residual(&network, 3.15e8) < 1e-9);
    }

    #[test]
    fn test_profile_polylines_join_segments() {
        let network = equilibrium_y();
        let lines = profile_polylines(&network);
        assert_eq!(lines.len(), 3);
        // Tributary polylines end at the trunk's first node.
        let trunk_head = (2000.0, network.segment(SegmentId::new(2)).z()[0]);
        assert_eq!(*lines[0].last().unwrap(), trunk_head);
        assert_eq!(*lines[1].last().unwrap(), trunk_head);
        // Outlet polyline ends at base level.
        assert_eq!(*lines[2].last().unwrap(), (5000.0, 0.0));
    }
}
