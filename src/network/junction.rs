//! Junction coupling: the rows that stitch segments together.
//!
//! At every confluence two physical constraints become equations of the
//! global system:
//!
//! 1. **Elevation continuity** — the last node of each upstream segment
//!    and the first node of the downstream segment share one elevation.
//!    One equality row per upstream segment.
//! 2. **Sediment-flux conservation** — the downstream segment's first node
//!    carries an Exner balance over the junction control volume (half of
//!    its first cell plus half of every upstream last cell). Incoming flux
//!    is the sum of the linearized fluxes from all upstream segments;
//!    outgoing flux feeds the downstream first cell. The storage term
//!    keeps the row nonsingular even when the frozen state has zero slope
//!    everywhere (flat initial beds).
//!
//! Headwater and outlet ends never appear here; segments own those rows.

use crate::closure::TransportClosure;
use crate::network::assembly::Row;
use crate::network::topology::Topology;
use crate::segment::{DiscretizeContext, Segment};

/// Rows for every junction of the network.
///
/// `z_lin` holds the per-segment elevations the conductances are frozen
/// at (the committed state, or the latest Picard iterate); right-hand
/// sides always use the committed elevations stored in the segments.
pub(crate) fn assemble_junction_rows<C: TransportClosure>(
    topology: &Topology,
    segments: &[Segment],
    z_lin: &[Vec<f64>],
    ctx: &DiscretizeContext<'_>,
    closure: &C,
) -> Vec<Row> {
    let mut rows = Vec::new();

    for (down_id, upstream) in topology.junctions() {
        let down = &segments[down_id.get()];
        let g_j = ctx.map.global(down_id, 0);

        // Continuity: each upstream segment's last node equals the
        // junction node.
        for &up_id in upstream {
            let up = &segments[up_id.get()];
            let last = up.n_nodes() - 1;
            let g_last = ctx.map.global(up_id, last);
            rows.push(Row {
                row: g_last,
                entries: vec![(g_last, 1.0), (g_j, -1.0)],
                rhs: 0.0,
            });
        }

        // Exner balance at the junction node.
        let dx_dn = down.dx()[0];
        let k_dn = down.face_conductance(0, &z_lin[down_id.get()], closure);

        let mut volume = 0.5 * dx_dn;
        for &up_id in upstream {
            let up = &segments[up_id.get()];
            volume += 0.5 * up.dx()[up.n_nodes() - 2];
        }
        let alpha = down.exner_alpha(0, volume, ctx.dt, ctx.porosity);

        let mut diag = 1.0 + alpha * k_dn / dx_dn;
        let mut entries = vec![(ctx.map.global(down_id, 1), -alpha * k_dn / dx_dn)];
        for &up_id in upstream {
            let up = &segments[up_id.get()];
            let last_face = up.n_nodes() - 2;
            let k_up = up.face_conductance(last_face, &z_lin[up_id.get()], closure);
            let frac = alpha * k_up / up.dx()[last_face];
            diag += frac;
            entries.push((ctx.map.global(up_id, last_face), -frac));
        }
        entries.push((g_j, diag));
        rows.push(Row {
            row: g_j,
            entries,
            rhs: down.z()[0],
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ThresholdWidth;
    use crate::network::assembly::NodeMap;
    use crate::segment::{DownstreamBoundary, SegmentInput, UpstreamBoundary};
    use crate::types::SegmentId;

    fn make_segment(
        id: usize,
        x: Vec<f64>,
        z: Vec<f64>,
        q: f64,
        up: UpstreamBoundary,
        down: DownstreamBoundary,
    ) -> Segment {
        let n = x.len();
        Segment::new(
            SegmentId::new(id),
            SegmentInput {
                x,
                z,
                discharge: vec![q; n],
                width: vec![100.0; n],
            },
            up,
            down,
        )
        .unwrap()
    }

    /// Two 3-node headwaters joining a 3-node trunk.
    fn y_setup() -> (Topology, Vec<Segment>) {
        let topology =
            Topology::new(vec![vec![], vec![], vec![0, 1]], vec![Some(2), Some(2), None]).unwrap();
        let s = 0.01;
        let zs = |xs: &[f64]| xs.iter().map(|&x| s * (6000.0 - x)).collect::<Vec<_>>();
        let x0 = vec![0.0, 1000.0, 2000.0];
        let x1 = vec![500.0, 1200.0, 2000.0];
        let x2 = vec![2000.0, 3000.0, 4000.0];
        let segments = vec![
            make_segment(
                0,
                x0.clone(),
                zs(&x0),
                10.0,
                UpstreamBoundary::FixedSlope(s),
                DownstreamBoundary::Junction,
            ),
            make_segment(
                1,
                x1.clone(),
                zs(&x1),
                10.0,
                UpstreamBoundary::FixedSlope(s),
                DownstreamBoundary::Junction,
            ),
            make_segment(
                2,
                x2.clone(),
                zs(&x2),
                20.0,
                UpstreamBoundary::Junction,
                DownstreamBoundary::BaseLevel(s * 2000.0),
            ),
        ];
        (topology, segments)
    }

    #[test]
    fn test_rows_cover_junction_nodes() {
        let (topology, segments) = y_setup();
        let map = NodeMap::new(&[3, 3, 3]);
        let ctx = DiscretizeContext {
            dt: 3.15e8,
            porosity: 0.35,
            map: &map,
        };
        let z_lin: Vec<Vec<f64>> = segments.iter().map(|s| s.z().to_vec()).collect();
        let rows = assemble_junction_rows(
            &topology,
            &segments,
            &z_lin,
            &ctx,
            &ThresholdWidth::default(),
        );
        // Two continuity rows (last nodes of 0 and 1) + one junction row
        // (first node of 2).
        assert_eq!(rows.len(), 3);
        let mut owned: Vec<usize> = rows.iter().map(|r| r.row).collect();
        owned.sort_unstable();
        assert_eq!(
            owned,
            vec![
                map.global(SegmentId::new(0), 2),
                map.global(SegmentId::new(1), 2),
                map.global(SegmentId::new(2), 0),
            ]
        );
    }

    #[test]
    fn test_equilibrium_junction_is_stationary() {
        // Same slope everywhere with Q_down = sum of upstream discharges:
        // capacity is linear in Q, so the junction balance closes and the
        // junction row must be satisfied by the unchanged elevations.
        let (topology, segments) = y_setup();
        let map = NodeMap::new(&[3, 3, 3]);
        let ctx = DiscretizeContext {
            dt: 3.15e8,
            porosity: 0.35,
            map: &map,
        };
        let z_lin: Vec<Vec<f64>> = segments.iter().map(|s| s.z().to_vec()).collect();
        let rows = assemble_junction_rows(
            &topology,
            &segments,
            &z_lin,
            &ctx,
            &ThresholdWidth::default(),
        );
        let z_flat: Vec<f64> = z_lin.iter().flat_map(|z| z.iter().copied()).collect();
        let junction_row = rows
            .iter()
            .find(|r| r.row == map.global(SegmentId::new(2), 0))
            .unwrap();
        let lhs: f64 = junction_row
            .entries
            .iter()
            .map(|&(col, coeff)| coeff * z_flat[col])
            .sum();
        assert!(
            (lhs - junction_row.rhs).abs() < 1e-9,
            "junction row residual {}",
            lhs - junction_row.rhs
        );
    }

    #[test]
    fn test_flat_bed_junction_row_keeps_diagonal() {
        // Zero slope -> zero conductance everywhere; the storage term must
        // still leave a unit diagonal so the system stays solvable.
        let (topology, mut segments) = y_setup();
        for seg in &mut segments {
            let flat = vec![0.0; seg.n_nodes()];
            seg.apply_elevations(&flat);
        }
        let map = NodeMap::new(&[3, 3, 3]);
        let ctx = DiscretizeContext {
            dt: 3.15e8,
            porosity: 0.35,
            map: &map,
        };
        let z_lin: Vec<Vec<f64>> = segments.iter().map(|s| s.z().to_vec()).collect();
        let rows = assemble_junction_rows(
            &topology,
            &segments,
            &z_lin,
            &ctx,
            &ThresholdWidth::default(),
        );
        let g_j = map.global(SegmentId::new(2), 0);
        let junction_row = rows.iter().find(|r| r.row == g_j).unwrap();
        let diag = junction_row
            .entries
            .iter()
            .find(|&&(col, _)| col == g_j)
            .unwrap()
            .1;
        assert!((diag - 1.0).abs() < 1e-15);
    }
}
