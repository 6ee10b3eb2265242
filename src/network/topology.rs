//! Network topology: segment adjacency and its validation.
//!
//! Segments form a directed acyclic graph draining to a single outlet.
//! Adjacency is declared redundantly (each segment lists both its upstream
//! feeders and its downstream receiver) and the two directions are checked
//! against each other at construction, so a malformed driver input fails
//! before any segment is built.

use std::collections::VecDeque;

use crate::error::TopologyError;
use crate::types::SegmentId;

/// Immutable adjacency of a segment network.
#[derive(Clone, Debug)]
pub struct Topology {
    upstream: Vec<Vec<SegmentId>>,
    downstream: Vec<Option<SegmentId>>,
    /// Headwaters-first topological order.
    order: Vec<SegmentId>,
    outlet: SegmentId,
}

impl Topology {
    /// Validate adjacency lists and build the topology.
    ///
    /// `upstream[i]` are the segments draining into segment `i`;
    /// `downstream[i]` is the segment it drains into (`None` only at the
    /// outlet). Fails with [`TopologyError`] on inconsistent adjacency,
    /// out-of-range ids, zero or multiple outlets, or a cycle.
    pub fn new(
        upstream: Vec<Vec<usize>>,
        downstream: Vec<Option<usize>>,
    ) -> Result<Self, TopologyError> {
        if upstream.len() != downstream.len() {
            return Err(TopologyError::AdjacencyLengthMismatch {
                upstream: upstream.len(),
                downstream: downstream.len(),
            });
        }
        let n = upstream.len();

        let check = |id: usize| -> Result<SegmentId, TopologyError> {
            if id < n {
                Ok(SegmentId::new(id))
            } else {
                Err(TopologyError::IdOutOfRange { id, len: n })
            }
        };

        let mut up: Vec<Vec<SegmentId>> = Vec::with_capacity(n);
        for (i, list) in upstream.iter().enumerate() {
            let seg = SegmentId::new(i);
            let mut ids = Vec::with_capacity(list.len());
            for &u in list {
                let u = check(u)?;
                if ids.contains(&u) {
                    return Err(TopologyError::DuplicateUpstream {
                        segment: seg,
                        upstream: u,
                    });
                }
                ids.push(u);
            }
            up.push(ids);
        }
        let mut down: Vec<Option<SegmentId>> = Vec::with_capacity(n);
        for d in &downstream {
            down.push(match d {
                Some(id) => Some(check(*id)?),
                None => None,
            });
        }

        // Mutual consistency of the two declared directions.
        for i in 0..n {
            let seg = SegmentId::new(i);
            if let Some(d) = down[i] {
                if !up[d.get()].contains(&seg) {
                    return Err(TopologyError::InconsistentAdjacency {
                        segment: seg,
                        downstream: d,
                    });
                }
            }
            for &u in &up[i] {
                if down[u.get()] != Some(seg) {
                    return Err(TopologyError::InconsistentUpstream {
                        segment: seg,
                        upstream: u,
                    });
                }
            }
        }

        let outlets: Vec<SegmentId> = (0..n)
            .filter(|&i| down[i].is_none())
            .map(SegmentId::new)
            .collect();
        let outlet = match outlets.as_slice() {
            [] => return Err(TopologyError::NoOutlet),
            [single] => *single,
            _ => return Err(TopologyError::MultipleOutlets { outlets }),
        };

        // Kahn's algorithm over downstream edges, headwaters first.
        let mut in_degree: Vec<usize> = up.iter().map(Vec::len).collect();
        let mut queue: VecDeque<SegmentId> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(SegmentId::new)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(seg) = queue.pop_front() {
            order.push(seg);
            if let Some(d) = down[seg.get()] {
                in_degree[d.get()] -= 1;
                if in_degree[d.get()] == 0 {
                    queue.push_back(d);
                }
            }
        }
        if order.len() != n {
            return Err(TopologyError::Cycle {
                ordered: order.len(),
                total: n,
            });
        }

        Ok(Self {
            upstream: up,
            downstream: down,
            order,
            outlet,
        })
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// Segments draining into `segment`.
    pub fn upstream_of(&self, segment: SegmentId) -> &[SegmentId] {
        &self.upstream[segment.get()]
    }

    /// The segment `segment` drains into, `None` at the outlet.
    pub fn downstream_of(&self, segment: SegmentId) -> Option<SegmentId> {
        self.downstream[segment.get()]
    }

    /// The network's unique sink.
    pub fn outlet(&self) -> SegmentId {
        self.outlet
    }

    /// Headwaters-first topological order.
    pub fn order(&self) -> &[SegmentId] {
        &self.order
    }

    /// Segments with no upstream feeders.
    pub fn headwaters(&self) -> impl Iterator<Item = SegmentId> + '_ {
        (0..self.len())
            .map(SegmentId::new)
            .filter(|&s| self.upstream[s.get()].is_empty())
    }

    /// All (upstream, downstream) segment ids of the network's junctions,
    /// grouped per receiving segment.
    pub fn junctions(&self) -> impl Iterator<Item = (SegmentId, &[SegmentId])> + '_ {
        (0..self.len())
            .map(SegmentId::new)
            .filter(|&s| !self.upstream[s.get()].is_empty())
            .map(|s| (s, self.upstream_of(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two headwaters joining into one trunk.
    fn y_network() -> Topology {
        Topology::new(vec![vec![], vec![], vec![0, 1]], vec![Some(2), Some(2), None]).unwrap()
    }

    #[test]
    fn test_y_network() {
        let topo = y_network();
        assert_eq!(topo.len(), 3);
        assert_eq!(topo.outlet(), SegmentId::new(2));
        assert_eq!(topo.upstream_of(SegmentId::new(2)).len(), 2);
        assert_eq!(topo.downstream_of(SegmentId::new(0)), Some(SegmentId::new(2)));
        assert_eq!(topo.headwaters().count(), 2);
        // Outlet must come last in topological order.
        assert_eq!(*topo.order().last().unwrap(), SegmentId::new(2));
    }

    #[test]
    fn test_inconsistent_adjacency() {
        // 0 claims to drain into 1, but 1 does not list 0 as upstream.
        let err = Topology::new(vec![vec![], vec![]], vec![Some(1), None]).unwrap_err();
        assert!(matches!(err, TopologyError::InconsistentAdjacency { .. }));
    }

    #[test]
    fn test_inconsistent_upstream() {
        // 1 lists 0 as upstream, but 0 drains nowhere.
        let err = Topology::new(vec![vec![], vec![0]], vec![None, None]).unwrap_err();
        assert!(matches!(err, TopologyError::InconsistentUpstream { .. }));
    }

    #[test]
    fn test_no_outlet_or_cycle() {
        // 0 -> 1 -> 0 is both outlet-free and cyclic; the sink check fires
        // first.
        let err = Topology::new(vec![vec![1], vec![0]], vec![Some(1), Some(0)]).unwrap_err();
        assert!(matches!(err, TopologyError::NoOutlet));
    }

    #[test]
    fn test_multiple_outlets() {
        let err = Topology::new(vec![vec![], vec![]], vec![None, None]).unwrap_err();
        assert!(matches!(err, TopologyError::MultipleOutlets { .. }));
    }

    #[test]
    fn test_id_out_of_range() {
        let err = Topology::new(vec![vec![], vec![5]], vec![Some(1), None]).unwrap_err();
        assert!(matches!(err, TopologyError::IdOutOfRange { id: 5, .. }));
    }

    #[test]
    fn test_five_segment_order() {
        // Two confluences: (0, 1) -> 2, then (2, 3) -> 4.
        let topo = Topology::new(
            vec![vec![], vec![], vec![0, 1], vec![], vec![2, 3]],
            vec![Some(2), Some(2), Some(4), Some(4), None],
        )
        .unwrap();
        let pos: Vec<usize> = (0..5)
            .map(|i| {
                topo.order()
                    .iter()
                    .position(|&s| s == SegmentId::new(i))
                    .unwrap()
            })
            .collect();
        assert!(pos[0] < pos[2] && pos[1] < pos[2]);
        assert!(pos[2] < pos[4] && pos[3] < pos[4]);
        assert_eq!(topo.junctions().count(), 2);
    }
}
