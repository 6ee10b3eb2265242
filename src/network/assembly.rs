//! Global system assembly.
//!
//! Each node of every segment owns exactly one row of the global linear
//! system. Segments and junctions produce [`Row`]s against global column
//! indices; this module maps (segment, node) pairs to global indices,
//! checks the row set is complete, and builds the sparse matrix and
//! right-hand side for the direct solve.

use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;

use crate::error::NumericalError;
use crate::types::SegmentId;

/// One equation of the global system: coefficients against global column
/// indices plus a right-hand-side value.
#[derive(Clone, Debug)]
pub(crate) struct Row {
    /// Global row index (the equation's home node).
    pub row: usize,
    /// (global column, coefficient) pairs.
    pub entries: Vec<(usize, f64)>,
    pub rhs: f64,
}

/// Mapping from (segment, node) to global unknown index.
#[derive(Clone, Debug)]
pub(crate) struct NodeMap {
    offsets: Vec<usize>,
    total: usize,
}

impl NodeMap {
    /// Build the map from per-segment node counts, in segment-id order.
    pub fn new(node_counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(node_counts.len());
        let mut total = 0;
        for &n in node_counts {
            offsets.push(total);
            total += n;
        }
        Self { offsets, total }
    }

    /// Global index of `node` within `segment`.
    #[inline]
    pub fn global(&self, segment: SegmentId, node: usize) -> usize {
        self.offsets[segment.get()] + node
    }

    /// Total number of unknowns.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Invert a global index back to (segment, node), for error context.
    pub fn locate(&self, global: usize) -> (SegmentId, usize) {
        // offsets is sorted; find the last offset <= global.
        let seg = match self.offsets.binary_search(&global) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (SegmentId::new(seg), global - self.offsets[seg])
    }
}

/// Build the sparse matrix and right-hand side from the collected rows.
///
/// Every unknown must be covered by exactly one row; a gap or duplicate is
/// an assembly failure (it would make the step's system meaningless).
pub(crate) fn build_system(
    rows: &[Row],
    map: &NodeMap,
    step: usize,
) -> Result<(SparseColMat<usize, f64>, Mat<f64>), NumericalError> {
    let n = map.total();
    if rows.len() != n {
        return Err(NumericalError::Assembly {
            step,
            reason: format!("{} rows assembled for {} unknowns", rows.len(), n),
        });
    }

    let mut covered = vec![false; n];
    let mut triplets = Vec::with_capacity(rows.iter().map(|r| r.entries.len()).sum());
    let mut rhs = Mat::zeros(n, 1);

    for row in rows {
        if covered[row.row] {
            return Err(NumericalError::Assembly {
                step,
                reason: format!("duplicate equation for unknown {}", row.row),
            });
        }
        covered[row.row] = true;
        rhs[(row.row, 0)] = row.rhs;
        for &(col, value) in &row.entries {
            triplets.push(Triplet::new(row.row, col, value));
        }
    }

    let matrix = SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| {
        NumericalError::Assembly {
            step,
            reason: format!("sparse matrix construction failed: {:?}", e),
        }
    })?;

    Ok((matrix, rhs))
}
