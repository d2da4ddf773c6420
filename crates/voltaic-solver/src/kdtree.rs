//! Static nearest-neighbor index over stored parameter points.
//!
//! The caching layer keeps its history as a column-major P×M matrix and
//! rebuilds this index over a prefix of the columns; the tree owns only its
//! node records and an index permutation, never the points. Queries accept a
//! priming candidate, so a caller that already holds an external candidate
//! (the solver's current origin, or a linear scan over not-yet-indexed
//! columns) gets the global minimum back from a single query.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};

/// A nearest-neighbor candidate: squared distance plus the matching column
/// index. `None` identifies the caller's own external candidate.
pub type Candidate = (f64, Option<usize>);

/// Squared Euclidean distance between a stored column and a query point.
pub(crate) fn column_sq_dist(points: &DMatrix<f64>, index: usize, query: &DVector<f64>) -> f64 {
    points
        .column(index)
        .iter()
        .zip(query.iter())
        .map(|(a, b)| {
            let d = a - b;
            d * d
        })
        .sum()
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        point: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// A k-d tree over the first `len` columns of a point matrix.
///
/// The index is static: appends to the backing matrix are not reflected
/// until the owner builds a fresh tree. Splits go through the median on the
/// widest-spread axis, so the tree stays balanced regardless of insertion
/// order.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    root: usize,
    len: usize,
}

impl KdTree {
    /// Build an index over the first `len` columns of `points`.
    pub fn build(points: &DMatrix<f64>, len: usize) -> Self {
        let mut perm: Vec<usize> = (0..len).collect();
        let mut nodes = Vec::with_capacity(2 * len.max(1) - 1);
        let root = if len == 0 {
            0
        } else {
            build_subtree(points, &mut perm, &mut nodes)
        };
        Self { nodes, root, len }
    }

    /// Number of indexed columns.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree indexes no columns.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the better of `best` and the closest indexed column to `query`,
    /// by squared Euclidean distance.
    ///
    /// `points` must be the matrix the tree was built over (columns may have
    /// been appended since; they are ignored). An indexed column only
    /// replaces the incoming candidate on strict improvement, so ties are
    /// deterministic and a primed query can never come back worse than it
    /// went in.
    pub fn nearest(&self, points: &DMatrix<f64>, query: &DVector<f64>, best: Candidate) -> Candidate {
        if self.is_empty() {
            return best;
        }
        self.search(self.root, points, query, best)
    }

    fn search(
        &self,
        node: usize,
        points: &DMatrix<f64>,
        query: &DVector<f64>,
        best: Candidate,
    ) -> Candidate {
        match self.nodes[node] {
            Node::Leaf { point } => {
                let d = column_sq_dist(points, point, query);
                if d < best.0 {
                    (d, Some(point))
                } else {
                    best
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let delta = query[axis] - value;
                let (near, far) = if delta < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                let mut best = self.search(near, points, query, best);
                // The far side can only win if the splitting plane itself is
                // closer than the best match so far.
                if delta * delta < best.0 {
                    best = self.search(far, points, query, best);
                }
                best
            }
        }
    }
}

fn build_subtree(points: &DMatrix<f64>, perm: &mut [usize], nodes: &mut Vec<Node>) -> usize {
    // Zero-dimensional points are all coincident; a lone leaf represents them.
    if perm.len() == 1 || points.nrows() == 0 {
        nodes.push(Node::Leaf { point: perm[0] });
        return nodes.len() - 1;
    }

    let axis = widest_axis(points, perm);
    let mid = perm.len() / 2;
    perm.select_nth_unstable_by(mid, |&a, &b| {
        points[(axis, a)]
            .partial_cmp(&points[(axis, b)])
            .unwrap_or(Ordering::Equal)
    });
    let value = points[(axis, perm[mid])];

    let (lower, upper) = perm.split_at_mut(mid);
    let left = build_subtree(points, lower, nodes);
    let right = build_subtree(points, upper, nodes);
    nodes.push(Node::Split {
        axis,
        value,
        left,
        right,
    });
    nodes.len() - 1
}

/// Axis with the greatest coordinate spread over the given columns.
fn widest_axis(points: &DMatrix<f64>, perm: &[usize]) -> usize {
    let mut best_axis = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for axis in 0..points.nrows() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &column in perm {
            let v = points[(axis, column)];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if hi - lo > best_spread {
            best_spread = hi - lo;
            best_axis = axis;
        }
    }
    best_axis
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(rng: &mut StdRng, dims: usize, count: usize) -> DMatrix<f64> {
        DMatrix::from_fn(dims, count, |_, _| rng.gen_range(-10.0..10.0))
    }

    fn random_query(rng: &mut StdRng, dims: usize) -> DVector<f64> {
        DVector::from_fn(dims, |_, _| rng.gen_range(-12.0..12.0))
    }

    fn brute_force(points: &DMatrix<f64>, len: usize, query: &DVector<f64>) -> f64 {
        (0..len)
            .map(|j| column_sq_dist(points, j, query))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);

        for &dims in &[1, 2, 6] {
            for &count in &[1, 2, 3, 17, 100, 1000] {
                let points = random_points(&mut rng, dims, count);
                let tree = KdTree::build(&points, count);

                for _ in 0..50 {
                    let query = random_query(&mut rng, dims);
                    let (dist, index) = tree.nearest(&points, &query, (f64::INFINITY, None));
                    let expected = brute_force(&points, count, &query);

                    assert_eq!(dist, expected, "dims={} count={}", dims, count);
                    let index = index.expect("unprimed query over a non-empty tree");
                    assert_eq!(column_sq_dist(&points, index, &query), dist);
                }
            }
        }
    }

    #[test]
    fn test_priming_never_worsens_the_result() {
        let mut rng = StdRng::seed_from_u64(11);
        let points = random_points(&mut rng, 4, 200);
        let tree = KdTree::build(&points, 200);

        for _ in 0..100 {
            let query = random_query(&mut rng, 4);
            let (unprimed, _) = tree.nearest(&points, &query, (f64::INFINITY, None));

            // Prime above the true minimum: the tree must still find it.
            let (loose, _) = tree.nearest(&points, &query, (unprimed * 4.0 + 1.0, None));
            assert_eq!(loose, unprimed);

            // Prime below the true minimum: the candidate must survive.
            let tight = unprimed / 2.0;
            let (primed, index) = tree.nearest(&points, &query, (tight, None));
            assert_eq!(primed, tight);
            assert_eq!(index, None);
        }
    }

    #[test]
    fn test_duplicate_points() {
        let points = DMatrix::from_fn(3, 20, |i, _| i as f64);
        let tree = KdTree::build(&points, 20);

        let query = DVector::from_element(3, 0.5);
        let (dist, index) = tree.nearest(&points, &query, (f64::INFINITY, None));

        let expected = column_sq_dist(&points, 0, &query);
        assert_eq!(dist, expected);
        assert!(index.is_some());
    }

    #[test]
    fn test_single_point() {
        let points = DMatrix::from_column_slice(2, 1, &[3.0, -4.0]);
        let tree = KdTree::build(&points, 1);

        let (dist, index) = tree.nearest(&points, &DVector::zeros(2), (f64::INFINITY, None));
        assert_eq!(dist, 25.0);
        assert_eq!(index, Some(0));
    }

    #[test]
    fn test_empty_tree_returns_candidate() {
        let points = DMatrix::<f64>::zeros(3, 0);
        let tree = KdTree::build(&points, 0);

        let (dist, index) = tree.nearest(&points, &DVector::zeros(3), (1.5, None));
        assert_eq!(dist, 1.5);
        assert_eq!(index, None);
    }

    #[test]
    fn test_ignores_columns_beyond_len() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut points = random_points(&mut rng, 2, 8);
        let tree = KdTree::build(&points, 8);

        // Appended columns (closer than anything indexed) must be invisible.
        let query = random_query(&mut rng, 2);
        let before = tree.nearest(&points, &query, (f64::INFINITY, None));

        let grown = points.resize_horizontally(9, 0.0);
        points = grown;
        points.set_column(8, &query);
        let after = tree.nearest(&points, &query, (f64::INFINITY, None));

        assert_eq!(before, after);
    }
}
