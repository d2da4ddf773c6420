//! Operating-point history around an inner solver.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::kdtree::{column_sq_dist, Candidate, KdTree};
use crate::NonlinearSolver;

/// Default minimum inner iteration count for a solve to be worth caching.
pub const DEFAULT_ITERATION_GATE: usize = 5;

/// Mines a history of converged operating points for better warm starts.
///
/// Every expensive converged solve is appended to a column-major history of
/// (p, z) pairs. Before delegating a solve, the wrapper looks up the stored
/// point nearest to the requested parameters and installs it as the inner
/// origin. Three sources compete for that lookup: a k-d tree over the
/// indexed prefix of the history, a linear scan over the columns appended
/// since the last rebuild, and the inner solver's own origin.
///
/// Cheap solves (at most [`DEFAULT_ITERATION_GATE`] iterations) are not
/// cached: the existing extrapolation already handles that neighborhood.
/// Rebuilds are amortized by `new_count_limit`, which shrinks while appends
/// are pending and doubles with the history size after each rebuild, keeping
/// the linearly scanned suffix small relative to the indexed prefix.
pub struct CachingSolver<S> {
    inner: S,
    ps: DMatrix<f64>,
    zs: DMatrix<f64>,
    num_ps: usize,
    tree: KdTree,
    new_count: usize,
    new_count_limit: usize,
    iteration_gate: usize,
}

impl<S: NonlinearSolver> CachingSolver<S> {
    /// Wrap an inner solver, seeding the history with its current origin.
    pub fn new(inner: S) -> Self {
        let (ps, zs) = {
            let (p0, z0) = inner.origin();
            let mut ps = DMatrix::zeros(p0.len(), 1);
            let mut zs = DMatrix::zeros(z0.len(), 1);
            ps.set_column(0, p0);
            zs.set_column(0, z0);
            (ps, zs)
        };
        let tree = KdTree::build(&ps, 1);

        Self {
            inner,
            ps,
            zs,
            num_ps: 1,
            tree,
            new_count: 0,
            new_count_limit: 2,
            iteration_gate: DEFAULT_ITERATION_GATE,
        }
    }

    /// Set the iteration count above which converged solves are cached.
    pub fn set_iteration_gate(&mut self, iteration_gate: usize) {
        self.iteration_gate = iteration_gate;
    }

    /// Number of stored operating points.
    pub fn num_cached(&self) -> usize {
        self.num_ps
    }

    /// The wrapped solver.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the inner solver.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn append(&mut self, p: &DVector<f64>) {
        if self.num_ps == self.ps.ncols() {
            let capacity = 2 * self.ps.ncols();
            let ps = std::mem::replace(&mut self.ps, DMatrix::zeros(0, 0));
            self.ps = ps.resize_horizontally(capacity, 0.0);
            let zs = std::mem::replace(&mut self.zs, DMatrix::zeros(0, 0));
            self.zs = zs.resize_horizontally(capacity, 0.0);
        }
        self.ps.set_column(self.num_ps, p);
        self.zs.set_column(self.num_ps, self.inner.solution());
        self.num_ps += 1;
        self.new_count += 1;
    }

    fn rebuild(&mut self) {
        self.tree = KdTree::build(&self.ps, self.num_ps);
        self.new_count = 0;
        self.new_count_limit = 2 * self.num_ps;
        log::debug!("rebuilt operating-point index over {} points", self.num_ps);
    }
}

impl<S: NonlinearSolver> NonlinearSolver for CachingSolver<S> {
    fn solve(&mut self, p: &DVector<f64>) -> &DVector<f64> {
        // The inner origin competes as the external candidate; the pending
        // suffix is folded in by a pre-query scan, and the tree query primed
        // with the running best then yields the global nearest.
        let mut best: Candidate = (sq_dist(p, self.inner.origin().0), None);
        for index in self.tree.len()..self.num_ps {
            let d = column_sq_dist(&self.ps, index, p);
            if d < best.0 {
                best = (d, Some(index));
            }
        }
        best = self.tree.nearest(&self.ps, p, best);

        if let (_, Some(index)) = best {
            let cached_p = self.ps.column(index).into_owned();
            let cached_z = self.zs.column(index).into_owned();
            // Stored points had a factorable Jacobian when appended; a
            // refused installation just keeps the current origin.
            let _ = self.inner.set_origin(&cached_p, &cached_z);
        }

        self.inner.solve(p);

        if self.inner.has_converged() && self.inner.needed_iterations() > self.iteration_gate {
            self.append(p);
        }
        if self.new_count > 0 {
            self.new_count_limit -= 1;
        }
        if self.new_count > self.new_count_limit {
            self.rebuild();
        }

        self.inner.solution()
    }

    fn solution(&self) -> &DVector<f64> {
        self.inner.solution()
    }

    fn has_converged(&self) -> bool {
        self.inner.has_converged()
    }

    fn needed_iterations(&self) -> usize {
        self.inner.needed_iterations()
    }

    fn set_tolerance(&mut self, tol: f64) {
        self.inner.set_tolerance(tol);
    }

    fn set_origin(&mut self, p: &DVector<f64>, z: &DVector<f64>) -> Result<()> {
        self.inner.set_origin(p, z)
    }

    fn origin(&self) -> (&DVector<f64>, &DVector<f64>) {
        self.inner.origin()
    }
}

fn sq_dist(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
