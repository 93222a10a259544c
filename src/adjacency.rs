use crate::grid::CellGrid;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::sync::OnceLock;
use tracing::info_span;

/// Memoized sets of directly adjacent cells (the 3x3x3 block, or 3x3 in 2D).
///
/// Adjacency only depends on the grid shape, so one cache can be shared by
/// every cell list built on the same shape. Each slot is initialized at most
/// once; concurrent first lookups of the same cell block until the winner
/// has stored its result, so readers never see a partial set.
#[derive(Debug)]
pub struct CellAdjacency {
    dims: Vector3<usize>,
    is_2d: bool,
    cells: Vec<OnceLock<Box<[usize]>>>,
}

impl CellAdjacency {
    pub fn new(grid: &CellGrid) -> Self {
        let cells = (0..grid.num_cells()).map(|_| OnceLock::new()).collect();
        Self {
            dims: grid.dims(),
            is_2d: grid.is_2d(),
            cells,
        }
    }

    /// True if this cache was built for a grid of the same shape.
    pub fn matches(&self, grid: &CellGrid) -> bool {
        self.dims == grid.dims() && self.is_2d == grid.is_2d()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Sorted, de-duplicated adjacent cells of `cell`, including `cell` itself.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is out of range for the grid shape.
    pub fn get(&self, cell: usize) -> &[usize] {
        self.cells[cell].get_or_init(|| self.compute(cell).into_boxed_slice())
    }

    /// Number of cells whose adjacency has been computed so far.
    pub fn num_cached(&self) -> usize {
        self.cells.iter().filter(|c| c.get().is_some()).count()
    }

    /// Computes every entry up front so a query batch never initializes slots.
    pub fn prefill(&self) {
        let _span = info_span!("CellAdjacency::prefill", n_cells = self.cells.len()).entered();
        (0..self.cells.len()).into_par_iter().for_each(|cell| {
            self.get(cell);
        });
    }

    fn compute(&self, cell: usize) -> Vec<usize> {
        let d = self.dims;
        let c = Vector3::new(cell % d.x, (cell / d.x) % d.y, cell / (d.x * d.y));

        let x_range = axis_offsets(d.x);
        let y_range = axis_offsets(d.y);
        let z_range = if self.is_2d { 0..=0 } else { axis_offsets(d.z) };

        let mut neighbors = Vec::with_capacity(27);
        for dz in z_range {
            for dy in y_range.clone() {
                for dx in x_range.clone() {
                    let x = (c.x as i64 + dx).rem_euclid(d.x as i64) as usize;
                    let y = (c.y as i64 + dy).rem_euclid(d.y as i64) as usize;
                    let z = (c.z as i64 + dz).rem_euclid(d.z as i64) as usize;
                    neighbors.push(x + d.x * (y + d.y * z));
                }
            }
        }
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}

/// Offsets to visit along an axis with `n` cells. With one cell the only
/// neighbor is the cell itself; with two, -1 and +1 reach the same cell.
fn axis_offsets(n: usize) -> std::ops::RangeInclusive<i64> {
    match n {
        1 => 0..=0,
        2 => 0..=1,
        _ => -1..=1,
    }
}
