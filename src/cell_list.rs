use crate::adjacency::CellAdjacency;
use crate::ball::BallQuery;
use crate::domain::{Domain, PeriodicBox};
use crate::error::{BuildError, QueryError};
use crate::grid::CellGrid;
use crate::nearest::NearestQuery;
use crate::query::{NeighborQueryIter, QueryArgs, QueryMode};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Points of one batch bucketed by grid cell.
///
/// Immutable between rebuilds, so a shared reference can be handed to any
/// number of query iterators on any number of threads.
pub struct CellList<D: Domain = PeriodicBox> {
    domain: D,
    grid: CellGrid,
    /// Copy of the batch positions, indexed by original point index.
    positions: Vec<Vector3<f64>>,
    /// Original point indices grouped by cell, ascending within a cell.
    particles: Vec<usize>,
    /// particles[cell_starts[c]..cell_starts[c + 1]] are the points of cell c.
    cell_starts: Vec<usize>,
    adjacency: Arc<CellAdjacency>,
}

impl<D: Domain> CellList<D> {
    pub fn build(
        domain: D,
        cell_width: f64,
        positions: &[Vector3<f64>],
    ) -> Result<Self, BuildError> {
        let grid = CellGrid::new(&domain, cell_width)?;
        let adjacency = Arc::new(CellAdjacency::new(&grid));
        Self::assemble(domain, grid, adjacency, positions)
    }

    /// Like [`CellList::build`], but reuses `adjacency` when it was built for
    /// the same grid shape.
    pub fn build_with_adjacency(
        domain: D,
        cell_width: f64,
        positions: &[Vector3<f64>],
        adjacency: &Arc<CellAdjacency>,
    ) -> Result<Self, BuildError> {
        let grid = CellGrid::new(&domain, cell_width)?;
        let adjacency = if adjacency.matches(&grid) {
            debug!(cached = adjacency.num_cached(), "reusing cell adjacency");
            Arc::clone(adjacency)
        } else {
            debug!("grid shape changed, starting a fresh cell adjacency");
            Arc::new(CellAdjacency::new(&grid))
        };
        Self::assemble(domain, grid, adjacency, positions)
    }

    fn assemble(
        domain: D,
        grid: CellGrid,
        adjacency: Arc<CellAdjacency>,
        positions: &[Vector3<f64>],
    ) -> Result<Self, BuildError> {
        let mut cl = Self {
            domain,
            grid,
            positions: Vec::new(),
            particles: Vec::new(),
            cell_starts: Vec::new(),
            adjacency,
        };
        cl.rebuild(positions)?;
        Ok(cl)
    }

    /// Replaces the point batch, keeping domain, grid and adjacency.
    pub fn rebuild(&mut self, positions: &[Vector3<f64>]) -> Result<(), BuildError> {
        let _span = info_span!(
            "CellList::build",
            n_points = positions.len(),
            cell_width = self.grid.cell_width()
        )
        .entered();
        if positions.is_empty() {
            return Err(BuildError::NoPoints);
        }
        let n_points = positions.len();
        let n_cells = self.grid.num_cells();

        // 1. Cell of every point
        let point_cells: Vec<usize> = {
            let _s = info_span!("bin_points").entered();
            let grid = &self.grid;
            let domain = &self.domain;
            positions
                .par_iter()
                .map(|pos| grid.cell_index(domain, pos))
                .collect()
        };

        // 2. Bucket offsets
        let mut counts = vec![0; n_cells];
        for &cell in &point_cells {
            counts[cell] += 1;
        }
        let mut cell_starts = vec![0; n_cells + 1];
        let mut accum = 0;
        for i in 0..n_cells {
            cell_starts[i] = accum;
            accum += counts[i];
        }
        cell_starts[n_cells] = accum;

        // 3. Fill buckets in ascending point order
        let mut particles = vec![0; n_points];
        {
            let _s = info_span!("bin_fill").entered();
            let mut current_fill = cell_starts.clone();
            for (i, &cell) in point_cells.iter().enumerate() {
                particles[current_fill[cell]] = i;
                current_fill[cell] += 1;
            }
        }

        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.particles = particles;
        self.cell_starts = cell_starts;
        Ok(())
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn cell_width(&self) -> f64 {
        self.grid.cell_width()
    }

    pub fn num_cells(&self) -> usize {
        self.grid.num_cells()
    }

    pub fn num_points(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn points_in_cell(&self, cell: usize) -> &[usize] {
        &self.particles[self.cell_starts[cell]..self.cell_starts[cell + 1]]
    }

    /// Cells adjacent to `cell` (itself included), computed on first use.
    pub fn neighbor_cells(&self, cell: usize) -> &[usize] {
        self.adjacency.get(cell)
    }

    pub fn adjacency(&self) -> &Arc<CellAdjacency> {
        &self.adjacency
    }

    /// Squared minimum-image distance from `point` to the stored point `j`.
    pub(crate) fn distance_sq(&self, point: &Vector3<f64>, j: usize) -> f64 {
        self.domain.wrap(&(self.positions[j] - point)).norm_squared()
    }

    /// Starts a lazy query for one query point.
    ///
    /// Argument errors are reported here, before any bond is produced.
    pub fn query(
        &self,
        point: Vector3<f64>,
        query_point_index: usize,
        args: &QueryArgs,
    ) -> Result<NeighborQueryIter<'_, D>, QueryError> {
        args.validate()?;
        match args.mode {
            QueryMode::Ball => Ok(NeighborQueryIter::Ball(BallQuery::new(
                self,
                point,
                query_point_index,
                args,
            ))),
            QueryMode::Nearest => Ok(NeighborQueryIter::Nearest(NearestQuery::new(
                self,
                point,
                query_point_index,
                args,
            ))),
            QueryMode::None => Err(QueryError::UnsupportedMode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(l: f64) -> PeriodicBox {
        PeriodicBox::cube(l).unwrap()
    }

    #[test]
    fn test_cell_list_structure() {
        let positions = vec![
            Vector3::new(1.0, 1.0, 1.0), // Cell [0, 0, 0]
            Vector3::new(9.0, 9.0, 9.0), // Cell [2, 2, 2]
            Vector3::new(1.1, 1.1, 1.1), // Cell [0, 0, 0]
        ];

        let cl = CellList::build(cube(10.0), 3.0, &positions).unwrap();
        assert_eq!(cl.grid().dims(), Vector3::new(3, 3, 3));

        let grid = *cl.grid();
        assert_eq!(cl.points_in_cell(0), &[0, 2]);
        assert_eq!(
            cl.points_in_cell(grid.coord_to_index(&Vector3::new(2, 2, 2))),
            &[1]
        );
        assert!(
            cl.points_in_cell(grid.coord_to_index(&Vector3::new(1, 1, 1)))
                .is_empty()
        );
    }

    #[test]
    fn test_every_point_in_exactly_one_bucket() {
        let mut positions = Vec::new();
        for i in 0..7 {
            for j in 0..7 {
                for k in 0..7 {
                    positions.push(Vector3::new(
                        i as f64 * 1.3,
                        j as f64 * 1.3 - 4.0,
                        k as f64 * 1.3 + 12.0,
                    ));
                }
            }
        }
        let cl = CellList::build(cube(9.0), 2.0, &positions).unwrap();

        let mut seen: Vec<usize> = (0..cl.num_cells())
            .flat_map(|c| cl.points_in_cell(c).to_vec())
            .collect();
        for c in 0..cl.num_cells() {
            assert!(cl.points_in_cell(c).windows(2).all(|w| w[0] < w[1]));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..positions.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let positions = vec![
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(4.5, 0.5, 9.5),
            Vector3::new(0.7, 0.2, 0.1),
            Vector3::new(7.0, 3.0, 5.0),
        ];
        let mut cl = CellList::build(cube(10.0), 2.5, &positions).unwrap();
        let before: Vec<Vec<usize>> = (0..cl.num_cells())
            .map(|c| cl.points_in_cell(c).to_vec())
            .collect();
        cl.rebuild(&positions).unwrap();
        let after: Vec<Vec<usize>> = (0..cl.num_cells())
            .map(|c| cl.points_in_cell(c).to_vec())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_configuration_errors() {
        let p = [Vector3::new(1.0, 1.0, 1.0)];
        assert_eq!(
            CellList::build(cube(10.0), 1.0, &[]).err(),
            Some(BuildError::NoPoints)
        );
        assert_eq!(
            CellList::build(cube(10.0), -1.0, &p).err(),
            Some(BuildError::InvalidCellWidth(-1.0))
        );
        assert!(matches!(
            CellList::build(cube(10.0), 6.0, &p).err(),
            Some(BuildError::CellWidthTooLarge { .. })
        ));

        let mut cl = CellList::build(cube(10.0), 1.0, &p).unwrap();
        assert_eq!(cl.rebuild(&[]), Err(BuildError::NoPoints));
    }

    #[test]
    fn test_adjacency_shared_between_batches() {
        let p = [Vector3::new(1.0, 1.0, 1.0), Vector3::new(2.0, 2.0, 2.0)];
        let first = CellList::build(cube(10.0), 2.0, &p).unwrap();
        first.neighbor_cells(0);

        let same_shape =
            CellList::build_with_adjacency(cube(10.5), 2.0, &p, first.adjacency()).unwrap();
        assert!(Arc::ptr_eq(first.adjacency(), same_shape.adjacency()));
        assert_eq!(same_shape.adjacency().num_cached(), 1);

        let other_shape =
            CellList::build_with_adjacency(cube(10.0), 2.5, &p, first.adjacency()).unwrap();
        assert!(!Arc::ptr_eq(first.adjacency(), other_shape.adjacency()));
        assert_eq!(other_shape.adjacency().num_cells(), other_shape.num_cells());
    }

    #[test]
    fn test_unsupported_mode() {
        let cl = CellList::build(cube(10.0), 2.0, &[Vector3::zeros()]).unwrap();
        let args = QueryArgs {
            r_max: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            cl.query(Vector3::zeros(), 0, &args),
            Err(QueryError::UnsupportedMode)
        ));
    }

    #[cfg(feature = "dhat-heap")]
    #[test]
    fn test_memory_profile() {
        let _profiler = dhat::Profiler::new_heap();

        let mut positions = Vec::new();
        for i in 0..100 {
            for j in 0..100 {
                positions.push(Vector3::new(i as f64 * 0.2, j as f64 * 0.2, 0.0));
            }
        }

        let cl = CellList::build(cube(20.0), 3.0, &positions).unwrap();
        let args = QueryArgs::ball(3.0);
        let _ = cl.query_all(&positions, &args);
    }
}
