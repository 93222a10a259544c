use crate::cell_list::CellList;
use crate::domain::Domain;
use crate::query::{NeighborBond, QueryArgs};
use crate::shell::ShellSequence;
use nalgebra::Vector3;
use rustc_hash::FxHashSet;
use std::iter::FusedIterator;
use tracing::trace;

/// Streams the `k` nearest points within `[r_min, r_max)` of a query point,
/// closest first, ties broken by reference index.
///
/// The search runs on the first pull: candidates are gathered shell by shell
/// until the k-th best one is provably closer than anything left unsearched.
pub struct NearestQuery<'a, D: Domain> {
    cell_list: &'a CellList<D>,
    query_point: Vector3<f64>,
    query_point_index: usize,
    num_neighbors: usize,
    r_max: f64,
    r_max_sq: f64,
    r_min_sq: f64,
    exclude_self: bool,
    candidates: Vec<NeighborBond>,
    search_done: bool,
    cells_searched: usize,
    count: usize,
    finished: bool,
}

impl<'a, D: Domain> NearestQuery<'a, D> {
    /// Expects `args` to be validated already.
    pub(crate) fn new(
        cell_list: &'a CellList<D>,
        query_point: Vector3<f64>,
        query_point_index: usize,
        args: &QueryArgs,
    ) -> Self {
        Self {
            cell_list,
            query_point,
            query_point_index,
            num_neighbors: args.num_neighbors.unwrap_or(1),
            r_max: args.r_max,
            r_max_sq: args.r_max * args.r_max,
            r_min_sq: args.r_min * args.r_min,
            exclude_self: args.exclude_self,
            candidates: Vec::new(),
            search_done: false,
            cells_searched: 0,
            count: 0,
            finished: false,
        }
    }

    /// Largest shell radius worth opening: no periodic image closer than half
    /// the smallest plane distance is ever needed.
    fn max_range(&self) -> i32 {
        let plane = self.cell_list.domain().plane_distances();
        let mut min_plane_distance = plane.x.min(plane.y);
        if !self.cell_list.grid().is_2d() {
            min_plane_distance = min_plane_distance.min(plane.z);
        }
        (min_plane_distance / (2.0 * self.cell_list.cell_width())).ceil() as i32 + 1
    }

    fn collect_cell(&mut self, points: &[usize]) {
        for &j in points {
            if self.exclude_self && j == self.query_point_index {
                continue;
            }
            let r_sq = self.cell_list.distance_sq(&self.query_point, j);
            if r_sq < self.r_max_sq && r_sq >= self.r_min_sq {
                self.candidates
                    .push(NeighborBond::new(self.query_point_index, j, r_sq.sqrt()));
            }
        }
    }

    fn search(&mut self) {
        let cell_list = self.cell_list;
        let grid = cell_list.grid();
        let cell_width = grid.cell_width();
        let max_range = self.max_range();
        let k = self.num_neighbors;

        let home = grid.cell_coord(cell_list.domain(), &self.query_point);
        let home_index = grid.coord_to_index(&home);
        let mut shells = ShellSequence::new(grid.is_2d());
        shells.next();
        let mut searched = FxHashSet::default();
        searched.insert(home_index);
        let mut current = cell_list.points_in_cell(home_index);

        loop {
            self.collect_cell(current);
            let drained_range = shells.range();

            let mut next_cell = None;
            if searched.len() < grid.num_cells() {
                while let Some(offset) = shells.next() {
                    // Points in this shell are at least (range - 1) cell widths away.
                    let nearest_possible = (shells.range() - 1) as f64 * cell_width;
                    if shells.range() >= max_range || nearest_possible > self.r_max {
                        break;
                    }
                    let cell = grid.offset_index(&home, &offset);
                    if searched.insert(cell) {
                        next_cell = Some(cell);
                        break;
                    }
                }
            }
            let Some(cell) = next_cell else {
                break;
            };

            if shells.range() != drained_range {
                // Every shell below the current one is done; nothing unsearched
                // can be closer than (range - 1) cell widths.
                self.candidates.sort_by(NeighborBond::cmp_by_distance);
                let bound = (shells.range() - 1) as f64 * cell_width;
                if self.candidates.len() >= k && self.candidates[k - 1].distance < bound {
                    trace!(
                        query_point_index = self.query_point_index,
                        range = shells.range(),
                        "nearest search terminated early"
                    );
                    break;
                }
            }
            current = cell_list.points_in_cell(cell);
        }

        self.cells_searched = searched.len();
        self.candidates.sort_by(NeighborBond::cmp_by_distance);
        self.candidates.truncate(k);
    }
}

impl<D: Domain> Iterator for NearestQuery<'_, D> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        if self.finished {
            return None;
        }
        if !self.search_done {
            self.search();
            self.search_done = true;
        }
        if self.count < self.num_neighbors && self.count < self.candidates.len() {
            // Candidates are already limited to [r_min, r_max).
            let bond = self.candidates[self.count];
            self.count += 1;
            return Some(bond);
        }
        self.finished = true;
        None
    }
}

impl<D: Domain> FusedIterator for NearestQuery<'_, D> {}
