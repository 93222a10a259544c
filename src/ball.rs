use crate::cell_list::CellList;
use crate::domain::Domain;
use crate::query::{NeighborBond, QueryArgs};
use crate::shell::ShellSequence;
use nalgebra::Vector3;
use rustc_hash::FxHashSet;
use std::iter::FusedIterator;

/// Streams every point within `[r_min, r_max)` of a query point.
///
/// Cells are opened shell by shell around the query point's cell. Bonds
/// come out in cell order, not distance order.
pub struct BallQuery<'a, D: Domain> {
    cell_list: &'a CellList<D>,
    query_point: Vector3<f64>,
    query_point_index: usize,
    r_max: f64,
    r_max_sq: f64,
    r_min_sq: f64,
    exclude_self: bool,
    home: Vector3<usize>,
    shells: ShellSequence,
    searched: FxHashSet<usize>,
    current: &'a [usize],
    cursor: usize,
    finished: bool,
}

impl<'a, D: Domain> BallQuery<'a, D> {
    /// Expects `args` to be validated already.
    pub(crate) fn new(
        cell_list: &'a CellList<D>,
        query_point: Vector3<f64>,
        query_point_index: usize,
        args: &QueryArgs,
    ) -> Self {
        let grid = cell_list.grid();
        let home = grid.cell_coord(cell_list.domain(), &query_point);
        let home_index = grid.coord_to_index(&home);

        let mut shells = ShellSequence::new(grid.is_2d());
        // Consume the origin offset; the home cell is opened right away.
        shells.next();
        let mut searched = FxHashSet::default();
        searched.insert(home_index);

        Self {
            cell_list,
            query_point,
            query_point_index,
            r_max: args.r_max,
            r_max_sq: args.r_max * args.r_max,
            r_min_sq: args.r_min * args.r_min,
            exclude_self: args.exclude_self,
            home,
            shells,
            searched,
            current: cell_list.points_in_cell(home_index),
            cursor: 0,
            finished: false,
        }
    }

    /// Opens the next cell that has not been searched yet. Returns false when
    /// no remaining cell can hold a point closer than `r_max`.
    fn advance_cell(&mut self) -> bool {
        let cell_list = self.cell_list;
        let grid = cell_list.grid();
        if self.searched.len() == grid.num_cells() {
            return false;
        }
        while let Some(offset) = self.shells.next() {
            // Closest approach to anything in this shell or beyond.
            if (self.shells.range() - 1) as f64 * grid.cell_width() > self.r_max {
                return false;
            }
            let cell = grid.offset_index(&self.home, &offset);
            if self.searched.insert(cell) {
                self.current = cell_list.points_in_cell(cell);
                self.cursor = 0;
                return true;
            }
        }
        false
    }
}

impl<D: Domain> Iterator for BallQuery<'_, D> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        if self.finished {
            return None;
        }
        loop {
            while let Some(&j) = self.current.get(self.cursor) {
                self.cursor += 1;
                if self.exclude_self && j == self.query_point_index {
                    continue;
                }
                let r_sq = self.cell_list.distance_sq(&self.query_point, j);
                if r_sq < self.r_max_sq && r_sq >= self.r_min_sq {
                    return Some(NeighborBond::new(self.query_point_index, j, r_sq.sqrt()));
                }
            }
            if !self.advance_cell() {
                self.finished = true;
                self.current = &[];
                return None;
            }
        }
    }
}

impl<D: Domain> FusedIterator for BallQuery<'_, D> {}
