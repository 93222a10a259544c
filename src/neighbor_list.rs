use crate::cell_list::CellList;
use crate::config;
use crate::domain::Domain;
use crate::error::QueryError;
use crate::query::{NeighborBond, QueryArgs, QueryMode};
use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::info_span;

const PARALLEL_TASKS_PER_THREAD: usize = 64;

/// Bonds of a whole query batch as parallel arrays, grouped by query point
/// in ascending query index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborList {
    pub query_point_indices: Vec<usize>,
    pub point_indices: Vec<usize>,
    pub distances: Vec<f64>,
}

impl NeighborList {
    fn from_bonds(bonds: Vec<NeighborBond>) -> Self {
        let mut nlist = Self {
            query_point_indices: Vec::with_capacity(bonds.len()),
            point_indices: Vec::with_capacity(bonds.len()),
            distances: Vec::with_capacity(bonds.len()),
        };
        for bond in bonds {
            nlist.query_point_indices.push(bond.query_point_index);
            nlist.point_indices.push(bond.point_index);
            nlist.distances.push(bond.distance);
        }
        nlist
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn bonds(&self) -> impl Iterator<Item = NeighborBond> + '_ {
        self.query_point_indices
            .iter()
            .zip(&self.point_indices)
            .zip(&self.distances)
            .map(|((&i, &j), &d)| NeighborBond::new(i, j, d))
    }

    /// Number of bonds of each query point.
    ///
    /// # Panics
    ///
    /// Panics if a query point index is not below `n_query_points`.
    pub fn neighbor_counts(&self, n_query_points: usize) -> Vec<usize> {
        let mut counts = vec![0; n_query_points];
        for &i in &self.query_point_indices {
            counts[i] += 1;
        }
        counts
    }

    /// Offset of the first bond of each query point; query points without
    /// bonds get the offset of the next one.
    ///
    /// # Panics
    ///
    /// Panics if a query point index is not below `n_query_points`.
    pub fn segments(&self, n_query_points: usize) -> Vec<usize> {
        let mut segments = Vec::with_capacity(n_query_points);
        let mut accum = 0;
        for count in self.neighbor_counts(n_query_points) {
            segments.push(accum);
            accum += count;
        }
        segments
    }
}

impl<D: Domain> CellList<D> {
    /// Runs one query per point of `query_points` and gathers every bond.
    ///
    /// Ball bonds are ordered by point index within each query point;
    /// nearest bonds keep their ascending-distance order.
    pub fn query_all(
        &self,
        query_points: &[Vector3<f64>],
        args: &QueryArgs,
    ) -> Result<NeighborList, QueryError> {
        args.validate()?;
        let n_query = query_points.len();
        let fast_path = args.mode == QueryMode::Ball && args.r_max <= self.cell_width();
        let _span = info_span!(
            "CellList::query_all",
            n_query_points = n_query,
            mode = ?args.mode,
            fast_path
        )
        .entered();

        if fast_path {
            self.adjacency().prefill();
        }

        let search = |i: usize| -> Result<Vec<NeighborBond>, QueryError> {
            let point = query_points[i];
            if fast_path {
                return Ok(self.scan_adjacent(&point, i, args));
            }
            let mut bonds: Vec<NeighborBond> = self.query(point, i, args)?.collect();
            if args.mode == QueryMode::Ball {
                bonds.sort_unstable_by_key(|b| b.point_index);
            }
            Ok(bonds)
        };

        let per_point: Vec<Vec<NeighborBond>> = if n_query >= config::get_parallel_threshold() {
            let num_threads = rayon::current_num_threads();
            let min_len = (n_query / (num_threads * PARALLEL_TASKS_PER_THREAD)).max(1);
            (0..n_query)
                .into_par_iter()
                .with_min_len(min_len)
                .map(search)
                .collect::<Result<_, _>>()?
        } else {
            (0..n_query).map(search).collect::<Result<_, _>>()?
        };
        let bonds = per_point.into_iter().flatten().collect();

        Ok(NeighborList::from_bonds(bonds))
    }

    /// Ball query restricted to the home cell and its direct neighbors.
    ///
    /// Only valid while `r_max` does not exceed the cell width; bonds come
    /// back ordered by point index.
    pub fn query_adjacent(
        &self,
        point: Vector3<f64>,
        query_point_index: usize,
        args: &QueryArgs,
    ) -> Result<Vec<NeighborBond>, QueryError> {
        args.validate()?;
        if args.mode != QueryMode::Ball {
            return Err(QueryError::UnsupportedMode);
        }
        if args.r_max > self.cell_width() {
            return Err(QueryError::RMaxExceedsCellWidth {
                r_max: args.r_max,
                cell_width: self.cell_width(),
            });
        }
        Ok(self.scan_adjacent(&point, query_point_index, args))
    }

    fn scan_adjacent(
        &self,
        point: &Vector3<f64>,
        query_point_index: usize,
        args: &QueryArgs,
    ) -> Vec<NeighborBond> {
        let r_max_sq = args.r_max * args.r_max;
        let r_min_sq = args.r_min * args.r_min;
        let home = self.grid().cell_index(self.domain(), point);

        let mut bonds = Vec::new();
        for &cell in self.neighbor_cells(home) {
            for &j in self.points_in_cell(cell) {
                if args.exclude_self && j == query_point_index {
                    continue;
                }
                let r_sq = self.distance_sq(point, j);
                if r_sq < r_max_sq && r_sq >= r_min_sq {
                    bonds.push(NeighborBond::new(query_point_index, j, r_sq.sqrt()));
                }
            }
        }
        bonds.sort_unstable_by_key(|b| b.point_index);
        bonds
    }
}
