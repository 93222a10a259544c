use crate::domain::Domain;
use crate::error::QueryError;
use crate::query::{NeighborBond, QueryArgs, QueryMode};
use nalgebra::Vector3;

/// Reference query over every point, with no spatial structure.
///
/// Ball results come back sorted by point index; nearest results by
/// distance, ties broken by point index, at most `k` of them.
pub fn query<D: Domain>(
    domain: &D,
    positions: &[Vector3<f64>],
    point: Vector3<f64>,
    query_point_index: usize,
    args: &QueryArgs,
) -> Result<Vec<NeighborBond>, QueryError> {
    args.validate()?;
    let r_max_sq = args.r_max * args.r_max;
    let r_min_sq = args.r_min * args.r_min;

    let mut bonds: Vec<NeighborBond> = positions
        .iter()
        .enumerate()
        .filter(|&(j, _)| !(args.exclude_self && j == query_point_index))
        .filter_map(|(j, p)| {
            let r_sq = domain.wrap(&(p - point)).norm_squared();
            (r_sq < r_max_sq && r_sq >= r_min_sq)
                .then(|| NeighborBond::new(query_point_index, j, r_sq.sqrt()))
        })
        .collect();

    if args.mode == QueryMode::Nearest {
        bonds.sort_by(NeighborBond::cmp_by_distance);
        bonds.truncate(args.num_neighbors.unwrap_or(0));
    }
    Ok(bonds)
}
