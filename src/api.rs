use crate::cell_list::CellList;
use crate::domain::PeriodicBox;
use crate::error::Error;
use crate::neighbor_list::NeighborList;
use crate::query::QueryArgs;
use nalgebra::{Matrix3, Vector3};
use std::borrow::Cow;

/// Padding added around the points, on top of `r_max`, when no box is given.
pub const AUTO_BOX_MARGIN: f64 = 1.0;

/// Self-query of a flat position array: every point against every other.
///
/// Without a `domain`, the points are placed in a non-periodic box that
/// encloses them with a margin, large enough for `cell_width`.
pub fn build_neighborlist(
    positions: &[[f64; 3]],
    domain: Option<PeriodicBox>,
    cell_width: f64,
    args: &QueryArgs,
) -> Result<NeighborList, Error> {
    args.validate()?;
    let positions = as_vectors(positions);
    let (domain, positions) = match domain {
        Some(domain) => (domain, positions),
        None => {
            let (domain, shifted) = enclosing_box(&positions, args.r_max, cell_width)?;
            (domain, Cow::Owned(shifted))
        }
    };
    let cell_list = CellList::build(domain, cell_width, &positions)?;
    Ok(cell_list.query_all(&positions, args)?)
}

fn as_vectors(positions: &[[f64; 3]]) -> Cow<'_, [Vector3<f64>]> {
    if let Ok(cast_slice) = bytemuck::try_cast_slice(positions) {
        return Cow::Borrowed(cast_slice);
    }
    // Fallback: Copy
    Cow::Owned(positions.iter().map(|p| Vector3::from(*p)).collect())
}

/// Non-periodic box around `positions`, with the points translated inside it.
fn enclosing_box(
    positions: &[Vector3<f64>],
    r_max: f64,
    cell_width: f64,
) -> Result<(PeriodicBox, Vec<Vector3<f64>>), Error> {
    let mut min_bound = Vector3::repeat(f64::INFINITY);
    let mut max_bound = Vector3::repeat(f64::NEG_INFINITY);
    for p in positions {
        min_bound = min_bound.inf(p);
        max_bound = max_bound.sup(p);
    }
    if positions.is_empty() {
        min_bound = Vector3::zeros();
        max_bound = Vector3::zeros();
    }

    let margin = r_max + AUTO_BOX_MARGIN;
    let lengths = (max_bound - min_bound)
        .map(|span| (span + 2.0 * margin).max(2.0 * cell_width));
    let domain = PeriodicBox::new(
        Matrix3::from_diagonal(&lengths),
        Vector3::new(false, false, false),
    )?;
    let offset = Vector3::repeat(margin) - min_bound;
    let shifted = positions.iter().map(|p| p + offset).collect();
    Ok((domain, shifted))
}
