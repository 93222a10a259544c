use crate::domain::Domain;
use crate::error::BuildError;
use nalgebra::Vector3;
use tracing::debug;

/// Regular partition of a domain into cells at least `cell_width` wide.
///
/// Cells are laid out with x varying fastest: `x + nx * (y + ny * z)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellGrid {
    dims: Vector3<usize>,
    cell_width: f64,
    is_2d: bool,
}

impl CellGrid {
    pub fn new<D: Domain>(domain: &D, cell_width: f64) -> Result<Self, BuildError> {
        if !cell_width.is_finite() || cell_width <= 0.0 {
            return Err(BuildError::InvalidCellWidth(cell_width));
        }
        let is_2d = domain.is_2d();
        let plane = domain.plane_distances();

        // A single query could otherwise see the same point through two images.
        let checked = if is_2d { 2 } else { 3 };
        for &plane_distance in plane.iter().take(checked) {
            if cell_width * 2.0 > plane_distance {
                return Err(BuildError::CellWidthTooLarge {
                    cell_width,
                    plane_distance,
                });
            }
        }

        let nx = ((plane.x / cell_width).floor() as usize).max(1);
        let ny = ((plane.y / cell_width).floor() as usize).max(1);
        let nz = if is_2d {
            1
        } else {
            ((plane.z / cell_width).floor() as usize).max(1)
        };
        let total = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .ok_or(BuildError::TooManyCells(nx, ny, nz))?;
        if total < 1 {
            return Err(BuildError::NoCells);
        }
        debug!(nx, ny, nz, cell_width, "cell grid dimensions");

        Ok(Self {
            dims: Vector3::new(nx, ny, nz),
            cell_width,
            is_2d,
        })
    }

    pub fn dims(&self) -> Vector3<usize> {
        self.dims
    }

    /// The requested cell width. Actual cells are at least this wide.
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    pub fn num_cells(&self) -> usize {
        self.dims.x * self.dims.y * self.dims.z
    }

    /// Integer cell coordinate of a position. Positions beyond a
    /// non-periodic face land in the edge cell.
    pub fn cell_coord<D: Domain>(&self, domain: &D, pos: &Vector3<f64>) -> Vector3<usize> {
        let u = domain.unit_cell_coords(pos);
        // Float to usize casts saturate, so negative coordinates clamp to 0.
        let bx = ((u.x * self.dims.x as f64) as usize).min(self.dims.x - 1);
        let by = ((u.y * self.dims.y as f64) as usize).min(self.dims.y - 1);
        let bz = if self.is_2d {
            0
        } else {
            ((u.z * self.dims.z as f64) as usize).min(self.dims.z - 1)
        };
        Vector3::new(bx, by, bz)
    }

    pub fn cell_index<D: Domain>(&self, domain: &D, pos: &Vector3<f64>) -> usize {
        self.coord_to_index(&self.cell_coord(domain, pos))
    }

    pub fn coord_to_index(&self, c: &Vector3<usize>) -> usize {
        c.x + self.dims.x * (c.y + self.dims.y * c.z)
    }

    pub fn index_to_coord(&self, idx: usize) -> Vector3<usize> {
        Vector3::new(
            idx % self.dims.x,
            (idx / self.dims.x) % self.dims.y,
            idx / (self.dims.x * self.dims.y),
        )
    }

    /// Index of the cell at `origin + offset`, wrapped periodically on every axis.
    pub fn offset_index(&self, origin: &Vector3<usize>, offset: &Vector3<i32>) -> usize {
        let x = wrap_axis(origin.x as i64 + offset.x as i64, self.dims.x);
        let y = wrap_axis(origin.y as i64 + offset.y as i64, self.dims.y);
        let z = wrap_axis(origin.z as i64 + offset.z as i64, self.dims.z);
        x + self.dims.x * (y + self.dims.y * z)
    }
}

fn wrap_axis(val: i64, max: usize) -> usize {
    val.rem_euclid(max as i64) as usize
}
