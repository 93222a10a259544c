use crate::error::DomainError;
use nalgebra::{Matrix3, Vector3};

/// Box geometry consumed by the cell list and the query iterators.
///
/// Implementations must be cheap to call from many threads at once; the
/// query engine never mutates a domain.
pub trait Domain: Send + Sync {
    /// True when the z axis is ignored.
    fn is_2d(&self) -> bool;

    /// Distances between opposite faces of the box along each lattice axis.
    fn plane_distances(&self) -> Vector3<f64>;

    /// Minimum-image form of a displacement vector.
    fn wrap(&self, disp: &Vector3<f64>) -> Vector3<f64>;

    /// Fractional coordinates of `pos`, folded into [0, 1) on periodic axes.
    fn unit_cell_coords(&self, pos: &Vector3<f64>) -> Vector3<f64>;

    /// Volume of the box (area in 2D).
    fn volume(&self) -> f64;
}

/// A general triclinic box described by its column matrix `h`, with
/// per-axis periodicity.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodicBox {
    h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
    pbc: Vector3<bool>,
    is_2d: bool,
}

impl PeriodicBox {
    pub fn new(h: Matrix3<f64>, pbc: Vector3<bool>) -> Result<Self, DomainError> {
        let h_inv = h.try_inverse().ok_or(DomainError::NotInvertible)?;
        Ok(Self {
            h,
            h_inv,
            pbc,
            is_2d: false,
        })
    }

    pub fn cube(l: f64) -> Result<Self, DomainError> {
        Self::orthorhombic(l, l, l)
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> Result<Self, DomainError> {
        for l in [lx, ly, lz] {
            check_length(l)?;
        }
        Self::new(
            Matrix3::from_diagonal(&Vector3::new(lx, ly, lz)),
            Vector3::new(true, true, true),
        )
    }

    pub fn square(l: f64) -> Result<Self, DomainError> {
        Self::rectangle(l, l)
    }

    /// A periodic 2D box in the xy plane. Points are expected to have z = 0.
    pub fn rectangle(lx: f64, ly: f64) -> Result<Self, DomainError> {
        check_length(lx)?;
        check_length(ly)?;
        // Unit z extent keeps h invertible; the z axis never takes part in a query.
        let mut b = Self::new(
            Matrix3::from_diagonal(&Vector3::new(lx, ly, 1.0)),
            Vector3::new(true, true, false),
        )?;
        b.is_2d = true;
        Ok(b)
    }

    /// Replaces the periodicity flags. The z flag is ignored in 2D.
    pub fn with_pbc(mut self, pbc: Vector3<bool>) -> Self {
        self.pbc = pbc;
        if self.is_2d {
            self.pbc.z = false;
        }
        self
    }

    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.h_inv * cart
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.h * frac
    }

    pub fn h(&self) -> &Matrix3<f64> {
        &self.h
    }

    pub fn h_inv(&self) -> &Matrix3<f64> {
        &self.h_inv
    }

    pub fn pbc(&self) -> &Vector3<bool> {
        &self.pbc
    }

    /// Returns the perpendicular widths of the box (distances between parallel faces).
    /// d_i = 1 / |h_inv.row(i)|
    pub fn perpendicular_widths(&self) -> Vector3<f64> {
        Vector3::new(
            1.0 / self.h_inv.row(0).norm(),
            1.0 / self.h_inv.row(1).norm(),
            1.0 / self.h_inv.row(2).norm(),
        )
    }

    /// Wraps a position back into the box on every periodic axis.
    pub fn wrap_position(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.to_cartesian(&self.unit_cell_coords(cart))
    }
}

impl Domain for PeriodicBox {
    fn is_2d(&self) -> bool {
        self.is_2d
    }

    fn plane_distances(&self) -> Vector3<f64> {
        self.perpendicular_widths()
    }

    fn wrap(&self, disp: &Vector3<f64>) -> Vector3<f64> {
        let d_frac = self.to_fractional(disp);
        let wrapped_frac = Vector3::new(
            if self.pbc.x {
                d_frac.x - d_frac.x.round()
            } else {
                d_frac.x
            },
            if self.pbc.y {
                d_frac.y - d_frac.y.round()
            } else {
                d_frac.y
            },
            if self.pbc.z {
                d_frac.z - d_frac.z.round()
            } else {
                d_frac.z
            },
        );
        let mut wrapped = self.to_cartesian(&wrapped_frac);
        if self.is_2d {
            wrapped.z = 0.0;
        }
        wrapped
    }

    fn unit_cell_coords(&self, pos: &Vector3<f64>) -> Vector3<f64> {
        let frac = self.to_fractional(pos);
        Vector3::new(
            if self.pbc.x {
                frac.x - frac.x.floor()
            } else {
                frac.x
            },
            if self.pbc.y {
                frac.y - frac.y.floor()
            } else {
                frac.y
            },
            if self.pbc.z {
                frac.z - frac.z.floor()
            } else {
                frac.z
            },
        )
    }

    fn volume(&self) -> f64 {
        self.h.determinant().abs()
    }
}

fn check_length(l: f64) -> Result<(), DomainError> {
    if l.is_finite() && l > 0.0 {
        Ok(())
    } else {
        Err(DomainError::InvalidLength(l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coordinate_transformation() {
        let b = PeriodicBox::cube(10.0).unwrap();

        let cart = Vector3::new(5.0, 2.0, 8.0);
        let frac = b.to_fractional(&cart);

        assert_relative_eq!(frac.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(frac.y, 0.2, epsilon = 1e-12);
        assert_relative_eq!(frac.z, 0.8, epsilon = 1e-12);

        let cart_back = b.to_cartesian(&frac);
        assert_relative_eq!(cart_back, cart, epsilon = 1e-12);
    }

    #[test]
    fn test_triclinic_plane_distances() {
        let h = Matrix3::new(10.0, 2.0, 1.0, 0.0, 10.0, 0.5, 0.0, 0.0, 10.0);
        let b = PeriodicBox::new(h, Vector3::new(true, true, true)).unwrap();

        let cart = Vector3::new(13.0, 10.5, 10.0);
        let frac = b.to_fractional(&cart);
        assert_relative_eq!(frac, Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-12);

        // Tilted box: only the z planes stay 10 apart.
        let d = b.plane_distances();
        assert!(d.x < 10.0);
        assert!(d.y < 10.0);
        assert_relative_eq!(d.z, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_boxes() {
        assert_eq!(
            PeriodicBox::new(Matrix3::zeros(), Vector3::new(true, true, true)),
            Err(DomainError::NotInvertible)
        );
        assert_eq!(
            PeriodicBox::cube(-1.0),
            Err(DomainError::InvalidLength(-1.0))
        );
        assert!(PeriodicBox::rectangle(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_minimum_image() {
        let b = PeriodicBox::cube(10.0).unwrap();
        let r_i = Vector3::new(1.0, 1.0, 1.0);
        let r_j = Vector3::new(9.0, 9.0, 9.0);

        let disp = b.wrap(&(r_j - r_i));
        assert_relative_eq!(disp, Vector3::new(-2.0, -2.0, -2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_mixed_pbc_minimum_image() {
        let b = PeriodicBox::cube(10.0)
            .unwrap()
            .with_pbc(Vector3::new(true, false, false));
        let disp = b.wrap(&Vector3::new(8.0, 8.0, 8.0));

        assert_relative_eq!(disp.x, -2.0, epsilon = 1e-12); // Periodic
        assert_relative_eq!(disp.y, 8.0); // Non-periodic
        assert_relative_eq!(disp.z, 8.0); // Non-periodic
    }

    #[test]
    fn test_position_wrapping() {
        let b = PeriodicBox::cube(10.0).unwrap();
        let wrapped = b.wrap_position(&Vector3::new(15.0, -2.0, 8.0));
        assert_relative_eq!(wrapped, Vector3::new(5.0, 8.0, 8.0), epsilon = 1e-12);

        let frac = b.unit_cell_coords(&Vector3::new(-0.5, 10.0, 25.0));
        assert_relative_eq!(frac, Vector3::new(0.95, 0.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_2d_box() {
        let b = PeriodicBox::rectangle(4.0, 6.0).unwrap();
        assert!(b.is_2d());
        assert!(!b.pbc().z);
        assert_relative_eq!(b.volume(), 24.0, epsilon = 1e-12);

        let disp = b.wrap(&Vector3::new(3.0, -5.0, 2.0));
        assert_relative_eq!(disp, Vector3::new(-1.0, 1.0, 0.0), epsilon = 1e-12);

        let d = b.plane_distances();
        assert_relative_eq!(d.x, 4.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_volume() {
        let b = PeriodicBox::orthorhombic(2.0, 3.0, 4.0).unwrap();
        assert_relative_eq!(b.volume(), 24.0, epsilon = 1e-12);
    }
}
