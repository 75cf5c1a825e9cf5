use std::fmt;
use std::ops::Mul;

/// Affine map from (col, row) cell coordinates to (x, y) world coordinates:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Pure scaling about the origin.
    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, 0.0, sy, 0.0)
    }

    /// Map a (col, row) position to world coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Inverse transform (world → cell), or `None` if degenerate.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        let c = -(a * self.c + b * self.f);
        let f = -(d * self.c + e * self.f);
        Some(Self::new(a, b, c, d, e, f))
    }
}

impl Mul for Affine {
    type Output = Affine;

    /// `self * rhs` applies `rhs` first, then `self`.
    fn mul(self, rhs: Affine) -> Affine {
        Affine::new(
            self.a * rhs.a + self.b * rhs.d,
            self.a * rhs.b + self.b * rhs.e,
            self.a * rhs.c + self.b * rhs.f + self.c,
            self.d * rhs.a + self.e * rhs.d,
            self.d * rhs.b + self.e * rhs.e,
            self.d * rhs.c + self.e * rhs.f + self.f,
        )
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Affine({}, {}, {}, {}, {}, {})", self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips_cell_positions() {
        let t = Affine::new(10.0, 0.0, 1000.0, 0.0, -10.0, 5000.0);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(3.5, 7.25);
        let (col, row) = inv.apply(x, y);
        assert!((col - 3.5).abs() < 1e-9);
        assert!((row - 7.25).abs() < 1e-9);
    }

    #[test]
    fn scaling_refines_cell_size() {
        let t = Affine::new(10.0, 0.0, 1000.0, 0.0, -10.0, 5000.0);
        let fine = t * Affine::scale(0.25, 0.25);
        assert_eq!(fine, Affine::new(2.5, 0.0, 1000.0, 0.0, -2.5, 5000.0));
        // fine cell 4 is coarse cell 1
        assert_eq!(fine.apply(4.0, 4.0), t.apply(1.0, 1.0));
    }

    #[test]
    fn degenerate_has_no_inverse() {
        assert!(Affine::scale(0.0, 1.0).inverse().is_none());
    }
}
