//! 3-vector and 3x3 matrix algebra used by the HTM indexer.
//!
//! Mirrors a small subset of the Eigen `Vector3d`/`Matrix3d` API, exactly as
//! the original partitioner's `Vector.h` did, so that swapping in a fuller
//! linear algebra crate later is a drop-in change if ever needed.

use snafu::prelude::*;

/// A 3-component column vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3d {
    c: [f64; 3],
}

impl Vector3d {
    /// Construct from components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { c: [x, y, z] }
    }

    /// The i-th component.
    pub fn get(&self, i: usize) -> f64 {
        self.c[i]
    }

    /// The x component.
    pub fn x(&self) -> f64 {
        self.c[0]
    }

    /// The y component.
    pub fn y(&self) -> f64 {
        self.c[1]
    }

    /// The z component.
    pub fn z(&self) -> f64 {
        self.c[2]
    }

    /// The dot (inner) product of `self` and `v`.
    pub fn dot(&self, v: &Vector3d) -> f64 {
        self.c[0] * v.c[0] + self.c[1] * v.c[1] + self.c[2] * v.c[2]
    }

    /// The L2 norm.
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// A normalized copy of this vector.
    pub fn normalized(&self) -> Vector3d {
        let n = self.norm();
        Vector3d::new(self.c[0] / n, self.c[1] / n, self.c[2] / n)
    }

    /// The cross product of `self` and `v`.
    pub fn cross(&self, v: &Vector3d) -> Vector3d {
        Vector3d::new(
            self.c[1] * v.c[2] - self.c[2] * v.c[1],
            self.c[2] * v.c[0] - self.c[0] * v.c[2],
            self.c[0] * v.c[1] - self.c[1] * v.c[0],
        )
    }

    /// Convert a `(ra, dec)` position in degrees to a unit vector on the
    /// sphere.
    pub fn from_ra_dec_deg(ra_deg: f64, dec_deg: f64) -> Vector3d {
        let ra = ra_deg.to_radians();
        let dec = dec_deg.to_radians();
        Vector3d::new(
            dec.cos() * ra.cos(),
            dec.cos() * ra.sin(),
            dec.sin(),
        )
    }
}

impl std::ops::Mul<f64> for Vector3d {
    type Output = Vector3d;
    fn mul(self, s: f64) -> Vector3d {
        Vector3d::new(self.c[0] * s, self.c[1] * s, self.c[2] * s)
    }
}

impl std::ops::Add for Vector3d {
    type Output = Vector3d;
    fn add(self, v: Vector3d) -> Vector3d {
        Vector3d::new(self.c[0] + v.c[0], self.c[1] + v.c[1], self.c[2] + v.c[2])
    }
}

impl std::ops::Sub for Vector3d {
    type Output = Vector3d;
    fn sub(self, v: Vector3d) -> Vector3d {
        Vector3d::new(self.c[0] - v.c[0], self.c[1] - v.c[1], self.c[2] - v.c[2])
    }
}

/// Returned when a [`Matrix3d`] cannot be inverted.
#[derive(Debug, Snafu, PartialEq)]
pub enum MatrixError {
    /// The matrix's determinant magnitude is below the singularity
    /// threshold.
    #[snafu(display("matrix is singular (|det| < eps)"))]
    SingularMatrix,
}

const SINGULAR_EPS: f64 = 1e-12;

/// A 3x3 matrix, stored column-major like `Vector.h`'s `Matrix3d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3d {
    col: [Vector3d; 3],
}

impl Matrix3d {
    /// The identity matrix.
    pub fn identity() -> Matrix3d {
        Matrix3d {
            col: [
                Vector3d::new(1.0, 0.0, 0.0),
                Vector3d::new(0.0, 1.0, 0.0),
                Vector3d::new(0.0, 0.0, 1.0),
            ],
        }
    }

    /// Construct from three columns.
    pub fn from_columns(c0: Vector3d, c1: Vector3d, c2: Vector3d) -> Matrix3d {
        Matrix3d { col: [c0, c1, c2] }
    }

    /// The scalar at row `r`, column `c`.
    pub fn at(&self, r: usize, c: usize) -> f64 {
        self.col[c].get(r)
    }

    /// Multiply this matrix by vector `v`.
    pub fn mul_vec(&self, v: &Vector3d) -> Vector3d {
        self.col[0] * v.get(0) + self.col[1] * v.get(1) + self.col[2] * v.get(2)
    }

    /// The inverse of this matrix, via the adjugate and determinant.
    pub fn inverse(&self) -> Result<Matrix3d, MatrixError> {
        let m = self;
        // First column of the adjugate matrix.
        let a0 = Vector3d::new(
            m.at(1, 1) * m.at(2, 2) - m.at(2, 1) * m.at(1, 2),
            m.at(1, 2) * m.at(2, 0) - m.at(2, 2) * m.at(1, 0),
            m.at(1, 0) * m.at(2, 1) - m.at(2, 0) * m.at(1, 1),
        );
        let det = a0.get(0) * m.at(0, 0) + a0.get(1) * m.at(0, 1) + a0.get(2) * m.at(0, 2);
        ensure!(det.abs() >= SINGULAR_EPS, SingularMatrixSnafu);
        let inv_det = 1.0 / det;

        let c0 = a0 * inv_det;
        let c1 = Vector3d::new(
            (m.at(0, 2) * m.at(2, 1) - m.at(2, 2) * m.at(0, 1)) * inv_det,
            (m.at(0, 0) * m.at(2, 2) - m.at(2, 0) * m.at(0, 2)) * inv_det,
            (m.at(0, 1) * m.at(2, 0) - m.at(2, 1) * m.at(0, 0)) * inv_det,
        );
        let c2 = Vector3d::new(
            (m.at(0, 1) * m.at(1, 2) - m.at(1, 1) * m.at(0, 2)) * inv_det,
            (m.at(0, 2) * m.at(1, 0) - m.at(1, 2) * m.at(0, 0)) * inv_det,
            (m.at(0, 0) * m.at(1, 1) - m.at(1, 0) * m.at(0, 1)) * inv_det,
        );
        Ok(Matrix3d::from_columns(c0, c1, c2))
    }
}
