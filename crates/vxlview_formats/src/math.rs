//! Mathematical types shared by the decoders and both renderers.
//!
//! Matrices follow the row-vector convention of the asset tools: a point is
//! a row `[x, y, z, 1]` multiplied on the left, so `a * b` applies `a` first.
//!
//! ```text
//! p' = p * translate(min) * scale(s) * base * world
//!      └──────── applied left to right ────────┘
//! ```

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D Vector - positions, bounds, directions
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Same value in every component
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All ones
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or `None` for the zero vector.
    #[must_use]
    pub fn try_normalize(self) -> Option<Self> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Component-wise product
    #[must_use]
    pub fn mul_elements(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Component-wise quotient
    #[must_use]
    pub fn div_elements(self, other: Self) -> Self {
        Self::new(self.x / other.x, self.y / other.y, self.z / other.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// 3×4 matrix as stored on disk by VXL tailers and HVA frames.
///
/// Rows are `[r0 r1 r2 t]`: a column-vector rotation with the translation in
/// the fourth column.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Matrix3x4 {
    /// Row-major storage, three rows of four floats.
    pub data: [[f32; 4]; 3],
}

impl Matrix3x4 {
    /// Size on disk in bytes.
    pub const SIZE: usize = 48;

    /// Identity rotation, zero translation.
    pub const IDENTITY: Self = Self {
        data: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    /// Creates from rows.
    #[must_use]
    pub const fn from_rows(data: [[f32; 4]; 3]) -> Self {
        Self { data }
    }

    /// Translation column.
    #[must_use]
    pub const fn translation(&self) -> Vec3 {
        Vec3::new(self.data[0][3], self.data[1][3], self.data[2][3])
    }
}

impl Default for Matrix3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 4×4 matrix, row-vector convention.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Mat4 {
    /// `rows[r][c]`
    pub rows: [[f32; 4]; 4],
}

impl Mat4 {
    /// Identity matrix
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates from rows.
    #[must_use]
    pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }

    /// Translation by `t` (stored in the fourth row).
    #[must_use]
    pub const fn translation(t: Vec3) -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [t.x, t.y, t.z, 1.0],
        ])
    }

    /// Non-uniform scale.
    #[must_use]
    pub const fn scaling(s: Vec3) -> Self {
        Self::from_rows([
            [s.x, 0.0, 0.0, 0.0],
            [0.0, s.y, 0.0, 0.0],
            [0.0, 0.0, s.z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Rotation about +Z by `angle` radians.
    #[must_use]
    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([
            [c, s, 0.0, 0.0],
            [-s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Transposed copy.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in self.rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                out[c][r] = *value;
            }
        }
        Self::from_rows(out)
    }

    /// Same matrix with the translation row cleared.
    #[must_use]
    pub fn without_translation(&self) -> Self {
        let mut out = *self;
        out.rows[3] = [0.0, 0.0, 0.0, 1.0];
        out
    }

    /// Transforms a point (`w = 1`).
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.transform([p.x, p.y, p.z, 1.0])
    }

    /// Transforms a direction (`w = 0`), ignoring translation.
    #[must_use]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.transform([v.x, v.y, v.z, 0.0])
    }

    #[inline]
    fn transform(&self, v: [f32; 4]) -> Vec3 {
        let m = &self.rows;
        let col = |c: usize| v[0] * m[0][c] + v[1] * m[1][c] + v[2] * m[2][c] + v[3] * m[3][c];
        Vec3::new(col(0), col(1), col(2))
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Mat4 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (r, out_row) in out.iter_mut().enumerate() {
            for (c, cell) in out_row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.rows[r][k] * rhs.rows[k][c]).sum();
            }
        }
        Self::from_rows(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_translation_applies_to_points_only() {
        let t = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_vector(Vec3::X), Vec3::X);
    }

    #[test]
    fn test_row_vector_order() {
        // scale first, then translate
        let m = Mat4::scaling(Vec3::splat(2.0)) * Mat4::translation(Vec3::X);
        assert!(approx(m.transform_point(Vec3::X), Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let r = Mat4::rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(approx(r.transform_vector(Vec3::X), Vec3::Y));
    }

    #[test]
    fn test_try_normalize() {
        assert!(Vec3::ZERO.try_normalize().is_none());
        let n = Vec3::new(3.0, 0.0, 4.0).try_normalize().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transpose_roundtrip() {
        let m = Mat4::rotation_z(0.3) * Mat4::translation(Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(m.transpose().transpose(), m);
    }
}
