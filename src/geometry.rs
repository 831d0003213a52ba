//! Small geometry value types used by calibration, pose estimation and compositing.
//!
//! - `Point2`: pixel coordinates.
//! - `Homography`: planar 3×3 projective mapping (model image -> camera frame).
//! - `Mat3x4`: 3×4 projection / rigid transform with named operations.
//! - `Intrinsics`: pinhole camera parameters.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Below this magnitude a homogeneous coordinate is treated as a point at infinity.
const HOMOGENEOUS_EPS: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

// ----------------------------------------------------------------------------
// Homography
// ----------------------------------------------------------------------------

/// Planar projective mapping from model-image pixels to camera-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self(m)
    }

    /// Axis-aligned scaling, e.g. model resolution to frame resolution.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self(Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Map a point. Returns `None` for points sent to infinity.
    pub fn apply(&self, p: Point2) -> Option<Point2> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < HOMOGENEOUS_EPS {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|i, j| rows[i][j]))
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = h.0[(i, j)];
            }
        }
        rows
    }
}

// ----------------------------------------------------------------------------
// Mat3x4
// ----------------------------------------------------------------------------

/// A 3×4 matrix: either a camera projection `K [R | t]` or a rigid transform `[R | t]`.
///
/// Composition treats the right-hand operand as an affine 4×4 matrix with an
/// implicit `[0 0 0 1]` bottom row, so `projection.mul(&object_transform)` is
/// the projection of object coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 4]; 3]", into = "[[f64; 4]; 3]")]
pub struct Mat3x4(Matrix3x4<f64>);

impl Mat3x4 {
    pub fn identity() -> Self {
        Self(Matrix3x4::identity())
    }

    pub fn from_matrix(m: Matrix3x4<f64>) -> Self {
        Self(m)
    }

    /// Build from a rotation block and a translation column.
    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut m = Matrix3x4::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        m.set_column(3, translation);
        Self(m)
    }

    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self::from_parts(&Matrix3::identity(), &Vector3::new(x, y, z))
    }

    /// Rotation of `angle` radians about `axis`. A zero axis yields the identity.
    pub fn rotation(axis: Vector3<f64>, angle: f64) -> Self {
        let rotation = Unit::try_new(axis, HOMOGENEOUS_EPS)
            .map(|axis| Rotation3::from_axis_angle(&axis, angle).into_inner())
            .unwrap_or_else(Matrix3::identity);
        Self::from_parts(&rotation, &Vector3::zeros())
    }

    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    /// `self · rhs`, with `rhs` promoted to an affine 4×4 matrix.
    pub fn mul(&self, rhs: &Mat3x4) -> Mat3x4 {
        Mat3x4(self.0 * affine(&rhs.0))
    }

    /// Project an object-space point into pixel coordinates.
    pub fn project(&self, p: Vector3<f64>) -> Option<Point2> {
        let v = self.0 * p.push(1.0);
        if v.z.abs() < HOMOGENEOUS_EPS {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }

    pub fn rotation_block(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation_column(&self) -> Vector3<f64> {
        self.0.column(3).into_owned()
    }
}

fn affine(m: &Matrix3x4<f64>) -> Matrix4<f64> {
    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 4>(0, 0).copy_from(m);
    out
}

impl From<[[f64; 4]; 3]> for Mat3x4 {
    fn from(rows: [[f64; 4]; 3]) -> Self {
        Self(Matrix3x4::from_fn(|i, j| rows[i][j]))
    }
}

impl From<Mat3x4> for [[f64; 4]; 3] {
    fn from(m: Mat3x4) -> Self {
        let mut rows = [[0.0; 4]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = m.0[(i, j)];
            }
        }
        rows
    }
}

// ----------------------------------------------------------------------------
// Intrinsics
// ----------------------------------------------------------------------------

/// Pinhole intrinsics (no distortion).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn inverse(&self) -> Option<Matrix3<f64>> {
        self.matrix().try_inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn translate_then_rotate_matches_object_transform() {
        let moved = Mat3x4::translation(10.0, 20.0, -90.0)
            .mul(&Mat3x4::rotation(Vector3::new(1.0, 0.0, 0.0), PI));

        assert!(moved.project(Vector3::new(1.0, 1.0, 0.0)).is_some());
        assert!(approx(moved.get(1, 1), -1.0));
        assert!(approx(moved.get(2, 2), -1.0));
        assert!(approx(moved.get(0, 3), 10.0));
        assert!(approx(moved.get(2, 3), -90.0));
    }

    #[test]
    fn identity_is_neutral_for_mul() {
        let t = Mat3x4::translation(1.0, 2.0, 3.0);
        assert_eq!(t.mul(&Mat3x4::identity()), t);
        assert_eq!(Mat3x4::identity().mul(&t), t);
    }

    #[test]
    fn zero_axis_rotation_is_identity() {
        assert_eq!(Mat3x4::rotation(Vector3::zeros(), 1.0), Mat3x4::identity());
    }

    #[test]
    fn homography_scale_maps_corners() {
        let h = Homography::scale(0.5, 2.0);
        let p = h.apply(Point2::new(100.0, 10.0)).unwrap();
        assert!(approx(p.x, 50.0));
        assert!(approx(p.y, 20.0));
    }

    #[test]
    fn matrices_serialize_as_row_arrays() {
        let m = Mat3x4::translation(1.0, 2.0, 3.0);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,0.0,0.0,1.0],[0.0,1.0,0.0,2.0],[0.0,0.0,1.0,3.0]]");
        let back: Mat3x4 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
