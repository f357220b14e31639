//! Limb transform composition and the isometric projection.
//!
//! Shared by every consumer of a posed limb, so CPU-side tools and the GPU
//! kernels place voxels identically.

use crate::hva::AnimationSet;
use crate::math::{Mat4, Matrix3x4, Vec3};
use crate::vxl::LimbTailer;

/// Depth scale of the isometric projection.
pub const PROJECTION_FAR: f64 = 5000.0;

/// How one model's limbs are posed for a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LimbPose {
    /// Rotation about +Z applied before the world matrix, radians.
    pub prerotation: f32,
    /// Shift along X applied before the prerotation.
    pub offset: f32,
}

/// Matrices for one posed limb.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimbTransform {
    /// Voxel grid coordinates to world.
    pub position: Mat4,
    /// Rotation applied to normals.
    pub normal: Mat4,
}

/// World size of one grid cell: `(max - min) / grid`. A zero grid
/// dimension is treated as one cell.
#[must_use]
pub fn scale_vector(tailer: &LimbTailer) -> Vec3 {
    let grid = tailer.grid_size();
    let guard = |v: f32| if v == 0.0 { 1.0 } else { v };
    let grid = Vec3::new(guard(grid.x), guard(grid.y), guard(grid.z));
    (tailer.max_bounds - tailer.min_bounds).div_elements(grid)
}

/// Converts a stored 3×4 matrix into row-vector form, pre-scaling its
/// translation by `scale_vec * limb_scale`.
#[must_use]
pub fn base_matrix(matrix: &Matrix3x4, scale_vec: Vec3, limb_scale: f32) -> Mat4 {
    let d = &matrix.data;
    let t = matrix.translation().mul_elements(scale_vec) * limb_scale;
    Mat4::from_rows([
        [d[0][0], d[1][0], d[2][0], 0.0],
        [d[0][1], d[1][1], d[2][1], 0.0],
        [d[0][2], d[1][2], d[2][2], 0.0],
        [t.x, t.y, t.z, 1.0],
    ])
}

/// Composes the limb matrices:
///
/// ```text
/// position = T(min) · S(scale_vec) · base · T(offset, 0, 0) · Rz(prerotation) · world
/// normal   = rotation part of base · Rz(prerotation) · world
/// ```
#[must_use]
pub fn compose(tailer: &LimbTailer, matrix: &Matrix3x4, pose: LimbPose, world: &Mat4) -> LimbTransform {
    let scale_vec = scale_vector(tailer);
    let base = base_matrix(matrix, scale_vec, tailer.scale);
    let rotation = Mat4::rotation_z(pose.prerotation);

    let position = Mat4::translation(tailer.min_bounds)
        * Mat4::scaling(scale_vec)
        * base
        * Mat4::translation(Vec3::new(pose.offset, 0.0, 0.0))
        * rotation
        * *world;
    let normal = (base * rotation * *world).without_translation();
    LimbTransform { position, normal }
}

/// Composes every limb of a model for `frame` of `animation`. The frame is
/// used as given; `None` when any section's matrix is absent.
#[must_use]
pub fn compose_model<'a>(
    tailers: impl IntoIterator<Item = &'a LimbTailer>,
    animation: &AnimationSet,
    frame: usize,
    pose: LimbPose,
    world: &Mat4,
) -> Option<Vec<LimbTransform>> {
    tailers
        .into_iter()
        .enumerate()
        .map(|(section, tailer)| {
            animation
                .matrix(frame, section)
                .map(|matrix| compose(tailer, matrix, pose, world))
        })
        .collect()
}

/// Isometric projection onto a `width × height` canvas. Returns screen
/// `x`, `y` and a depth where smaller is nearer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn project_isometric(width: u32, height: u32, p: Vec3) -> Vec3 {
    let (w, h) = (f64::from(width), f64::from(height));
    let (x, y, z) = (f64::from(p.x), f64::from(p.y), f64::from(p.z));
    let sqrt2 = std::f64::consts::SQRT_2;
    let sqrt3 = 3.0_f64.sqrt();

    let sx = w / 2.0 + (x - y) / sqrt2;
    let sy = h / 2.0 + (x + y) / 2.0 / sqrt2 - z * sqrt3 / 2.0;
    let depth = sqrt3 / 2.0 / PROJECTION_FAR * (4000.0 * sqrt2 / 3.0 - (x + y) / sqrt2 - z / sqrt3);
    Vec3::new(sx as f32, sy as f32, depth as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normals::NormalEncoding;

    fn tailer(grid: (u8, u8, u8), min: Vec3, max: Vec3) -> LimbTailer {
        LimbTailer {
            span_start_offset: 0,
            span_end_offset: 0,
            span_data_offset: 0,
            scale: 1.0,
            transform: Matrix3x4::IDENTITY,
            min_bounds: min,
            max_bounds: max,
            x_size: grid.0,
            y_size: grid.1,
            z_size: grid.2,
            normal_encoding: NormalEncoding::RedAlert2,
        }
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_scale_vector_guards_zero_grid() {
        let t = tailer((4, 0, 2), Vec3::ZERO, Vec3::new(8.0, 3.0, 1.0));
        assert_eq!(scale_vector(&t), Vec3::new(2.0, 3.0, 0.5));
    }

    #[test]
    fn test_identity_pose_maps_grid_to_bounds() {
        let t = tailer((10, 10, 10), Vec3::splat(-5.0), Vec3::splat(5.0));
        let m = compose(&t, &Matrix3x4::IDENTITY, LimbPose::default(), &Mat4::IDENTITY);
        assert!(close(m.position.transform_point(Vec3::ZERO), Vec3::splat(-5.0)));
        assert!(close(m.position.transform_point(Vec3::splat(10.0)), Vec3::splat(5.0)));
        assert_eq!(m.normal, Mat4::IDENTITY);
    }

    #[test]
    fn test_hva_translation_is_prescaled() {
        let t = tailer((2, 2, 2), Vec3::ZERO, Vec3::splat(4.0));
        let mut matrix = Matrix3x4::IDENTITY;
        matrix.data[0][3] = 1.0;
        let m = compose(&t, &matrix, LimbPose::default(), &Mat4::IDENTITY);
        // translation 1 * scale_vec 2 * limb scale 1
        assert!(close(m.position.transform_point(Vec3::ZERO), Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_offset_then_prerotation() {
        let t = tailer((1, 1, 1), Vec3::ZERO, Vec3::ONE);
        let pose = LimbPose { prerotation: std::f32::consts::FRAC_PI_2, offset: 3.0 };
        let m = compose(&t, &Matrix3x4::IDENTITY, pose, &Mat4::IDENTITY);
        // offset along x, then a quarter turn carries it onto y
        assert!(close(m.position.transform_point(Vec3::ZERO), Vec3::new(0.0, 3.0, 0.0)));
        assert!(close(m.normal.transform_vector(Vec3::X), Vec3::Y));
    }

    #[test]
    fn test_projection_center_and_depth_order() {
        let c = project_isometric(256, 256, Vec3::ZERO);
        assert!((c.x - 128.0).abs() < 1e-4 && (c.y - 128.0).abs() < 1e-4);
        let near = project_isometric(256, 256, Vec3::new(10.0, 10.0, 10.0));
        assert!(near.z < c.z);
    }
}
