//! # Unit Composition
//!
//! A unit is a body model plus an optional turret (`<name>tur`) and
//! barrel (`<name>barl`), each a `.vxl` with its `.hva`, found next to the
//! body file. All parts share one renderer, appended in that order.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use vxlview_formats::{AnimationSet, LimbPose, VoxelModel};
use vxlview_rendering::{AnimationPose, GpuDevice, Renderer};

use crate::error::{AppError, AppResult};

/// Role of a model inside a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Part {
    /// Hull, always present.
    Body,
    /// Rotates with the turret angle.
    Turret,
    /// Follows the turret.
    Barrel,
}

impl Part {
    /// Load order.
    pub const ALL: [Self; 3] = [Self::Body, Self::Turret, Self::Barrel];

    /// File stem suffix appended to the body name.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Body => "",
            Self::Turret => "tur",
            Self::Barrel => "barl",
        }
    }
}

/// File pair for one part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartFiles {
    /// Role
    pub part: Part,
    /// `.vxl` path
    pub vxl: PathBuf,
    /// `.hva` path
    pub hva: PathBuf,
}

impl PartFiles {
    fn for_stem(part: Part, dir: &Path, name: &str) -> Self {
        let stem = format!("{name}{}", part.suffix());
        Self {
            part,
            vxl: dir.join(format!("{stem}.vxl")),
            hva: dir.join(format!("{stem}.hva")),
        }
    }
}

/// Parts found on disk for a body file.
///
/// Turret and barrel are included only when both of their files exist.
///
/// # Errors
///
/// [`AppError::MissingModel`] when the body `.vxl` or `.hva` is absent.
pub fn discover(body: &Path) -> AppResult<Vec<PartFiles>> {
    let dir = body.parent().unwrap_or_else(|| Path::new("."));
    let name = body
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AppError::MissingModel(body.display().to_string()))?;

    let mut parts = Vec::with_capacity(Part::ALL.len());
    for part in Part::ALL {
        let files = PartFiles::for_stem(part, dir, name);
        match (files.vxl.is_file(), files.hva.is_file()) {
            (true, true) => parts.push(files),
            (vxl, _) if part == Part::Body => {
                let missing = if vxl { &files.hva } else { &files.vxl };
                return Err(AppError::MissingModel(missing.display().to_string()));
            }
            (true, false) => {
                warn!(path = %files.vxl.display(), "model has no animation file, skipped");
            }
            _ => {}
        }
    }
    Ok(parts)
}

/// Decoded model and animation for one part.
#[derive(Clone, Debug)]
pub struct UnitModel {
    /// Role
    pub part: Part,
    /// Voxel limbs
    pub model: VoxelModel,
    /// Limb matrices
    pub animation: AnimationSet,
}

/// All parts of a unit, decoded.
#[derive(Clone, Debug)]
pub struct Unit {
    name: String,
    models: Vec<UnitModel>,
}

impl Unit {
    /// Discovers and decodes every part of the unit whose body is `body`.
    ///
    /// # Errors
    ///
    /// A missing body file or any decode failure.
    pub fn load(body: &Path) -> AppResult<Self> {
        let name = body
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_owned();
        let mut models = Vec::new();
        for files in discover(body)? {
            let model = VoxelModel::from_file(&files.vxl)?;
            let animation = AnimationSet::from_file(&files.hva)?;
            info!(
                part = ?files.part,
                limbs = model.limb_count(),
                frames = animation.frame_count(),
                "unit part loaded"
            );
            models.push(UnitModel { part: files.part, model, animation });
        }
        Ok(Self { name, models })
    }

    /// Builds a unit from already decoded parts. The first entry should be
    /// the body.
    #[must_use]
    pub fn from_models(name: &str, models: Vec<UnitModel>) -> Self {
        Self { name: name.to_owned(), models }
    }

    /// Body file stem.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parts in load order.
    #[must_use]
    pub fn models(&self) -> &[UnitModel] {
        &self.models
    }

    /// Animation frame count of `part`, zero when absent.
    #[must_use]
    pub fn frame_count(&self, part: Part) -> usize {
        self.models
            .iter()
            .find(|m| m.part == part)
            .map_or(0, |m| m.animation.frame_count())
    }

    /// Frames needed to play every part's animation through a whole
    /// number of times.
    #[must_use]
    pub fn frames_per_direction(&self) -> usize {
        Part::ALL
            .iter()
            .map(|&part| self.frame_count(part).max(1))
            .fold(1, lcm)
    }

    /// Uploads every part, clearing whatever the renderer held before.
    ///
    /// # Errors
    ///
    /// The first failing [`Renderer::load_vxl`]; the renderer is left
    /// without limbs.
    pub fn load_into<D: GpuDevice>(&self, renderer: &mut Renderer<D>) -> AppResult<()> {
        for (i, m) in self.models.iter().enumerate() {
            renderer.load_vxl(&m.model, &m.animation, 0, i == 0)?;
        }
        Ok(())
    }

    /// One pose per part: the body turns by `angle`, turret and barrel by
    /// `angle + turret_angle` after shifting by `turret_offset`.
    #[must_use]
    pub fn poses(&self, frame: usize, angle: f32, turret_angle: f32, turret_offset: f32) -> Vec<AnimationPose<'_>> {
        self.models
            .iter()
            .map(|m| {
                let pose = match m.part {
                    Part::Body => LimbPose { prerotation: angle, offset: 0.0 },
                    Part::Turret | Part::Barrel => LimbPose {
                        prerotation: angle + turret_angle,
                        offset: turret_offset,
                    },
                };
                AnimationPose { animation: &m.animation, frame, pose }
            })
            .collect()
    }
}

/// Greatest common divisor.
#[must_use]
pub const fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Least common multiple; zero when either side is zero.
#[must_use]
pub const fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vxlview_formats::testing::{HvaBuilder, LimbSpec, VxlBuilder};
    use vxlview_formats::Voxel;

    fn part(part: Part, frames: u32) -> UnitModel {
        let vxl = VxlBuilder::new()
            .limb(LimbSpec::new("hull", (1, 1, 1)).voxel(0, 0, 0, Voxel::new(5, 0)))
            .build();
        UnitModel {
            part,
            model: VoxelModel::decode(&vxl).unwrap(),
            animation: AnimationSet::decode(&HvaBuilder::new(frames, 1).build()).unwrap(),
        }
    }

    #[test]
    fn test_lcm_and_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(lcm(4, 6), 12);
        assert_eq!(lcm(1, 7), 7);
        assert_eq!(lcm(0, 3), 0);
    }

    #[test]
    fn test_frames_per_direction_covers_every_part() {
        let unit = Unit::from_models("tank", vec![part(Part::Body, 4), part(Part::Turret, 6), part(Part::Barrel, 3)]);
        assert_eq!(unit.frames_per_direction(), 12);

        let body_only = Unit::from_models("tank", vec![part(Part::Body, 5)]);
        assert_eq!(body_only.frames_per_direction(), 5);
        assert_eq!(body_only.frame_count(Part::Turret), 0);
    }

    #[test]
    fn test_turret_pose_follows_turret_angle() {
        let unit = Unit::from_models("tank", vec![part(Part::Body, 1), part(Part::Turret, 1)]);
        let poses = unit.poses(3, 1.0, 0.5, 2.0);
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].pose, LimbPose { prerotation: 1.0, offset: 0.0 });
        assert_eq!(poses[1].pose, LimbPose { prerotation: 1.5, offset: 2.0 });
        assert!(poses.iter().all(|p| p.frame == 3));
    }
}
