//! The closed set of asset formats.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};
use crate::hva::AnimationSet;
use crate::palette::Palette;
use crate::vpl::LightingTable;
use crate::vxl::VoxelModel;

/// Asset format tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Voxel model.
    Vxl,
    /// Animation matrices.
    Hva,
    /// Lighting remap table.
    Vpl,
    /// Palette.
    Pal,
}

impl AssetKind {
    /// Infers the kind from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vxl" => Some(Self::Vxl),
            "hva" => Some(Self::Hva),
            "vpl" => Some(Self::Vpl),
            "pal" => Some(Self::Pal),
            _ => None,
        }
    }

    /// Lowercase extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Vxl => "vxl",
            Self::Hva => "hva",
            Self::Vpl => "vpl",
            Self::Pal => "pal",
        }
    }
}

/// Any decoded asset.
#[derive(Clone, Debug, PartialEq)]
pub enum Asset {
    /// Voxel model.
    Vxl(VoxelModel),
    /// Animation matrices.
    Hva(AnimationSet),
    /// Lighting remap table.
    Vpl(LightingTable),
    /// Palette.
    Pal(Palette),
}

impl Asset {
    /// Decodes `data` as `kind`.
    ///
    /// # Errors
    ///
    /// Whatever the format's decoder reports.
    pub fn decode(kind: AssetKind, data: &[u8]) -> FormatResult<Self> {
        Ok(match kind {
            AssetKind::Vxl => Self::Vxl(VoxelModel::decode(data)?),
            AssetKind::Hva => Self::Hva(AnimationSet::decode(data)?),
            AssetKind::Vpl => Self::Vpl(LightingTable::decode(data)?),
            AssetKind::Pal => Self::Pal(Palette::from_bytes(data)?),
        })
    }

    /// Reads a file, picking the decoder from its extension.
    ///
    /// # Errors
    ///
    /// [`FormatError::Io`] for unreadable files or unknown extensions,
    /// otherwise whatever the decoder reports.
    pub fn from_file<P: AsRef<Path>>(path: P) -> FormatResult<Self> {
        let path = path.as_ref();
        let kind = AssetKind::from_path(path).ok_or_else(|| FormatError::Io {
            path: path.display().to_string(),
            reason: "unrecognised asset extension".to_owned(),
        })?;
        let data = std::fs::read(path).map_err(|e| FormatError::io(path, &e))?;
        Self::decode(kind, &data)
    }

    /// Format tag.
    #[must_use]
    pub const fn kind(&self) -> AssetKind {
        match self {
            Self::Vxl(_) => AssetKind::Vxl,
            Self::Hva(_) => AssetKind::Hva,
            Self::Vpl(_) => AssetKind::Vpl,
            Self::Pal(_) => AssetKind::Pal,
        }
    }

    /// Whether the asset holds usable data. Decoded models, tables and
    /// palettes always do; an animation needs at least one matrix.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match self {
            Self::Hva(hva) => hva.is_loaded(),
            Self::Pal(pal) => pal.is_loaded(),
            Self::Vxl(vxl) => vxl.limb_count() > 0,
            Self::Vpl(vpl) => vpl.section_count() > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PALETTE_BYTES;
    use crate::testing::{HvaBuilder, LimbSpec, VxlBuilder};

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AssetKind::from_path(Path::new("units/htnk.VXL")), Some(AssetKind::Vxl));
        assert_eq!(AssetKind::from_path(Path::new("voxels.vpl")), Some(AssetKind::Vpl));
        assert_eq!(AssetKind::from_path(Path::new("readme")), None);
        assert_eq!(AssetKind::Hva.extension(), "hva");
    }

    #[test]
    fn test_decode_dispatch() {
        let pal = Asset::decode(AssetKind::Pal, &[1u8; PALETTE_BYTES]).unwrap();
        assert_eq!(pal.kind(), AssetKind::Pal);
        assert!(pal.is_loaded());

        let vxl = VxlBuilder::new().limb(LimbSpec::new("body", (1, 1, 1))).build();
        assert_eq!(Asset::decode(AssetKind::Vxl, &vxl).unwrap().kind(), AssetKind::Vxl);

        let empty_hva = Asset::decode(AssetKind::Hva, &HvaBuilder::new(0, 0).build()).unwrap();
        assert!(!empty_hva.is_loaded());

        assert!(Asset::decode(AssetKind::Vpl, &[]).is_err());
    }
}
