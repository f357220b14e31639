//! Voxel Kernels
//!
//! WGSL source for the two compute passes:
//! 1. Shade - one invocation per voxel record. Poses and projects the
//!    voxel, picks its lighting section, remaps the color through the VPL
//!    and keeps the nearest voxel per pixel with an atomic max.
//! 2. Resolve - one invocation per pixel. Turns canvas keys into RGBA.
//!
//! ## Canvas layout
//!
//! Two `u32` per pixel:
//!
//! ```text
//! word 0 (key):  [31..9] nearness   [8] remap flag   [7..0] palette index
//! word 1:        number of voxels that hit the pixel
//! ```
//!
//! Nearness is `1 - depth` scaled to 23 bits and never 0, so a zero key
//! always means "no voxel".

/// Bits of the key holding the palette index.
pub const KEY_INDEX_MASK: u32 = 0xFF;

/// Key bit set for colors inside the model's remap range.
pub const KEY_REMAP_FLAG: u32 = 1 << 8;

/// Shift of the nearness field.
pub const KEY_NEARNESS_SHIFT: u32 = 9;

/// Largest nearness value.
pub const KEY_NEARNESS_MAX: u32 = (1 << 23) - 1;

/// Builds a canvas key.
#[must_use]
pub const fn pack_key(nearness: u32, remapped: bool, index: u8) -> u32 {
    let flag = if remapped { KEY_REMAP_FLAG } else { 0 };
    (nearness & KEY_NEARNESS_MAX) << KEY_NEARNESS_SHIFT | flag | index as u32
}

/// One decoded canvas pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CanvasSample {
    /// Raw key word.
    pub key: u32,
    /// Voxels that landed on the pixel.
    pub hits: u32,
}

impl CanvasSample {
    /// No voxel reached this pixel.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.key == 0
    }

    /// Palette index of the nearest voxel.
    #[must_use]
    pub const fn palette_index(self) -> u8 {
        (self.key & KEY_INDEX_MASK) as u8
    }

    /// Whether the nearest voxel takes the remap colour.
    #[must_use]
    pub const fn is_remapped(self) -> bool {
        self.key & KEY_REMAP_FLAG != 0
    }

    /// Nearness of the winning voxel; larger is closer.
    #[must_use]
    pub const fn nearness(self) -> u32 {
        self.key >> KEY_NEARNESS_SHIFT
    }
}

/// Splits raw canvas bytes (as returned by `front_buffer_data`) into samples.
#[must_use]
pub fn decode_canvas(bytes: &[u8]) -> Vec<CanvasSample> {
    bytes
        .chunks_exact(8)
        .map(|px| CanvasSample {
            key: u32::from_le_bytes([px[0], px[1], px[2], px[3]]),
            hits: u32::from_le_bytes([px[4], px[5], px[6], px[7]]),
        })
        .collect()
}

/// Shading kernel. Bindings: canvas, voxels, limb constants, VPL table.
pub const SHADE_WGSL: &str = r"
// Voxel Shade Compute Shader

struct Voxel {
    color: u32,
    normal: u32,
    x: u32,
    y: u32,
    z: u32,
}

struct Limb {
    transform: mat4x4<f32>,   // row-vector matrix, rows stored as columns
    canvas: vec4<f32>,        // width, height, _, _
    info: vec4<u32>,          // remap start, remap end, sections, records
    sections: array<vec4<u32>, 64>,
}

@group(0) @binding(0) var<storage, read_write> canvas: array<atomic<u32>>;
@group(0) @binding(1) var<storage, read> voxels: array<Voxel>;
@group(0) @binding(2) var<uniform> limb: Limb;
@group(0) @binding(3) var<storage, read> vpl: array<u32>;

const SQRT2: f32 = 1.4142135;
const SQRT3: f32 = 1.7320508;
const FAR: f32 = 5000.0;
const NEARNESS_MAX: f32 = 8388607.0;

@compute @workgroup_size(64)
fn main(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let idx = gid.y * groups.x * 64u + gid.x;
    if idx >= limb.info.w {
        return;
    }
    let v = voxels[idx];
    if v.color == 0u {
        return;
    }

    let p = limb.transform * vec4<f32>(f32(v.x), f32(v.y), f32(v.z), 1.0);
    let w = limb.canvas.x;
    let h = limb.canvas.y;
    let sx = w * 0.5 + (p.x - p.y) / SQRT2;
    let sy = h * 0.5 + (p.x + p.y) / 2.0 / SQRT2 - p.z * SQRT3 / 2.0;
    if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
        return;
    }
    let depth = SQRT3 / 2.0 / FAR * (4000.0 * SQRT2 / 3.0 - (p.x + p.y) / SQRT2 - p.z / SQRT3);
    let nearness = max(u32(clamp(1.0 - depth, 0.0, 1.0) * NEARNESS_MAX), 1u);

    let section = min(limb.sections[v.normal / 4u][v.normal % 4u], max(limb.info.z, 1u) - 1u);
    let index = vpl[section * 256u + v.color] & 0xFFu;
    var flag = 0u;
    if v.color >= limb.info.x && v.color <= limb.info.y {
        flag = 1u;
    }

    let key = (nearness << 9u) | (flag << 8u) | index;
    let pixel = u32(sy) * u32(w) + u32(sx);
    atomicMax(&canvas[pixel * 2u], key);
    atomicAdd(&canvas[pixel * 2u + 1u], 1u);
}
";

/// Resolve kernel. Bindings: canvas, target pixels, palette, scene constants.
pub const RESOLVE_WGSL: &str = r"
// Canvas Resolve Compute Shader

struct Scene {
    background: vec4<f32>,
    remap: vec4<f32>,
    canvas: vec4<u32>,   // width, height, _, _
    light: vec4<f32>,    // extra light, _, _, _
}

@group(0) @binding(0) var<storage, read> canvas: array<u32>;
@group(0) @binding(1) var<storage, read_write> target_pixels: array<u32>;
@group(0) @binding(2) var<storage, read> palette: array<u32>;
@group(0) @binding(3) var<uniform> scene: Scene;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if gid.x >= scene.canvas.x || gid.y >= scene.canvas.y {
        return;
    }
    let pixel = gid.y * scene.canvas.x + gid.x;
    let key = canvas[pixel * 2u];
    if key == 0u {
        target_pixels[pixel] = pack4x8unorm(scene.background);
        return;
    }

    var rgb = unpack4x8unorm(palette[key & 0xFFu]).rgb;
    if (key & 0x100u) != 0u {
        let luma = dot(rgb, vec3<f32>(0.299, 0.587, 0.114));
        rgb = scene.remap.rgb * luma;
    }
    rgb = clamp(rgb * (1.0 + scene.light.x), vec3<f32>(0.0), vec3<f32>(1.0));
    target_pixels[pixel] = pack4x8unorm(vec4<f32>(rgb, 1.0));
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_prefers_nearer() {
        let far = pack_key(10, true, 255);
        let near = pack_key(11, false, 1);
        assert!(near > far);
    }

    #[test]
    fn test_key_fields() {
        let sample = CanvasSample { key: pack_key(KEY_NEARNESS_MAX, true, 42), hits: 3 };
        assert_eq!(sample.palette_index(), 42);
        assert!(sample.is_remapped());
        assert_eq!(sample.nearness(), KEY_NEARNESS_MAX);
        assert!(!sample.is_empty());
    }

    #[test]
    fn test_decode_canvas() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&pack_key(5, false, 7).to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 8]);
        let samples = decode_canvas(&bytes);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].palette_index(), 7);
        assert_eq!(samples[0].hits, 2);
        assert!(samples[1].is_empty());
    }

    #[test]
    fn test_kernels_declare_four_bindings() {
        for source in [SHADE_WGSL, RESOLVE_WGSL] {
            for binding in 0..4 {
                assert!(source.contains(&format!("@binding({binding})")));
            }
            assert!(!source.contains("@binding(4)"));
            assert!(source.contains("fn main("));
        }
    }
}
