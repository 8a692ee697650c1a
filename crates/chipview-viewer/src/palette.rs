//! Layer colours and the per-mesh material

use chipview_core::Color;

/// Colours cycled through for meshes whose name names no known layer.
pub const LAYER_COLORS: [u32; 10] = [
    0x4fc3f7, 0xba68c8, 0x4db6ac, 0xff8a65, 0x7986cb, 0xaed581, 0xf06292, 0xffd54f, 0x90a4ae,
    0xe0e0e0,
];

/// Name fragments and the colour they select, checked in order.
const LAYER_RULES: &[(&[&str], u32)] = &[
    (&["via", "contact"], 0xf06292),
    (&["pad", "bond"], 0xffd54f),
    (&["sub", "bulk", "die"], 0x546e7a),
    (&["m1", "metal1", "metal_1"], 0x4fc3f7),
    (&["m2", "metal2", "metal_2"], 0xba68c8),
    (&["m3", "metal3", "metal_3"], 0x4db6ac),
    (&["m4", "metal4", "metal_4"], 0xff8a65),
];

/// Colour for a known chip layer, matched case-insensitively on the mesh name
pub fn layer_color(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    LAYER_RULES
        .iter()
        .find(|(fragments, _)| fragments.iter().any(|f| name.contains(f)))
        .map(|(_, hex)| *hex)
}

/// Colour for the `index`-th mesh of a model
pub fn mesh_color(name: &str, index: usize) -> u32 {
    layer_color(name).unwrap_or(LAYER_COLORS[index % LAYER_COLORS.len()])
}

/// Phong material applied to every chip mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub specular: Color,
    pub shininess: f32,
    pub double_sided: bool,
}

impl Material {
    pub fn for_mesh(name: &str, index: usize) -> Self {
        Self {
            color: Color::from_hex(mesh_color(name, index)),
            specular: Color::from_hex(0x333333),
            shininess: 60.0,
            double_sided: true,
        }
    }
}
