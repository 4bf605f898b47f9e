//! The geometry engine boundary (§1: "the IFC geometry engine, treated as a
//! black box returning vertex/face/material arrays per element") plus the
//! pure conversion laws the IFC builder (C6) applies to whatever the engine
//! returns: coordinate permutation, material color normalization, and index
//! component-type selection.

use crate::error::Result;
use tilechunk_json::accessor::ComponentType;

/// Draw mode of one geometry group, mirroring `tilechunk_json::mesh::Mode`'s
/// two relevant variants (a IfcBuilder-produced primitive is either solid
/// triangles or wireframe edges, never points or strips).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Topology {
    Triangles,
    Lines,
}

/// A material as reported by the geometry engine, before color-law
/// normalization: `diffuse` may be either 0..1 or 0..255 range, matching
/// whatever convention the underlying engine uses.
#[derive(Clone, Debug)]
pub struct EngineMaterial {
    pub name: String,
    pub diffuse: [f32; 3],
    pub transparency: f32,
}

/// One triangle (or line) group for a single element/material pair: flat
/// XYZ vertex positions in the geometry engine's coordinate space, and
/// indices into that vertex array.
#[derive(Clone, Debug)]
pub struct TriangleGroup {
    pub material: EngineMaterial,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

/// External collaborator that turns one IFC element's representation into
/// triangle groups, one group per material. Kept as a trait so the builder
/// can be exercised against a fake engine returning canned geometry.
pub trait GeometryEngine {
    /// Returns one group per material used by `step_id`'s representation.
    /// An empty result means the element has no usable geometry; an error
    /// is a per-element failure the caller logs and skips (§7).
    fn triangle_groups(&self, step_id: u64) -> Result<Vec<TriangleGroup>>;
}

/// Reshapes flat XYZ vertices into glTF's axis convention: (X, Y, Z) becomes
/// (-X, Z, Y).
pub fn permute_coordinates(flat: &[f32]) -> Vec<[f32; 3]> {
    flat.chunks_exact(3)
        .map(|v| [-v[0], v[2], v[1]])
        .collect()
}

/// Normalized glTF material inputs derived from an engine material (§4.5
/// "Materials").
pub struct NormalizedMaterial {
    pub base_color_factor: [f32; 4],
    pub alpha_mode_opaque: bool,
}

/// Applies the IFC color law: diffuse channels above 1 are assumed to be
/// 0..255 and rescaled; alpha is `1 - transparency`; an all-zero diffuse
/// with zero transparency (an engine material with no assignment at all)
/// becomes opaque middle grey rather than opaque black.
pub fn normalize_material(material: &EngineMaterial) -> NormalizedMaterial {
    let mut diffuse = material.diffuse;
    if diffuse.iter().any(|c| *c > 1.0) {
        for c in diffuse.iter_mut() {
            *c /= 255.0;
        }
    }

    let is_unassigned = diffuse == [0.0, 0.0, 0.0] && material.transparency == 0.0;
    let (rgb, alpha) = if is_unassigned {
        ([0.5, 0.5, 0.5], 1.0)
    } else {
        (diffuse, 1.0 - material.transparency)
    };

    NormalizedMaterial {
        base_color_factor: [rgb[0], rgb[1], rgb[2], alpha],
        alpha_mode_opaque: alpha == 1.0,
    }
}

/// Chooses the smallest unsigned integer component type that can hold
/// `max_index` (§8 "Index-type law").
pub fn index_component_type(max_index: u32) -> ComponentType {
    if max_index <= u8::MAX as u32 {
        ComponentType::U8
    } else if max_index <= u16::MAX as u32 {
        ComponentType::U16
    } else {
        ComponentType::U32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unassigned_material_becomes_opaque_grey() {
        let material = EngineMaterial {
            name: "none".into(),
            diffuse: [0.0, 0.0, 0.0],
            transparency: 0.0,
        };
        let normalized = normalize_material(&material);
        assert_eq!(normalized.base_color_factor, [0.5, 0.5, 0.5, 1.0]);
        assert!(normalized.alpha_mode_opaque);
    }

    #[test]
    fn byte_range_diffuse_is_rescaled_and_alpha_from_transparency() {
        let material = EngineMaterial {
            name: "white".into(),
            diffuse: [255.0, 255.0, 255.0],
            transparency: 0.25,
        };
        let normalized = normalize_material(&material);
        assert_relative_eq!(normalized.base_color_factor[0], 1.0);
        assert_relative_eq!(normalized.base_color_factor[3], 0.75);
        assert!(!normalized.alpha_mode_opaque);
    }

    #[test]
    fn index_type_follows_the_three_way_boundary() {
        assert_eq!(index_component_type(0), ComponentType::U8);
        assert_eq!(index_component_type(255), ComponentType::U8);
        assert_eq!(index_component_type(256), ComponentType::U16);
        assert_eq!(index_component_type(65_535), ComponentType::U16);
        assert_eq!(index_component_type(65_536), ComponentType::U32);
    }

    #[test]
    fn coordinate_permutation_swaps_y_and_z_and_negates_x() {
        let flat = [1.0, 2.0, 3.0];
        let reshaped = permute_coordinates(&flat);
        assert_eq!(reshaped, vec![[-1.0, 3.0, 2.0]]);
    }
}
