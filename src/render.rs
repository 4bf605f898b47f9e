//! The preview-image renderer's CLI-facing contract (§1: "the 3D renderer
//! ... treated as a black box", named only where its interface matters, §6).
//! A flat-shaded software rasterizer stands in for the external renderer:
//! it frames the scene's bounding box, orbits a camera around it by the
//! same angle bookkeeping as the source tool, and writes a 1920x1080 PNG.

use crate::error::{ChunkerError, Result};
use crate::model::GltfModel;
use glam::{Mat4, Vec3, Vec4Swizzles};
use image::{Rgba, RgbaImage};
use tilechunk_json::accessor::{Accessor, ComponentType};
use tilechunk_json::buffer;
use tilechunk_json::mesh::{Mode, Primitive, Semantic};
use tilechunk_json::scene::Node;
use tilechunk_json::validation::Checked;
use tilechunk_json::{Index, Root};

pub const WIDTH: u32 = 1920;
pub const HEIGHT: u32 = 1080;

const SENSOR_WIDTH_MM: f32 = 36.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 3000.0;
const AMBIENT: f32 = 0.3;
const LIGHT_DIRECTION: Vec3 = Vec3::new(0.3, 0.8, 0.5);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HorizontalDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerticalDirection {
    Up,
    Down,
}

/// Mirrors the five camera flags in §6's Renderer CLI contract.
#[derive(Clone, Copy, Debug)]
pub struct CameraParams {
    pub focal_length_mm: f32,
    pub distance_multiplier: f32,
    pub horizontal_direction: HorizontalDirection,
    pub horizontal_degrees: f32,
    pub vertical_direction: VerticalDirection,
    pub vertical_degrees: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        CameraParams {
            focal_length_mm: 50.0,
            distance_multiplier: 1.3,
            horizontal_direction: HorizontalDirection::Clockwise,
            horizontal_degrees: 0.0,
            vertical_direction: VerticalDirection::Up,
            vertical_degrees: 0.0,
        }
    }
}

struct Triangle {
    positions: [Vec3; 3],
    color: [f32; 4],
}

/// Renders `model` from the orbiting camera described by `params` into a
/// 1920x1080 RGBA image with a transparent background.
pub fn render(model: &GltfModel, params: &CameraParams) -> Result<RgbaImage> {
    let triangles = gather_triangles(model)?;
    if triangles.is_empty() {
        return Ok(RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([0, 0, 0, 0])));
    }

    let (min, max) = bounding_box(&triangles);
    let center = (min + max) * 0.5;
    let size = max - min;
    let max_dimension = size.x.max(size.y).max(size.z);

    let eye = orbit_camera(center, size, max_dimension, params);
    let view = Mat4::look_at_rh(eye, center, Vec3::Y);
    let fov_y = vertical_fov(params.focal_length_mm);
    let aspect = WIDTH as f32 / HEIGHT as f32;
    let projection = Mat4::perspective_rh(fov_y, aspect, NEAR, FAR);
    let view_projection = projection * view;

    let mut image = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([0, 0, 0, 0]));
    let mut depth = vec![f32::INFINITY; (WIDTH * HEIGHT) as usize];
    for triangle in &triangles {
        rasterize(triangle, &view_projection, &mut image, &mut depth);
    }
    Ok(image)
}

/// Converts a 35mm-style focal length to a vertical field of view, following
/// the same full-frame 36mm sensor convention the source renderer's host
/// application assumes for its `lens` property.
fn vertical_fov(focal_length_mm: f32) -> f32 {
    let horizontal_fov = 2.0 * (SENSOR_WIDTH_MM / (2.0 * focal_length_mm)).atan();
    let aspect = WIDTH as f32 / HEIGHT as f32;
    2.0 * ((horizontal_fov * 0.5).tan() / aspect).atan()
}

/// Places the camera at `distance = max_dimension * distance_multiplier`
/// behind the bounding box center, lifted by half its height, then orbits it
/// by the requested horizontal/vertical degrees around that center. Unlike
/// the source tool (which re-derives the orbit angles from the camera's
/// absolute world position), this orbits relative to `center` so panning a
/// model away from the origin doesn't change the orbit's apparent radius.
fn orbit_camera(center: Vec3, size: Vec3, max_dimension: f32, params: &CameraParams) -> Vec3 {
    let distance = max_dimension * params.distance_multiplier;
    let initial_offset = Vec3::new(0.0, size.y * 0.5, -distance);

    let horizontal_distance = (initial_offset.x.powi(2) + initial_offset.z.powi(2)).sqrt();
    let vertical_distance = (initial_offset.y.powi(2) + horizontal_distance.powi(2)).sqrt();
    let horizontal_angle = initial_offset.z.atan2(initial_offset.x);
    let vertical_angle = initial_offset.y.atan2(horizontal_distance);

    let horizontal_sign = match params.horizontal_direction {
        HorizontalDirection::Clockwise => 1.0,
        HorizontalDirection::CounterClockwise => -1.0,
    };
    let vertical_sign = match params.vertical_direction {
        VerticalDirection::Up => 1.0,
        VerticalDirection::Down => -1.0,
    };

    let new_horizontal_angle = horizontal_angle + params.horizontal_degrees.to_radians() * horizontal_sign;
    let new_vertical_angle = vertical_angle + params.vertical_degrees.to_radians() * vertical_sign;

    let offset = Vec3::new(
        horizontal_distance * new_horizontal_angle.cos(),
        vertical_distance * new_vertical_angle.sin(),
        horizontal_distance * new_horizontal_angle.sin(),
    );
    center + offset
}

fn bounding_box(triangles: &[Triangle]) -> (Vec3, Vec3) {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for triangle in triangles {
        for vertex in &triangle.positions {
            min = min.min(*vertex);
            max = max.max(*vertex);
        }
    }
    (min, max)
}

fn gather_triangles(model: &GltfModel) -> Result<Vec<Triangle>> {
    let document = &model.document;
    let scene_index = document
        .scene
        .ok_or_else(|| ChunkerError::invalid_reference("no default scene to render"))?;
    let scene = document
        .scenes
        .get(scene_index.value())
        .ok_or_else(|| ChunkerError::invalid_reference("default scene index out of bounds"))?;

    let mut triangles = Vec::new();
    for &root in &scene.nodes {
        walk_node(document, root, Mat4::IDENTITY, model, &mut triangles)?;
    }
    Ok(triangles)
}

fn walk_node(
    document: &Root,
    node_index: Index<Node>,
    parent_transform: Mat4,
    model: &GltfModel,
    triangles: &mut Vec<Triangle>,
) -> Result<()> {
    let node = document
        .nodes
        .get(node_index.value())
        .ok_or_else(|| ChunkerError::invalid_reference("dangling node index"))?;
    let world_transform = parent_transform * local_transform(node);

    if let Some(mesh_index) = node.mesh {
        let mesh = document
            .meshes
            .get(mesh_index.value())
            .ok_or_else(|| ChunkerError::invalid_reference("dangling mesh index"))?;
        for primitive in &mesh.primitives {
            if primitive.mode != Checked::Valid(Mode::Triangles) {
                continue;
            }
            collect_primitive(document, primitive, world_transform, model, triangles)?;
        }
    }

    if let Some(children) = &node.children {
        for &child in children {
            walk_node(document, child, world_transform, model, triangles)?;
        }
    }
    Ok(())
}

fn local_transform(node: &Node) -> Mat4 {
    if let Some(matrix) = node.matrix {
        return Mat4::from_cols_array(&matrix);
    }
    let translation = node.translation.map(Vec3::from).unwrap_or(Vec3::ZERO);
    let rotation = node
        .rotation
        .map(|r| glam::Quat::from_xyzw(r.0[0], r.0[1], r.0[2], r.0[3]))
        .unwrap_or(glam::Quat::IDENTITY);
    let scale = node.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

fn collect_primitive(
    document: &Root,
    primitive: &Primitive,
    world_transform: Mat4,
    model: &GltfModel,
    triangles: &mut Vec<Triangle>,
) -> Result<()> {
    let positions_index = primitive
        .attributes
        .get(&Checked::Valid(Semantic::Positions))
        .ok_or_else(|| ChunkerError::invalid_reference("primitive has no POSITION attribute"))?;
    let positions = read_vec3(document, model, *positions_index)?;

    let indices = match primitive.indices {
        Some(index) => read_indices(document, model, index)?,
        None => (0..positions.len() as u32).collect(),
    };

    let color = primitive
        .material
        .and_then(|index| document.materials.get(index.value()))
        .map(|material| material.pbr_metallic_roughness.base_color_factor.0)
        .unwrap_or([0.5, 0.5, 0.5, 1.0]);

    for face in indices.chunks_exact(3) {
        let positions = [
            world_transform.transform_point3(positions[face[0] as usize]),
            world_transform.transform_point3(positions[face[1] as usize]),
            world_transform.transform_point3(positions[face[2] as usize]),
        ];
        triangles.push(Triangle { positions, color });
    }
    Ok(())
}

/// Reads the byte range an accessor/buffer-view pair describes out of the
/// model's single embedded buffer. Renderer inputs are self-contained GLBs
/// produced by this crate, so buffer 0 is always the embedded blob.
fn accessor_bytes<'a>(document: &Root, model: &'a GltfModel, accessor: &Accessor) -> Result<&'a [u8]> {
    let view_index = accessor
        .buffer_view
        .ok_or_else(|| ChunkerError::invalid_reference("sparse accessors are not supported by the renderer"))?;
    let view = document
        .buffer_views
        .get(view_index.value())
        .ok_or_else(|| ChunkerError::invalid_reference("dangling buffer view index"))?;
    if view.buffer.value() != 0 {
        return Err(ChunkerError::invalid_reference(
            "renderer only supports the embedded GLB buffer",
        ));
    }
    let view_offset = view.byte_offset.map(|o| o.value()).unwrap_or(0);
    let accessor_offset = accessor.byte_offset.map(|o| o.value()).unwrap_or(0);
    let start = view_offset + accessor_offset;
    let end = start + view.byte_length.value();
    model
        .blob
        .get(start..end)
        .ok_or_else(|| ChunkerError::invalid_reference("buffer view range exceeds blob length"))
}

fn read_vec3(document: &Root, model: &GltfModel, accessor_index: Index<Accessor>) -> Result<Vec<Vec3>> {
    let accessor = document
        .accessors
        .get(accessor_index.value())
        .ok_or_else(|| ChunkerError::invalid_reference("dangling accessor index"))?;
    let bytes = accessor_bytes(document, model, accessor)?;
    Ok(bytes
        .chunks_exact(12)
        .take(accessor.count.value())
        .map(|chunk| {
            Vec3::new(
                f32::from_le_bytes(chunk[0..4].try_into().unwrap()),
                f32::from_le_bytes(chunk[4..8].try_into().unwrap()),
                f32::from_le_bytes(chunk[8..12].try_into().unwrap()),
            )
        })
        .collect())
}

fn read_indices(document: &Root, model: &GltfModel, accessor_index: Index<Accessor>) -> Result<Vec<u32>> {
    let accessor = document
        .accessors
        .get(accessor_index.value())
        .ok_or_else(|| ChunkerError::invalid_reference("dangling accessor index"))?;
    let component_type = match accessor.component_type {
        Checked::Valid(generic) => generic.0,
        Checked::Invalid => {
            return Err(ChunkerError::invalid_reference("invalid index component type"))
        }
    };
    let bytes = accessor_bytes(document, model, accessor)?;
    let count = accessor.count.value();
    Ok(match component_type {
        ComponentType::U8 => bytes.iter().take(count).map(|&b| b as u32).collect(),
        ComponentType::U16 => bytes
            .chunks_exact(2)
            .take(count)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()) as u32)
            .collect(),
        ComponentType::U32 => bytes
            .chunks_exact(4)
            .take(count)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect(),
        _ => return Err(ChunkerError::invalid_reference("index accessor has a non-integer component type")),
    })
}

/// Scan-converts one world-space triangle with a flat directional-light
/// shade, testing and updating `depth` in lockstep with `image`.
fn rasterize(triangle: &Triangle, view_projection: &Mat4, image: &mut RgbaImage, depth: &mut [f32]) {
    let clip: Vec<_> = triangle
        .positions
        .iter()
        .map(|&p| *view_projection * p.extend(1.0))
        .collect();
    if clip.iter().any(|c| c.w <= 0.0) {
        return;
    }
    let screen: Vec<_> = clip
        .iter()
        .map(|c| {
            let ndc = c.xyz() / c.w;
            let x = (ndc.x * 0.5 + 0.5) * WIDTH as f32;
            let y = (1.0 - (ndc.y * 0.5 + 0.5)) * HEIGHT as f32;
            (x, y, ndc.z)
        })
        .collect();

    let edge = triangle.positions[1] - triangle.positions[0];
    let edge2 = triangle.positions[2] - triangle.positions[0];
    let normal = edge.cross(edge2).normalize_or_zero();
    let intensity = (AMBIENT + (1.0 - AMBIENT) * normal.dot(LIGHT_DIRECTION.normalize()).max(0.0)).min(1.0);
    let shaded = [
        (triangle.color[0] * intensity * 255.0) as u8,
        (triangle.color[1] * intensity * 255.0) as u8,
        (triangle.color[2] * intensity * 255.0) as u8,
        (triangle.color[3] * 255.0) as u8,
    ];

    let min_x = screen.iter().map(|s| s.0).fold(f32::MAX, f32::min).floor().max(0.0) as i32;
    let max_x = screen
        .iter()
        .map(|s| s.0)
        .fold(f32::MIN, f32::max)
        .ceil()
        .min(WIDTH as f32 - 1.0) as i32;
    let min_y = screen.iter().map(|s| s.1).fold(f32::MAX, f32::min).floor().max(0.0) as i32;
    let max_y = screen
        .iter()
        .map(|s| s.1)
        .fold(f32::MIN, f32::max)
        .ceil()
        .min(HEIGHT as f32 - 1.0) as i32;
    if min_x > max_x || min_y > max_y {
        return;
    }

    let area = edge_function(screen[0], screen[1], screen[2]);
    if area == 0.0 {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let point = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge_function(screen[1], screen[2], point);
            let w1 = edge_function(screen[2], screen[0], point);
            let w2 = edge_function(screen[0], screen[1], point);
            let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
            if !inside {
                continue;
            }
            let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
            let z = b0 * screen[0].2 + b1 * screen[1].2 + b2 * screen[2].2;

            let pixel_index = (y as u32 * WIDTH + x as u32) as usize;
            if z < depth[pixel_index] {
                depth[pixel_index] = z;
                image.put_pixel(x as u32, y as u32, Rgba(shaded));
            }
        }
    }
}

fn edge_function(a: (f32, f32, f32), b: (f32, f32, f32), c: (f32, f32)) -> f32 {
    (c.0 - a.0) * (b.1 - a.1) - (c.1 - a.1) * (b.0 - a.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilechunk_json::accessor::{GenericComponentType, Type};
    use tilechunk_json::material::{Material, PbrBaseColorFactor, PbrMetallicRoughness};
    use tilechunk_json::mesh::Mesh;
    use tilechunk_json::scene::Scene;
    use tilechunk_json::validation::USize64;
    use tilechunk_json::{Asset, Buffer};
    use std::collections::BTreeMap;

    fn single_triangle_model() -> GltfModel {
        let mut blob = Vec::new();
        for component in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            blob.extend_from_slice(&component.to_le_bytes());
        }
        let buffer_view = buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(blob.len()),
            byte_offset: Some(USize64::from(0usize)),
            byte_stride: None,
            target: None,
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
        };
        let accessor = Accessor {
            buffer_view: Some(Index::new(0)),
            byte_offset: None,
            count: USize64::from(3usize),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            type_: Checked::Valid(Type::Vec3),
            min: Some(serde_json::json!([0.0, 0.0, 0.0])),
            max: Some(serde_json::json!([1.0, 1.0, 0.0])),
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            normalized: false,
            sparse: None,
        };
        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), Index::new(0));
        let primitive = Primitive {
            attributes,
            extensions: None,
            extras: Default::default(),
            indices: None,
            material: Some(Index::new(0)),
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
        };
        let mesh = Mesh {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            primitives: vec![primitive],
            weights: None,
        };
        let node = Node {
            mesh: Some(Index::new(0)),
            ..Default::default()
        };
        let scene = Scene {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            nodes: vec![Index::new(0)],
        };
        let material = Material {
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: PbrBaseColorFactor([1.0, 0.0, 0.0, 1.0]),
                ..Default::default()
            },
            ..Default::default()
        };
        let document = Root {
            accessors: vec![accessor],
            asset: Asset::default(),
            buffers: vec![Buffer {
                byte_length: USize64::from(blob.len()),
                uri: None,
                extensions: None,
                extras: Default::default(),
                #[cfg(feature = "names")]
                name: None,
            }],
            buffer_views: vec![buffer_view],
            materials: vec![material],
            meshes: vec![mesh],
            nodes: vec![node],
            scenes: vec![scene],
            scene: Some(Index::new(0)),
            ..Default::default()
        };
        GltfModel::new(document, blob)
    }

    #[test]
    fn renders_a_1920x1080_image_with_some_shaded_pixels() {
        let model = single_triangle_model();
        let image = render(&model, &CameraParams::default()).unwrap();
        assert_eq!(image.width(), WIDTH);
        assert_eq!(image.height(), HEIGHT);
        assert!(image.pixels().any(|p| p.0[3] == 255));
    }

    #[test]
    fn background_pixels_stay_transparent() {
        let model = single_triangle_model();
        let image = render(&model, &CameraParams::default()).unwrap();
        assert_eq!(image.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn vertical_fov_shrinks_as_focal_length_grows() {
        assert!(vertical_fov(100.0) < vertical_fov(24.0));
    }
}
