//! C2: walks a subgraph starting at a node and gathers the transitive set of
//! resources it references, with deduplication, capped at a window size.

use crate::error::{ChunkerError, Result};
use std::collections::HashMap;
use tilechunk_json::mesh::Semantic;
use tilechunk_json::validation::Checked;
use tilechunk_json::{Index, Root};
use tracing::trace;

/// Accumulated retained resources plus source→destination index maps for one
/// chunk window. Lives only for the duration of building a single chunk;
/// consumed by the Reindexer.
#[derive(Debug, Default)]
pub struct CollectedInfo {
    pub nodes: Vec<usize>,
    pub meshes: Vec<usize>,
    pub materials: Vec<usize>,
    pub textures: Vec<usize>,
    pub samplers: Vec<usize>,
    pub images: Vec<usize>,
    pub accessors: Vec<usize>,
    pub buffer_views: Vec<usize>,
    pub skins: Vec<usize>,
    pub animations: Vec<usize>,
    pub scenes: Vec<usize>,
    pub cameras: Vec<usize>,

    pub node_map: HashMap<usize, usize>,
    pub mesh_map: HashMap<usize, usize>,
    pub material_map: HashMap<usize, usize>,
    pub texture_map: HashMap<usize, usize>,
    pub sampler_map: HashMap<usize, usize>,
    pub image_map: HashMap<usize, usize>,
    pub accessor_map: HashMap<usize, usize>,
    pub buffer_view_map: HashMap<usize, usize>,
    pub skin_map: HashMap<usize, usize>,
    pub animation_map: HashMap<usize, usize>,
    pub scene_map: HashMap<usize, usize>,
    pub camera_map: HashMap<usize, usize>,

    /// Destination node indices attributed to each retained source scene,
    /// in insertion order.
    pub scene_nodes: HashMap<usize, Vec<usize>>,
}

macro_rules! retain {
    ($self:ident, $list:ident, $map:ident, $source_index:expr) => {{
        let source_index = $source_index;
        if let Some(&dest) = $self.$map.get(&source_index) {
            dest
        } else {
            let dest = $self.$list.len();
            $self.$list.push(source_index);
            $self.$map.insert(source_index, dest);
            dest
        }
    }};
}

impl CollectedInfo {
    pub fn retain_node(&mut self, source_index: usize) -> usize {
        retain!(self, nodes, node_map, source_index)
    }

    pub fn retain_mesh(&mut self, source_index: usize) -> usize {
        retain!(self, meshes, mesh_map, source_index)
    }

    pub fn retain_material(&mut self, source_index: usize) -> usize {
        retain!(self, materials, material_map, source_index)
    }

    pub fn retain_texture(&mut self, source_index: usize) -> usize {
        retain!(self, textures, texture_map, source_index)
    }

    pub fn retain_sampler(&mut self, source_index: usize) -> usize {
        retain!(self, samplers, sampler_map, source_index)
    }

    pub fn retain_image(&mut self, source_index: usize) -> usize {
        retain!(self, images, image_map, source_index)
    }

    pub fn retain_accessor(&mut self, source_index: usize) -> usize {
        retain!(self, accessors, accessor_map, source_index)
    }

    pub fn retain_buffer_view(&mut self, source_index: usize) -> usize {
        retain!(self, buffer_views, buffer_view_map, source_index)
    }

    pub fn retain_skin(&mut self, source_index: usize) -> usize {
        retain!(self, skins, skin_map, source_index)
    }

    pub fn retain_animation(&mut self, source_index: usize) -> usize {
        retain!(self, animations, animation_map, source_index)
    }

    pub fn retain_scene(&mut self, source_index: usize) -> usize {
        retain!(self, scenes, scene_map, source_index)
    }

    pub fn retain_camera(&mut self, source_index: usize) -> usize {
        retain!(self, cameras, camera_map, source_index)
    }

    pub fn contains_node(&self, source_index: usize) -> bool {
        self.node_map.contains_key(&source_index)
    }
}

/// Walks `root`'s subgraph rooted at `start_node`, filling `collected` with
/// everything transitively reachable through children, mesh, and skin edges,
/// capped so retained nodes never exceed `window_cap`.
///
/// Call once per node in a chunk window (the Chunker drives this per §4.4);
/// call [`finalize_animations`] once after the whole window has been walked.
pub fn collect_node(
    root: &Root,
    start_node: usize,
    window_cap: usize,
    collected: &mut CollectedInfo,
) -> Result<()> {
    visit_node(root, start_node, window_cap, collected)
}

/// Retains every animation with a channel targeting an already-retained node,
/// plus its sampler accessors. Call once after a window's nodes are collected.
pub fn finalize_animations(root: &Root, collected: &mut CollectedInfo) -> Result<()> {
    attach_animations(root, collected)
}

fn visit_node(
    root: &Root,
    node_index: usize,
    window_cap: usize,
    collected: &mut CollectedInfo,
) -> Result<()> {
    if collected.contains_node(node_index) {
        return Ok(());
    }
    if collected.nodes.len() >= window_cap {
        return Ok(());
    }

    let node = root.nodes.get(node_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("node index {} out of bounds", node_index))
    })?;

    collected.retain_node(node_index);
    trace!(node_index, "retained node");

    if let Some(skin_index) = node.skin {
        retain_skin(root, skin_index.value(), collected)?;
    }

    if let Some(mesh_index) = node.mesh {
        retain_mesh(root, mesh_index.value(), collected)?;
    }

    if let Some(camera_index) = node.camera {
        let dest = collected.retain_camera(camera_index.value());
        let _ = dest;
    }

    for (scene_index, scene) in root.scenes.iter().enumerate() {
        if scene.nodes.iter().any(|n| n.value() == node_index) {
            collected.retain_scene(scene_index);
            let dest_node = collected.node_map[&node_index];
            collected
                .scene_nodes
                .entry(scene_index)
                .or_default()
                .push(dest_node);
        }
    }

    let children: Vec<usize> = node.children.iter().flatten().map(Index::value).collect();
    for child in children {
        visit_node(root, child, window_cap, collected)?;
    }

    Ok(())
}

fn retain_mesh(root: &Root, mesh_index: usize, collected: &mut CollectedInfo) -> Result<()> {
    if collected.mesh_map.contains_key(&mesh_index) {
        return Ok(());
    }
    collected.retain_mesh(mesh_index);

    let mesh = root.meshes.get(mesh_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("mesh index {} out of bounds", mesh_index))
    })?;

    for primitive in &mesh.primitives {
        if let Some(material_index) = primitive.material {
            retain_material(root, material_index.value(), collected)?;
        }

        for (_semantic, accessor_index) in &primitive.attributes {
            retain_accessor(root, accessor_index.value(), collected)?;
        }
        if let Some(indices) = primitive.indices {
            retain_accessor(root, indices.value(), collected)?;
        }
        if let Some(targets) = &primitive.targets {
            for target in targets {
                for accessor_index in [target.positions, target.normals, target.tangents]
                    .into_iter()
                    .flatten()
                {
                    retain_accessor(root, accessor_index.value(), collected)?;
                }
            }
        }
    }

    Ok(())
}

fn retain_material(
    root: &Root,
    material_index: usize,
    collected: &mut CollectedInfo,
) -> Result<()> {
    if collected.material_map.contains_key(&material_index) {
        return Ok(());
    }
    collected.retain_material(material_index);

    let material = root.materials.get(material_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("material index {} out of bounds", material_index))
    })?;

    let mut texture_indices = Vec::new();
    if let Some(t) = &material.pbr_metallic_roughness.base_color_texture {
        texture_indices.push(t.index.value());
    }
    if let Some(t) = &material.pbr_metallic_roughness.metallic_roughness_texture {
        texture_indices.push(t.index.value());
    }
    if let Some(t) = &material.normal_texture {
        texture_indices.push(t.index.value());
    }
    if let Some(t) = &material.occlusion_texture {
        texture_indices.push(t.index.value());
    }
    if let Some(t) = &material.emissive_texture {
        texture_indices.push(t.index.value());
    }

    for texture_index in texture_indices {
        retain_texture(root, texture_index, collected)?;
    }

    Ok(())
}

fn retain_texture(root: &Root, texture_index: usize, collected: &mut CollectedInfo) -> Result<()> {
    if collected.texture_map.contains_key(&texture_index) {
        return Ok(());
    }
    collected.retain_texture(texture_index);

    let texture = root.textures.get(texture_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("texture index {} out of bounds", texture_index))
    })?;

    if let Some(sampler_index) = texture.sampler {
        collected.retain_sampler(sampler_index.value());
    }

    let source = texture.primary_source();
    if source.value() != u32::MAX as usize {
        retain_image(root, source.value(), collected)?;
    }

    Ok(())
}

fn retain_image(root: &Root, image_index: usize, collected: &mut CollectedInfo) -> Result<()> {
    if collected.image_map.contains_key(&image_index) {
        return Ok(());
    }
    collected.retain_image(image_index);

    let image = root.images.get(image_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("image index {} out of bounds", image_index))
    })?;

    if let Some(buffer_view_index) = image.buffer_view {
        retain_buffer_view(root, buffer_view_index.value(), collected)?;
    }

    Ok(())
}

fn retain_accessor(
    root: &Root,
    accessor_index: usize,
    collected: &mut CollectedInfo,
) -> Result<()> {
    if collected.accessor_map.contains_key(&accessor_index) {
        return Ok(());
    }
    collected.retain_accessor(accessor_index);

    let accessor = root.accessors.get(accessor_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!(
            "accessor index {} out of bounds",
            accessor_index
        ))
    })?;

    if let Some(buffer_view_index) = accessor.buffer_view {
        retain_buffer_view(root, buffer_view_index.value(), collected)?;
    }

    if let Some(sparse) = &accessor.sparse {
        retain_buffer_view(root, sparse.indices.buffer_view.value(), collected)?;
        retain_buffer_view(root, sparse.values.buffer_view.value(), collected)?;
    }

    Ok(())
}

fn retain_buffer_view(
    root: &Root,
    buffer_view_index: usize,
    collected: &mut CollectedInfo,
) -> Result<()> {
    if collected.buffer_view_map.contains_key(&buffer_view_index) {
        return Ok(());
    }
    collected.retain_buffer_view(buffer_view_index);

    let _ = root.buffer_views.get(buffer_view_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!(
            "buffer view index {} out of bounds",
            buffer_view_index
        ))
    })?;

    Ok(())
}

fn retain_skin(root: &Root, skin_index: usize, collected: &mut CollectedInfo) -> Result<()> {
    if collected.skin_map.contains_key(&skin_index) {
        return Ok(());
    }
    collected.retain_skin(skin_index);

    let skin = root.skins.get(skin_index).ok_or_else(|| {
        ChunkerError::invalid_reference(format!("skin index {} out of bounds", skin_index))
    })?;

    if let Some(ibm) = skin.inverse_bind_matrices {
        retain_accessor(root, ibm.value(), collected)?;
    }

    Ok(())
}

/// For every animation with a channel targeting a retained node, retain the
/// animation and its sampler input/output accessors.
fn attach_animations(root: &Root, collected: &mut CollectedInfo) -> Result<()> {
    for (animation_index, animation) in root.animations.iter().enumerate() {
        let targets_retained_node = animation
            .channels
            .iter()
            .any(|channel| collected.contains_node(channel.target.node.value()));
        if !targets_retained_node {
            continue;
        }
        if collected.animation_map.contains_key(&animation_index) {
            continue;
        }
        collected.retain_animation(animation_index);

        for sampler in &animation.samplers {
            retain_accessor(root, sampler.input.value(), collected)?;
            retain_accessor(root, sampler.output.value(), collected)?;
        }
    }
    Ok(())
}

/// Returns true if `semantic` is an unrecognized (e.g. `_FEATURE_ID_0`)
/// attribute name that must be preserved verbatim rather than interpreted.
pub fn is_unknown_semantic(semantic: &Checked<Semantic>) -> bool {
    matches!(semantic, Checked::Invalid)
        || matches!(semantic.as_ref(), Checked::Valid(Semantic::Extras(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type};
    use tilechunk_json::animation::{Animation, Channel, Interpolation, Property, Sampler as AnimSampler, Target};
    use tilechunk_json::buffer;
    use tilechunk_json::mesh::{Mesh, Mode, Primitive, Semantic};
    use tilechunk_json::scene::{Node, Scene};
    use tilechunk_json::skin::Skin;
    use tilechunk_json::validation::{Checked, USize64};
    use tilechunk_json::{Buffer, Index, Root};

    fn accessor() -> Accessor {
        Accessor {
            buffer_view: Some(Index::new(0)),
            byte_offset: None,
            count: USize64::from(3usize),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            extensions: None,
            extras: Default::default(),
            type_: Checked::Valid(Type::Vec3),
            min: None,
            max: None,
            #[cfg(feature = "names")]
            name: None,
            normalized: false,
            sparse: None,
        }
    }

    fn buffer_view() -> buffer::View {
        buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(36usize),
            byte_offset: Some(USize64::from(0usize)),
            byte_stride: None,
            #[cfg(feature = "names")]
            name: None,
            target: None,
            extensions: None,
            extras: Default::default(),
        }
    }

    fn mesh_with_positions(accessor_index: u32) -> Mesh {
        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), Index::new(accessor_index));
        Mesh {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            primitives: vec![Primitive {
                attributes,
                extensions: None,
                extras: Default::default(),
                indices: None,
                material: None,
                mode: Checked::Valid(Mode::Triangles),
                targets: None,
            }],
            weights: None,
        }
    }

    /// Two root nodes, the first a parent of the second, each with its own
    /// mesh/accessor/buffer-view so sharing is observable if it happens.
    fn two_node_chain() -> Root {
        let nodes = vec![
            Node {
                mesh: Some(Index::new(0)),
                children: Some(vec![Index::new(1)]),
                ..Default::default()
            },
            Node {
                mesh: Some(Index::new(1)),
                ..Default::default()
            },
        ];
        let scene = Scene {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            nodes: vec![Index::new(0)],
        };
        Root {
            accessors: vec![accessor(), accessor()],
            buffer_views: vec![buffer_view(), buffer_view()],
            meshes: vec![mesh_with_positions(0), mesh_with_positions(1)],
            nodes,
            scenes: vec![scene],
            scene: Some(Index::new(0)),
            buffers: vec![Buffer {
                byte_length: USize64::from(72usize),
                #[cfg(feature = "names")]
                name: None,
                uri: None,
                extensions: None,
                extras: Default::default(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn walks_children_and_dedups_shared_resources() {
        let root = two_node_chain();
        let mut collected = CollectedInfo::default();

        collect_node(&root, 0, 100, &mut collected).unwrap();

        assert_eq!(collected.nodes, vec![0, 1]);
        assert_eq!(collected.meshes, vec![0, 1]);
        assert_eq!(collected.accessors, vec![0, 1]);
        assert_eq!(collected.buffer_views, vec![0, 1]);
    }

    #[test]
    fn revisiting_a_retained_node_is_a_no_op() {
        let root = two_node_chain();
        let mut collected = CollectedInfo::default();

        collect_node(&root, 0, 100, &mut collected).unwrap();
        collect_node(&root, 0, 100, &mut collected).unwrap();
        collect_node(&root, 1, 100, &mut collected).unwrap();

        assert_eq!(collected.nodes, vec![0, 1]);
    }

    #[test]
    fn window_cap_stops_collection_without_erroring() {
        let root = two_node_chain();
        let mut collected = CollectedInfo::default();

        collect_node(&root, 0, 1, &mut collected).unwrap();

        assert_eq!(collected.nodes, vec![0]);
        assert_eq!(collected.meshes, vec![0]);
    }

    #[test]
    fn out_of_bounds_node_reference_is_an_error() {
        let root = two_node_chain();
        let mut collected = CollectedInfo::default();

        let err = collect_node(&root, 5, 100, &mut collected);
        assert!(err.is_err());
    }

    #[test]
    fn retains_skin_inverse_bind_matrix_accessor() {
        let mut root = two_node_chain();
        root.skins.push(Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(Index::new(1)),
            joints: vec![Index::new(1)],
            #[cfg(feature = "names")]
            name: None,
            skeleton: None,
        });
        root.nodes[0].skin = Some(Index::new(0));

        let mut collected = CollectedInfo::default();
        collect_node(&root, 0, 100, &mut collected).unwrap();

        assert_eq!(collected.skins, vec![0]);
        assert!(collected.accessor_map.contains_key(&1));
    }

    #[test]
    fn finalize_animations_retains_channels_targeting_collected_nodes_only() {
        let mut root = two_node_chain();
        root.accessors.push(accessor());
        root.accessors.push(accessor());
        root.nodes.push(Node {
            ..Default::default()
        });
        let stranded_node = root.nodes.len() as u32 - 1;

        root.animations.push(Animation {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            channels: vec![
                Channel {
                    sampler: Index::new(0),
                    target: Target {
                        extensions: None,
                        extras: Default::default(),
                        node: Index::new(1),
                        path: Checked::Valid(Property::Translation),
                    },
                    extensions: None,
                    extras: Default::default(),
                },
                Channel {
                    sampler: Index::new(0),
                    target: Target {
                        extensions: None,
                        extras: Default::default(),
                        node: Index::new(stranded_node),
                        path: Checked::Valid(Property::Translation),
                    },
                    extensions: None,
                    extras: Default::default(),
                },
            ],
            samplers: vec![AnimSampler {
                extensions: None,
                extras: Default::default(),
                input: Index::new(2),
                interpolation: Checked::Valid(Interpolation::Linear),
                output: Index::new(3),
            }],
        });

        let mut collected = CollectedInfo::default();
        collect_node(&root, 0, 100, &mut collected).unwrap();
        finalize_animations(&root, &mut collected).unwrap();

        assert_eq!(collected.animations, vec![0]);
        assert!(collected.accessor_map.contains_key(&2));
        assert!(collected.accessor_map.contains_key(&3));
        assert!(!collected.node_map.contains_key(&(stranded_node as usize)));
    }
}
