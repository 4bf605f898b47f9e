//! C3: rewrites a window's collected subset of a source `Root` into a fresh,
//! self-contained `Root` with dense, 0-based cross-references.
//!
//! The rewrite order is fixed (buffer views, skins, accessors, meshes, nodes,
//! animations, cameras, scenes) because later steps look resources up through
//! maps the earlier steps build. `CollectedInfo`'s retained-order arrays
//! already carry the destination index as their position, so each step below
//! just rebuilds an output array by walking `collected.$list` in order and
//! rewriting whatever cross-references it carries through the matching map.

use crate::collector::CollectedInfo;
use crate::error::Result;
use tilechunk_json::accessor::Accessor;
use tilechunk_json::buffer;
use tilechunk_json::material::Material;
use tilechunk_json::mesh::{Mesh, Primitive};
use tilechunk_json::scene::{Node, Scene};
use tilechunk_json::skin::Skin;
use tilechunk_json::texture::{Sampler, Texture};
use tilechunk_json::{Animation, Camera, Image, Index, Root};

/// Rewrites everything `collected` names within `source` into a new `Root`,
/// whose arrays are dense and whose internal indices resolve entirely within
/// themselves. Buffer-view `buffer`/`byteOffset` fields are left untouched;
/// the BlobRepacker (C4) owns rewriting those once the output blob is built.
pub fn reindex(source: &Root, collected: &CollectedInfo) -> Result<Root> {
    let mut output = Root {
        asset: source.asset.clone(),
        extensions: source.extensions.clone(),
        extras: source.extras.clone(),
        extensions_used: source.extensions_used.clone(),
        extensions_required: source.extensions_required.clone(),
        ..Default::default()
    };

    output.buffer_views = reindex_buffer_views(source, collected);
    output.skins = reindex_skins(source, collected);
    output.accessors = reindex_accessors(source, collected);

    let (materials, textures, samplers, images) = reindex_materials(source, collected);
    output.materials = materials;
    output.textures = textures;
    output.samplers = samplers;
    output.images = images;

    output.meshes = reindex_meshes(source, collected);
    output.nodes = reindex_nodes(source, collected);
    output.animations = reindex_animations(source, collected);
    output.cameras = reindex_cameras(source, collected);
    output.scenes = reindex_scenes(collected, &output.nodes);
    output.scene = Some(Index::new(0));

    Ok(output)
}

fn reindex_buffer_views(source: &Root, collected: &CollectedInfo) -> Vec<buffer::View> {
    collected
        .buffer_views
        .iter()
        .map(|&src| source.buffer_views[src].clone())
        .collect()
}

fn reindex_skins(source: &Root, collected: &CollectedInfo) -> Vec<Skin> {
    collected
        .skins
        .iter()
        .map(|&src| {
            let mut skin = source.skins[src].clone();

            // Rewritten through the accessor map, not the skin map: the
            // source's inverseBindMatrices accessor is unrelated to skin
            // identity and must resolve against the output accessors array.
            skin.inverse_bind_matrices = skin
                .inverse_bind_matrices
                .and_then(|ibm| collected.accessor_map.get(&ibm.value()))
                .map(|&dest| Index::new(dest as u32));

            skin.joints = skin
                .joints
                .iter()
                .filter_map(|joint| collected.node_map.get(&joint.value()))
                .map(|&dest| Index::new(dest as u32))
                .collect();

            skin.skeleton = skin
                .skeleton
                .and_then(|node| collected.node_map.get(&node.value()))
                .map(|&dest| Index::new(dest as u32));

            skin
        })
        .collect()
}

fn reindex_accessors(source: &Root, collected: &CollectedInfo) -> Vec<Accessor> {
    collected
        .accessors
        .iter()
        .map(|&src| {
            let mut accessor = source.accessors[src].clone();

            accessor.buffer_view = accessor
                .buffer_view
                .and_then(|bv| collected.buffer_view_map.get(&bv.value()))
                .map(|&dest| Index::new(dest as u32));

            if let Some(sparse) = &mut accessor.sparse {
                sparse.indices.buffer_view = Index::new(
                    collected.buffer_view_map[&sparse.indices.buffer_view.value()] as u32,
                );
                sparse.values.buffer_view = Index::new(
                    collected.buffer_view_map[&sparse.values.buffer_view.value()] as u32,
                );
            }

            accessor
        })
        .collect()
}

type MaterialResources = (Vec<Material>, Vec<Texture>, Vec<Sampler>, Vec<Image>);

fn reindex_materials(source: &Root, collected: &CollectedInfo) -> MaterialResources {
    let samplers = collected
        .samplers
        .iter()
        .map(|&src| source.samplers[src].clone())
        .collect();

    let images = collected
        .images
        .iter()
        .map(|&src| {
            let mut image = source.images[src].clone();
            image.buffer_view = image
                .buffer_view
                .and_then(|bv| collected.buffer_view_map.get(&bv.value()))
                .map(|&dest| Index::new(dest as u32));
            image
        })
        .collect();

    let textures = collected
        .textures
        .iter()
        .map(|&src| {
            let mut texture = source.textures[src].clone();
            texture.sampler = texture
                .sampler
                .and_then(|s| collected.sampler_map.get(&s.value()))
                .map(|&dest| Index::new(dest as u32));
            let source_image = texture.primary_source();
            texture.source = if source_image.value() == u32::MAX as usize {
                source_image
            } else {
                Index::new(collected.image_map[&source_image.value()] as u32)
            };
            texture
        })
        .collect();

    let materials = collected
        .materials
        .iter()
        .map(|&src| reindex_material(&source.materials[src], collected))
        .collect();

    (materials, textures, samplers, images)
}

fn reindex_texture_index(
    index: Index<Texture>,
    collected: &CollectedInfo,
) -> Index<Texture> {
    Index::new(collected.texture_map[&index.value()] as u32)
}

fn reindex_material(material: &Material, collected: &CollectedInfo) -> Material {
    let mut material = material.clone();

    let pbr = &mut material.pbr_metallic_roughness;
    if let Some(info) = &mut pbr.base_color_texture {
        info.index = reindex_texture_index(info.index, collected);
    }
    if let Some(info) = &mut pbr.metallic_roughness_texture {
        info.index = reindex_texture_index(info.index, collected);
    }
    if let Some(normal) = &mut material.normal_texture {
        normal.index = reindex_texture_index(normal.index, collected);
    }
    if let Some(occlusion) = &mut material.occlusion_texture {
        occlusion.index = reindex_texture_index(occlusion.index, collected);
    }
    if let Some(info) = &mut material.emissive_texture {
        info.index = reindex_texture_index(info.index, collected);
    }

    material
}

fn reindex_meshes(source: &Root, collected: &CollectedInfo) -> Vec<Mesh> {
    collected
        .meshes
        .iter()
        .map(|&src| {
            let mut mesh = source.meshes[src].clone();
            mesh.primitives = mesh
                .primitives
                .iter()
                .map(|primitive| reindex_primitive(primitive, collected))
                .collect();
            mesh
        })
        .collect()
}

fn reindex_primitive(primitive: &Primitive, collected: &CollectedInfo) -> Primitive {
    let mut primitive = primitive.clone();

    // Unknown semantics such as `_FEATURE_ID_0` are preserved verbatim; only
    // the accessor index they point at needs rewriting.
    for accessor_index in primitive.attributes.values_mut() {
        *accessor_index = Index::new(collected.accessor_map[&accessor_index.value()] as u32);
    }

    primitive.indices = primitive
        .indices
        .map(|i| Index::new(collected.accessor_map[&i.value()] as u32));

    primitive.material = primitive
        .material
        .and_then(|m| collected.material_map.get(&m.value()))
        .map(|&dest| Index::new(dest as u32));

    if let Some(targets) = &mut primitive.targets {
        for target in targets {
            target.positions = target
                .positions
                .map(|i| Index::new(collected.accessor_map[&i.value()] as u32));
            target.normals = target
                .normals
                .map(|i| Index::new(collected.accessor_map[&i.value()] as u32));
            target.tangents = target
                .tangents
                .map(|i| Index::new(collected.accessor_map[&i.value()] as u32));
        }
    }

    primitive
}

fn reindex_nodes(source: &Root, collected: &CollectedInfo) -> Vec<Node> {
    collected
        .nodes
        .iter()
        .map(|&src| {
            let mut node = source.nodes[src].clone();

            node.mesh = node
                .mesh
                .and_then(|m| collected.mesh_map.get(&m.value()))
                .map(|&dest| Index::new(dest as u32));

            node.skin = node
                .skin
                .and_then(|s| collected.skin_map.get(&s.value()))
                .map(|&dest| Index::new(dest as u32));

            node.camera = node
                .camera
                .and_then(|c| collected.camera_map.get(&c.value()))
                .map(|&dest| Index::new(dest as u32));

            node.children = node.children.as_ref().map(|children| {
                children
                    .iter()
                    .filter_map(|child| collected.node_map.get(&child.value()))
                    .map(|&dest| Index::new(dest as u32))
                    .collect()
            });

            node
        })
        .collect()
}

fn reindex_animations(source: &Root, collected: &CollectedInfo) -> Vec<Animation> {
    collected
        .animations
        .iter()
        .map(|&src| {
            let mut animation = source.animations[src].clone();

            // A retained animation can still carry channels targeting nodes
            // outside this window; those can't resolve here and are dropped
            // so every cross-reference in the output stays in-chunk.
            animation
                .channels
                .retain(|channel| collected.node_map.contains_key(&channel.target.node.value()));
            for channel in &mut animation.channels {
                channel.target.node =
                    Index::new(collected.node_map[&channel.target.node.value()] as u32);
            }

            for sampler in &mut animation.samplers {
                sampler.input = Index::new(collected.accessor_map[&sampler.input.value()] as u32);
                sampler.output =
                    Index::new(collected.accessor_map[&sampler.output.value()] as u32);
            }

            animation
        })
        .collect()
}

fn reindex_cameras(source: &Root, collected: &CollectedInfo) -> Vec<Camera> {
    collected
        .cameras
        .iter()
        .map(|&src| source.cameras[src].clone())
        .collect()
}

fn reindex_scenes(collected: &CollectedInfo, output_nodes: &[Node]) -> Vec<Scene> {
    if collected.scenes.is_empty() {
        // Nothing in the source attributed any retained node to a scene
        // (shouldn't happen for a well-formed asset, but windowing can strand
        // nodes reached only through skin joints). Synthesize one scene
        // holding every retained node that actually carries a mesh, in
        // insertion order.
        let nodes = (0..output_nodes.len())
            .filter(|&i| output_nodes[i].mesh.is_some())
            .map(|i| Index::new(i as u32))
            .collect();
        return vec![Scene {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            nodes,
        }];
    }

    collected
        .scenes
        .iter()
        .map(|&src| {
            let dest_nodes = collected
                .scene_nodes
                .get(&src)
                .cloned()
                .unwrap_or_default();
            Scene {
                extensions: None,
                extras: Default::default(),
                #[cfg(feature = "names")]
                name: None,
                nodes: dest_nodes.into_iter().map(|i| Index::new(i as u32)).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_node;
    use std::collections::BTreeMap;
    use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type as AccessorType};
    use tilechunk_json::mesh::{Mesh, Mode, Primitive, Semantic};
    use tilechunk_json::skin::Skin;
    use tilechunk_json::validation::{Checked, USize64};
    use tilechunk_json::{Buffer, Index};

    fn accessor() -> Accessor {
        Accessor {
            buffer_view: Some(Index::new(0)),
            byte_offset: None,
            count: USize64::from(3usize),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            extensions: None,
            extras: Default::default(),
            type_: Checked::Valid(AccessorType::Vec3),
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

    /// Two chained nodes (second is a skinned leaf of the first), sharing no
    /// resources, so every destination index below is provably a rewrite and
    /// not an accidental match with the source index.
    fn two_node_source() -> Root {
        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), Index::new(1));
        let mesh = Mesh {
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
        };

        let nodes = vec![
            Node {
                mesh: None,
                children: Some(vec![Index::new(1)]),
                ..Default::default()
            },
            Node {
                mesh: Some(Index::new(0)),
                skin: Some(Index::new(0)),
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
            // A leading, unreferenced accessor/buffer-view pair at index 0
            // makes sure reindexing walks through the collected order rather
            // than assuming source index == destination index.
            accessors: vec![accessor(), accessor()],
            buffer_views: vec![buffer_view(), buffer_view()],
            meshes: vec![mesh],
            skins: vec![Skin {
                extensions: Default::default(),
                extras: Default::default(),
                inverse_bind_matrices: Some(Index::new(0)),
                joints: vec![Index::new(1)],
                #[cfg(feature = "names")]
                name: None,
                skeleton: Some(Index::new(0)),
            }],
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
    fn rewrites_mesh_and_accessor_cross_references_to_dense_indices() {
        let source = two_node_source();
        let mut collected = CollectedInfo::default();
        collect_node(&source, 0, 100, &mut collected).unwrap();

        let output = reindex(&source, &collected).unwrap();

        assert_eq!(output.nodes.len(), 2);
        assert_eq!(output.meshes.len(), 1);
        assert_eq!(output.accessors.len(), 1);

        let mesh_index = output.nodes[1].mesh.expect("leaf node keeps its mesh");
        assert_eq!(mesh_index.value(), 0);

        // The skin on node 1 is visited before its mesh, so the skin's
        // inverse-bind-matrices accessor (source index 0) claims dest 0 and
        // the mesh's positions accessor (source index 1) lands at dest 1.
        let primitive = &output.meshes[0].primitives[0];
        let accessor_index = primitive.attributes[&Checked::Valid(Semantic::Positions)];
        assert_eq!(accessor_index.value(), 1);
    }

    #[test]
    fn rewrites_skin_inverse_bind_matrices_and_joints() {
        let source = two_node_source();
        let mut collected = CollectedInfo::default();
        collect_node(&source, 0, 100, &mut collected).unwrap();

        let output = reindex(&source, &collected).unwrap();

        assert_eq!(output.skins.len(), 1);
        let skin = &output.skins[0];
        // A node's skin is visited before its mesh, so the skin's
        // inverse-bind-matrices accessor claims dense index 0, ahead of the
        // mesh's own positions accessor.
        assert_eq!(skin.inverse_bind_matrices.unwrap().value(), 0);
        assert_eq!(skin.joints.len(), 1);
        assert_eq!(skin.joints[0].value(), 1);
        assert_eq!(skin.skeleton.unwrap().value(), 0);
    }

    #[test]
    fn scene_nodes_reflect_only_retained_nodes_in_insertion_order() {
        let source = two_node_source();
        let mut collected = CollectedInfo::default();
        collect_node(&source, 0, 100, &mut collected).unwrap();

        let output = reindex(&source, &collected).unwrap();

        assert_eq!(output.scenes.len(), 1);
        assert_eq!(output.scenes[0].nodes.len(), 1);
        assert_eq!(output.scenes[0].nodes[0].value(), 0);
        assert_eq!(output.scene.unwrap().value(), 0);
    }

    #[test]
    fn synthesizes_a_scene_when_no_source_scene_attributes_any_retained_node() {
        let mut source = two_node_source();
        source.scenes.clear();
        source.scene = None;

        let mut collected = CollectedInfo::default();
        collect_node(&source, 0, 100, &mut collected).unwrap();

        let output = reindex(&source, &collected).unwrap();

        assert_eq!(output.scenes.len(), 1);
        assert_eq!(output.scenes[0].nodes.len(), 1);
        assert_eq!(output.scenes[0].nodes[0].value(), 1);
    }
}
