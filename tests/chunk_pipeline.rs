//! Cross-component integration test for the collect -> reindex -> repack
//! pipeline (C2-C4), run against the real public API rather than a single
//! module's in-crate fixtures.

use std::collections::BTreeMap;
use tilechunk::collector::{collect_node, finalize_animations, CollectedInfo};
use tilechunk::model::GltfModel;
use tilechunk::reindex::reindex;
use tilechunk::repack::repack;
use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type};
use tilechunk_json::buffer;
use tilechunk_json::mesh::{Mesh, Mode, Primitive, Semantic};
use tilechunk_json::scene::{Node, Scene};
use tilechunk_json::validation::{Checked, USize64};
use tilechunk_json::{Buffer, Index, Root};

const POSITION_SRC: usize = 7;
const NORMAL_SRC: usize = 8;
const FEATURE_ID_SRC: usize = 42;
const INDICES_SRC: usize = 9;
const ACCESSOR_COUNT: usize = 43;

fn placeholder_accessor(component_type: ComponentType, type_: Type) -> Accessor {
    Accessor {
        buffer_view: Some(Index::new(0)),
        byte_offset: None,
        count: USize64::from(3usize),
        component_type: Checked::Valid(GenericComponentType(component_type)),
        extensions: None,
        extras: Default::default(),
        type_: Checked::Valid(type_),
        min: None,
        max: None,
        #[cfg(feature = "names")]
        name: None,
        normalized: false,
        sparse: None,
    }
}

/// A source document whose mesh attributes use sparse, non-dense accessor
/// indices (7, 8, 9, 42 among 43 total accessors), matching the shape
/// spec.md's end-to-end scenario 3 names explicitly.
fn sparse_index_source() -> Root {
    let mut accessors: Vec<Accessor> = (0..ACCESSOR_COUNT)
        .map(|_| placeholder_accessor(ComponentType::F32, Type::Scalar))
        .collect();
    accessors[POSITION_SRC] = placeholder_accessor(ComponentType::F32, Type::Vec3);
    accessors[NORMAL_SRC] = placeholder_accessor(ComponentType::F32, Type::Vec3);
    accessors[FEATURE_ID_SRC] = placeholder_accessor(ComponentType::F32, Type::Scalar);
    accessors[INDICES_SRC] = placeholder_accessor(ComponentType::U16, Type::Scalar);

    let buffer_view = buffer::View {
        buffer: Index::new(0),
        byte_length: USize64::from(12usize),
        byte_offset: Some(USize64::from(0usize)),
        byte_stride: None,
        #[cfg(feature = "names")]
        name: None,
        target: None,
        extensions: None,
        extras: Default::default(),
    };
    let buffer_views = vec![buffer_view; ACCESSOR_COUNT];

    let mut attributes = BTreeMap::new();
    attributes.insert(Checked::Valid(Semantic::Positions), Index::new(POSITION_SRC as u32));
    attributes.insert(Checked::Valid(Semantic::Normals), Index::new(NORMAL_SRC as u32));
    attributes.insert(
        Checked::Valid(Semantic::Extras("FEATURE_ID_0".to_string())),
        Index::new(FEATURE_ID_SRC as u32),
    );

    let primitive = Primitive {
        attributes,
        extensions: None,
        extras: Default::default(),
        indices: Some(Index::new(INDICES_SRC as u32)),
        material: None,
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

    Root {
        accessors,
        buffer_views,
        meshes: vec![mesh],
        nodes: vec![node],
        scenes: vec![scene],
        scene: Some(Index::new(0)),
        buffers: vec![Buffer {
            byte_length: USize64::from((12 * ACCESSOR_COUNT) as u64),
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
fn reindex_densifies_sparse_accessor_indices_and_preserves_unknown_semantics() {
    let blob = vec![0u8; 12 * ACCESSOR_COUNT];
    let source = GltfModel::new(sparse_index_source(), blob);

    let mut collected = CollectedInfo::default();
    collect_node(&source.document, 0, 100, &mut collected).unwrap();
    finalize_animations(&source.document, &mut collected).unwrap();

    // Exactly the four referenced accessors survive, not all 43.
    assert_eq!(collected.accessors.len(), 4);

    let mut reindexed = reindex(&source.document, &collected).unwrap();
    let blob = repack(&source.blob, &mut reindexed).unwrap();
    let output = GltfModel::new(reindexed, blob);

    assert_eq!(output.document.accessors.len(), 4);

    let primitive = &output.document.meshes[0].primitives[0];
    for (_semantic, accessor_index) in &primitive.attributes {
        assert!(
            accessor_index.value() < 4,
            "attribute accessor index must be dense within the output array"
        );
    }
    let indices_index = primitive.indices.unwrap();
    assert!(indices_index.value() < 4);

    let feature_id_key = Checked::Valid(Semantic::Extras("FEATURE_ID_0".to_string()));
    assert!(
        primitive.attributes.contains_key(&feature_id_key),
        "_FEATURE_ID_0 must survive reindexing under its original name"
    );

    // Round-trips through the real GLB container format cleanly.
    let bytes = output.to_glb_bytes().unwrap();
    let reloaded = GltfModel::from_glb_bytes(&bytes).unwrap();
    assert_eq!(reloaded.document.accessors.len(), 4);
}

#[test]
fn chunk_short_circuit_names_output_with_explicit_window_suffix() {
    let blob = vec![0u8; 12 * ACCESSOR_COUNT];
    let model = GltfModel::new(sparse_index_source(), blob);
    let config = tilechunk::Config::default();
    let dir = tempfile::tempdir().unwrap();

    let outputs = tilechunk::chunker::chunk(&model, &config, dir.path(), "asset").unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].file_name().unwrap(), "asset_1.glb");

    let reloaded = GltfModel::from_glb_path(&outputs[0]).unwrap();
    assert_eq!(reloaded.node_count(), 1);
}
