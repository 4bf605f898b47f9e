//! Folds a batch table into a glTF via `EXT_structural_metadata` and
//! `EXT_mesh_features` (§6 "Metadata merge layout"). Only reachable from
//! the IFC-only entry point's `--merge_metadata` flag.

use crate::batch_table::BatchTable;
use crate::model::GltfModel;
use serde_json::Value;
use std::collections::BTreeMap;
use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type};
use tilechunk_json::buffer;
use tilechunk_json::extensions::mesh::{ExtMeshFeatures, FeatureId};
use tilechunk_json::extensions::root::{
    Class, ClassProperty, ExtStructuralMetadata, PropertyTable, PropertyTableProperty, Schema,
};
use tilechunk_json::mesh::{Primitive, Semantic};
use tilechunk_json::root::Root;
use tilechunk_json::validation::{Checked, USize64};
use tilechunk_json::{Buffer, Index};

const CLASS_NAME: &str = "class_batch_table";
const STRUCTURAL_METADATA: &str = "EXT_structural_metadata";
const MESH_FEATURES: &str = "EXT_mesh_features";

/// Raw bytes for the two side-car buffers this merge produces; the caller
/// writes them to disk under the names recorded as each `Buffer.uri`.
pub struct MergedBuffers {
    pub metadata_bytes: Vec<u8>,
    pub feature_ids_bytes: Vec<u8>,
}

/// Merges `batch_table` into `model` in place: one `EXT_structural_metadata`
/// property per column, plus one synthesized `_FEATURE_ID_0` accessor and
/// `EXT_mesh_features` attachment per primitive. `metadata_buffer_uri` and
/// `feature_ids_buffer_uri` become the `uri` of the two new buffers this
/// merge appends; their bytes are returned for the caller to save alongside
/// the merged GLB.
pub fn merge(
    model: &mut GltfModel,
    batch_table: &BatchTable,
    metadata_buffer_uri: &str,
    feature_ids_buffer_uri: &str,
) -> MergedBuffers {
    let metadata_buffer_index = Index::new(model.document.buffers.len() as u32);
    let feature_ids_buffer_index = Index::new(metadata_buffer_index.value() as u32 + 1);

    let mut metadata_bytes = Vec::new();
    let mut properties = BTreeMap::new();
    let mut class_properties = BTreeMap::new();

    for (column_name, values) in &batch_table.columns {
        let property = encode_column(
            &mut model.document.buffer_views,
            &mut model.document.accessors,
            &mut metadata_bytes,
            metadata_buffer_index,
            values,
        );
        properties.insert(column_name.clone(), property);
        class_properties.insert(
            column_name.clone(),
            ClassProperty {
                ty: "STRING".to_string(),
            },
        );
    }

    let mut classes = BTreeMap::new();
    classes.insert(
        CLASS_NAME.to_string(),
        Class {
            properties: class_properties,
        },
    );

    model.document.extensions.ext_structural_metadata = Some(ExtStructuralMetadata {
        schema: Schema { classes },
        property_tables: vec![PropertyTable {
            class: CLASS_NAME.to_string(),
            count: batch_table.row_count() as u32,
            properties,
        }],
    });

    let feature_ids_bytes = attach_feature_ids(&mut model.document, feature_ids_buffer_index);

    model.document.buffers.push(Buffer {
        byte_length: USize64::from(metadata_bytes.len()),
        uri: Some(metadata_buffer_uri.to_string()),
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
    });
    model.document.buffers.push(Buffer {
        byte_length: USize64::from(feature_ids_bytes.len()),
        uri: Some(feature_ids_buffer_uri.to_string()),
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
    });

    for extension in [STRUCTURAL_METADATA, MESH_FEATURES] {
        if !model.document.extensions_used.iter().any(|n| n == extension) {
            model.document.extensions_used.push(extension.to_string());
        }
        if !model
            .document
            .extensions_required
            .iter()
            .any(|n| n == extension)
        {
            model.document.extensions_required.push(extension.to_string());
        }
    }

    MergedBuffers {
        metadata_bytes,
        feature_ids_bytes,
    }
}

/// Encodes one column as concatenated UTF-8 bytes plus a cumulative-offsets
/// array of length `rows + 1`, and registers both as buffer views/accessors.
fn encode_column(
    buffer_views: &mut Vec<buffer::View>,
    accessors: &mut Vec<Accessor>,
    metadata_bytes: &mut Vec<u8>,
    buffer_index: Index<Buffer>,
    values: &[Value],
) -> PropertyTableProperty {
    let mut string_bytes = Vec::new();
    let mut offsets = vec![0u32];
    for value in values {
        string_bytes.extend_from_slice(value_as_text(value).as_bytes());
        offsets.push(string_bytes.len() as u32);
    }

    let values_byte_offset = metadata_bytes.len();
    metadata_bytes.extend_from_slice(&string_bytes);
    let values_view = push_buffer_view(buffer_views, buffer_index, values_byte_offset, string_bytes.len());
    let values_accessor = Accessor {
        buffer_view: Some(values_view),
        byte_offset: None,
        count: USize64::from(string_bytes.len()),
        component_type: Checked::Valid(GenericComponentType(ComponentType::U8)),
        type_: Checked::Valid(Type::Scalar),
        min: None,
        max: None,
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
        normalized: false,
        sparse: None,
    };
    let values_index = push_accessor(accessors, values_accessor);

    while metadata_bytes.len() % 4 != 0 {
        metadata_bytes.push(0);
    }
    let offsets_byte_offset = metadata_bytes.len();
    for offset in &offsets {
        metadata_bytes.extend_from_slice(&offset.to_le_bytes());
    }
    let offsets_byte_length = offsets.len() * 4;
    let offsets_view = push_buffer_view(buffer_views, buffer_index, offsets_byte_offset, offsets_byte_length);
    let offsets_accessor = Accessor {
        buffer_view: Some(offsets_view),
        byte_offset: None,
        count: USize64::from(offsets.len()),
        component_type: Checked::Valid(GenericComponentType(ComponentType::U32)),
        type_: Checked::Valid(Type::Scalar),
        min: None,
        max: None,
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
        normalized: false,
        sparse: None,
    };
    let offsets_index = push_accessor(accessors, offsets_accessor);

    PropertyTableProperty {
        values: values_index,
        string_offsets: offsets_index,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Synthesizes one `_FEATURE_ID_0` accessor per primitive, filled with that
/// mesh's own array index (the batch-id, per the builder's naming contract),
/// and attaches `EXT_mesh_features` to the primitive.
fn attach_feature_ids(document: &mut Root, buffer_index: Index<Buffer>) -> Vec<u8> {
    let mut feature_ids_bytes = Vec::new();
    let Root {
        meshes,
        accessors,
        buffer_views,
        ..
    } = document;

    for (mesh_index, mesh) in meshes.iter_mut().enumerate() {
        for primitive in &mut mesh.primitives {
            attach_primitive_feature_id(
                primitive,
                accessors,
                buffer_views,
                &mut feature_ids_bytes,
                buffer_index,
                mesh_index as f32,
            );
        }
    }

    feature_ids_bytes
}

fn attach_primitive_feature_id(
    primitive: &mut Primitive,
    accessors: &mut Vec<Accessor>,
    buffer_views: &mut Vec<buffer::View>,
    feature_ids_bytes: &mut Vec<u8>,
    buffer_index: Index<Buffer>,
    feature_id: f32,
) {
    let vertex_count = primitive
        .attributes
        .get(&Checked::Valid(Semantic::Positions))
        .map(|index| accessors[index.value()].count.value())
        .unwrap_or(0);
    if vertex_count == 0 {
        return;
    }

    while feature_ids_bytes.len() % 4 != 0 {
        feature_ids_bytes.push(0);
    }
    let byte_offset = feature_ids_bytes.len();
    for _ in 0..vertex_count {
        feature_ids_bytes.extend_from_slice(&feature_id.to_le_bytes());
    }
    let byte_length = feature_ids_bytes.len() - byte_offset;

    let view = push_buffer_view(buffer_views, buffer_index, byte_offset, byte_length);
    let accessor = Accessor {
        buffer_view: Some(view),
        byte_offset: None,
        count: USize64::from(vertex_count),
        component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
        type_: Checked::Valid(Type::Scalar),
        min: Some(serde_json::json!([feature_id])),
        max: Some(serde_json::json!([feature_id])),
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
        normalized: false,
        sparse: None,
    };
    let accessor_index = push_accessor(accessors, accessor);

    primitive.attributes.insert(
        Checked::Valid(Semantic::Extras("FEATURE_ID_0".to_string())),
        accessor_index,
    );
    primitive
        .extensions
        .get_or_insert_with(Default::default)
        .ext_mesh_features = Some(ExtMeshFeatures {
        feature_ids: vec![FeatureId {
            attribute: 0,
            feature_count: 1,
            property_table: 0,
        }],
    });
}

fn push_buffer_view(
    buffer_views: &mut Vec<buffer::View>,
    buffer_index: Index<Buffer>,
    byte_offset: usize,
    byte_length: usize,
) -> Index<buffer::View> {
    let view = buffer::View {
        buffer: buffer_index,
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: None,
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
    };
    let index = Index::new(buffer_views.len() as u32);
    buffer_views.push(view);
    index
}

fn push_accessor(accessors: &mut Vec<Accessor>, accessor: Accessor) -> Index<Accessor> {
    let index = Index::new(accessors.len() as u32);
    accessors.push(accessor);
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_table::BatchTable;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use tilechunk_json::mesh::{Mesh, Mode};
    use tilechunk_json::{Asset, Root};

    fn model_with_one_triangle() -> GltfModel {
        let position_accessor = Accessor {
            buffer_view: None,
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
        let document = Root {
            accessors: vec![position_accessor],
            asset: Asset::default(),
            meshes: vec![mesh],
            ..Default::default()
        };
        GltfModel::new(document, Vec::new())
    }

    fn one_row_batch_table() -> BatchTable {
        let mut table = BatchTable::new();
        let mut fields = BTreeMap::new();
        fields.insert("globalId".to_string(), Value::String("A".into()));
        table.push_row(0, &fields);
        table
    }

    #[test]
    fn merge_registers_structural_metadata_schema_and_one_property_table() {
        let mut model = model_with_one_triangle();
        let table = one_row_batch_table();

        merge(&mut model, &table, "meta.bin", "features.bin");

        let metadata = model.document.extensions.ext_structural_metadata.unwrap();
        let class = &metadata.schema.classes[CLASS_NAME];
        assert!(class.properties.contains_key("globalId"));
        assert_eq!(metadata.property_tables[0].count, 1);
    }

    #[test]
    fn merge_attaches_one_feature_id_accessor_per_primitive() {
        let mut model = model_with_one_triangle();
        let table = one_row_batch_table();

        merge(&mut model, &table, "meta.bin", "features.bin");

        let primitive = &model.document.meshes[0].primitives[0];
        let extensions = primitive.extensions.as_ref().unwrap();
        let feature_ids = extensions.ext_mesh_features.as_ref().unwrap();
        assert_eq!(feature_ids.feature_ids.len(), 1);
        assert_eq!(feature_ids.feature_ids[0].attribute, 0);

        let feature_accessor_index = primitive
            .attributes
            .get(&Checked::Valid(Semantic::Extras("FEATURE_ID_0".to_string())))
            .unwrap();
        let feature_accessor = &model.document.accessors[feature_accessor_index.value()];
        assert_eq!(feature_accessor.count.value(), 3);
    }

    #[test]
    fn merge_extends_two_buffers_and_required_extensions() {
        let mut model = model_with_one_triangle();
        let table = one_row_batch_table();

        let buffers = merge(&mut model, &table, "meta.bin", "features.bin");

        assert_eq!(model.document.buffers.len(), 2);
        assert_eq!(model.document.buffers[0].uri.as_deref(), Some("meta.bin"));
        assert_eq!(model.document.buffers[1].uri.as_deref(), Some("features.bin"));
        assert!(!buffers.metadata_bytes.is_empty());
        assert!(!buffers.feature_ids_bytes.is_empty());
        assert!(model.document.extensions_used.contains(&STRUCTURAL_METADATA.to_string()));
        assert!(model.document.extensions_required.contains(&MESH_FEATURES.to_string()));
    }

    #[test]
    fn offsets_accessor_has_row_count_plus_one_entries() {
        let mut table = BatchTable::new();
        let mut row_a = BTreeMap::new();
        row_a.insert("globalId".to_string(), Value::String("A".into()));
        table.push_row(0, &row_a);
        let mut row_b = BTreeMap::new();
        row_b.insert("globalId".to_string(), Value::String("B".into()));
        table.push_row(1, &row_b);
        let mut row_c = BTreeMap::new();
        row_c.insert("globalId".to_string(), Value::String("C".into()));
        table.push_row(2, &row_c);

        let mut model = model_with_one_triangle();
        merge(&mut model, &table, "meta.bin", "features.bin");

        let metadata = model.document.extensions.ext_structural_metadata.as_ref().unwrap();
        let property = &metadata.property_tables[0].properties["globalId"];
        let offsets_accessor = &model.document.accessors[property.string_offsets.value()];
        assert_eq!(offsets_accessor.count.value(), 4);
        let values_accessor = &model.document.accessors[property.values.value()];
        assert_eq!(values_accessor.count.value(), 3);
    }
}
