//! C6: builds a `GltfModel` (plus batch table and mesh-name mapping) from an
//! IFC spatial/decomposition tree, calling the geometry engine per element.

use crate::batch_table::{BatchTable, BatchTableMapping};
use crate::error::{ChunkerError, Result};
use crate::geometry::{self, GeometryEngine, Topology, TriangleGroup};
use crate::model::GltfModel;
use crate::step::{self, StepEntity, StepModel, StepValue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type};
use tilechunk_json::buffer;
use tilechunk_json::material::{AlphaMode, EmissiveFactor, Material, PbrBaseColorFactor, PbrMetallicRoughness};
use tilechunk_json::mesh::{Mesh, Mode, Primitive, Semantic};
use tilechunk_json::scene::{Node, Scene};
use tilechunk_json::validation::{Checked, USize64};
use tilechunk_json::{Asset, Buffer, Index, Root};
use tracing::{debug, warn};

/// Entity types that count as an IFC product and can become a tree node.
///
/// `IfcProject` is deliberately absent: it is `IfcContext`, not
/// `IfcProduct`, in the IFC4 schema, and the source this was ported from
/// picks the first entity matching this list as the traversal root rather
/// than explicitly locating the project (§9 open question) — preserved
/// here rather than "fixed", since no test confirms the fix is wanted.
const PRODUCT_TYPES: &[&str] = &[
    "IFCSITE",
    "IFCBUILDING",
    "IFCBUILDINGSTOREY",
    "IFCSPACE",
    "IFCSPATIALZONE",
    "IFCWALL",
    "IFCWALLSTANDARDCASE",
    "IFCSLAB",
    "IFCBEAM",
    "IFCCOLUMN",
    "IFCDOOR",
    "IFCWINDOW",
    "IFCROOF",
    "IFCSTAIR",
    "IFCRAILING",
    "IFCRAMP",
    "IFCFOOTING",
    "IFCPILE",
    "IFCCOVERING",
    "IFCCURTAINWALL",
    "IFCPLATE",
    "IFCMEMBER",
    "IFCFURNISHINGELEMENT",
    "IFCFLOWTERMINAL",
    "IFCFLOWSEGMENT",
    "IFCFLOWFITTING",
    "IFCDISTRIBUTIONELEMENT",
    "IFCBUILDINGELEMENTPROXY",
    "IFCBUILDINGELEMENTPART",
    "IFCTRANSPORTELEMENT",
    "IFCVIRTUALELEMENT",
    "IFCELEMENTASSEMBLY",
];

/// `IfcProduct` attribute offsets shared by every subtype this builder
/// recognizes: `GlobalId`, then `OwnerHistory`, `Name`, `Description`,
/// `ObjectType`, `ObjectPlacement`, `Representation`. Subtype-specific
/// attributes are appended after these in every IFC4 product entity, so a
/// fixed-offset read is safe without a schema.
mod attr {
    pub const GLOBAL_ID: usize = 0;
    pub const NAME: usize = 2;
    pub const REPRESENTATION: usize = 6;
}

mod rel_aggregates {
    pub const RELATING_OBJECT: usize = 4;
    pub const RELATED_OBJECTS: usize = 5;
}

mod rel_contained {
    pub const RELATED_ELEMENTS: usize = 4;
    pub const RELATING_STRUCTURE: usize = 5;
}

mod rel_defines_by_properties {
    pub const RELATED_OBJECTS: usize = 4;
    pub const RELATING_PROPERTY_DEFINITION: usize = 5;
}

mod property_set {
    pub const HAS_PROPERTIES: usize = 4;
}

mod property_single_value {
    pub const NAME: usize = 0;
    pub const NOMINAL_VALUE: usize = 2;
}

/// Output of building one element's representation into one or more glTF
/// nodes carrying batch-table metadata.
struct BuildState {
    nodes: Vec<Node>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    materials_by_name: HashMap<String, Index<Material>>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<buffer::View>,
    blob: Vec<u8>,
    batch_table: BatchTable,
    batch_table_mapping: BatchTableMapping,
    mesh_name_mapping: HashMap<String, String>,
}

impl BuildState {
    fn new() -> Self {
        BuildState {
            nodes: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            materials_by_name: HashMap::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            blob: Vec::new(),
            batch_table: BatchTable::new(),
            batch_table_mapping: BatchTableMapping::new(),
            mesh_name_mapping: HashMap::new(),
        }
    }

    fn push_node(&mut self, node: Node) -> Index<Node> {
        let index = Index::new(self.nodes.len() as u32);
        self.nodes.push(node);
        index
    }

    fn material_index(&mut self, material: &geometry::EngineMaterial) -> Index<Material> {
        if let Some(index) = self.materials_by_name.get(&material.name) {
            return *index;
        }
        let normalized = geometry::normalize_material(material);
        let gltf_material = Material {
            alpha_mode: Checked::Valid(if normalized.alpha_mode_opaque {
                AlphaMode::Opaque
            } else {
                AlphaMode::Blend
            }),
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: PbrBaseColorFactor(normalized.base_color_factor),
                ..Default::default()
            },
            emissive_factor: EmissiveFactor::default(),
            #[cfg(feature = "names")]
            name: Some(material.name.clone()),
            ..Default::default()
        };
        let index = Index::new(self.materials.len() as u32);
        self.materials.push(gltf_material);
        self.materials_by_name.insert(material.name.clone(), index);
        index
    }

    fn align_blob(&mut self, alignment: usize) {
        while self.blob.len() % alignment != 0 {
            self.blob.push(0);
        }
    }

    /// Writes one triangle/line group as a fresh mesh with one primitive,
    /// per §4.5 "Primitives".
    fn push_mesh_group(&mut self, group: &TriangleGroup) -> Result<Index<Mesh>> {
        let material_index = self.material_index(&group.material);
        let positions = geometry::permute_coordinates(&group.vertices);

        let max_index = group.indices.iter().copied().max().unwrap_or(0);
        let component_type = geometry::index_component_type(max_index);
        let component_size = component_type.size();

        self.align_blob(component_size.max(1));
        let indices_byte_offset = self.blob.len();
        for &idx in &group.indices {
            match component_type {
                ComponentType::U8 => self.blob.push(idx as u8),
                ComponentType::U16 => self.blob.extend_from_slice(&(idx as u16).to_le_bytes()),
                ComponentType::U32 => self.blob.extend_from_slice(&idx.to_le_bytes()),
                _ => unreachable!("index component type is always an unsigned integer"),
            }
        }
        let indices_byte_length = self.blob.len() - indices_byte_offset;

        self.align_blob(4);
        let positions_byte_offset = self.blob.len();
        for vertex in &positions {
            for component in vertex {
                self.blob.extend_from_slice(&component.to_le_bytes());
            }
        }
        let positions_byte_length = self.blob.len() - positions_byte_offset;

        let indices_view = self.push_buffer_view(indices_byte_offset, indices_byte_length);
        let positions_view = self.push_buffer_view(positions_byte_offset, positions_byte_length);

        let (index_min, index_max) = group
            .indices
            .iter()
            .fold((u32::MAX, 0u32), |(min, max), &v| (min.min(v), max.max(v)));
        let indices_accessor = Accessor {
            buffer_view: Some(indices_view),
            byte_offset: None,
            count: USize64::from(group.indices.len()),
            component_type: Checked::Valid(GenericComponentType(component_type)),
            type_: Checked::Valid(Type::Scalar),
            min: Some(serde_json::json!([index_min])),
            max: Some(serde_json::json!([index_max])),
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            normalized: false,
            sparse: None,
        };
        let indices_accessor_index = self.push_accessor(indices_accessor);

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for vertex in &positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
        let positions_accessor = Accessor {
            buffer_view: Some(positions_view),
            byte_offset: None,
            count: USize64::from(positions.len()),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            type_: Checked::Valid(Type::Vec3),
            min: Some(serde_json::json!([min[0], min[1], min[2]])),
            max: Some(serde_json::json!([max[0], max[1], max[2]])),
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            normalized: false,
            sparse: None,
        };
        let positions_accessor_index = self.push_accessor(positions_accessor);

        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), positions_accessor_index);

        let has_triangle_indices = group.indices.len() >= 3;
        let mode = match group.topology {
            Topology::Triangles if has_triangle_indices => Mode::Triangles,
            _ => Mode::Lines,
        };

        let primitive = Primitive {
            attributes,
            extensions: None,
            extras: Default::default(),
            indices: Some(indices_accessor_index),
            material: Some(material_index),
            mode: Checked::Valid(mode),
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
        let mesh_index = Index::new(self.meshes.len() as u32);
        self.meshes.push(mesh);
        Ok(mesh_index)
    }

    fn push_buffer_view(&mut self, byte_offset: usize, byte_length: usize) -> Index<buffer::View> {
        let view = buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(byte_length),
            byte_offset: Some(USize64::from(byte_offset)),
            byte_stride: None,
            target: None,
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
        };
        let index = Index::new(self.buffer_views.len() as u32);
        self.buffer_views.push(view);
        index
    }

    fn push_accessor(&mut self, accessor: Accessor) -> Index<Accessor> {
        let index = Index::new(self.accessors.len() as u32);
        self.accessors.push(accessor);
        index
    }

    /// Overwrites the mesh's name with `global_id`, records the human name
    /// under it, and appends one batch-table row keyed by the mesh's own
    /// index (§4.5 "Naming contract with batch table").
    fn record_feature(
        &mut self,
        mesh_index: Index<Mesh>,
        global_id: &str,
        human_name: &str,
        wbs: Option<&String>,
    ) {
        #[cfg(feature = "names")]
        {
            self.meshes[mesh_index.value()].name = Some(global_id.to_string());
        }
        self.mesh_name_mapping
            .insert(global_id.to_string(), human_name.to_string());

        let mut fields = BTreeMap::new();
        fields.insert("globalId".to_string(), Value::String(global_id.to_string()));
        if let Some(wbs) = wbs {
            fields.insert("wbs".to_string(), Value::String(wbs.clone()));
        }

        let batch_id = mesh_index.value();
        self.batch_table.push_row(batch_id, &fields);
        self.batch_table_mapping.insert_row(global_id, batch_id, &fields);
    }
}

/// Forward decomposition and containment edges, plus WBS property values,
/// indexed by the STEP instance id they apply to.
struct Relations {
    aggregates: HashMap<u64, Vec<u64>>,
    containment: HashMap<u64, Vec<u64>>,
    wbs: HashMap<u64, String>,
}

fn collect_relations(model: &StepModel) -> Relations {
    let mut aggregates: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut containment: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut wbs: HashMap<u64, String> = HashMap::new();

    for &id in &model.order {
        let entity = &model.entities[&id];
        match entity.type_name.as_str() {
            "IFCRELAGGREGATES" => {
                if let (Some(relating), Some(related)) = (
                    entity.arg(rel_aggregates::RELATING_OBJECT).and_then(StepValue::as_id),
                    entity.arg(rel_aggregates::RELATED_OBJECTS).and_then(StepValue::as_list),
                ) {
                    let ids = related.iter().filter_map(StepValue::as_id).collect::<Vec<_>>();
                    aggregates.entry(relating).or_default().extend(ids);
                }
            }
            "IFCRELCONTAINEDINSPATIALSTRUCTURE" => {
                if let (Some(relating), Some(related)) = (
                    entity.arg(rel_contained::RELATING_STRUCTURE).and_then(StepValue::as_id),
                    entity.arg(rel_contained::RELATED_ELEMENTS).and_then(StepValue::as_list),
                ) {
                    let ids = related.iter().filter_map(StepValue::as_id).collect::<Vec<_>>();
                    containment.entry(relating).or_default().extend(ids);
                }
            }
            "IFCRELDEFINESBYPROPERTIES" => {
                collect_wbs_relation(entity, model, &mut wbs);
            }
            _ => {}
        }
    }

    Relations {
        aggregates,
        containment,
        wbs,
    }
}

fn collect_wbs_relation(entity: &StepEntity, model: &StepModel, wbs: &mut HashMap<u64, String>) {
    let related_objects = match entity
        .arg(rel_defines_by_properties::RELATED_OBJECTS)
        .and_then(StepValue::as_list)
    {
        Some(list) => list.iter().filter_map(StepValue::as_id).collect::<Vec<_>>(),
        None => return,
    };
    let property_set_id = match entity
        .arg(rel_defines_by_properties::RELATING_PROPERTY_DEFINITION)
        .and_then(StepValue::as_id)
    {
        Some(id) => id,
        None => return,
    };
    let Some(property_set) = model.get(property_set_id) else {
        return;
    };
    if property_set.type_name != "IFCPROPERTYSET" {
        return;
    }
    let Some(properties) = property_set
        .arg(property_set::HAS_PROPERTIES)
        .and_then(StepValue::as_list)
    else {
        return;
    };

    for value in properties {
        let Some(property_id) = value.as_id() else {
            continue;
        };
        let Some(property) = model.get(property_id) else {
            continue;
        };
        if property.type_name != "IFCPROPERTYSINGLEVALUE" {
            continue;
        }
        let name = property
            .arg(property_single_value::NAME)
            .and_then(StepValue::as_str);
        if name != Some("WBS") {
            continue;
        }
        let value_text = match property.arg(property_single_value::NOMINAL_VALUE) {
            Some(StepValue::Str(s)) => s.clone(),
            Some(StepValue::Int(i)) => i.to_string(),
            Some(StepValue::Real(r)) => r.to_string(),
            _ => continue,
        };
        for &object_id in &related_objects {
            wbs.insert(object_id, value_text.clone());
        }
    }
}

fn find_root(model: &StepModel) -> Option<u64> {
    model
        .order
        .iter()
        .copied()
        .find(|id| PRODUCT_TYPES.contains(&model.entities[id].type_name.as_str()))
}

fn visit_element(
    id: u64,
    model: &StepModel,
    relations: &Relations,
    visited: &mut HashSet<u64>,
    engine: &dyn GeometryEngine,
    state: &mut BuildState,
) -> Result<Index<Node>> {
    visited.insert(id);
    let entity = &model.entities[&id];
    let global_id = entity
        .arg(attr::GLOBAL_ID)
        .and_then(StepValue::as_str)
        .unwrap_or_default()
        .to_string();
    let name = entity
        .arg(attr::NAME)
        .and_then(StepValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| entity.type_name.clone());
    let has_representation = matches!(entity.arg(attr::REPRESENTATION), Some(StepValue::Id(_)));

    let mut child_ids: Vec<u64> = Vec::new();
    if let Some(children) = relations.aggregates.get(&id) {
        child_ids.extend(children);
    }
    if let Some(children) = relations.containment.get(&id) {
        child_ids.extend(children);
    }

    let mut children_indices = Vec::new();
    for child_id in child_ids {
        if visited.contains(&child_id) || !model.entities.contains_key(&child_id) {
            continue;
        }
        let child_index = visit_element(child_id, model, relations, visited, engine, state)?;
        children_indices.push(child_index);
    }

    let mut own_mesh = None;
    if has_representation {
        let groups = match engine.triangle_groups(id) {
            Ok(groups) => groups,
            Err(err) => {
                warn!(element = %global_id, error = %err, "geometry engine failed, skipping element");
                Vec::new()
            }
        };
        match groups.len() {
            0 => {}
            1 => {
                let mesh_index = state.push_mesh_group(&groups[0])?;
                state.record_feature(mesh_index, &global_id, &name, relations.wbs.get(&id));
                own_mesh = Some(mesh_index);
            }
            _ => {
                for group in &groups {
                    let mesh_index = state.push_mesh_group(group)?;
                    let child_name = format!("{name} | {}", group.material.name);
                    state.record_feature(mesh_index, &global_id, &child_name, relations.wbs.get(&id));
                    let child_node = Node {
                        mesh: Some(mesh_index),
                        #[cfg(feature = "names")]
                        name: Some(child_name),
                        ..Default::default()
                    };
                    children_indices.push(state.push_node(child_node));
                }
            }
        }
    }

    let node = Node {
        mesh: own_mesh,
        children: if children_indices.is_empty() {
            None
        } else {
            Some(children_indices)
        },
        #[cfg(feature = "names")]
        name: Some(name),
        ..Default::default()
    };
    debug!(step_id = id, global_id = %global_id, "built node");
    Ok(state.push_node(node))
}

/// Builds a glTF model from an IFC file at `path`, plus its batch table,
/// batch-table mapping, and mesh-name mapping (§4.5).
pub fn build(path: &Path, engine: &dyn GeometryEngine) -> Result<(GltfModel, BatchTable, BatchTableMapping, HashMap<String, String>)> {
    let text = std::fs::read_to_string(path).map_err(|e| ChunkerError::input_io(path, e))?;
    let model = step::parse(&text)?;

    let root_id = find_root(&model)
        .ok_or_else(|| ChunkerError::IfcParseError("no IFC product found in file".to_string()))?;
    let relations = collect_relations(&model);

    let mut state = BuildState::new();
    let mut visited = HashSet::new();
    let root_node = visit_element(root_id, &model, &relations, &mut visited, engine, &mut state)?;

    let scene = Scene {
        extensions: None,
        extras: Default::default(),
        #[cfg(feature = "names")]
        name: None,
        nodes: vec![root_node],
    };

    let document = Root {
        accessors: state.accessors,
        asset: Asset::default(),
        buffers: vec![Buffer {
            byte_length: USize64::from(state.blob.len()),
            uri: None,
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
        }],
        buffer_views: state.buffer_views,
        materials: state.materials,
        meshes: state.meshes,
        nodes: state.nodes,
        scenes: vec![scene],
        scene: Some(Index::new(0)),
        ..Default::default()
    };

    let gltf_model = GltfModel::new(document, state.blob);
    Ok((gltf_model, state.batch_table, state.batch_table_mapping, state.mesh_name_mapping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EngineMaterial;

    struct OneTriangleEngine;

    impl GeometryEngine for OneTriangleEngine {
        fn triangle_groups(&self, _step_id: u64) -> Result<Vec<TriangleGroup>> {
            Ok(vec![TriangleGroup {
                material: EngineMaterial {
                    name: "concrete".into(),
                    diffuse: [200.0, 200.0, 200.0],
                    transparency: 0.0,
                },
                vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                indices: vec![0, 1, 2],
                topology: Topology::Triangles,
            }])
        }
    }

    fn sample_ifc() -> String {
        "#1=IFCWALL('2O2Fr$t4X7Zf8NOew3FNr2',$,'Wall-01',$,$,#2,#3,$);\n\
         #2=IFCLOCALPLACEMENT($,$);\n\
         #3=IFCPRODUCTDEFINITIONSHAPE($,$,$);\n"
            .to_string()
    }

    #[test]
    fn builds_one_node_with_geometry_for_a_single_product() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.ifc");
        std::fs::write(&path, sample_ifc()).unwrap();

        let (model, batch_table, mapping, names) = build(&path, &OneTriangleEngine).unwrap();

        assert_eq!(model.document.nodes.len(), 1);
        assert_eq!(model.document.meshes.len(), 1);
        assert_eq!(batch_table.row_count(), 1);
        assert_eq!(mapping.0.len(), 1);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn finds_root_by_first_product_type_in_file_order() {
        let model = step::parse(&sample_ifc()).unwrap();
        assert_eq!(find_root(&model), Some(1));
    }
}
