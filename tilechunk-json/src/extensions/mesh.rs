use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

/// Mesh-level extension data (currently unused; feature metadata lives on
/// primitives, not meshes).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Mesh {}

impl Validate for Mesh {}

/// Primitive-level extension data.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Primitive {
    #[serde(
        default,
        rename = "EXT_mesh_features",
        skip_serializing_if = "Option::is_none"
    )]
    pub ext_mesh_features: Option<ExtMeshFeatures>,
}

impl Validate for Primitive {}

/// `EXT_mesh_features` on a primitive: one or more per-vertex feature-id sets.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExtMeshFeatures {
    #[serde(rename = "featureIds")]
    pub feature_ids: Vec<FeatureId>,
}

impl Validate for ExtMeshFeatures {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FeatureId {
    /// Index suffix of the `_FEATURE_ID_n` vertex attribute carrying this set.
    pub attribute: u32,

    #[serde(rename = "featureCount")]
    pub feature_count: u32,

    #[serde(rename = "propertyTable")]
    pub property_table: u32,
}

impl Validate for FeatureId {}
