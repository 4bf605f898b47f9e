use crate::validation::Validate;
use crate::{accessor::Accessor, Index};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root-level extension data.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Root {
    #[serde(
        default,
        rename = "EXT_structural_metadata",
        skip_serializing_if = "Option::is_none"
    )]
    pub ext_structural_metadata: Option<ExtStructuralMetadata>,
}

impl Validate for Root {}

/// `EXT_structural_metadata` at the asset root: a schema of property-table classes
/// plus the property tables themselves.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExtStructuralMetadata {
    pub schema: Schema,

    #[serde(rename = "propertyTables")]
    pub property_tables: Vec<PropertyTable>,
}

impl Validate for ExtStructuralMetadata {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Schema {
    pub classes: BTreeMap<String, Class>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Class {
    pub properties: BTreeMap<String, ClassProperty>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ClassProperty {
    #[serde(rename = "type")]
    pub ty: String,
}

/// One property table: a row count plus, per column, the accessor pair
/// encoding that column's string values.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PropertyTable {
    pub class: String,

    pub count: u32,

    pub properties: BTreeMap<String, PropertyTableProperty>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PropertyTableProperty {
    /// Accessor holding the concatenated UTF-8 bytes for this column.
    pub values: Index<Accessor>,

    /// Accessor holding `count + 1` cumulative byte offsets into `values`.
    #[serde(rename = "stringOffsets")]
    pub string_offsets: Index<Accessor>,
}
