use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Material {}

impl Validate for Material {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PbrMetallicRoughness {}

impl Validate for PbrMetallicRoughness {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NormalTexture {}

impl Validate for NormalTexture {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OcclusionTexture {}

impl Validate for OcclusionTexture {}
