use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Camera {}

impl Validate for Camera {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Orthographic {}

impl Validate for Orthographic {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Perspective {}

impl Validate for Perspective {}
