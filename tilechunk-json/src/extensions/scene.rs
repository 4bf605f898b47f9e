use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Node {}

impl Validate for Node {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Scene {}

impl Validate for Scene {}
