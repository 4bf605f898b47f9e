use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Buffer {}

impl Validate for Buffer {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct View {}

impl Validate for View {}
