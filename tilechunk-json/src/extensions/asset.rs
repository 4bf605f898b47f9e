use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Asset {}

impl Validate for Asset {}
