use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Sampler {}

impl Validate for Sampler {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Texture {}

impl Validate for Texture {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Info {}

impl Validate for Info {}
