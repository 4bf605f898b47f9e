use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Animation {}

impl Validate for Animation {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Channel {}

impl Validate for Channel {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Target {}

impl Validate for Target {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Sampler {}

impl Validate for Sampler {}
