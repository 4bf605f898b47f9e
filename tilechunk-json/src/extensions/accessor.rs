use crate::validation::Validate;
use serde_derive::{Deserialize, Serialize};

/// Extension specific data for `Accessor`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Accessor {}

impl Validate for Accessor {}

/// Extension specific data for `accessor::sparse::*`.
pub mod sparse {
    use crate::validation::Validate;
    use serde_derive::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct Indices {}

    impl Validate for Indices {}

    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct Sparse {}

    impl Validate for Sparse {}

    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct Values {}

    impl Validate for Values {}
}
