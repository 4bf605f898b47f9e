use crate::error::{ChunkerError, Result};
use crate::glb::Glb;
use std::borrow::Cow;
use std::path::Path;
use tilechunk_json::Root;

/// In-memory representation of a glTF asset: the JSON document plus the raw
/// binary blob it references. Mirrors glTF 2.0 directly (§3 of the spec);
/// cross-references inside `document` are array indices into the vectors
/// owned by `document` itself.
#[derive(Clone, Debug)]
pub struct GltfModel {
    pub document: Root,
    pub blob: Vec<u8>,
}

impl GltfModel {
    pub fn new(document: Root, blob: Vec<u8>) -> Self {
        GltfModel { document, blob }
    }

    /// Loads a `.glb` file from disk.
    pub fn from_glb_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ChunkerError::input_io(path, e))?;
        Self::from_glb_bytes(&bytes)
    }

    /// Parses an in-memory GLB container.
    pub fn from_glb_bytes(bytes: &[u8]) -> Result<Self> {
        let glb = Glb::from_slice(bytes)?;
        let document: Root = tilechunk_json::from_slice(&glb.json)?;
        let blob = glb.bin.map(|c| c.into_owned()).unwrap_or_default();
        Ok(GltfModel::new(document, blob))
    }

    /// Serializes this model as a GLB container.
    pub fn to_glb_bytes(&self) -> Result<Vec<u8>> {
        let json = self
            .document
            .to_vec()
            .map_err(ChunkerError::ParseError)?;
        let glb = Glb {
            json: Cow::Owned(json),
            bin: Some(Cow::Borrowed(&self.blob)),
        };
        Ok(glb.to_vec()?)
    }

    /// Serializes and writes this model to `path` as a `.glb` file.
    pub fn save_glb(&self, path: &Path) -> Result<()> {
        let bytes = self.to_glb_bytes()?;
        std::fs::write(path, bytes).map_err(|e| ChunkerError::output_io(path, e))
    }

    pub fn node_count(&self) -> usize {
        self.document.nodes.len()
    }
}
