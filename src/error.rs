use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the chunker pipeline.
///
/// Per the error handling policy: every variant here is fatal to the current
/// run except per-element geometry failures during IFC building, which are
/// logged and skipped by the caller rather than turned into this type.
#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("failed to read {path}: {source}")]
    InputIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    OutputIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed glTF JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("malformed GLB container: {0}")]
    GlbError(#[from] crate::glb::Error),

    #[error("malformed IFC file: {0}")]
    IfcParseError(String),

    #[error("dangling reference: {0}")]
    InvalidReference(String),

    #[error("geometry engine failed for element {element}: {message}")]
    GeometryEngineError { element: String, message: String },
}

pub type Result<T> = std::result::Result<T, ChunkerError>;

impl ChunkerError {
    pub fn input_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChunkerError::InputIoError {
            path: path.into(),
            source,
        }
    }

    pub fn output_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChunkerError::OutputIoError {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_reference(description: impl Into<String>) -> Self {
        ChunkerError::InvalidReference(description.into())
    }
}
