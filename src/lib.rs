//! Splits a glTF 2.0 scene (optionally built from an IFC model first) into a
//! sequence of self-contained glTF chunks of at most N nodes each.
//!
//! The six components named in the design (`GltfModel`, `ResourceCollector`,
//! `Reindexer`, `BlobRepacker`, `Chunker`, `IfcBuilder`) map onto the modules
//! below: [`model`], [`collector`], [`reindex`], [`repack`], [`chunker`],
//! [`ifc`].

pub mod batch_table;
pub mod chunker;
pub mod collector;
pub mod config;
pub mod error;
pub mod geometry;
pub mod glb;
pub mod ifc;
pub mod logging;
#[cfg(feature = "extras")]
pub mod metadata;
pub mod model;
pub mod reindex;
pub mod render;
pub mod repack;
pub mod step;

pub use config::Config;
pub use error::{ChunkerError, Result};
pub use model::GltfModel;
