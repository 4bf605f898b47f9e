//! C5: splits a `GltfModel` into self-contained chunk files, one per window
//! of source node indices, unless the model is small enough to short-circuit.

use crate::collector::{collect_node, finalize_animations, CollectedInfo};
use crate::config::Config;
use crate::error::Result;
use crate::model::GltfModel;
use crate::reindex::reindex;
use crate::repack::repack;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Splits `model` into chunk files under `output_dir`, named
/// `<base_name>_<k>.glb` for k = 1..K. If the model has at most
/// `config.short_circuit_threshold` nodes, it is instead saved unmodified as
/// a single `<base_name>_1.glb` and that one path is returned.
///
/// `output_dir` must already exist. Windows share only read-only access to
/// `model`, so they're built in parallel; filenames and contents are
/// determined solely by window index and are unaffected by execution order.
pub fn chunk(
    model: &GltfModel,
    config: &Config,
    output_dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>> {
    let node_count = model.node_count();

    if node_count <= config.short_circuit_threshold {
        info!(
            node_count,
            threshold = config.short_circuit_threshold,
            "node count at or below short-circuit threshold, saving single copy"
        );
        let path = output_dir.join(format!("{base_name}_1.glb"));
        model.save_glb(&path)?;
        return Ok(vec![path]);
    }

    let window_size = config.split_size.max(1);
    let window_count = (node_count + window_size - 1) / window_size;
    info!(node_count, window_size, window_count, "splitting into chunk windows");

    let results: Vec<Result<Option<PathBuf>>> = (0..window_count)
        .into_par_iter()
        .map(|window_index| -> Result<Option<PathBuf>> {
            chunk_window(model, window_index, window_size, node_count, output_dir, base_name)
        })
        .collect();

    let mut outputs = Vec::with_capacity(window_count);
    for result in results {
        if let Some(path) = result? {
            outputs.push(path);
        }
    }
    Ok(outputs)
}

fn chunk_window(
    model: &GltfModel,
    window_index: usize,
    window_size: usize,
    node_count: usize,
    output_dir: &Path,
    base_name: &str,
) -> Result<Option<PathBuf>> {
    let start = window_index * window_size;
    let end = (start + window_size).min(node_count);

    // Fresh index maps per window: the Reindexer's destination indices are
    // only meaningful within the chunk that produced them, so reusing a map
    // across windows would silently cross-wire unrelated chunks.
    let mut collected = CollectedInfo::default();
    for node_index in start..end {
        collect_node(&model.document, node_index, window_size, &mut collected)?;
    }
    finalize_animations(&model.document, &mut collected)?;

    if collected.accessors.is_empty() || collected.buffer_views.is_empty() {
        debug!(window_index, "skipping window with no retained geometry");
        return Ok(None);
    }

    let mut reindexed = reindex(&model.document, &collected)?;
    let blob = repack(&model.blob, &mut reindexed)?;
    let chunk_model = GltfModel::new(reindexed, blob);

    let path = output_dir.join(format!("{base_name}_{}.glb", window_index + 1));
    chunk_model.save_glb(&path)?;
    debug!(window_index, nodes = collected.nodes.len(), path = %path.display(), "wrote chunk");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tilechunk_json::accessor::{Accessor, ComponentType, GenericComponentType, Type};
    use tilechunk_json::buffer;
    use tilechunk_json::mesh::{Mesh, Mode, Primitive, Semantic};
    use tilechunk_json::scene::{Node, Scene};
    use tilechunk_json::validation::{Checked, USize64};
    use tilechunk_json::{Buffer, Index, Root};

    /// A model with `node_count` flat (non-hierarchical) nodes, all sharing a
    /// single mesh/accessor/buffer-view/buffer so every window retains some
    /// geometry and nothing gets skipped as empty.
    fn sample_model(node_count: usize) -> GltfModel {
        let blob = vec![0u8; 36];

        let buffer_view = buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(36usize),
            byte_offset: Some(USize64::from(0usize)),
            byte_stride: None,
            #[cfg(feature = "names")]
            name: None,
            target: None,
            extensions: None,
            extras: Default::default(),
        };

        let accessor = Accessor {
            buffer_view: Some(Index::new(0)),
            byte_offset: None,
            count: USize64::from(3usize),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            extensions: None,
            extras: Default::default(),
            type_: Checked::Valid(Type::Vec3),
            min: None,
            max: None,
            #[cfg(feature = "names")]
            name: None,
            normalized: false,
            sparse: None,
        };

        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), Index::new(0));
        let primitive = Primitive {
            attributes,
            extensions: None,
            extras: Default::default(),
            indices: None,
            material: None,
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
        };
        let mesh = Mesh {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            primitives: vec![primitive],
            weights: None,
        };

        let nodes: Vec<Node> = (0..node_count)
            .map(|_| Node {
                mesh: Some(Index::new(0)),
                ..Default::default()
            })
            .collect();
        let scene = Scene {
            extensions: None,
            extras: Default::default(),
            #[cfg(feature = "names")]
            name: None,
            nodes: (0..node_count).map(|i| Index::new(i as u32)).collect(),
        };

        let document = Root {
            accessors: vec![accessor],
            buffer_views: vec![buffer_view],
            buffers: vec![Buffer {
                byte_length: USize64::from(36usize),
                #[cfg(feature = "names")]
                name: None,
                uri: None,
                extensions: None,
                extras: Default::default(),
            }],
            meshes: vec![mesh],
            nodes,
            scenes: vec![scene],
            scene: Some(Index::new(0)),
            ..Default::default()
        };

        GltfModel::new(document, blob)
    }

    #[test]
    fn short_circuits_below_threshold() {
        let model = sample_model(5);
        let config = Config {
            split_size: 100,
            short_circuit_threshold: 400,
        };
        let dir = tempfile::tempdir().unwrap();

        let outputs = chunk(&model, &config, dir.path(), "asset").unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].file_name().unwrap(), "asset_1.glb");
    }

    #[test]
    fn splits_above_threshold_covering_every_node_once() {
        let model = sample_model(401);
        let config = Config {
            split_size: 100,
            short_circuit_threshold: 400,
        };
        let dir = tempfile::tempdir().unwrap();

        let outputs = chunk(&model, &config, dir.path(), "asset").unwrap();

        assert_eq!(outputs.len(), 5);
        let mut total_nodes = 0;
        for path in &outputs {
            let chunk_model = GltfModel::from_glb_path(path).unwrap();
            total_nodes += chunk_model.node_count();
        }
        assert_eq!(total_nodes, 401);
    }
}
