//! `tilechunk-ifc`: builds a glTF from an IFC file and, on request, folds its
//! batch table into the result via `EXT_structural_metadata` /
//! `EXT_mesh_features` (§6 "IFC-only").

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tilechunk::geometry::{GeometryEngine, TriangleGroup};
use tilechunk::{ifc, metadata};

#[derive(Parser)]
#[command(about = "Builds a glTF from an IFC file, optionally merging its batch table as metadata")]
#[command(rename_all = "snake_case")]
struct Args {
    #[arg(long)]
    input_path: PathBuf,

    #[arg(long)]
    output_path: PathBuf,

    /// Pass "true" to fold the batch table into the GLB via structural
    /// metadata; any other value (or omitting the flag) skips that step.
    #[arg(long, default_value = "false")]
    merge_metadata: String,
}

/// Stands in for the real IFC geometry engine (`ifcopenshell.geom.create_shape`
/// in the source tool, explicitly out of scope here); every element comes back
/// with no geometry until a real engine is wired in at this seam.
struct NullGeometryEngine;

impl GeometryEngine for NullGeometryEngine {
    fn triangle_groups(&self, _step_id: u64) -> tilechunk::Result<Vec<TriangleGroup>> {
        Ok(Vec::new())
    }
}

fn main() -> Result<()> {
    tilechunk::logging::init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.output_path)
        .with_context(|| format!("creating output directory {}", args.output_path.display()))?;

    let base_name = args
        .input_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no file stem", args.input_path.display()))?;

    let (mut model, batch_table, mapping, mesh_name_mapping) = ifc::build(&args.input_path, &NullGeometryEngine)
        .with_context(|| format!("building glTF from {}", args.input_path.display()))?;

    write_json(&args.output_path, &base_name, "batch_table", &batch_table)?;
    write_json(&args.output_path, &base_name, "batch_table_mapping", &mapping)?;
    write_json(&args.output_path, &base_name, "mesh_name_mapping", &mesh_name_mapping)?;

    let glb_path = args.output_path.join(format!("{base_name}.glb"));
    model.save_glb(&glb_path)?;
    println!("wrote {}", glb_path.display());

    if args.merge_metadata == "true" {
        let metadata_buffer_name = format!("{base_name}_feature_metadata_buffer.bin");
        let feature_ids_buffer_name = format!("{base_name}_feature_ids_buffer.bin");
        let merged = metadata::merge(&mut model, &batch_table, &metadata_buffer_name, &feature_ids_buffer_name);

        write_bytes(&args.output_path, &metadata_buffer_name, &merged.metadata_bytes)?;
        write_bytes(&args.output_path, &feature_ids_buffer_name, &merged.feature_ids_bytes)?;

        let merged_glb_path = args.output_path.join(format!("{base_name}_merged_with_metadata.glb"));
        model.save_glb(&merged_glb_path)?;
        println!("wrote {}", merged_glb_path.display());
    }

    Ok(())
}

fn write_json<T: serde::Serialize>(output_dir: &std::path::Path, base_name: &str, suffix: &str, value: &T) -> Result<()> {
    let path = output_dir.join(format!("{base_name}_{suffix}.json"));
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, value).with_context(|| format!("writing {}", path.display()))
}

fn write_bytes(output_dir: &std::path::Path, filename: &str, bytes: &[u8]) -> Result<()> {
    let path = output_dir.join(filename);
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
}
