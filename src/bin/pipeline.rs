//! `tilechunk-pipeline`: splits a glTF or IFC asset into chunk files in one
//! step (§6 "Pipeline"). IFC input is first built into a glTF via the same
//! path the IFC-only binary uses, then chunked like any other input.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tilechunk::config::Config;
use tilechunk::geometry::{GeometryEngine, TriangleGroup};
use tilechunk::{chunker, ifc, GltfModel};

#[derive(Parser)]
#[command(about = "Splits a glTF 2.0 asset (or an IFC model, converted first) into chunk files")]
#[command(rename_all = "snake_case")]
struct Args {
    #[arg(long)]
    input_path: PathBuf,

    #[arg(long)]
    output_path: PathBuf,

    #[arg(long, default_value_t = 100)]
    split_size: usize,
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

    let base_name = base_name(&args.input_path)?;
    let config = Config {
        split_size: args.split_size,
        ..Config::default()
    };

    let is_ifc = args
        .input_path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("ifc"))
        .unwrap_or(false);

    let model = if is_ifc {
        let (model, batch_table, mapping, mesh_name_mapping) = ifc::build(&args.input_path, &NullGeometryEngine)
            .with_context(|| format!("building glTF from {}", args.input_path.display()))?;
        write_json(&args.output_path, &base_name, "batch_table", &batch_table)?;
        write_json(&args.output_path, &base_name, "batch_table_mapping", &mapping)?;
        write_json(&args.output_path, &base_name, "mesh_name_mapping", &mesh_name_mapping)?;
        let glb_path = args.output_path.join(format!("{base_name}.glb"));
        model.save_glb(&glb_path)?;
        model
    } else {
        GltfModel::from_glb_path(&args.input_path)
            .with_context(|| format!("reading {}", args.input_path.display()))?
    };

    let outputs = chunker::chunk(&model, &config, &args.output_path, &base_name)?;
    for path in outputs {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn base_name(path: &std::path::Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no file stem", path.display()))
}

fn write_json<T: serde::Serialize>(output_dir: &std::path::Path, base_name: &str, suffix: &str, value: &T) -> Result<()> {
    let path = output_dir.join(format!("{base_name}_{suffix}.json"));
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, value).with_context(|| format!("writing {}", path.display()))
}
