//! `tilechunk-render`: frames a finished glTF with an orbiting camera and
//! writes a 1920x1080 preview PNG (§6 "Renderer"). The renderer that turns
//! framed geometry into pixels is treated elsewhere as a black box (§1); here
//! it's a self-contained software rasterizer since there's no external
//! renderer process to shell out to.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tilechunk::render::{self, CameraParams, HorizontalDirection, VerticalDirection};
use tilechunk::GltfModel;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HorizontalArg {
    Cw,
    Ccw,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VerticalArg {
    U,
    D,
}

#[derive(Parser)]
#[command(about = "Renders a 1920x1080 preview PNG of a glTF asset from an orbiting camera")]
#[command(rename_all = "snake_case")]
struct Args {
    #[arg(long)]
    input_path: PathBuf,

    #[arg(long)]
    output_image_path: PathBuf,

    #[arg(long, default_value_t = 30.0)]
    camera_lenses: f32,

    #[arg(long, default_value_t = 1.3)]
    camera_distance: f32,

    #[arg(long, value_enum, default_value_t = HorizontalArg::Cw)]
    horizontal_rotate_direction: HorizontalArg,

    #[arg(long, default_value_t = 0.0)]
    horizontal_rotate_degree: f32,

    #[arg(long, value_enum, default_value_t = VerticalArg::U)]
    vertical_rotate_direction: VerticalArg,

    #[arg(long, default_value_t = 0.0)]
    vertical_rotate_degree: f32,
}

fn main() -> Result<()> {
    tilechunk::logging::init();
    let args = Args::parse();

    let model = GltfModel::from_glb_path(&args.input_path)
        .with_context(|| format!("reading {}", args.input_path.display()))?;

    let params = CameraParams {
        focal_length_mm: args.camera_lenses,
        distance_multiplier: args.camera_distance,
        horizontal_direction: match args.horizontal_rotate_direction {
            HorizontalArg::Cw => HorizontalDirection::Clockwise,
            HorizontalArg::Ccw => HorizontalDirection::CounterClockwise,
        },
        horizontal_degrees: args.horizontal_rotate_degree,
        vertical_direction: match args.vertical_rotate_direction {
            VerticalArg::U => VerticalDirection::Up,
            VerticalArg::D => VerticalDirection::Down,
        },
        vertical_degrees: args.vertical_rotate_degree,
    };

    if let Some(parent) = args.output_image_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }

    let image = render::render(&model, &params)?;
    image
        .save(&args.output_image_path)
        .with_context(|| format!("writing {}", args.output_image_path.display()))?;
    println!("wrote {}", args.output_image_path.display());
    Ok(())
}
