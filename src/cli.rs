use std::{fs, num::NonZeroUsize, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use patchbvh::{BvhSettings, LinearBvh, PatchModel, geometry::WorldVector};
use tracing_subscriber::EnvFilter;

/// Builds a flat BVH over a quad patch model and writes it out for upload.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Patch model to load
    model: PathBuf,

    /// Maximum number of patches in a leaf
    #[arg(long, default_value = "3")]
    leaf_size: NonZeroUsize,

    /// Uniform scale applied to the model before building
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Offset applied to the model after scaling
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    offset: Option<Vec<f32>>,

    /// Where to write the BVH node buffer
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Where to write the reordered patches
    #[arg(long)]
    patches_output: Option<PathBuf>,

    /// Store child indices and leaf ranges as floats
    #[arg(long)]
    float_layout: bool,

    #[arg(long)]
    print_tree: bool,

    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut model = PatchModel::with_file(&args.model)
        .with_context(|| format!("Loading {}", args.model.display()))?;

    let offset = match args.offset.as_deref() {
        Some(&[x, y, z]) => WorldVector::new(x, y, z),
        Some(_) => anyhow::bail!("Offset needs exactly three coordinates"),
        None => WorldVector::zeros(),
    };
    if args.scale != 1.0 || offset != WorldVector::zeros() {
        model.transform(args.scale, &offset);
    }

    let settings = BvhSettings::builder()
        .leaf_threshold(args.leaf_size)
        .build();
    let tree = model.build_tree(&settings);

    if args.print_tree {
        tree.print_tree();
    }
    if args.stats {
        tree.print_statistics();
    }

    let bvh = LinearBvh::from_tree(&tree);
    bvh.validate(model.patches().len())
        .context("Built BVH has an invalid layout")?;

    tracing::info!(
        node_count = bvh.len(),
        byte_len = bvh.byte_len(),
        "BVH ready"
    );

    if let Some(output) = &args.output {
        let float_nodes;
        let bytes: &[u8] = if args.float_layout {
            float_nodes = bvh.to_float_layout();
            bytemuck::cast_slice(&float_nodes)
        } else {
            bvh.as_bytes()
        };
        fs::write(output, bytes).with_context(|| format!("Writing {}", output.display()))?;
    }

    if let Some(output) = &args.patches_output {
        let patches = model.gpu_patches();
        fs::write(output, bytemuck::cast_slice::<_, u8>(&patches))
            .with_context(|| format!("Writing {}", output.display()))?;
    }

    Ok(())
}
