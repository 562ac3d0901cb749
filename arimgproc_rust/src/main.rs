// CLI entry for arimgproc
use anyhow::{Context, Result};
use arimgproc_rust::colconv::{grayscale, yuv_round_trip};
use arimgproc_rust::exam::{greenscale, zoom};
use arimgproc_rust::{resample, segment, EmptyClusterPolicy, Interpolation, Region, SegmentParams, SourceImage, RED};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use image::RgbaImage;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "arimgproc", version, about = "Color segmentation and resampling for images")]
struct Cli {
    /// Input image path
    #[arg(value_hint = ValueHint::FilePath)]
    input: String,
    /// Output image path (written in the input's format)
    #[arg(value_hint = ValueHint::FilePath)]
    output: String,

    #[command(subcommand)]
    op: Op,
}

#[derive(Subcommand, Debug)]
enum Op {
    /// Cluster colors with k-means and paint each region with its mean color
    Segment {
        /// Number of clusters
        #[arg(short = 'k', long = "clusters", default_value_t = 6)]
        clusters: usize,
        /// Number of worker threads
        #[arg(long = "threads")]
        threads: Option<usize>,
        /// Iteration cap
        #[arg(long = "max-iterations")]
        max_iterations: Option<usize>,
        /// Seed for the initial centroid draw
        #[arg(long = "seed")]
        seed: Option<u64>,
        /// Reseed empty clusters from a random pixel instead of keeping them
        #[arg(long = "reseed-empty", action = ArgAction::SetTrue)]
        reseed_empty: bool,
        /// Bilinear scale factor applied before clustering
        #[arg(long = "prescale")]
        prescale: Option<f64>,
        /// Mark region boundaries in red
        #[arg(long = "highlight", action = ArgAction::SetTrue)]
        highlight: bool,
    },
    /// Scale the image
    Resample {
        /// Scale factor
        #[arg(short = 'f', long = "factor")]
        factor: f64,
        /// Use nearest-neighbor instead of bilinear interpolation
        #[arg(long = "nearest", action = ArgAction::SetTrue)]
        nearest: bool,
    },
    /// BT.601 luma
    Gray,
    /// Round trip through YUV
    Yuv,
    /// Channel mean in the green channel
    Greenscale,
    /// Zoom the top-left quarter in place
    Zoom {
        #[arg(short = 'f', long = "factor", default_value_t = 2.0)]
        factor: f64,
    },
}

fn segment_params(op: &Op) -> Option<SegmentParams> {
    let Op::Segment { clusters, threads, max_iterations, seed, reseed_empty, prescale, highlight } = op else {
        return None;
    };
    let mut params = SegmentParams::new(*clusters);
    if let Some(v) = threads { params.config.num_threads = (*v).max(1); }
    if let Some(v) = max_iterations { params.config.max_iterations = *v; }
    if *reseed_empty { params.config.empty_cluster = EmptyClusterPolicy::Reseed; }
    params.config.seed = *seed;
    params.prescale = *prescale;
    params.highlight = highlight.then_some(RED);
    Some(params)
}

fn run(src: &SourceImage, op: &Op) -> Result<RgbaImage> {
    let img = &src.image;
    let out = match op {
        Op::Segment { .. } => {
            let params = segment_params(op).context("segment parameters")?;
            segment(img, &params)?.image
        }
        Op::Resample { factor, nearest } => {
            let method = if *nearest { Interpolation::NearestNeighbor } else { Interpolation::Bilinear };
            resample(img, *factor, method)?
        }
        Op::Gray => grayscale(img),
        Op::Yuv => yuv_round_trip(img),
        Op::Greenscale => greenscale(img),
        Op::Zoom { factor } => zoom(img, Region::new(0, 0, img.width() / 2, img.height() / 2), *factor)?,
    };
    Ok(out)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let src = SourceImage::load(&cli.input).with_context(|| format!("loading {}", cli.input))?;
    let out = run(&src, &cli.op)?;
    let bytes = src.encode(&out)?;
    std::fs::write(&cli.output, bytes).with_context(|| format!("writing {}", cli.output))?;
    info!("Output saved to {}", cli.output);
    Ok(())
}
