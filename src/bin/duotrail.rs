use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use duotrail::{
    CpuSurface, FsImageLoader, ImagePool, Millis, PointerSample, RayonExecutor, RecolorCache,
    RenderSettings, RenderSurface, Rgb8, TrailConfig, TrailController, TransformParams,
};

#[derive(Parser, Debug)]
#[command(name = "duotrail", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the duotone transform to one image.
    Recolor(RecolorArgs),
    /// Drive a trail with a pointer path and write PNG frames.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct RecolorArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Color for dark tones, `rgb(r,g,b)` or `#rrggbb`.
    #[arg(long)]
    color_a: Option<Rgb8>,

    /// Color for light tones.
    #[arg(long)]
    color_b: Option<Rgb8>,

    #[arg(long)]
    intensity: Option<f64>,

    /// Dither amplitude in [0, 1).
    #[arg(long)]
    noise: Option<f64>,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Pool images, in ring order.
    #[arg(long, num_args = 1.., required = true)]
    images: Vec<PathBuf>,

    /// Trail configuration JSON. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pointer samples JSON (`[{"x":..,"y":..,"t_ms":..}, ..]`). Defaults to a figure-eight.
    #[arg(long)]
    path: Option<PathBuf>,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 240)]
    frames: u64,

    /// Directory receiving `frame_NNNNN.png`.
    #[arg(long)]
    out_dir: PathBuf,

    /// Recolor worker threads (rayon default when omitted).
    #[arg(long)]
    threads: Option<usize>,

    /// Write every K-th frame.
    #[arg(long, default_value_t = 1)]
    every: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Recolor(args) => cmd_recolor(args),
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn cmd_recolor(args: RecolorArgs) -> anyhow::Result<()> {
    let mut params = TransformParams::default();
    if let Some(c) = args.color_a {
        params.color_a = c;
    }
    if let Some(c) = args.color_b {
        params.color_b = c;
    }
    if let Some(v) = args.intensity {
        params.intensity = v;
    }
    if let Some(v) = args.noise {
        params.noise_amount = v;
    }
    params.validate()?;

    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let src = duotrail::decode_image(&bytes)?;
    let out = duotrail::transform_image(&src, &params)?;

    ensure_parent(&args.out)?;
    out.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    if !(args.fps.is_finite() && args.fps > 0.0) {
        anyhow::bail!("--fps must be a positive number");
    }
    let every = args.every.max(1);

    let config = match &args.config {
        Some(p) => TrailConfig::from_json_file(p)?,
        None => TrailConfig::default(),
    };

    let sources: Vec<String> = args
        .images
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let pool = ImagePool::load(&sources, &FsImageLoader::new("."))?;

    let executor = Arc::new(RayonExecutor::new(args.threads)?);
    let cache = Arc::new(RecolorCache::new(executor));
    let mut ctl = TrailController::new(config, &pool, cache)?;

    let samples = match &args.path {
        Some(p) => read_samples(p)?,
        None => figure_eight(args.width, args.height, args.fps, args.frames),
    };

    let mut surface = CpuSurface::new(
        args.width,
        args.height,
        RenderSettings {
            clear_rgba: Some([18, 20, 28, 255]),
        },
    )?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let mut next = 0usize;
    let mut written = 0u64;
    for i in 0..args.frames {
        let now = frame_time(i, args.fps);
        while let Some(s) = samples.get(next)
            && s.at <= now
        {
            ctl.observe(*s);
            next += 1;
        }
        ctl.tick(now);

        if i % every != 0 {
            continue;
        }
        let frame = surface.render_scene(&ctl.scene())?;
        let out = args.out_dir.join(format!("frame_{i:05}.png"));
        frame
            .to_rgba_image()?
            .save_with_format(&out, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", out.display()))?;
        written += 1;
    }
    ctl.shutdown();

    let stats = ctl.stats();
    println!(
        "frames={written} spawns={} retires={} recolors_started={} recolors_completed={} failures={} stale={}",
        stats.spawns,
        stats.retires,
        stats.recolors_started,
        stats.recolors_completed,
        stats.recolor_failures,
        stats.stale_discards,
    );
    Ok(())
}

fn frame_time(i: u64, fps: f64) -> Millis {
    Millis((i as f64 * 1000.0 / fps).round() as u64)
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<PointerSample>> {
    let f = File::open(path).with_context(|| format!("open pointer path '{}'", path.display()))?;
    let mut samples: Vec<PointerSample> = serde_json::from_reader(BufReader::new(f))
        .with_context(|| "parse pointer path JSON")?;
    samples.sort_by_key(|s| s.at);
    Ok(samples)
}

/// One sample per frame along a figure-eight spanning most of the surface; one loop per 4s.
fn figure_eight(width: u32, height: u32, fps: f64, frames: u64) -> Vec<PointerSample> {
    let (w, h) = (f64::from(width), f64::from(height));
    (0..frames)
        .map(|i| {
            let at = frame_time(i, fps);
            let theta = std::f64::consts::TAU * at.0 as f64 / 4000.0;
            PointerSample::new(
                w / 2.0 + w * 0.38 * theta.sin(),
                h / 2.0 + h * 0.3 * (2.0 * theta).sin(),
                at,
            )
        })
        .collect()
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
