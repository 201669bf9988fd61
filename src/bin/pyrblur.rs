use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use pyrblur::SimilarityMetric as _;

#[derive(Parser, Debug)]
#[command(name = "pyrblur", version)]
struct Cli {
    /// Log scheduling and per-pass diagnostics to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Blur an image and write it as a PNG.
    Blur(BlurArgs),
    /// Print the pass plan for a radius and image size as JSON.
    Plan(PlanArgs),
    /// Compare the pyramid blur against a direct Gaussian and print the SSIM.
    Compare(CompareArgs),
}

#[derive(Parser, Debug)]
struct BlurArgs {
    /// Input image (any format the `image` crate decodes).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Blur radius in pixels (sigma = radius / 2).
    #[arg(long)]
    radius: f32,

    #[arg(long, value_enum, default_value_t = MethodChoice::FixedLog)]
    method: MethodChoice,

    /// Optional JSON configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[arg(long)]
    radius: f32,

    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    #[arg(long, value_enum, default_value_t = MethodChoice::FixedLog)]
    method: MethodChoice,

    /// Optional JSON configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    radius: f32,

    #[arg(long, value_enum, default_value_t = MethodChoice::FixedLog)]
    method: MethodChoice,

    /// Also write the pyramid result here.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write the direct Gaussian here.
    #[arg(long)]
    reference_out: Option<PathBuf>,

    /// Optional JSON configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodChoice {
    FixedLog,
    FixedLogCorrected,
    RadiusBudget,
    Dyadic,
}

impl From<MethodChoice> for pyrblur::BlurMethod {
    fn from(m: MethodChoice) -> Self {
        match m {
            MethodChoice::FixedLog => Self::FixedLog,
            MethodChoice::FixedLogCorrected => Self::FixedLogCorrected,
            MethodChoice::RadiusBudget => Self::RadiusBudget,
            MethodChoice::Dyadic => Self::Dyadic,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }
    match cli.cmd {
        Command::Blur(args) => cmd_blur(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Compare(args) => cmd_compare(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<pyrblur::Config> {
    match path {
        Some(p) => pyrblur::Config::from_path(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(pyrblur::Config::default()),
    }
}

fn read_image(path: &Path) -> anyhow::Result<pyrblur::ImageRgba8> {
    let img = image::open(path).with_context(|| format!("open image '{}'", path.display()))?;
    Ok(pyrblur::ImageRgba8::from_dynamic(&img)?)
}

fn write_png(path: &Path, img: &pyrblur::ImageRgba8) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &img.data,
        img.width,
        img.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn make_engine(cfg: &pyrblur::Config) -> anyhow::Result<pyrblur::BlurEngine> {
    Ok(pyrblur::BlurEngine::cpu(cfg.engine_opts(), cfg.cpu)?)
}

fn cmd_blur(args: BlurArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let src = read_image(&args.in_path)?;
    let mut engine = make_engine(&cfg)?;

    let (out, stats) = engine
        .blur_with_stats(&src, args.radius, args.method.into())
        .with_context(|| format!("blur '{}'", args.in_path.display()))?;
    eprintln!(
        "{} passes, working size {}",
        stats.plan.len(),
        stats.plan.working_size().unwrap_or(src.size())
    );
    write_png(&args.out, &out)
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let plan = pyrblur::PassScheduler::new(cfg.schedule).plan(
        args.method.into(),
        args.radius,
        args.width,
        args.height,
    )?;
    let json = serde_json::to_string_pretty(&plan).context("serialize plan")?;
    println!("{json}");
    Ok(())
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let src = read_image(&args.in_path)?;
    let mut engine = make_engine(&cfg)?;

    let (approx, stats) = engine.blur_with_stats(&src, args.radius, args.method.into())?;
    let reference = pyrblur::reference_gaussian_blur(&src, args.radius)?;
    let ssim = cfg.ssim.score(&approx, &reference)?;

    println!("method: {:?}", stats.plan.method);
    println!("passes: {}", stats.plan.len());
    println!("ssim: {ssim:.4}");

    if let Some(p) = &args.out {
        write_png(p, &approx)?;
    }
    if let Some(p) = &args.reference_out {
        write_png(p, &reference)?;
    }
    Ok(())
}
