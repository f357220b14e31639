//! # VXLVIEW Command Line
//!
//! ```bash
//! # One frame of a unit
//! vxlview render art/htnk.vxl --frame 3 --out htnk.png
//!
//! # Screenshot sequence (and the in-game preview when enabled in settings)
//! vxlview shots art/htnk.vxl --color Gold --turret-rotation 25
//!
//! # Without a GPU adapter (resource lifecycle only, images stay blank)
//! vxlview --backend headless shots art/htnk.vxl
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};
use vxlview::screenshot::{self, load_background, render_frame, save_png, ShotOptions};
use vxlview::{build_renderer, Settings, SharedAssets, Unit, DEFAULT_SETTINGS_FILE};
use vxlview_rendering::{GpuDevice, HeadlessDevice, WgpuDevice};

#[derive(Parser, Debug)]
#[command(name = "vxlview", version, about = "Render voxel units to PNG")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Settings file.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Lighting table.
    #[arg(long, global = true, default_value = "voxels.vpl")]
    vpl: PathBuf,

    /// Unit palette.
    #[arg(long, global = true, default_value = "unittem.pal")]
    pal: PathBuf,

    /// Remap color name from the settings `[colors]` table.
    #[arg(long, global = true, default_value = "Default")]
    color: String,

    /// Turret turn in hundredths of a full circle.
    #[arg(long, global = true, default_value_t = 0.0, allow_hyphen_values = true)]
    turret_rotation: f32,

    /// Turret and barrel shift along X.
    #[arg(long, global = true, default_value_t = 0.0, allow_hyphen_values = true)]
    turret_offset: f32,

    /// Mirror the log into this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Device backend.
    #[arg(long, global = true, value_enum, default_value_t = Backend::Wgpu)]
    backend: Backend,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Render(RenderArgs),
    /// Write the screenshot sequence.
    Shots(ShotsArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Body `.vxl`; turret and barrel are found next to it.
    body: PathBuf,

    /// Animation frame (wrapped per part).
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// View angle in degrees.
    #[arg(long, default_value_t = -135.0, allow_hyphen_values = true)]
    angle: f32,

    /// Output PNG path (default `<name>.png`).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ShotsArgs {
    /// Body `.vxl`; turret and barrel are found next to it.
    body: PathBuf,

    /// Overrides `screenshot_output_dir`.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// First available GPU adapter.
    Wgpu,
    /// In-memory device, no GPU.
    Headless,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.backend {
        Backend::Wgpu => {
            let device = WgpuDevice::new().context("create wgpu device")?;
            run(device, &cli)
        }
        Backend::Headless => run(HeadlessDevice::new(), &cli),
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create log file '{}'", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

fn run<D: GpuDevice>(device: D, cli: &Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.settings)?;
    let remap = settings.require_color(&cli.color)?;
    let assets = SharedAssets::load(&cli.vpl, &cli.pal)?;
    let mut renderer = build_renderer(device, &settings, &assets, remap)?;
    info!(device = renderer.device().name(), color = %cli.color, "renderer ready");

    let mut options = ShotOptions::from_settings(&settings.settings);
    options.turret_rotation = cli.turret_rotation;
    options.turret_offset = cli.turret_offset;

    match &cli.cmd {
        Command::Render(args) => {
            let unit = Unit::load(&args.body)?;
            unit.load_into(&mut renderer)?;
            let image = render_frame(&mut renderer, &unit, args.frame, args.angle.to_radians(), &options)?;
            let out = args.out.clone().unwrap_or_else(|| PathBuf::from(format!("{}.png", unit.name())));
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            save_png(&image, &out)?;
            eprintln!("wrote {}", out.display());
        }
        Command::Shots(args) => {
            if let Some(dir) = &args.out_dir {
                options.output_dir.clone_from(dir);
            }
            let unit = Unit::load(&args.body)?;
            unit.load_into(&mut renderer)?;
            let written = screenshot::write_sequence(&mut renderer, &unit, &options)?;
            eprintln!("wrote {} images to {}", written.len(), options.output_dir.display());

            if settings.settings.generate_ingame_views {
                let base = cli.settings.parent().unwrap_or_else(|| Path::new("."));
                let background = load_background(&base.join(&settings.settings.background_file_name));
                let path = screenshot::write_preview(
                    &mut renderer,
                    &unit,
                    &options,
                    settings.settings.cell_offsets(),
                    background.as_ref(),
                )?;
                eprintln!("wrote {}", path.display());
            }
        }
    }
    Ok(())
}
