//! hazardgrid CLI. Runs the frame → path pipeline on image files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use hazardgrid::marker::Dictionary;
use hazardgrid::{
    DetectionStrategy, DirDebugSink, FileFrameSource, FrameSource, GridCell, GridSize,
    HazardDetector, NoopDebugSink, OccupancyGrid, PathMessage, Pipeline, PipelineConfig,
    PipelineOutcome, Rectifier,
};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "hazardgrid")]
#[command(about = "Locate hazards in overhead frames and plan grid paths around or to them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: rectify, detect, map, plan.
    Run(CliRunArgs),

    /// Rectify a frame and write the top-down image.
    Rectify {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Path to write the rectified PNG.
        #[arg(long)]
        out: PathBuf,

        /// Pipeline configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Detect hazards and print them as JSON.
    Detect {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Pipeline configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured detection strategy.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Run A* alone on a synthetic grid.
    Plan(CliPlanArgs),

    /// Print the default configuration as JSON.
    ConfigTemplate,

    /// Match a 16-bit payload word against the built-in marker dictionary.
    DecodeTest {
        /// Observed 16-bit word (hex, e.g. 0xB532).
        #[arg(long)]
        word: String,
    },
}

#[derive(Debug, Clone, Args)]
struct CliRunArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Pipeline configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to write the path payload (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for intermediate images; enables debug output.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Override the configured detection strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Debug, Clone, Args)]
struct CliPlanArgs {
    #[arg(long)]
    rows: usize,

    #[arg(long)]
    cols: usize,

    /// Start cell as `row,col`.
    #[arg(long, value_parser = parse_cell)]
    start: GridCell,

    /// Goal cell as `row,col`.
    #[arg(long, value_parser = parse_cell)]
    goal: GridCell,

    /// Blocked cell as `row,col`; repeatable.
    #[arg(long, value_parser = parse_cell)]
    blocked: Vec<GridCell>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Contours,
    GridCells,
}

impl StrategyArg {
    fn to_core(self) -> DetectionStrategy {
        match self {
            Self::Contours => DetectionStrategy::Contours,
            Self::GridCells => DetectionStrategy::GridCells,
        }
    }
}

fn parse_cell(s: &str) -> Result<GridCell, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected row,col, got {s:?}"))?;
    let row = row.trim().parse().map_err(|e| format!("bad row in {s:?}: {e}"))?;
    let col = col.trim().parse().map_err(|e| format!("bad col in {s:?}: {e}"))?;
    Ok(GridCell::new(row, col))
}

fn load_config(path: Option<&Path>, strategy: Option<StrategyArg>) -> CliResult<PipelineConfig> {
    let mut config = match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            PipelineConfig::from_json_file(p)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(s) = strategy {
        config.hazard.strategy = s.to_core();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_pipeline(&args),
        Commands::Rectify { image, out, config } => run_rectify(&image, &out, config.as_deref()),
        Commands::Detect {
            image,
            config,
            strategy,
        } => run_detect(&image, config.as_deref(), strategy),
        Commands::Plan(args) => run_plan(&args),
        Commands::ConfigTemplate => run_config_template(),
        Commands::DecodeTest { word } => run_decode_test(&word),
    }
}

// ── run ────────────────────────────────────────────────────────────────

fn run_pipeline(args: &CliRunArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref(), args.strategy)?;
    if args.debug_dir.is_some() {
        config.debug = true;
    }
    let pipeline = Pipeline::new(config)?;

    tracing::info!("Loading image: {}", args.image.display());
    let mut source = FileFrameSource::new(&args.image);

    let outcome = match &args.debug_dir {
        Some(dir) => {
            let mut sink = DirDebugSink::new(dir);
            let outcome = pipeline.run_source(&mut source, &mut sink)?;
            tracing::info!(
                "{} debug images written to {}",
                sink.written().len(),
                dir.display()
            );
            outcome
        }
        None => pipeline.run_source(&mut source, &mut NoopDebugSink)?,
    };

    let report = match outcome {
        PipelineOutcome::Planned(report) => report,
        PipelineOutcome::NoHazard => {
            tracing::info!("No hazard found; nothing to publish");
            return Ok(());
        }
    };

    tracing::info!(
        "Hazard target {:?}, start {:?}, {} path cells (rectified: {})",
        report.goal,
        report.start,
        report.path.len(),
        report.rectified
    );
    if report.path.is_empty() {
        tracing::warn!("Goal unreachable; publishing an empty path");
    }

    let json = report.message().to_json()?;
    match &args.out {
        Some(out) => {
            std::fs::write(out, &json)?;
            tracing::info!("Path written to {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── rectify ────────────────────────────────────────────────────────────

fn run_rectify(image: &Path, out: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config, None)?;
    let rectifier = Rectifier::new(config.rectify)?;
    let frame = FileFrameSource::new(image).capture()?;
    tracing::info!("Image size: {}x{}", frame.width(), frame.height());

    let r = rectifier.rectify(&frame)?;
    for m in &r.corners {
        tracing::info!(
            "marker {} at ({:.1}, {:.1}), rotation {}, {} bit errors",
            m.id,
            m.centroid[0],
            m.centroid[1],
            m.rotation,
            m.hamming
        );
    }
    tracing::info!("Homography: {:?}", r.homography_array());
    r.image.save(out)?;
    tracing::info!("Rectified image written to {}", out.display());
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(image: &Path, config: Option<&Path>, strategy: Option<StrategyArg>) -> CliResult<()> {
    let config = load_config(config, strategy)?;
    let rectifier = Rectifier::new(config.rectify.clone())?;
    let detector = HazardDetector::new(config.hazard.clone(), config.grid)?;

    let frame = FileFrameSource::new(image).capture()?;
    let view = rectifier.rectify_or_fallback(&frame)?;
    let hazard = detector.detect(view.image())?;

    match &hazard {
        Some(region) => tracing::info!("Detected {} hazard regions", region.len()),
        None => tracing::info!("No hazard found"),
    }
    println!("{}", serde_json::to_string_pretty(&hazard)?);
    Ok(())
}

// ── plan ───────────────────────────────────────────────────────────────

fn run_plan(args: &CliPlanArgs) -> CliResult<()> {
    GridSize::new(args.rows, args.cols).validate()?;
    let mut grid = OccupancyGrid::open(args.rows, args.cols);
    let n_blocked = grid.block_cells(&args.blocked);
    if n_blocked < args.blocked.len() {
        tracing::warn!(
            "{} blocked cells outside the grid were ignored",
            args.blocked.len() - n_blocked
        );
    }

    let (path, stats) = hazardgrid::plan_with_stats(&grid, args.start, args.goal)?;
    tracing::info!(
        "A*: {} pushed, {} popped, {} expanded",
        stats.pushed,
        stats.popped,
        stats.expanded
    );
    println!("{}", PathMessage::from_path(&path).to_json()?);
    Ok(())
}

// ── config-template ────────────────────────────────────────────────────

fn run_config_template() -> CliResult<()> {
    println!("{}", PipelineConfig::default().to_json_pretty()?);
    Ok(())
}

// ── decode-test ────────────────────────────────────────────────────────

fn run_decode_test(word_str: &str) -> CliResult<()> {
    let word_str = word_str
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    let word = u16::from_str_radix(word_str, 16)
        .map_err(|e| -> CliError { format!("invalid hex word: {}", e).into() })?;

    let dict = Dictionary::new(&hazardgrid::MarkerFamily::default())?;
    let m = dict.best_match(word);

    println!("Input word:   0x{:04X} (binary: {:016b})", word, word);
    println!("Best match:");
    println!("  id:         {}", m.id);
    println!("  codeword:   0x{:04X}", dict.word(m.id).unwrap_or(0));
    println!("  rotation:   {} quarter turns", m.rotation);
    println!("  distance:   {} bits", m.hamming);

    Ok(())
}
