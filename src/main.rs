//! Power Trace Analyzer CLI
//!
//! Segments power-analyzer recordings into active and idle periods and
//! reports per-scenario energy statistics.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use power_trace_analyzer::{
    batch::{run_batch, write_reports, CsvTraceSource},
    config::Config,
    core::{analyze, SegmentationParams},
    diagnostics::DiagnosticsLog,
    timing::analyze_round_trips,
    trace::load_trace,
    VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "power-trace")]
#[command(version = VERSION)]
#[command(about = "Power trace segmentation and interval aggregation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every configured method and write report tables
    Analyze {
        /// Configuration file (defaults to the user config)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Output directory (overrides the configured one)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Only run these methods (repeatable)
        #[arg(long = "method", short = 'm')]
        methods: Vec<String>,
    },

    /// Segment a single trace and print its runs
    Segment {
        /// Recording CSV
        trace: PathBuf,

        /// Configuration file for columns and parameters
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Window start in seconds
        #[arg(long)]
        start_s: Option<f64>,

        /// Window end in seconds
        #[arg(long)]
        end_s: Option<f64>,

        /// Sample rate of the recording (Hz)
        #[arg(long)]
        fs: Option<f64>,

        /// Decimated rate (Hz)
        #[arg(long)]
        target_fs: Option<f64>,

        /// Smoothing window (s)
        #[arg(long)]
        smooth_s: Option<f64>,

        /// High/low threshold (W)
        #[arg(long)]
        thresh: Option<f64>,

        /// Shortest low gap kept (s)
        #[arg(long)]
        min_gap_s: Option<f64>,

        /// Early window (ms)
        #[arg(long)]
        early_window_ms: Option<f64>,
    },

    /// Summarize a round-trip timing log directory
    Timing {
        /// Directory with RTT.csv, S_PROC.csv, ...
        dir: PathBuf,

        /// Ignore ENC/DEC stage files
        #[arg(long)]
        no_crypto: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (defaults to the user config)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

/// Segmentation overrides from the command line.
struct ParamOverrides {
    fs: Option<f64>,
    target_fs: Option<f64>,
    smooth_s: Option<f64>,
    thresh: Option<f64>,
    min_gap_s: Option<f64>,
    early_window_ms: Option<f64>,
}

impl ParamOverrides {
    fn apply(self, params: &mut SegmentationParams) {
        let set = |field: &mut f64, value: Option<f64>| {
            if let Some(v) = value {
                *field = v;
            }
        };
        set(&mut params.fs, self.fs);
        set(&mut params.target_fs, self.target_fs);
        set(&mut params.smooth_s, self.smooth_s);
        set(&mut params.thresh, self.thresh);
        set(&mut params.min_gap_s, self.min_gap_s);
        set(&mut params.early_window_ms, self.early_window_ms);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            config,
            output,
            methods,
        } => cmd_analyze(config.as_deref(), output, &methods),
        Commands::Segment {
            trace,
            config,
            start_s,
            end_s,
            fs,
            target_fs,
            smooth_s,
            thresh,
            min_gap_s,
            early_window_ms,
        } => cmd_segment(
            &trace,
            config.as_deref(),
            start_s,
            end_s,
            ParamOverrides {
                fs,
                target_fs,
                smooth_s,
                thresh,
                min_gap_s,
                early_window_ms,
            },
        ),
        Commands::Timing { dir, no_crypto } => cmd_timing(&dir, !no_crypto),
        Commands::InitConfig { output } => cmd_init_config(output),
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("could not load {}", path.display())),
        None => Config::load().context("could not load the user configuration"),
    }
}

fn cmd_analyze(
    config_path: Option<&Path>,
    output: Option<PathBuf>,
    methods: &[String],
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output {
        config.report.output_dir = dir;
    }
    config.ensure_directories()?;

    if config.methods.is_empty() {
        bail!("no methods configured; run `power-trace init-config` and edit the file");
    }

    println!("Power Trace Analyzer v{VERSION}");
    println!();

    let out_dir = config.report.output_dir.clone();
    let mut log = DiagnosticsLog::with_persistence(out_dir.join("diagnostics.json"));
    let mut source = CsvTraceSource::new(config.columns.clone());

    let reports = run_batch(&config, methods, &mut source, &mut log)?;
    let early_ms = config.segmentation.early_window_ms;

    for report in &reports {
        println!("{}", report.method);
        println!("{}", "=".repeat(report.method.len()));
        println!("{}", report.table(&config.report, early_ms));
        println!();
    }

    let written = write_reports(&reports, &config.report, early_ms, &out_dir)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }

    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save diagnostics log: {e}");
    }

    println!();
    println!("{}", log.summary());
    Ok(())
}

fn cmd_segment(
    trace_path: &Path,
    config_path: Option<&Path>,
    start_s: Option<f64>,
    end_s: Option<f64>,
    overrides: ParamOverrides,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut params = config.segmentation.clone();
    overrides.apply(&mut params);

    let trace = load_trace(trace_path, &config.columns)?;
    let start = start_s.unwrap_or(0.0);
    let end = end_s.unwrap_or(trace.len() as f64 / params.fs);
    let view = trace.window(start, end, params.fs);
    if view.is_empty() {
        bail!("window {start}..{end} s holds no samples");
    }

    let analysis = analyze(view, &params)?;

    println!("Trace: {}", trace_path.display());
    println!(
        "Samples: {} ({:.2} s), decimated by {}",
        analysis.sample_count,
        view.span_secs(),
        analysis.decimation_factor
    );
    for adjustment in &analysis.adjustments {
        eprintln!("Warning: {adjustment}");
    }
    println!();

    println!(
        "{:>5}  {:>10}  {:>10}  {:>9}  {:>12}  {:>12}",
        "Run", "Start [s]", "End [s]", "Dur [s]", "Energy [mJ]", "Early [mJ]"
    );
    for (i, run) in analysis.runs.iter().enumerate() {
        println!(
            "{:>5}  {:>10.4}  {:>10.4}  {:>9.4}  {:>12.4}  {:>12.4}",
            i + 1,
            run.start_time,
            run.end_time,
            run.duration,
            run.sum,
            run.early_sum
        );
    }
    println!();

    let power = analysis.power;
    println!("High periods power [mW]: {}", power.high.format(3, 1000.0));
    println!("Low periods power [mW]:  {}", power.low.format(3, 1000.0));
    println!("All periods power [mW]:  {}", power.all.format(3, 1000.0));
    println!(
        "Run energy [mJ]:         {}",
        analysis.series.energy.format(3, 1.0)
    );
    println!(
        "Run duration [s]:        {}",
        analysis.series.duration.format(2, 1.0)
    );
    Ok(())
}

fn cmd_timing(dir: &Path, with_crypto: bool) -> anyhow::Result<()> {
    let (summary, counts) = analyze_round_trips(dir, with_crypto)?;

    println!("Round trips: {}", dir.display());
    println!(
        "Kept {} records, removed {} (non-finite: {}, zero: {}, start after end: {})",
        counts.kept, counts.removed, counts.non_finite, counts.zero, counts.start_after_end
    );
    println!();
    for (metric, stats) in summary {
        println!("{:<46} {}", metric.to_string(), stats.format(3, 1.0));
    }
    Ok(())
}

fn cmd_init_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(Config::config_path);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Config::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    println!("Configuration");
    println!("=============");
    println!();
    match config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: {:?}", Config::config_path()),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
