//! labelkit CLI - label layout normalization
//!
//! Runs the layout solver on a label document using estimated text metrics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labelkit_layout::{
    BoundsIndex, EstimatingMeasurer, LabelDocument, LayoutSolver, NormalizeOptions,
    NormalizeResult, PatternReport, SolverConfig, Verbosity,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "labelkit",
    about = "Normalize label layouts",
    long_about = "Settle loosely positioned label items into a printable layout.\n\
                  \n\
                  Bounds are estimated from font sizes, so results approximate\n\
                  what the editor's renderer would produce.",
    version
)]
struct Args {
    /// Increase solver logging (-v summary, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Normalize a label document
    #[command(long_about = "Normalize a label document.\n\
                      \n\
                      Prints the normalized document together with the solver result.\n\
                      With --output the document is written to the file and only the\n\
                      result is printed.")]
    Normalize {
        /// Input label document (JSON)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Write the normalized document here
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Run every pass even when the layout is already clean
        #[arg(long)]
        force_rebuild: bool,

        /// Solver config file (TOML)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Report which structural patterns match a label document
    Detect {
        /// Input label document (JSON)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Solver config file (TOML)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct NormalizeReport<'a> {
    result: &'a NormalizeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<&'a LabelDocument>,
}

fn load_document(path: &Path) -> Result<LabelDocument> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read label document: {}", path.display()))?;
    LabelDocument::from_json(&json)
        .with_context(|| format!("Invalid label document: {}", path.display()))
}

fn load_config(path: Option<&Path>, verbose: u8) -> Result<SolverConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<SolverConfig>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => SolverConfig::default(),
    };
    if verbose > 0 {
        config.verbosity = Verbosity::from_occurrences(verbose);
    }
    config.validate().context("Invalid solver config")?;
    Ok(config)
}

fn init_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Summary => "debug",
        Verbosity::Trace => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn normalize(
    input: &Path,
    output: Option<&Path>,
    force_rebuild: bool,
    config: SolverConfig,
) -> Result<()> {
    let mut document = load_document(input)?;
    let mut host = EstimatingMeasurer::with_items(document.preview_size, &document.items);
    let solver = LayoutSolver::with_config(config);
    let options = NormalizeOptions { force_rebuild };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start runtime")?;
    let result = runtime.block_on(solver.normalize(&mut document.items, &mut host, options));
    log::debug!(
        "{}: {} (confidence {:.2})",
        input.display(),
        result.reason,
        result.confidence
    );

    let report = match output {
        Some(path) => {
            let json = document.to_json_pretty()?;
            fs::write(path, json)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            NormalizeReport {
                result: &result,
                document: None,
            }
        }
        None => NormalizeReport {
            result: &result,
            document: Some(&document),
        },
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn detect(input: &Path, config: SolverConfig) -> Result<()> {
    let document = load_document(input)?;
    let host = EstimatingMeasurer::with_items(document.preview_size, &document.items);
    let index = BoundsIndex::snapshot(&document.items, &host)
        .map_err(|missing| anyhow::anyhow!("No bounds for items: {}", missing.join(", ")))?;
    let reports: Vec<PatternReport> = LayoutSolver::with_config(config).detect_patterns(
        &document.items,
        &index,
        document.preview_size,
    );
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Normalize {
            input,
            output,
            force_rebuild,
            config,
        } => {
            let config = load_config(config.as_deref(), args.verbose)?;
            init_logging(config.verbosity);
            normalize(&input, output.as_deref(), force_rebuild, config)
        }
        Commands::Detect { input, config } => {
            let config = load_config(config.as_deref(), args.verbose)?;
            init_logging(config.verbosity);
            detect(&input, config)
        }
    }
}
