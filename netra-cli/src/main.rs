//! NE-NETRA CLI - district risk scoring over classified signals

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input and --at yields byte-for-byte identical output
// - Diagnostics go to stderr; stdout carries only results

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use netra_core::config::{self, ResolvedConfig};
use netra_core::report::render_explain;
use netra_core::signal::{group_by_district, load_signals};
use netra_core::{render_json, render_text, sort_scores, RiskEngine, TimeWindow};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "netra")]
#[command(about = "District risk aggregation and composite scoring for classified signals")]
#[command(version = env!("NETRA_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single district
    Score {
        /// JSON file containing an array of classified signals
        signals: PathBuf,

        /// District to score
        #[arg(long)]
        district: String,

        /// State of the district (default: taken from its first signal)
        #[arg(long)]
        state: Option<String>,

        /// Scoring window in hours (overrides config file)
        #[arg(long)]
        window: Option<i64>,

        /// Reference time in RFC 3339 (default: now)
        #[arg(long, value_parser = parse_reference_time)]
        at: Option<DateTime<Utc>>,

        /// Number of top signals to include (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Drop malformed signal records instead of failing
        #[arg(long)]
        skip_invalid: bool,
    },
    /// Score every district present in a signals file
    Batch {
        /// JSON file containing an array of classified signals
        signals: PathBuf,

        /// Scoring window in hours (overrides config file)
        #[arg(long)]
        window: Option<i64>,

        /// Reference time in RFC 3339 (default: now)
        #[arg(long, value_parser = parse_reference_time)]
        at: Option<DateTime<Utc>>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Drop malformed signal records instead of failing
        #[arg(long)]
        skip_invalid: bool,
    },
    /// Inspect or adjust configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without scoring anything
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print adjusted district weights after a false-positive review
    Feedback {
        /// District whose score was flagged as a false positive
        #[arg(long)]
        district: String,

        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_reference_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netra=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            signals,
            district,
            state,
            window,
            at,
            top,
            format,
            config: config_path,
            skip_invalid,
        } => {
            if top == Some(0) {
                anyhow::bail!("--top must be at least 1");
            }

            let resolved = load_config(config_path.as_deref())?;
            let window = effective_window(window, &resolved)?;
            let reference_time = at.unwrap_or_else(Utc::now);

            let mut engine_config = resolved.engine;
            if let Some(n) = top {
                engine_config.top_signals = n;
            }
            let engine = RiskEngine::new(engine_config);

            let mut grouped = group_by_district(load_signals(&signals, skip_invalid)?);
            let district_signals = grouped.remove(&district).unwrap_or_default();

            let state = match state {
                Some(s) => s,
                None => district_signals
                    .first()
                    .map(|s| s.state.clone())
                    .with_context(|| {
                        format!(
                            "no signals for district '{}' in {}; pass --state to score it anyway",
                            district,
                            signals.display()
                        )
                    })?,
            };

            let score = engine.compute_district_risk(
                &district,
                &state,
                &district_signals,
                window,
                reference_time,
            );

            match format {
                OutputFormat::Text => print!("{}", render_explain(&score)),
                OutputFormat::Json => println!("{}", score.to_json()?),
            }
        }
        Commands::Batch {
            signals,
            window,
            at,
            format,
            config: config_path,
            skip_invalid,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let window = effective_window(window, &resolved)?;
            let reference_time = at.unwrap_or_else(Utc::now);
            let engine = RiskEngine::new(resolved.engine);

            let grouped = group_by_district(load_signals(&signals, skip_invalid)?);
            tracing::info!(
                districts = grouped.len(),
                path = %signals.display(),
                "scoring districts"
            );

            let scores = sort_scores(
                engine
                    .batch_compute_districts(&grouped, window, reference_time)
                    .into_values()
                    .collect(),
            );

            match format {
                OutputFormat::Text => print!("{}", render_text(&scores)),
                OutputFormat::Json => println!("{}", render_json(&scores)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let root = std::env::current_dir()?;
                match config::load_and_resolve(&root, path.as_deref()) {
                    Ok(resolved) => {
                        if let Some(ref p) = resolved.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let resolved = load_config(path.as_deref())?;
                print!("{}", describe_config(&resolved));
            }
            ConfigAction::Feedback { district, path } => {
                let resolved = load_config(path.as_deref())?;
                let before = resolved.engine.weights_for(&district);
                let fragment = resolved.false_positive_fragment(&district);
                tracing::info!(
                    district = %district,
                    cognitive = before.cognitive,
                    network = before.network,
                    "applied false-positive decay"
                );
                println!(
                    "{}",
                    serde_json::to_string_pretty(&fragment)
                        .context("failed to serialize config fragment")?
                );
            }
        },
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let root = std::env::current_dir()?;
    let resolved =
        config::load_and_resolve(&root, explicit).context("failed to load configuration")?;
    if let Some(ref p) = resolved.config_path {
        tracing::info!(path = %p.display(), "using config");
    }
    Ok(resolved)
}

/// CLI flag takes precedence over the config file
fn effective_window(flag: Option<i64>, resolved: &ResolvedConfig) -> anyhow::Result<TimeWindow> {
    match flag {
        Some(hours) => TimeWindow::hours(hours).context("invalid --window"),
        None => Ok(resolved.engine.window),
    }
}

fn describe_config(resolved: &ResolvedConfig) -> String {
    let engine = &resolved.engine;
    let mut out = String::new();

    out.push_str("Configuration:\n");
    match resolved.config_path {
        Some(ref p) => out.push_str(&format!("  Source: {}\n", p.display())),
        None => out.push_str("  Source: defaults (no config file found)\n"),
    }
    out.push('\n');
    out.push_str("Scoring:\n");
    out.push_str(&format!("  window: {}h\n", engine.window.as_hours()));
    out.push_str(&format!("  top_signals: {}\n", engine.top_signals));
    out.push_str(&format!("  decay_rate: {}\n", engine.weighting.decay_rate));
    out.push_str(&format!(
        "  min_recency_weight: {}\n",
        engine.weighting.min_recency_weight
    ));
    out.push('\n');
    out.push_str("Sigmoid:\n");
    out.push_str(&format!("  midpoint: {}\n", engine.sigmoid.midpoint));
    out.push_str(&format!("  steepness: {}\n", engine.sigmoid.steepness));
    out.push('\n');
    out.push_str("Weights:\n");
    out.push_str(&format!("  cognitive: {}\n", engine.default_weights.cognitive));
    out.push_str(&format!("  network: {}\n", engine.default_weights.network));
    out.push_str(&format!("  physical: {}\n", engine.default_weights.physical));

    if !engine.district_weights.is_empty() {
        out.push('\n');
        out.push_str("District overrides:\n");
        let mut districts: Vec<_> = engine.district_weights.iter().collect();
        districts.sort_by(|a, b| a.0.cmp(b.0));
        for (district, w) in districts {
            out.push_str(&format!(
                "  {}: cognitive={} network={} physical={}\n",
                district, w.cognitive, w.network, w.physical
            ));
        }
    }

    out
}
