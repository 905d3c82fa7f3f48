//! MECE Segmenter: cart abandoner audience segmentation.
//!
//! Loads a user table, runs the segmentation pipeline and exports the ranked
//! segment strategy.

mod export;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use mece_core::config::AppConfig;
use mece_core::{ResolutionPolicy, SegmentSummary};
use mece_segmentation::{table, AnalysisReport, SegmentationEngine};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mece-segmenter")]
#[command(about = "MECE audience segmentation for cart abandoners")]
#[command(version)]
struct Cli {
    /// Input table: JSON array of user rows or JSON Lines
    #[arg(short, long)]
    input: PathBuf,

    /// Minimum segment size (overrides config)
    #[arg(long, env = "MECE__SEGMENTATION__MIN_SEGMENT_SIZE")]
    min_segment_size: Option<usize>,

    /// Maximum segment size (overrides config)
    #[arg(long, env = "MECE__SEGMENTATION__MAX_SEGMENT_SIZE")]
    max_segment_size: Option<usize>,

    /// Output directory (overrides config)
    #[arg(short, long, env = "MECE__OUTPUT__DIR")]
    output_dir: Option<String>,

    /// Output file prefix (overrides config)
    #[arg(long, env = "MECE__OUTPUT__PREFIX")]
    prefix: Option<String>,

    /// Reference time for the recency window, RFC 3339 (defaults to now)
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Accept a best-effort result when segments stay out of bounds
    #[arg(long, default_value_t = false)]
    best_effort: bool,

    /// Skip writing CSV/JSON files
    #[arg(long, default_value_t = false)]
    no_export: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("MECE segmenter starting up");

    let config = load_config(&cli)?;

    info!(
        min_segment_size = config.segmentation.min_segment_size,
        max_segment_size = config.segmentation.max_segment_size,
        window_days = config.segmentation.recency_window_days,
        output_dir = %config.output.dir,
        "Configuration loaded"
    );

    let engine = SegmentationEngine::new(config.segmentation.clone())?;
    let records = load_records(&cli.input)?;
    let now = cli.now.unwrap_or_else(Utc::now);

    let report = engine.run(&records, now)?;
    print_strategy(&report);

    if !cli.no_export {
        let (csv_path, json_path) = export::export_results(
            &report.summaries,
            Path::new(&config.output.dir),
            &config.output.prefix,
        )?;
        println!("\nResults exported to: {}", csv_path.display());
        println!("Results exported to: {}", json_path.display());
    }

    Ok(())
}

/// Environment configuration with CLI overrides applied. A present but
/// malformed `MECE__*` value is an error; absent values take defaults.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load().context("invalid MECE__ configuration")?;

    if let Some(min) = cli.min_segment_size {
        config.segmentation.min_segment_size = min;
    }
    if let Some(max) = cli.max_segment_size {
        config.segmentation.max_segment_size = max;
    }
    if let Some(dir) = cli.output_dir.clone() {
        config.output.dir = dir;
    }
    if let Some(prefix) = cli.prefix.clone() {
        config.output.prefix = prefix;
    }
    if cli.best_effort {
        config.segmentation.resolution = ResolutionPolicy::BestEffort;
    }
    Ok(config)
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mece_segmenter=info,mece_segmentation=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_records(path: &Path) -> Result<Vec<mece_core::UserRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input table {}", path.display()))?;
    let rows = table::rows_from_json(&text)?;
    let records = table::records_from_rows(&rows)?;
    info!(rows = records.len(), input = %path.display(), "Input table loaded");
    Ok(records)
}

fn print_strategy(report: &AnalysisReport) {
    println!("\n{}", "=".repeat(80));
    println!("FINAL SEGMENT STRATEGY");
    println!("{}", "=".repeat(80));

    if report.summaries.is_empty() {
        println!(
            "No users in universe ({} in population), nothing to segment",
            report.population
        );
        return;
    }

    if let Some(thresholds) = report.thresholds {
        println!(
            "AOV thresholds: high > {:.2}, medium > {:.2}",
            thresholds.high, thresholds.medium
        );
    }

    println!(
        "\n{:<30} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        "segment", "size", "conv", "lift", "size_s", "profit", "fit", "overall", "valid"
    );
    for s in &report.summaries {
        println!(
            "{:<30} {:>8} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3}  {}",
            s.segment_name,
            s.size,
            s.conversion_potential,
            s.lift_vs_control,
            s.size_score,
            s.profitability,
            s.strategic_fit,
            s.overall_score,
            if s.valid { "Yes" } else { "No" }
        );
    }

    print_statistics(report);
}

fn print_statistics(report: &AnalysisReport) {
    let summaries: &[SegmentSummary] = &report.summaries;
    let sizes: Vec<usize> = summaries.iter().map(|s| s.size).collect();
    let total: usize = sizes.iter().sum();

    println!("\n{}", "=".repeat(50));
    println!("SUMMARY STATISTICS");
    println!("{}", "=".repeat(50));
    println!("Total users in population: {}", report.population);
    println!("Total users in universe:   {}", report.universe);
    println!("Total segments created:    {}", summaries.len());
    println!(
        "Average segment size:      {:.0}",
        total as f64 / summaries.len() as f64
    );
    println!("Largest segment:           {}", sizes.iter().max().unwrap_or(&0));
    println!("Smallest segment:          {}", sizes.iter().min().unwrap_or(&0));
    if let Some(top) = summaries.first() {
        println!(
            "Top scoring segment:       {} (score: {:.3})",
            top.segment_name, top.overall_score
        );
    }
    println!(
        "Merges: {}, splits: {}",
        report.resolution.merges.len(),
        report.resolution.splits.len()
    );
    for segment in &report.noncompliant {
        println!("Out of bounds: {} ({} users)", segment.label, segment.size);
    }
    println!(
        "\nValidation: {} users segmented = {} universe users",
        total, report.universe
    );
}
