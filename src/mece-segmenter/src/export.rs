//! Flat-file export of ranked segment summaries.

use anyhow::{Context, Result};
use mece_core::SegmentSummary;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 14] = [
    "segment_name",
    "rules_applied",
    "size",
    "conversion_potential",
    "lift_vs_control",
    "size_score",
    "profitability",
    "strategic_fit",
    "overall_score",
    "valid",
    "avg_aov",
    "avg_engagement",
    "avg_sessions",
    "merged_from",
];

/// Write `<dir>/<prefix>_strategy.csv` and `<dir>/<prefix>_strategy.json`.
pub fn export_results(
    summaries: &[SegmentSummary],
    dir: &Path,
    prefix: &str,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let csv_path = dir.join(format!("{prefix}_strategy.csv"));
    write_csv(summaries, &csv_path)?;

    let json_path = dir.join(format!("{prefix}_strategy.json"));
    write_json(summaries, &json_path)?;

    Ok((csv_path, json_path))
}

pub fn write_json(summaries: &[SegmentSummary], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summaries)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv(summaries: &[SegmentSummary], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for summary in summaries {
        writeln!(writer, "{}", csv_row(summary).join(","))?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_row(s: &SegmentSummary) -> Vec<String> {
    vec![
        csv_field(&s.segment_name),
        csv_field(&s.rules_applied),
        s.size.to_string(),
        format!("{:.3}", s.conversion_potential),
        format!("{:.3}", s.lift_vs_control),
        format!("{:.3}", s.size_score),
        format!("{:.3}", s.profitability),
        format!("{:.3}", s.strategic_fit),
        format!("{:.3}", s.overall_score),
        if s.valid { "Yes" } else { "No" }.to_string(),
        format!("{:.2}", s.avg_aov),
        format!("{:.3}", s.avg_engagement),
        format!("{:.1}", s.avg_sessions),
        csv_field(&s.merged_from.join(";")),
    ]
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
