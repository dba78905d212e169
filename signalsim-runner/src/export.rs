//! Artifact export — per-run CSV/JSON files plus a batch summary.
//!
//! Layout under the output directory:
//!
//! ```text
//! <out>/summary.csv          one row per completed run
//! <out>/failed.csv           one row per failed run (when any)
//! <out>/batch.json           batch metadata
//! <out>/<run_id>/capital_history.csv
//! <out>/<run_id>/positions.csv
//! <out>/<run_id>/params.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::sweep::{BatchResults, RunReport};

/// Write one run's artifacts into `<dir>/<run_id>/`.
pub fn export_run(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let run_dir = dir.join(&report.run_id);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;

    let history_path = run_dir.join("capital_history.csv");
    let mut writer = csv::Writer::from_path(&history_path)
        .with_context(|| format!("failed to open {}", history_path.display()))?;
    for sample in &report.output.capital_history {
        writer.serialize(sample)?;
    }
    writer.flush()?;

    let positions_path = run_dir.join("positions.csv");
    let mut writer = csv::Writer::from_path(&positions_path)
        .with_context(|| format!("failed to open {}", positions_path.display()))?;
    for position in &report.output.positions {
        writer.serialize(position)?;
    }
    writer.flush()?;

    let params_json = serde_json::to_string_pretty(&report.params)
        .context("failed to serialize run parameters")?;
    fs::write(run_dir.join("params.json"), params_json)
        .with_context(|| format!("failed to write params.json in {}", run_dir.display()))?;

    Ok(run_dir)
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    run_id: &'a str,
    final_capital: f64,
    fees_paid: f64,
    positions: usize,
    hit: u64,
    miss: u64,
    stopped: u64,
    expired: u64,
    trailed: u64,
    alpha: Option<f64>,
    beta: Option<f64>,
    r_squared: Option<f64>,
    std_dev: Option<f64>,
    sharpe: Option<f64>,
}

#[derive(Debug, Serialize)]
struct FailedRow<'a> {
    run_id: &'a str,
    error: String,
}

#[derive(Debug, Serialize)]
struct BatchMeta {
    generated_at: String,
    completed: usize,
    failed: usize,
    best_run_id: Option<String>,
}

/// Write the batch summary and every run's artifacts into `dir`.
pub fn export_batch(dir: &Path, results: &BatchResults) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    for report in &results.completed {
        export_run(dir, report)?;
    }

    let summary_path = dir.join("summary.csv");
    let mut writer = csv::Writer::from_path(&summary_path)
        .with_context(|| format!("failed to open {}", summary_path.display()))?;
    for report in &results.completed {
        writer.serialize(summary_row(report))?;
    }
    writer.flush()?;

    if !results.failed.is_empty() {
        let failed_path = dir.join("failed.csv");
        let mut writer = csv::Writer::from_path(&failed_path)
            .with_context(|| format!("failed to open {}", failed_path.display()))?;
        for failed in &results.failed {
            writer.serialize(FailedRow {
                run_id: &failed.run_id,
                error: failed.error.to_string(),
            })?;
        }
        writer.flush()?;
    }

    let meta = BatchMeta {
        generated_at: chrono::Utc::now().to_rfc3339(),
        completed: results.completed.len(),
        failed: results.failed.len(),
        best_run_id: results.best().map(|r| r.run_id.clone()),
    };
    let meta_json = serde_json::to_string_pretty(&meta).context("failed to serialize batch metadata")?;
    fs::write(dir.join("batch.json"), meta_json)
        .with_context(|| format!("failed to write batch.json in {}", dir.display()))?;

    Ok(())
}

fn summary_row(report: &RunReport) -> SummaryRow<'_> {
    let last = report.output.capital_history.last();
    SummaryRow {
        run_id: &report.run_id,
        final_capital: report.output.final_capital(),
        fees_paid: last.map_or(0.0, |s| s.fees_paid),
        positions: report.output.positions.len(),
        hit: last.map_or(0, |s| s.hit),
        miss: last.map_or(0, |s| s.miss),
        stopped: last.map_or(0, |s| s.stopped),
        expired: last.map_or(0, |s| s.expired),
        trailed: last.map_or(0, |s| s.trailed),
        alpha: report.stats.map(|s| s.alpha),
        beta: report.stats.map(|s| s.beta),
        r_squared: report.stats.map(|s| s.r_squared),
        std_dev: report.stats.map(|s| s.std_dev),
        sharpe: report.stats.map(|s| s.sharpe),
    }
}
