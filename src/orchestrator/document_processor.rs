//! Single document processor.
//!
//! Takes one PDF from path to report file: rasterize, run the document flow,
//! persist the JSON report, append review entries. Reports per-document
//! statistics back to the batch processor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::DocumentReport;
use crate::pdf::rasterizer;
use crate::services::ReviewWriter;
use crate::workflow::{DocumentCtx, DocumentFlow};

/// Per-document outcome statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentStats {
    pub accepted: usize,
    pub rejected: usize,
    pub flagged: usize,
}

/// Process one document end to end. Returns the stats recorded in its report.
pub async fn process_document(
    flow: Arc<DocumentFlow>,
    pdf_path: PathBuf,
    doc_index: usize,
    config: &Config,
) -> Result<DocumentStats> {
    let doc_name = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pdf_path.display().to_string());

    // ========== rasterize (blocking, pdfium is not async-safe) ==========
    let render_width = config.render_width;
    let page_cap = config.page_cap_opt();
    let raster_path = pdf_path.clone();
    let pages = task::spawn_blocking(move || {
        rasterizer::rasterize_document(&raster_path, render_width, page_cap)
    })
    .await
    .context("rasterizer task panicked")??;

    let ctx = DocumentCtx::new(doc_index, &doc_name, pages.len() as u32);
    info!("{} 📄 rasterized {} page(s)", ctx, pages.len());

    // ========== run the flow ==========
    let report = flow.run(&pages, &ctx).await;

    // ========== persist ==========
    write_report(&report, &doc_name, &config.report_folder, &ctx)?;
    append_review_entries(&report, &doc_name, &config.review_file, &ctx);

    Ok(DocumentStats {
        accepted: report.questions.len(),
        rejected: report.rejected.len(),
        flagged: report.flagged.len(),
    })
}

/// Write the JSON report next to the other reports, named after the source.
fn write_report(
    report: &DocumentReport,
    doc_name: &str,
    report_folder: &str,
    ctx: &DocumentCtx,
) -> Result<()> {
    std::fs::create_dir_all(report_folder)
        .with_context(|| format!("creating report folder {report_folder}"))?;

    let stem = Path::new(doc_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| doc_name.to_string());
    let path = Path::new(report_folder).join(format!("{stem}.json"));

    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;

    info!("{} ✓ report written to {}", ctx, path.display());
    Ok(())
}

/// Append every rejected and flagged record to the review file. Review-file
/// failures are logged, never fatal; the JSON report already holds the data.
fn append_review_entries(report: &DocumentReport, doc_name: &str, review_file: &str, ctx: &DocumentCtx) {
    let writer = ReviewWriter::with_path(review_file);

    for rejected in &report.rejected {
        if let Err(e) = writer.write_rejected(doc_name, rejected) {
            warn!("{} review entry write failed: {:#}", ctx, e);
        }
    }
    for flagged in &report.flagged {
        if let Err(e) = writer.write_flagged(doc_name, flagged) {
            warn!("{} review entry write failed: {:#}", ctx, e);
        }
    }
}
