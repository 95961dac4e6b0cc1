//! Batch document processor.
//!
//! Entry point of the application: scans the input folder, controls document
//! concurrency with a semaphore, delegates each document to
//! `document_processor` and aggregates the run-level statistics. No document
//! detail handling happens here.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::orchestrator::document_processor;
use crate::services::LlmExtractionService;
use crate::workflow::DocumentFlow;

pub struct App {
    config: Config,
    flow: Arc<DocumentFlow>,
}

impl App {
    pub fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let service = Arc::new(LlmExtractionService::new(&config));
        let flow = Arc::new(DocumentFlow::new(service.clone(), service, &config));

        Ok(Self { config, flow })
    }

    pub async fn run(&self) -> Result<()> {
        let documents = self.load_documents()?;

        if documents.is_empty() {
            warn!("⚠️ no PDF documents found in {}, nothing to do", self.config.pdf_folder);
            return Ok(());
        }

        log_documents_loaded(documents.len(), self.config.max_concurrent_documents);

        let stats = self.process_all_documents(documents).await;
        print_final_stats(&stats, &self.config);

        Ok(())
    }

    /// All PDF files in the input folder, sorted by file name.
    fn load_documents(&self) -> Result<Vec<PathBuf>> {
        info!("📁 scanning {} for PDF documents...", self.config.pdf_folder);

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.config.pdf_folder)
            .with_context(|| format!("reading PDF folder {}", self.config.pdf_folder))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        Ok(paths)
    }

    async fn process_all_documents(&self, documents: Vec<PathBuf>) -> ProcessingStats {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents.max(1)));
        let mut handles = Vec::with_capacity(documents.len());

        for (idx, path) in documents.into_iter().enumerate() {
            let doc_index = idx + 1;
            let semaphore = semaphore.clone();
            let flow = self.flow.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                document_processor::process_document(flow, path.clone(), doc_index, &config)
                    .await
                    .map_err(|e| {
                        error!("[doc {} {}] ❌ processing failed: {:#}", doc_index, path.display(), e);
                        e
                    })
            });
            handles.push(handle);
        }

        let mut stats = ProcessingStats {
            total: handles.len(),
            ..Default::default()
        };
        for handle in handles {
            match handle.await {
                Ok(Ok(doc_stats)) => {
                    stats.succeeded += 1;
                    stats.accepted += doc_stats.accepted;
                    stats.rejected += doc_stats.rejected;
                    stats.flagged += doc_stats.flagged;
                }
                Ok(Err(_)) => {
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("document task failed: {}", e);
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}

/// Run-level statistics aggregated over every document.
#[derive(Debug, Default)]
struct ProcessingStats {
    total: usize,
    succeeded: usize,
    failed: usize,
    accepted: usize,
    rejected: usize,
    flagged: usize,
}

// ========== log helpers ==========

fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nexam extraction log - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 exam extraction pipeline starting");
    info!("📊 document concurrency: {}", config.max_concurrent_documents);
    info!("📊 page concurrency per document: {}", config.max_concurrent_pages);
    info!("{}", "=".repeat(60));
}

fn log_documents_loaded(total: usize, max_concurrent: usize) {
    info!("✓ found {} document(s) to process", total);
    info!("📋 at most {} in flight at once\n", max_concurrent);
}

fn print_final_stats(stats: &ProcessingStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 run complete");
    info!(
        "finished at: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ documents processed: {}/{}", stats.succeeded, stats.total);
    info!("❌ documents failed: {}", stats.failed);
    info!(
        "questions: {} accepted, {} rejected, {} flagged for review",
        stats.accepted, stats.rejected, stats.flagged
    );
    info!("{}", "=".repeat(60));
    info!("\nreview entries appended to: {}", config.review_file);
}
