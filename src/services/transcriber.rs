//! Page transcription stage.
//!
//! Thin wrapper around the [`TranscriptionService`] capability. A failed page
//! is recorded with an error-marker string and the pipeline continues; one
//! bad page never aborts the document.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::pdf::PageImage;
use crate::services::contract::TranscriptionService;
use crate::workflow::DocumentCtx;

/// Placeholder text recorded for a page whose transcription failed.
pub const TRANSCRIPTION_ERROR_MARKER: &str = "[transcription failed]";

pub struct PageTranscriber {
    service: Arc<dyn TranscriptionService>,
}

impl PageTranscriber {
    pub fn new(service: Arc<dyn TranscriptionService>) -> Self {
        Self { service }
    }

    /// Transcribe all pages, at most `concurrency` calls in flight.
    ///
    /// Returns one text block per page, aligned with the input order, plus
    /// the 1-based numbers of pages that failed.
    pub async fn transcribe_all(
        &self,
        pages: &[PageImage],
        ctx: &DocumentCtx,
        concurrency: usize,
    ) -> (Vec<String>, Vec<u32>) {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let futures = pages.iter().map(|page| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                match self.service.transcribe_page(page).await {
                    Ok(text) => (text, None),
                    Err(e) => {
                        warn!(
                            "{} page {} transcription failed: {}",
                            ctx, page.page_number, e
                        );
                        (TRANSCRIPTION_ERROR_MARKER.to_string(), Some(page.page_number))
                    }
                }
            }
        });

        let results = join_all(futures).await;

        let mut texts = Vec::with_capacity(results.len());
        let mut failed_pages = Vec::new();
        for (text, failure) in results {
            texts.push(text);
            if let Some(page_number) = failure {
                failed_pages.push(page_number);
            }
        }
        failed_pages.sort_unstable();

        info!(
            "{} transcribed {} page(s), {} failed",
            ctx,
            texts.len(),
            failed_pages.len()
        );

        (texts, failed_pages)
    }
}
