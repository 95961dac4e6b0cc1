//! Document processing flow.
//!
//! Defines the complete processing order for one document:
//! 1. transcribe every page
//! 2. extract questions (with shared-stem propagation)
//! 3. resolve the answer key from the trailing pages
//! 4. match and structurally validate
//! 5. semantically validate the matched set
//! 6. context-search repair for the flagged set
//!
//! The flow is infallible by construction: every degradation is recorded in
//! the report instead of aborting the document. It holds no resources, only
//! stage services.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::models::{DocumentReport, FlaggedQuestion, ReportMetadata};
use crate::pdf::PageImage;
use crate::services::{
    match_questions, AnswerKeyResolver, ContextSearchRepair, ExtractionService, PageTranscriber,
    QuestionExtractor, SemanticValidator, TranscriptionService,
};
use crate::workflow::document_ctx::DocumentCtx;

pub struct DocumentFlow {
    transcriber: PageTranscriber,
    extractor: QuestionExtractor,
    resolver: AnswerKeyResolver,
    validator: SemanticValidator,
    repair: ContextSearchRepair,
    answer_key_window: usize,
    max_concurrent_pages: usize,
}

impl DocumentFlow {
    pub fn new(
        transcription: Arc<dyn TranscriptionService>,
        extraction: Arc<dyn ExtractionService>,
        config: &Config,
    ) -> Self {
        Self {
            transcriber: PageTranscriber::new(transcription),
            extractor: QuestionExtractor::new(extraction.clone()),
            resolver: AnswerKeyResolver::new(extraction.clone()),
            validator: SemanticValidator::new(extraction.clone(), config.min_confidence),
            repair: ContextSearchRepair::new(extraction, config.context_window_radius),
            answer_key_window: config.answer_key_window,
            max_concurrent_pages: config.max_concurrent_pages,
        }
    }

    /// Process one rasterized document into its report.
    pub async fn run(&self, pages: &[PageImage], ctx: &DocumentCtx) -> DocumentReport {
        // ========== stage 1: transcription ==========
        let (page_texts, transcription_failures) = self
            .transcriber
            .transcribe_all(pages, ctx, self.max_concurrent_pages)
            .await;

        // ========== stage 2: question extraction ==========
        let extraction = self
            .extractor
            .extract_all(&page_texts, ctx, self.max_concurrent_pages)
            .await;

        // ========== stage 3: answer-key resolution ==========
        let key = self
            .resolver
            .resolve(&page_texts, self.answer_key_window, ctx)
            .await;
        let answer_key_empty = key.is_empty();
        if answer_key_empty {
            warn!(
                "{} no answer key resolved, every question will miss its answer",
                ctx
            );
        }

        // ========== stage 4: matching / structural validation ==========
        let outcome = match_questions(extraction.questions, &key.entries, ctx);
        let mut matched = outcome.matched;

        // ========== stage 5: semantic validation ==========
        self.validator.validate_all(&mut matched, ctx).await;

        // ========== stage 6: context-search repair for flagged ==========
        let (accepted, failed): (Vec<_>, Vec<_>) = matched
            .into_iter()
            .partition(|q| q.validation.as_ref().map(|v| v.valid).unwrap_or(true));

        let mut flagged = Vec::with_capacity(failed.len());
        for question in failed {
            let suggestion = self.repair.search(&question, &page_texts, ctx).await;
            flagged.push(FlaggedQuestion {
                question,
                suggestion,
            });
        }

        let matched_len = accepted.len() + outcome.rejected.len() + flagged.len();
        let success_rate = if matched_len == 0 {
            0.0
        } else {
            accepted.len() as f64 / matched_len as f64
        };

        info!(
            "{} done: {} accepted, {} rejected, {} flagged (success rate {:.2})",
            ctx,
            accepted.len(),
            outcome.rejected.len(),
            flagged.len(),
            success_rate
        );

        DocumentReport {
            questions: accepted,
            rejected: outcome.rejected,
            flagged,
            metadata: ReportMetadata {
                page_count: ctx.page_count,
                extraction_method: "vision_transcription".to_string(),
                success_rate,
                transcription_failures,
                extraction_failures: extraction.failed_pages,
                collisions: outcome.collisions,
                answer_key_empty,
            },
        }
    }
}
