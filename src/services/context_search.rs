//! Context-search repair stage.
//!
//! For questions flagged by validation, re-reads the transcripts around the
//! question's recorded page and asks the model to locate the question there.
//! The outcome is a suggestion attached to the flagged record; it is never
//! applied automatically. `DocumentReport::apply_repair` is the explicit
//! commit point for a reviewed suggestion.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{ContextSearchResult, Question};
use crate::services::contract::ExtractionService;
use crate::workflow::DocumentCtx;

pub struct ContextSearchRepair {
    service: Arc<dyn ExtractionService>,
    window_radius: u32,
}

impl ContextSearchRepair {
    pub fn new(service: Arc<dyn ExtractionService>, window_radius: u32) -> Self {
        Self {
            service,
            window_radius,
        }
    }

    /// Search for `question` in the transcripts near its recorded page.
    /// Returns `None` when the search ran but found nothing, or when the
    /// service call failed; the flagged record then carries no suggestion.
    pub async fn search(
        &self,
        question: &Question,
        page_texts: &[String],
        ctx: &DocumentCtx,
    ) -> Option<ContextSearchResult> {
        let window_text = self.window_text(question.page, page_texts);
        if window_text.is_empty() {
            debug!(
                "{} question {}: no transcripts available for context search",
                ctx, question.number
            );
            return None;
        }

        match self
            .service
            .locate_question(question.number, &question.stem, &window_text)
            .await
        {
            Ok(located) if located.found => {
                info!(
                    "{} question {}: context search found a candidate on page {:?}",
                    ctx, question.number, located.page
                );
                Some(ContextSearchResult {
                    found: true,
                    source_page: located.page,
                    corrected_options: located.options,
                    corrected_answer: located.answer,
                })
            }
            Ok(_) => {
                debug!(
                    "{} question {}: context search found nothing",
                    ctx, question.number
                );
                None
            }
            Err(err) => {
                warn!(
                    "{} question {}: context search failed: {}",
                    ctx, question.number, err
                );
                None
            }
        }
    }

    /// Transcripts to search, concatenated with page markers so the service
    /// can report a source page. A recorded page of 0 means the location is
    /// unknown; fall back to the whole document.
    fn window_text(&self, page: u32, page_texts: &[String]) -> String {
        let last = page_texts.len() as u32;
        let (lo, hi) = if page == 0 {
            (1, last)
        } else {
            (
                page.saturating_sub(self.window_radius).max(1),
                (page + self.window_radius).min(last),
            )
        };

        let mut out = String::new();
        for n in lo..=hi {
            let Some(text) = page_texts.get(n as usize - 1) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            let _ = write!(out, "[Page {n}]\n{text}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::{AnswerKeyEntry, OptionLetter, OptionMap};
    use crate::services::contract::{AnswerCheck, ExtractedPage, LocatedQuestion};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLocator {
        windows: Mutex<Vec<String>>,
        result: Option<LocatedQuestion>,
    }

    #[async_trait]
    impl ExtractionService for RecordingLocator {
        async fn extract_questions(
            &self,
            _page_text: &str,
            _page_number: u32,
        ) -> Result<ExtractedPage, ServiceError> {
            unimplemented!("not used")
        }

        async fn extract_answer_key(
            &self,
            _tail_text: &str,
        ) -> Result<Vec<AnswerKeyEntry>, ServiceError> {
            unimplemented!("not used")
        }

        async fn check_answer(
            &self,
            _stem: &str,
            _options: &OptionMap,
        ) -> Result<AnswerCheck, ServiceError> {
            unimplemented!("not used")
        }

        async fn locate_question(
            &self,
            _number: u32,
            _stem: &str,
            window_text: &str,
        ) -> Result<LocatedQuestion, ServiceError> {
            self.windows.lock().unwrap().push(window_text.to_string());
            Ok(self.result.clone().unwrap_or_default())
        }
    }

    fn question(page: u32) -> Question {
        Question {
            number: 3,
            stem: "stem".to_string(),
            options: OptionMap::new(),
            page,
            correct_answer: None,
            validation: None,
        }
    }

    fn pages(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("page {i} text")).collect()
    }

    fn ctx() -> DocumentCtx {
        DocumentCtx::new(1, "test.pdf", 5)
    }

    fn marked_pages(window: &str) -> Vec<u32> {
        window
            .lines()
            .filter_map(|l| l.strip_prefix("[Page ")?.strip_suffix(']')?.parse().ok())
            .collect()
    }

    #[tokio::test]
    async fn window_spans_neighbors() {
        let locator = Arc::new(RecordingLocator::default());
        let repair = ContextSearchRepair::new(locator.clone(), 1);
        repair.search(&question(3), &pages(5), &ctx()).await;

        let windows = locator.windows.lock().unwrap();
        assert_eq!(marked_pages(&windows[0]), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn window_clamps_at_document_edges() {
        let locator = Arc::new(RecordingLocator::default());
        let repair = ContextSearchRepair::new(locator.clone(), 1);
        repair.search(&question(1), &pages(5), &ctx()).await;
        repair.search(&question(5), &pages(5), &ctx()).await;

        let windows = locator.windows.lock().unwrap();
        assert_eq!(marked_pages(&windows[0]), vec![1, 2]);
        assert_eq!(marked_pages(&windows[1]), vec![4, 5]);
    }

    #[tokio::test]
    async fn unknown_page_searches_whole_document() {
        let locator = Arc::new(RecordingLocator::default());
        let repair = ContextSearchRepair::new(locator.clone(), 1);
        repair.search(&question(0), &pages(4), &ctx()).await;

        let windows = locator.windows.lock().unwrap();
        assert_eq!(marked_pages(&windows[0]), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_transcripts_are_skipped() {
        let locator = Arc::new(RecordingLocator::default());
        let repair = ContextSearchRepair::new(locator.clone(), 1);
        let mut texts = pages(5);
        texts[1] = "   ".to_string();
        repair.search(&question(3), &texts, &ctx()).await;

        let windows = locator.windows.lock().unwrap();
        assert_eq!(marked_pages(&windows[0]), vec![3, 4]);
    }

    #[tokio::test]
    async fn not_found_yields_no_suggestion() {
        let locator = Arc::new(RecordingLocator::default());
        let repair = ContextSearchRepair::new(locator, 1);
        let suggestion = repair.search(&question(3), &pages(5), &ctx()).await;
        assert!(suggestion.is_none());
    }

    #[tokio::test]
    async fn found_result_becomes_suggestion() {
        use OptionLetter::*;
        let mut options = OptionMap::new();
        for l in [A, B, C, D] {
            options.insert(l, format!("true option {l}"));
        }
        let locator = Arc::new(RecordingLocator {
            windows: Mutex::new(Vec::new()),
            result: Some(LocatedQuestion {
                found: true,
                page: Some(4),
                options: Some(options.clone()),
                answer: Some(C),
            }),
        });
        let repair = ContextSearchRepair::new(locator, 1);
        let suggestion = repair.search(&question(3), &pages(5), &ctx()).await.unwrap();

        assert_eq!(suggestion.source_page, Some(4));
        assert_eq!(suggestion.corrected_options, Some(options));
        assert_eq!(suggestion.corrected_answer, Some(C));
    }
}
