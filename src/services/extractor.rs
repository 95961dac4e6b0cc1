//! Question extraction stage.
//!
//! Per page, asks the extraction service for all questions plus any shared
//! "data for questions X–Y" blocks, then propagates each shared block onto
//! every question in its range. Failing to propagate shared context silently
//! produces an unanswerable question, so propagation happens here,
//! deterministically, rather than being left to the service.
//!
//! A regex fallback recognizes the heading directly in the page text for the
//! cases where the service extracts the questions but omits the block.

use std::sync::Arc;
use std::sync::OnceLock;

use futures::future::join_all;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::models::Question;
use crate::services::contract::{ExtractedQuestion, ExtractionService, SharedStem};
use crate::services::transcriber::TRANSCRIPTION_ERROR_MARKER;
use crate::workflow::DocumentCtx;

/// Output of the extraction stage for a whole document.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// All extracted questions, in page order (answers unset).
    pub questions: Vec<Question>,
    /// Pages whose extraction failed schema conformance (1-based).
    pub failed_pages: Vec<u32>,
}

pub struct QuestionExtractor {
    service: Arc<dyn ExtractionService>,
}

impl QuestionExtractor {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self { service }
    }

    /// Extract questions from every transcribed page, at most `concurrency`
    /// calls in flight. Empty and failed-transcription pages contribute zero
    /// questions and are not treated as errors.
    pub async fn extract_all(
        &self,
        page_texts: &[String],
        ctx: &DocumentCtx,
        concurrency: usize,
    ) -> ExtractionOutcome {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let futures = page_texts.iter().enumerate().map(|(index, text)| {
            let semaphore = semaphore.clone();
            let page_number = index as u32 + 1;
            async move {
                if text.trim().is_empty() || text == TRANSCRIPTION_ERROR_MARKER {
                    return (page_number, Some(Vec::new()));
                }

                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                match self.service.extract_questions(text, page_number).await {
                    Ok(mut page) => {
                        // Service-reported blocks first, then anything the
                        // heading regex finds that the service missed.
                        let mut stems = std::mem::take(&mut page.shared_stems);
                        for detected in detect_shared_stems(text) {
                            if !stems.iter().any(|s| s.first == detected.first) {
                                stems.push(detected);
                            }
                        }
                        propagate_shared_stems(&mut page.questions, &stems);

                        debug!(
                            "{} page {}: {} question(s), {} shared block(s)",
                            ctx,
                            page_number,
                            page.questions.len(),
                            stems.len()
                        );
                        (page_number, Some(page.questions))
                    }
                    Err(e) => {
                        warn!("{} page {} extraction failed: {}", ctx, page_number, e);
                        (page_number, None)
                    }
                }
            }
        });

        let results = join_all(futures).await;

        let mut outcome = ExtractionOutcome::default();
        for (page_number, extracted) in results {
            match extracted {
                Some(questions) => {
                    for q in questions {
                        outcome.questions.push(Question {
                            number: q.number,
                            stem: q.stem,
                            options: q.options,
                            page: page_number,
                            correct_answer: None,
                            validation: None,
                        });
                    }
                }
                None => outcome.failed_pages.push(page_number),
            }
        }
        outcome.failed_pages.sort_unstable();

        info!(
            "{} extracted {} question(s) across {} page(s), {} page(s) failed",
            ctx,
            outcome.questions.len(),
            page_texts.len(),
            outcome.failed_pages.len()
        );

        outcome
    }
}

fn shared_stem_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "data for questions 22-23" / "נתונים לשאלות 22-23"
        Regex::new(
            r"(?im)^[#*\s]*(?:data for questions|נתונים לשאלות)\s+(\d+)\s*[-–—]\s*(\d+)\s*:?\s*$",
        )
        .expect("valid regex")
    })
}

fn question_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s*[.)]").expect("valid regex"))
}

/// Find shared-stem blocks in raw page text: a recognized heading followed by
/// the scenario text, which runs until the next question number line or the
/// next heading.
pub fn detect_shared_stems(page_text: &str) -> Vec<SharedStem> {
    let heading_re = shared_stem_heading_regex();
    let question_re = question_start_regex();

    let mut stems = Vec::new();
    for caps in heading_re.captures_iter(page_text) {
        let (Ok(first), Ok(last)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        if first > last {
            continue;
        }

        let heading_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let rest = &page_text[heading_end..];

        let mut scenario_lines = Vec::new();
        for line in rest.lines() {
            if question_re.is_match(line) || heading_re.is_match(line) {
                break;
            }
            scenario_lines.push(line);
        }

        let text = scenario_lines.join("\n").trim().to_string();
        if !text.is_empty() {
            stems.push(SharedStem { first, last, text });
        }
    }
    stems
}

/// Prepend each shared block verbatim onto every question in its range,
/// unless the question already carries that text.
pub fn propagate_shared_stems(questions: &mut [ExtractedQuestion], stems: &[SharedStem]) {
    for stem in stems {
        for question in questions.iter_mut() {
            if question.number < stem.first || question.number > stem.last {
                continue;
            }
            if question.stem.contains(stem.text.as_str()) {
                continue;
            }
            question.stem = format!("{}\n\n{}", stem.text, question.stem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionMap;

    fn extracted(number: u32, stem: &str) -> ExtractedQuestion {
        ExtractedQuestion {
            number,
            stem: stem.to_string(),
            options: OptionMap::new(),
        }
    }

    #[test]
    fn detects_english_heading() {
        let text = "Some intro.\n\nData for questions 22-23:\nA factory produces 40 units \
                    per hour.\nThe night shift runs 6 hours.\n\n22. How many units?\n";
        let stems = detect_shared_stems(text);
        assert_eq!(stems.len(), 1);
        assert_eq!(stems[0].first, 22);
        assert_eq!(stems[0].last, 23);
        assert!(stems[0].text.contains("40 units"));
        assert!(stems[0].text.contains("night shift"));
        assert!(!stems[0].text.contains("How many"));
    }

    #[test]
    fn detects_hebrew_heading() {
        let text = "נתונים לשאלות 7-9\nבמפעל מיוצרות 40 יחידות בשעה.\n\n7. כמה יחידות?\n";
        let stems = detect_shared_stems(text);
        assert_eq!(stems.len(), 1);
        assert_eq!((stems[0].first, stems[0].last), (7, 9));
        assert!(stems[0].text.contains("40 יחידות"));
    }

    #[test]
    fn ignores_inverted_ranges() {
        let text = "Data for questions 9-7:\nscenario text\n";
        assert!(detect_shared_stems(text).is_empty());
    }

    #[test]
    fn propagates_to_range_only() {
        let stems = vec![SharedStem {
            first: 22,
            last: 23,
            text: "The factory scenario.".to_string(),
        }];
        let mut questions = vec![
            extracted(21, "Before."),
            extracted(22, "How many units?"),
            extracted(23, "How long?"),
            extracted(24, "After."),
        ];
        propagate_shared_stems(&mut questions, &stems);

        assert_eq!(questions[0].stem, "Before.");
        assert!(questions[1].stem.starts_with("The factory scenario."));
        assert!(questions[2].stem.starts_with("The factory scenario."));
        assert_eq!(questions[3].stem, "After.");
    }

    #[test]
    fn propagation_is_idempotent() {
        let stems = vec![SharedStem {
            first: 5,
            last: 5,
            text: "Scenario.".to_string(),
        }];
        let mut questions = vec![extracted(5, "Scenario.\n\nAlready prefixed?")];
        propagate_shared_stems(&mut questions, &stems);
        assert_eq!(questions[0].stem, "Scenario.\n\nAlready prefixed?");
    }
}
