//! Collaborator contracts
//!
//! The pipeline consumes two external capabilities: page transcription and
//! semantic extraction. Both are capability traits, not concrete bindings,
//! so the production LLM implementation and the deterministic test doubles
//! are interchangeable without touching pipeline logic.
//!
//! Every method returns a typed DTO or a typed [`ServiceError`]; free-form
//! service text never crosses this boundary.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{AnswerKeyEntry, OptionLetter, OptionMap};
use crate::pdf::PageImage;

/// Converts a page image into normalized text, preserving structural cues
/// (headings, tables, numbering).
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe_page(&self, page: &PageImage) -> Result<String, ServiceError>;
}

/// One question as returned by the extraction service, letters already
/// normalized to the Latin alphabet.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedQuestion {
    pub number: u32,
    pub stem: String,
    pub options: OptionMap,
}

/// A "data for questions X–Y" block preceding a question range.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedStem {
    pub first: u32,
    pub last: u32,
    pub text: String,
}

/// Everything extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub questions: Vec<ExtractedQuestion>,
    pub shared_stems: Vec<SharedStem>,
}

/// The independently derived answer and its confidence, in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCheck {
    pub answer: Option<OptionLetter>,
    pub confidence: f64,
}

/// Result of a "locate this question's true options" query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatedQuestion {
    pub found: bool,
    pub page: Option<u32>,
    pub options: Option<OptionMap>,
    pub answer: Option<OptionLetter>,
}

/// Semantic extraction over transcribed text: question extraction,
/// answer-key extraction, answer plausibility, and question relocation.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// All questions on one page, plus any shared-stem blocks.
    async fn extract_questions(
        &self,
        page_text: &str,
        page_number: u32,
    ) -> Result<ExtractedPage, ServiceError>;

    /// The answer table found in `tail_text`, one entry per row. Duplicate
    /// numbers are allowed here; the resolver collapses them.
    async fn extract_answer_key(
        &self,
        tail_text: &str,
    ) -> Result<Vec<AnswerKeyEntry>, ServiceError>;

    /// Independently pick the best answer for a question, without being told
    /// which option is marked correct.
    async fn check_answer(
        &self,
        stem: &str,
        options: &OptionMap,
    ) -> Result<AnswerCheck, ServiceError>;

    /// Search `window_text` (concatenated neighboring pages) for the true
    /// options / answer of a mis-attributed question.
    async fn locate_question(
        &self,
        number: u32,
        stem: &str,
        window_text: &str,
    ) -> Result<LocatedQuestion, ServiceError>;
}
