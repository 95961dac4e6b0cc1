//! Per-document report
//!
//! The report is the single output of a pipeline run. Even a degenerate run
//! (zero questions) produces one, with metadata explaining why.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::question::{ContextSearchResult, Question};

/// Why a question was excluded by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No answer-key entry for this question number.
    MissingAnswer,
    /// The answer key attributes more than one correct option.
    MultiAnswer,
    /// Fewer than 4 options, or a letter gap in the option alphabet.
    StructuralGap,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::MissingAnswer => "missing_answer",
            RejectReason::MultiAnswer => "multi_answer",
            RejectReason::StructuralGap => "structural_gap",
        };
        write!(f, "{s}")
    }
}

/// One rejected question with the reason it was excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedQuestion {
    pub number: u32,
    pub page: u32,
    pub reason: RejectReason,
}

/// A question that failed the semantic check, with the repair suggestion if
/// context search found one. `suggestion` is never auto-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedQuestion {
    pub question: Question,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<ContextSearchResult>,
}

/// Run-level diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub page_count: u32,
    pub extraction_method: String,
    /// Accepted questions over all matched questions, in [0, 1].
    pub success_rate: f64,
    /// Pages whose transcription failed (1-based).
    #[serde(default)]
    pub transcription_failures: Vec<u32>,
    /// Pages whose question extraction failed schema conformance (1-based).
    #[serde(default)]
    pub extraction_failures: Vec<u32>,
    /// Question numbers claimed by more than one extracted question.
    /// Last one in page order won; the collision is surfaced, not silent.
    #[serde(default)]
    pub collisions: Vec<u32>,
    /// True when the answer-key scan yielded no entries. A valid terminal
    /// outcome; the resolver does not guess at key locations.
    #[serde(default)]
    pub answer_key_empty: bool,
}

/// Full output for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Accepted questions, ready for downstream ingestion.
    pub questions: Vec<Question>,
    pub rejected: Vec<RejectedQuestion>,
    pub flagged: Vec<FlaggedQuestion>,
    pub metadata: ReportMetadata,
}

impl DocumentReport {
    /// Number of questions that reached the matcher join.
    pub fn matched_len(&self) -> usize {
        self.questions.len() + self.rejected.len() + self.flagged.len()
    }

    /// Commit the repair suggestion for `number`: overwrite the question's
    /// options and answer with the suggested correction and move it into the
    /// accepted set.
    ///
    /// This is the explicit "apply fix" action; the pipeline itself never
    /// calls it. Returns false when the question is not flagged, carries no
    /// usable suggestion, or would still lack an answer or a structurally
    /// valid option set after the correction; the question then stays
    /// flagged.
    pub fn apply_repair(&mut self, number: u32) -> bool {
        let idx = match self.flagged.iter().position(|f| {
            f.question.number == number
                && f.suggestion.as_ref().map(|s| s.found).unwrap_or(false)
        }) {
            Some(idx) => idx,
            None => return false,
        };
        let Some(suggestion) = self.flagged[idx].suggestion.clone() else {
            return false;
        };

        let mut question = self.flagged[idx].question.clone();
        if let Some(options) = suggestion.corrected_options {
            question.options = options;
        }
        if let Some(answer) = suggestion.corrected_answer {
            question.correct_answer = Some(answer);
        }
        if let Some(page) = suggestion.source_page {
            question.page = page;
        }
        question.validation = None;

        // Accepted questions always carry an answer drawn from their own
        // option set; a correction that cannot reach that state is not
        // committed.
        if question.correct_answer.is_none() || !question.is_structurally_valid() {
            return false;
        }

        self.flagged.remove(idx);
        self.questions.push(question);
        self.questions.sort_by_key(|q| q.number);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionLetter, OptionMap};

    fn flagged_question(number: u32, suggestion: Option<ContextSearchResult>) -> FlaggedQuestion {
        FlaggedQuestion {
            question: Question {
                number,
                stem: "stem".to_string(),
                options: OptionMap::new(),
                page: 2,
                correct_answer: None,
                validation: None,
            },
            suggestion,
        }
    }

    #[test]
    fn apply_repair_moves_question_to_accepted() {
        let mut corrected = OptionMap::new();
        for l in OptionLetter::ALL {
            corrected.insert(l, format!("fixed {l}"));
        }
        let suggestion = ContextSearchResult {
            found: true,
            source_page: Some(3),
            corrected_options: Some(corrected),
            corrected_answer: Some(OptionLetter::B),
        };
        let mut report = DocumentReport {
            flagged: vec![flagged_question(7, Some(suggestion))],
            ..Default::default()
        };

        assert!(report.apply_repair(7));
        assert!(report.flagged.is_empty());
        assert_eq!(report.questions.len(), 1);
        let q = &report.questions[0];
        assert_eq!(q.correct_answer, Some(OptionLetter::B));
        assert_eq!(q.page, 3);
        assert_eq!(q.options.len(), 5);
    }

    #[test]
    fn apply_repair_refuses_answerless_correction() {
        let mut corrected = OptionMap::new();
        for l in OptionLetter::ALL {
            corrected.insert(l, format!("fixed {l}"));
        }
        // found, but no corrected answer and the question never had one
        let suggestion = ContextSearchResult {
            found: true,
            source_page: Some(3),
            corrected_options: Some(corrected),
            corrected_answer: None,
        };
        let mut report = DocumentReport {
            flagged: vec![flagged_question(7, Some(suggestion))],
            ..Default::default()
        };

        assert!(!report.apply_repair(7));
        assert!(report.questions.is_empty());
        assert_eq!(report.flagged.len(), 1);
    }

    #[test]
    fn apply_repair_refuses_gapped_correction() {
        use OptionLetter::*;
        let mut corrected = OptionMap::new();
        for l in [A, B, D, E] {
            corrected.insert(l, format!("fixed {l}"));
        }
        let suggestion = ContextSearchResult {
            found: true,
            source_page: Some(3),
            corrected_options: Some(corrected),
            corrected_answer: Some(A),
        };
        let mut report = DocumentReport {
            flagged: vec![flagged_question(7, Some(suggestion))],
            ..Default::default()
        };

        assert!(!report.apply_repair(7));
        assert_eq!(report.flagged.len(), 1);
    }

    #[test]
    fn apply_repair_refuses_without_suggestion() {
        let mut report = DocumentReport {
            flagged: vec![flagged_question(7, None)],
            ..Default::default()
        };
        assert!(!report.apply_repair(7));
        assert_eq!(report.flagged.len(), 1);
    }

    #[test]
    fn reject_reason_uses_snake_case() {
        assert_eq!(RejectReason::StructuralGap.to_string(), "structural_gap");
        let json = serde_json::to_string(&RejectReason::MultiAnswer).unwrap();
        assert_eq!(json, "\"multi_answer\"");
    }
}
