//! Pipeline entity records
//!
//! These are the shapes that flow between pipeline stages. They are plain
//! value types; stages receive them by value and no record is shared mutably
//! across concurrent page workers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::letters::OptionLetter;

/// Option letters mapped to option text, ordered by the alphabet.
pub type OptionMap = BTreeMap<OptionLetter, String>;

/// One extracted multiple-choice question.
///
/// Lifecycle: created by the extractor (answer unset), answer attached by the
/// matcher, validation attached by the semantic validator. A context-search
/// suggestion is only ever committed through an explicit apply step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Question number as printed in the source. Not guaranteed unique in
    /// malformed documents; collisions are resolved last-writer-wins and
    /// surfaced in the report metadata.
    pub number: u32,
    /// Question text. For multi-part items this includes the shared scenario
    /// prefix.
    pub stem: String,
    #[serde(default)]
    pub options: OptionMap,
    /// 1-based source page.
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionLetter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl Question {
    /// True when the option keys form a prefix of the alphabet (no letter
    /// gap). A gap indicates extraction damage, not a short exam.
    pub fn has_gap_free_alphabet(&self) -> bool {
        self.options
            .keys()
            .zip(OptionLetter::ALL.iter())
            .filter(|(have, want)| *have == *want)
            .count()
            == self.options.len()
    }

    /// Structural completeness: at least 4 options, no letter gap, and the
    /// attached answer (if any) present in the option set.
    pub fn is_structurally_valid(&self) -> bool {
        if self.options.len() < 4 || !self.has_gap_free_alphabet() {
            return false;
        }
        match self.correct_answer {
            Some(letter) => self.options.contains_key(&letter),
            None => true,
        }
    }
}

/// Outcome of the independent semantic re-check for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Confidence of the independent re-derivation, in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_answer: Option<OptionLetter>,
}

impl ValidationResult {
    /// A failed validation carrying a single issue line.
    pub fn failed(issue: impl Into<String>) -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            issues: vec![issue.into()],
            derived_answer: None,
        }
    }
}

/// A resolved answer-key value for one question number.
///
/// `Multi` means the source marked more than one correct option; such
/// questions are excluded from the output, never arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyedAnswer {
    Single(OptionLetter),
    Multi,
}

/// One row of the extracted answer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_number: u32,
    pub answer: KeyedAnswer,
}

/// Correction proposed by the context-search repair stage.
///
/// Owned by the repair stage; never persisted unless an operator (or a
/// calling pipeline) explicitly applies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSearchResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_options: Option<OptionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_answer: Option<OptionLetter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_with(letters: &[OptionLetter]) -> Question {
        let mut options = OptionMap::new();
        for l in letters {
            options.insert(*l, format!("option {l}"));
        }
        Question {
            number: 1,
            stem: "stem".to_string(),
            options,
            page: 1,
            correct_answer: None,
            validation: None,
        }
    }

    #[test]
    fn full_alphabet_is_gap_free() {
        let q = question_with(&OptionLetter::ALL);
        assert!(q.has_gap_free_alphabet());
        assert!(q.is_structurally_valid());
    }

    #[test]
    fn four_option_prefix_is_valid() {
        use OptionLetter::*;
        let q = question_with(&[A, B, C, D]);
        assert!(q.is_structurally_valid());
    }

    #[test]
    fn letter_gap_is_rejected() {
        use OptionLetter::*;
        let q = question_with(&[A, B, D, E]);
        assert!(!q.has_gap_free_alphabet());
        assert!(!q.is_structurally_valid());
    }

    #[test]
    fn three_options_are_rejected() {
        use OptionLetter::*;
        let q = question_with(&[A, B, C]);
        assert!(q.has_gap_free_alphabet());
        assert!(!q.is_structurally_valid());
    }

    #[test]
    fn answer_outside_options_is_invalid() {
        use OptionLetter::*;
        let mut q = question_with(&[A, B, C, D]);
        q.correct_answer = Some(E);
        assert!(!q.is_structurally_valid());
        q.correct_answer = Some(B);
        assert!(q.is_structurally_valid());
    }
}
