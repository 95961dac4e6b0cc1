//! Matching and structural validation stage.
//!
//! Joins extracted questions to the resolved answer key and enforces minimum
//! structural completeness. Deterministic: no service calls, no heuristics.
//! Every exclusion is reported with its question number and reason; nothing
//! is silently dropped.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::{
    KeyedAnswer, Question, RejectReason, RejectedQuestion, ValidationResult,
};
use crate::workflow::DocumentCtx;

/// What the matcher produced for one document.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Structurally valid questions that survived the join, in number order.
    /// Questions pre-flagged with a failed validation carry a semantic
    /// mismatch (keyed answer outside the option set) for the repair stage.
    pub matched: Vec<Question>,
    pub rejected: Vec<RejectedQuestion>,
    /// Numbers claimed by more than one extracted question (last writer won).
    pub collisions: Vec<u32>,
}

/// Join `questions` (in page order) against the resolved key.
pub fn match_questions(
    questions: Vec<Question>,
    key: &BTreeMap<u32, KeyedAnswer>,
    ctx: &DocumentCtx,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    // Collision resolution first: last one encountered in page order wins,
    // and the collision is surfaced in metadata rather than silently
    // discarding a record.
    let mut by_number: BTreeMap<u32, Question> = BTreeMap::new();
    for question in questions {
        let number = question.number;
        if by_number.insert(number, question).is_some() {
            warn!(
                "{} question number {} extracted more than once, keeping the later one",
                ctx, number
            );
            if !outcome.collisions.contains(&number) {
                outcome.collisions.push(number);
            }
        }
    }

    for (number, mut question) in by_number {
        // Structural check before the key join: a damaged option set can
        // never be delivered regardless of the key.
        if question.options.len() < 4 || !question.has_gap_free_alphabet() {
            debug!(
                "{} question {} rejected: structural gap ({} option(s))",
                ctx,
                number,
                question.options.len()
            );
            outcome.rejected.push(RejectedQuestion {
                number,
                page: question.page,
                reason: RejectReason::StructuralGap,
            });
            continue;
        }

        match key.get(&number) {
            None => {
                // No key entry: the question can never be delivered as
                // single-answer output, so it is reported, not retained.
                outcome.rejected.push(RejectedQuestion {
                    number,
                    page: question.page,
                    reason: RejectReason::MissingAnswer,
                });
            }
            Some(KeyedAnswer::Multi) => {
                outcome.rejected.push(RejectedQuestion {
                    number,
                    page: question.page,
                    reason: RejectReason::MultiAnswer,
                });
            }
            Some(KeyedAnswer::Single(letter)) => {
                if question.options.contains_key(letter) {
                    question.correct_answer = Some(*letter);
                } else {
                    // Keyed answer outside the extracted option set: a
                    // semantic mismatch, typically page misattribution.
                    // Flag for context-search repair instead of rejecting.
                    warn!(
                        "{} question {}: keyed answer {} not among extracted options",
                        ctx, number, letter
                    );
                    question.validation = Some(ValidationResult::failed(format!(
                        "keyed answer {letter} not among extracted options"
                    )));
                }
                outcome.matched.push(question);
            }
        }
    }

    outcome.collisions.sort_unstable();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionLetter, OptionMap};

    fn ctx() -> DocumentCtx {
        DocumentCtx::new(1, "test.pdf", 5)
    }

    fn question(number: u32, page: u32, letters: &[OptionLetter]) -> Question {
        let mut options = OptionMap::new();
        for l in letters {
            options.insert(*l, format!("option {l}"));
        }
        Question {
            number,
            stem: format!("question {number}"),
            options,
            page,
            correct_answer: None,
            validation: None,
        }
    }

    fn single(letter: OptionLetter) -> KeyedAnswer {
        KeyedAnswer::Single(letter)
    }

    #[test]
    fn attaches_answer_from_key() {
        use OptionLetter::*;
        let key = BTreeMap::from([(1, single(B))]);
        let outcome = match_questions(vec![question(1, 1, &[A, B, C, D])], &key, &ctx());

        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.matched[0].correct_answer, Some(B));
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn rejects_option_gap() {
        use OptionLetter::*;
        let key = BTreeMap::from([(1, single(A))]);
        let outcome = match_questions(vec![question(1, 1, &[A, B, D, E])], &key, &ctx());

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.rejected[0].reason, RejectReason::StructuralGap);
    }

    #[test]
    fn rejects_three_options() {
        use OptionLetter::*;
        let outcome = match_questions(vec![question(2, 1, &[A, B, C])], &BTreeMap::new(), &ctx());
        assert_eq!(outcome.rejected[0].reason, RejectReason::StructuralGap);
    }

    #[test]
    fn rejects_multi_answer() {
        use OptionLetter::*;
        let key = BTreeMap::from([(5, KeyedAnswer::Multi)]);
        let outcome = match_questions(vec![question(5, 2, &[A, B, C, D])], &key, &ctx());

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.rejected[0].reason, RejectReason::MultiAnswer);
    }

    #[test]
    fn rejects_missing_key_entry() {
        use OptionLetter::*;
        let outcome = match_questions(vec![question(8, 3, &[A, B, C, D])], &BTreeMap::new(), &ctx());
        assert_eq!(outcome.rejected[0].reason, RejectReason::MissingAnswer);
    }

    #[test]
    fn keyed_answer_outside_options_is_flagged_not_rejected() {
        use OptionLetter::*;
        let key = BTreeMap::from([(4, single(E))]);
        let outcome = match_questions(vec![question(4, 1, &[A, B, C, D])], &key, &ctx());

        assert_eq!(outcome.matched.len(), 1);
        let q = &outcome.matched[0];
        assert_eq!(q.correct_answer, None);
        assert!(!q.validation.as_ref().unwrap().valid);
    }

    #[test]
    fn collision_keeps_last_and_is_surfaced() {
        use OptionLetter::*;
        let key = BTreeMap::from([(7, single(A))]);
        let mut first = question(7, 2, &[A, B, C, D]);
        first.stem = "earlier".to_string();
        let mut second = question(7, 3, &[A, B, C, D]);
        second.stem = "later".to_string();

        let outcome = match_questions(vec![first, second], &key, &ctx());
        assert_eq!(outcome.collisions, vec![7]);
        assert_eq!(outcome.matched[0].stem, "later");
        assert_eq!(outcome.matched[0].page, 3);
    }
}
