//! Answer-key resolution stage.
//!
//! The answer table is physically separated from the questions, almost always
//! on the last pages. The resolver scans the trailing window only; an empty
//! result is a valid terminal outcome that the report surfaces. Guessing at
//! key locations elsewhere in the document is worse than reporting zero, so
//! there is no silent full-document fallback.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{AnswerKeyEntry, KeyedAnswer};
use crate::services::contract::ExtractionService;
use crate::workflow::DocumentCtx;

/// The resolved key for one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub entries: BTreeMap<u32, KeyedAnswer>,
    /// True when the scan call itself failed (as opposed to finding nothing).
    pub scan_failed: bool,
}

impl ResolvedKey {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct AnswerKeyResolver {
    service: Arc<dyn ExtractionService>,
}

impl AnswerKeyResolver {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self { service }
    }

    /// Scan the last `window` pages for the answer table.
    pub async fn resolve(
        &self,
        page_texts: &[String],
        window: usize,
        ctx: &DocumentCtx,
    ) -> ResolvedKey {
        let window = window.max(1);
        let start = page_texts.len().saturating_sub(window);
        let tail = page_texts[start..].join("\n\n");

        if tail.trim().is_empty() {
            warn!("{} answer-key window is empty", ctx);
            return ResolvedKey::default();
        }

        match self.service.extract_answer_key(&tail).await {
            Ok(entries) => {
                let key = collapse_entries(entries);
                if key.entries.is_empty() {
                    warn!("{} no answer key found in the last {} page(s)", ctx, window);
                } else {
                    info!(
                        "{} resolved answer key with {} entr(ies)",
                        ctx,
                        key.entries.len()
                    );
                }
                key
            }
            Err(e) => {
                warn!("{} answer-key scan failed: {}", ctx, e);
                ResolvedKey {
                    entries: BTreeMap::new(),
                    scan_failed: true,
                }
            }
        }
    }
}

/// Collapse raw table rows into one entry per question number. A number with
/// conflicting single letters, or any explicit MULTI row, resolves to MULTI.
fn collapse_entries(entries: Vec<AnswerKeyEntry>) -> ResolvedKey {
    let mut collapsed: BTreeMap<u32, KeyedAnswer> = BTreeMap::new();

    for entry in entries {
        collapsed
            .entry(entry.question_number)
            .and_modify(|existing| {
                if *existing != entry.answer {
                    *existing = KeyedAnswer::Multi;
                }
            })
            .or_insert(entry.answer);
    }

    ResolvedKey {
        entries: collapsed,
        scan_failed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionLetter;

    fn entry(number: u32, answer: KeyedAnswer) -> AnswerKeyEntry {
        AnswerKeyEntry {
            question_number: number,
            answer,
        }
    }

    #[test]
    fn collapses_conflicting_rows_to_multi() {
        let key = collapse_entries(vec![
            entry(5, KeyedAnswer::Single(OptionLetter::A)),
            entry(5, KeyedAnswer::Single(OptionLetter::C)),
            entry(6, KeyedAnswer::Single(OptionLetter::B)),
        ]);
        assert_eq!(key.entries[&5], KeyedAnswer::Multi);
        assert_eq!(key.entries[&6], KeyedAnswer::Single(OptionLetter::B));
    }

    #[test]
    fn duplicate_identical_rows_stay_single() {
        let key = collapse_entries(vec![
            entry(3, KeyedAnswer::Single(OptionLetter::D)),
            entry(3, KeyedAnswer::Single(OptionLetter::D)),
        ]);
        assert_eq!(key.entries[&3], KeyedAnswer::Single(OptionLetter::D));
    }

    #[test]
    fn explicit_multi_is_sticky() {
        let key = collapse_entries(vec![
            entry(9, KeyedAnswer::Multi),
            entry(9, KeyedAnswer::Single(OptionLetter::A)),
        ]);
        assert_eq!(key.entries[&9], KeyedAnswer::Multi);
    }
}
