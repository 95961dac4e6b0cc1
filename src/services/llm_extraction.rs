//! LLM-backed implementation of the collaborator contracts.
//!
//! This is the parse edge: every response is JSON, parsed exactly once into
//! the typed DTOs of [`crate::services::contract`]. Option letters (Latin or
//! Hebrew) are normalized here; nothing downstream sees raw service output.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clients::LlmClient;
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{AnswerKeyEntry, KeyedAnswer, OptionLetter, OptionMap};
use crate::pdf::PageImage;
use crate::services::contract::{
    AnswerCheck, ExtractedPage, ExtractedQuestion, ExtractionService, LocatedQuestion, SharedStem,
    TranscriptionService,
};

const TRANSCRIBE_SYSTEM: &str = "You are a meticulous transcription engine for scanned exam \
pages in Hebrew and English. Return a faithful plain-text transcription, preserving headings, \
tables and question numbering with Markdown where appropriate. Do not translate, do not \
summarize, do not invent content.";

const EXTRACT_SYSTEM: &str = "You extract multiple-choice questions from transcribed exam \
pages (Hebrew or English). You answer with JSON only, exactly in the requested schema, with \
no commentary and no markdown fences.";

pub struct LlmExtractionService {
    chat_client: Arc<LlmClient>,
    vision_client: Arc<LlmClient>,
}

impl LlmExtractionService {
    pub fn new(config: &Config) -> Self {
        Self {
            chat_client: Arc::new(LlmClient::new(config)),
            vision_client: Arc::new(LlmClient::with_model(
                config,
                config.transcription_model_name.clone(),
            )),
        }
    }
}

#[async_trait]
impl TranscriptionService for LlmExtractionService {
    async fn transcribe_page(&self, page: &PageImage) -> Result<String, ServiceError> {
        let data_url = page.to_data_url();
        let user_message = format!(
            "Transcribe exam page {} from the attached image. Output the transcription only.",
            page.page_number
        );

        let text = self
            .vision_client
            .chat(&user_message, Some(TRANSCRIBE_SYSTEM), Some(&[data_url]))
            .await
            .map_err(|e| request_failed("transcribe", e))?;

        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse {
                endpoint: "transcribe".to_string(),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl ExtractionService for LlmExtractionService {
    async fn extract_questions(
        &self,
        page_text: &str,
        page_number: u32,
    ) -> Result<ExtractedPage, ServiceError> {
        let prompt = build_extract_questions_prompt(page_text, page_number);
        let response = self
            .chat_client
            .chat(&prompt, Some(EXTRACT_SYSTEM), None)
            .await
            .map_err(|e| request_failed("extract_questions", e))?;

        let wire: WirePage = parse_json("extract_questions", &response)?;

        let questions = wire
            .questions
            .into_iter()
            .filter_map(|q| {
                let number = q.number?;
                Some(ExtractedQuestion {
                    number,
                    stem: q.stem.trim().to_string(),
                    options: parse_option_map(&q.options),
                })
            })
            .collect();

        let shared_stems = wire
            .shared_stems
            .into_iter()
            .filter(|s| s.first <= s.last && !s.text.trim().is_empty())
            .map(|s| SharedStem {
                first: s.first,
                last: s.last,
                text: s.text.trim().to_string(),
            })
            .collect();

        Ok(ExtractedPage {
            questions,
            shared_stems,
        })
    }

    async fn extract_answer_key(
        &self,
        tail_text: &str,
    ) -> Result<Vec<AnswerKeyEntry>, ServiceError> {
        let prompt = build_answer_key_prompt(tail_text);
        let response = self
            .chat_client
            .chat(&prompt, Some(EXTRACT_SYSTEM), None)
            .await
            .map_err(|e| request_failed("extract_answer_key", e))?;

        let wire: WireKey = parse_json("extract_answer_key", &response)?;

        let mut entries = Vec::new();
        for row in wire.entries {
            match parse_keyed_answer(&row.answer) {
                Some(answer) => entries.push(AnswerKeyEntry {
                    question_number: row.number,
                    answer,
                }),
                None => {
                    warn!(
                        "answer key row for question {} has unparseable answer '{}', dropped",
                        row.number, row.answer
                    );
                }
            }
        }
        Ok(entries)
    }

    async fn check_answer(
        &self,
        stem: &str,
        options: &OptionMap,
    ) -> Result<AnswerCheck, ServiceError> {
        let prompt = build_check_answer_prompt(stem, options);
        let response = self
            .chat_client
            .chat(&prompt, Some(EXTRACT_SYSTEM), None)
            .await
            .map_err(|e| request_failed("check_answer", e))?;

        let wire: WireCheck = parse_json("check_answer", &response)?;

        let confidence = parse_confidence(&wire.confidence).ok_or_else(|| {
            ServiceError::schema_mismatch(
                "check_answer",
                format!("unparseable confidence: {}", wire.confidence),
            )
        })?;

        Ok(AnswerCheck {
            answer: wire.answer.as_deref().and_then(OptionLetter::parse),
            confidence,
        })
    }

    async fn locate_question(
        &self,
        number: u32,
        stem: &str,
        window_text: &str,
    ) -> Result<LocatedQuestion, ServiceError> {
        let prompt = build_locate_prompt(number, stem, window_text);
        let response = self
            .chat_client
            .chat(&prompt, Some(EXTRACT_SYSTEM), None)
            .await
            .map_err(|e| request_failed("locate_question", e))?;

        let wire: WireLocate = parse_json("locate_question", &response)?;
        debug!("locate_question {}: found={}", number, wire.found);

        Ok(LocatedQuestion {
            found: wire.found,
            page: wire.page,
            options: wire.options.as_ref().map(parse_option_map),
            answer: wire.answer.as_deref().and_then(OptionLetter::parse),
        })
    }
}

// ========== prompt builders ==========

fn build_extract_questions_prompt(page_text: &str, page_number: u32) -> String {
    format!(
        r#"Below is the transcription of page {page_number} of a scanned multiple-choice exam
(Hebrew or English). Extract every multiple-choice question on the page.

Rules:
- Every question has a printed number, a stem, and lettered options (A-E or א-ה).
- Keep option letters exactly as printed; do not renumber or reorder.
- When the page contains a heading like "data for questions 22-23" (or the Hebrew
  equivalent) followed by descriptive text, report that block under "shared_stems"
  with the question range it applies to. Do not fold it into the stems yourself.
- A page with no questions yields empty arrays.

Return JSON only, in this schema:
{{
  "questions": [
    {{"number": 1, "stem": "...", "options": {{"A": "...", "B": "...", "C": "...", "D": "..."}}}}
  ],
  "shared_stems": [
    {{"first": 22, "last": 23, "text": "..."}}
  ]
}}

Page transcription:
{page_text}"#
    )
}

fn build_answer_key_prompt(tail_text: &str) -> String {
    format!(
        r#"Below are the trailing pages of a scanned multiple-choice exam. Find the answer-key
table: a mapping from question number to the correct option letter.

Rules:
- Option letters may be Latin (A-E) or Hebrew (א-ה); report them as printed.
- When the source marks MORE THAN ONE correct option for a number, report the
  answer as "MULTI" for that number. Never pick one yourself.
- If there is no answer table in the text, return an empty "entries" array.

Return JSON only, in this schema:
{{
  "entries": [
    {{"number": 1, "answer": "B"}},
    {{"number": 5, "answer": "MULTI"}}
  ]
}}

Text:
{tail_text}"#
    )
}

fn build_check_answer_prompt(stem: &str, options: &OptionMap) -> String {
    let options_block = options
        .iter()
        .map(|(letter, text)| format!("{letter}. {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are given one multiple-choice exam question. Independently select the best
answer and state your confidence.

Return JSON only, in this schema:
{{"answer": "B", "confidence": 0.9}}

"confidence" is a number in [0, 1] (the words "low", "medium", "high" are also
accepted). If no option is clearly best, pick the most plausible one with low
confidence.

Question:
{stem}

Options:
{options_block}"#
    )
}

fn build_locate_prompt(number: u32, stem: &str, window_text: &str) -> String {
    format!(
        r#"Question {number} of a scanned exam was extracted with options or an answer that do
not belong to it, most likely because of a page-boundary error. Below is the text
of the neighboring pages. Locate the TRUE options (and the correct answer, if an
answer table is visible) belonging to this question.

Return JSON only, in this schema:
{{"found": true, "page": 4, "options": {{"A": "...", "B": "...", "C": "...", "D": "..."}}, "answer": "C"}}

If the pages do not contain this question's options, return {{"found": false}}.
Never invent options.

Question {number} stem:
{stem}

Neighboring pages:
{window_text}"#
    )
}

// ========== wire shapes ==========

#[derive(Debug, Deserialize)]
struct WireQuestion {
    number: Option<u32>,
    #[serde(default)]
    stem: String,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct WireSharedStem {
    first: u32,
    last: u32,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct WirePage {
    #[serde(default)]
    questions: Vec<WireQuestion>,
    #[serde(default)]
    shared_stems: Vec<WireSharedStem>,
}

#[derive(Debug, Deserialize)]
struct WireKeyRow {
    number: u32,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireKey {
    #[serde(default)]
    entries: Vec<WireKeyRow>,
}

#[derive(Debug, Deserialize)]
struct WireCheck {
    answer: Option<String>,
    #[serde(default)]
    confidence: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireLocate {
    #[serde(default)]
    found: bool,
    page: Option<u32>,
    options: Option<BTreeMap<String, String>>,
    answer: Option<String>,
}

// ========== edge parsing ==========

fn request_failed(endpoint: &str, err: anyhow::Error) -> ServiceError {
    ServiceError::RequestFailed {
        endpoint: endpoint.to_string(),
        source: err.into(),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    response: &str,
) -> Result<T, ServiceError> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(cleaned)
        .map_err(|e| ServiceError::schema_mismatch(endpoint, e.to_string()))
}

/// Models often wrap JSON in ``` fences despite instructions; strip them.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let Some(inner) = s.strip_prefix("```") else {
        return s;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim().strip_suffix("```").unwrap_or(inner).trim()
}

/// Normalize a raw letter→text map. Unrecognized letters are dropped with a
/// warning; the structural validator rejects any resulting gap downstream.
fn parse_option_map(raw: &BTreeMap<String, String>) -> OptionMap {
    let mut options = OptionMap::new();
    for (key, text) in raw {
        match OptionLetter::parse(key) {
            Some(letter) => {
                options.insert(letter, text.trim().to_string());
            }
            None => warn!("dropping option with unrecognized letter '{}'", key),
        }
    }
    options
}

/// Parse one answer-key cell: a single letter (Latin or Hebrew), an explicit
/// MULTI marker, or several letters ("A,C") which also mean MULTI.
fn parse_keyed_answer(raw: &str) -> Option<KeyedAnswer> {
    let trimmed = raw.trim();
    if trimmed.to_ascii_lowercase().contains("multi") {
        return Some(KeyedAnswer::Multi);
    }

    let mut letters: Vec<OptionLetter> =
        trimmed.chars().filter_map(OptionLetter::from_char).collect();
    letters.sort();
    letters.dedup();
    match letters.len() {
        0 => None,
        1 => Some(KeyedAnswer::Single(letters[0])),
        _ => Some(KeyedAnswer::Multi),
    }
}

/// Accept numeric confidence in [0, 1] or the discrete words low/medium/high.
fn parse_confidence(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|v| v.clamp(0.0, 1.0)),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(0.25),
            "medium" => Some(0.55),
            "high" => Some(0.9),
            other => other.parse::<f64>().ok().map(|v| v.clamp(0.0, 1.0)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parses_hebrew_option_keys() {
        let mut raw = BTreeMap::new();
        raw.insert("א".to_string(), "first".to_string());
        raw.insert("ב.".to_string(), "second".to_string());
        raw.insert("7".to_string(), "junk".to_string());

        let parsed = parse_option_map(&raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(&OptionLetter::A).unwrap(), "first");
        assert_eq!(parsed.get(&OptionLetter::B).unwrap(), "second");
    }

    #[test]
    fn keyed_answer_variants() {
        assert_eq!(
            parse_keyed_answer("B"),
            Some(KeyedAnswer::Single(OptionLetter::B))
        );
        assert_eq!(
            parse_keyed_answer("ד"),
            Some(KeyedAnswer::Single(OptionLetter::D))
        );
        assert_eq!(parse_keyed_answer("MULTI"), Some(KeyedAnswer::Multi));
        assert_eq!(parse_keyed_answer("A, C"), Some(KeyedAnswer::Multi));
        assert_eq!(parse_keyed_answer("?"), None);
    }

    #[test]
    fn confidence_accepts_numbers_and_words() {
        use serde_json::json;
        assert_eq!(parse_confidence(&json!(0.85)), Some(0.85));
        assert_eq!(parse_confidence(&json!(7)), Some(1.0));
        assert_eq!(parse_confidence(&json!("high")), Some(0.9));
        assert_eq!(parse_confidence(&json!("low")), Some(0.25));
        assert_eq!(parse_confidence(&json!("0.4")), Some(0.4));
        assert_eq!(parse_confidence(&json!(null)), None);
    }

    #[test]
    fn wire_page_parses_schema() {
        let json = r#"{
            "questions": [
                {"number": 3, "stem": "What?", "options": {"A": "x", "B": "y", "C": "z", "D": "w"}}
            ],
            "shared_stems": [{"first": 3, "last": 4, "text": "scenario"}]
        }"#;
        let wire: WirePage = parse_json("extract_questions", json).unwrap();
        assert_eq!(wire.questions.len(), 1);
        assert_eq!(wire.shared_stems[0].last, 4);
    }

    #[test]
    fn schema_mismatch_is_typed() {
        let err = parse_json::<WirePage>("extract_questions", "not json at all").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::SchemaMismatch { .. }
        ));
    }
}
