//! Semantic validation stage.
//!
//! Asks the model to answer each matched question independently and compares
//! its pick against the keyed answer. A question is accepted only when the
//! checker reproduces the keyed answer with confidence at or above the
//! threshold; a mismatch, a low-confidence agreement, or an abstaining
//! checker all fail validation and hand the question to repair.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::models::{OptionLetter, Question, ValidationResult};
use crate::services::contract::ExtractionService;
use crate::workflow::DocumentCtx;

pub struct SemanticValidator {
    service: Arc<dyn ExtractionService>,
    min_confidence: f64,
}

impl SemanticValidator {
    pub fn new(service: Arc<dyn ExtractionService>, min_confidence: f64) -> Self {
        Self {
            service,
            min_confidence,
        }
    }

    /// Validate every matched question in place. Questions already carrying a
    /// failed validation from the matching stage are left untouched, they go
    /// straight to repair. A check call that errors out leaves the question
    /// accepted with the keyed answer; validation is advisory.
    pub async fn validate_all(&self, questions: &mut [Question], ctx: &DocumentCtx) {
        for question in questions.iter_mut() {
            if matches!(&question.validation, Some(v) if !v.valid) {
                continue;
            }
            let Some(keyed) = question.correct_answer else {
                continue;
            };

            match self.check_one(question, keyed).await {
                Ok(validation) => {
                    if !validation.valid {
                        warn!(
                            "{} question {}: check against keyed answer {} failed ({})",
                            ctx,
                            question.number,
                            keyed,
                            validation.issues.join("; ")
                        );
                    }
                    question.validation = Some(validation);
                }
                Err(err) => {
                    debug!(
                        "{} question {}: semantic check unavailable: {}",
                        ctx, question.number, err
                    );
                }
            }
        }
    }

    async fn check_one(
        &self,
        question: &Question,
        keyed: OptionLetter,
    ) -> Result<ValidationResult, ServiceError> {
        let check = self
            .service
            .check_answer(&question.stem, &question.options)
            .await?;

        // Accept only a confident, matching re-derivation; everything else
        // is listed as an issue and fails the check.
        let mut issues = Vec::new();
        match check.answer {
            None => issues.push("checker returned no answer".to_string()),
            Some(derived) if derived != keyed => {
                issues.push(format!("checker answered {derived} against keyed {keyed}"));
            }
            Some(_) => {}
        }
        if check.confidence < self.min_confidence {
            issues.push(format!(
                "confidence {:.2} below threshold {:.2}",
                check.confidence, self.min_confidence
            ));
        }

        Ok(ValidationResult {
            valid: issues.is_empty(),
            confidence: check.confidence,
            issues,
            derived_answer: check.answer,
        })
    }
}
