//! Review queue writer.
//!
//! Appends one line per record that needs a human decision: rejected
//! questions and flagged questions with their repair suggestion. Only writes
//! single records; knows nothing about pipeline order.

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::models::{FlaggedQuestion, RejectedQuestion};
use crate::utils::truncate_text;

pub struct ReviewWriter {
    review_file_path: String,
}

impl ReviewWriter {
    pub fn new() -> Self {
        Self {
            review_file_path: "review.txt".to_string(),
        }
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            review_file_path: path.into(),
        }
    }

    /// Append one rejected question.
    pub fn write_rejected(&self, doc_name: &str, rejected: &RejectedQuestion) -> Result<()> {
        debug!(
            "review entry: {} | question {} | {}",
            doc_name, rejected.number, rejected.reason
        );
        self.append(format!(
            "{} | question {} | page {} | rejected: {}\n",
            doc_name, rejected.number, rejected.page, rejected.reason
        ))
    }

    /// Append one flagged question, with its suggestion when one exists.
    pub fn write_flagged(&self, doc_name: &str, flagged: &FlaggedQuestion) -> Result<()> {
        let question = &flagged.question;
        let issues = question
            .validation
            .as_ref()
            .map(|v| v.issues.join("; "))
            .unwrap_or_default();
        let suggestion = match &flagged.suggestion {
            Some(s) => format!(
                "suggestion from page {}",
                s.source_page
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string())
            ),
            None => "no suggestion".to_string(),
        };
        self.append(format!(
            "{} | question {} | page {} | flagged: {} | {} | stem: {}\n",
            doc_name,
            question.number,
            question.page,
            issues,
            suggestion,
            truncate_text(&question.stem, 120)
        ))
    }

    fn append(&self, line: String) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.review_file_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl Default for ReviewWriter {
    fn default() -> Self {
        Self::new()
    }
}
