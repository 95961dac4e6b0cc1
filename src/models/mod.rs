//! Pipeline data model: questions, answer keys, validation, reports.

pub mod letters;
pub mod question;
pub mod report;

pub use letters::OptionLetter;
pub use question::{
    AnswerKeyEntry, ContextSearchResult, KeyedAnswer, OptionMap, Question, ValidationResult,
};
pub use report::{DocumentReport, FlaggedQuestion, RejectReason, RejectedQuestion, ReportMetadata};
