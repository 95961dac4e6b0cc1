//! # exam_extract
//!
//! Extraction of structured multiple-choice question records from scanned
//! exam PDFs (Hebrew or English).
//!
//! ## Architecture
//!
//! The system is layered; each layer depends only on the ones below it.
//!
//! ### ① Infrastructure (clients, pdf)
//! - `clients::LlmClient` - the one network edge: retry, timeout, pacing
//! - `pdf::rasterizer` - pdfium binding, PDF pages to PNG images
//!
//! ### ② Services
//! - `services::contract` - the two capability traits the pipeline consumes
//! - `services::LlmExtractionService` - LLM-backed implementation, the parse edge
//! - `services::PageTranscriber` / `QuestionExtractor` / `AnswerKeyResolver` -
//!   per-stage wrappers, degradation recorded instead of propagated
//! - `services::matcher` / `SemanticValidator` / `ContextSearchRepair` -
//!   matching, validation and repair
//! - `services::ReviewWriter` - appends review-queue entries
//!
//! ### ③ Workflow
//! - `workflow::DocumentCtx` - "which document am I on" for log lines
//! - `workflow::DocumentFlow` - the six-stage order for one document,
//!   infallible by construction
//!
//! ### ④ Orchestration
//! - `orchestrator::App` - folder scan, concurrency, run statistics
//! - `orchestrator::process_document` - one PDF from path to report file

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pdf;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use error::ServiceError;
pub use models::{DocumentReport, Question};
pub use orchestrator::{process_document, App};
pub use workflow::{DocumentCtx, DocumentFlow};
