//! Orchestration layer.
//!
//! ## Responsibilities
//!
//! Batch processing and scheduling. Nothing in here makes a business
//! decision about a question; the layers below do that.
//!
//! ### `batch_processor`
//! - application lifecycle (initialize, run)
//! - input-folder scanning
//! - document concurrency (Semaphore)
//! - run-level statistics
//!
//! ### `document_processor`
//! - rasterizes one PDF (spawn_blocking, pdfium is synchronous)
//! - runs the document flow
//! - persists the JSON report and appends review entries
//!
//! ## Layering
//!
//! ```text
//! batch_processor (Vec<PathBuf>)
//!     ↓
//! document_processor (one PDF)
//!     ↓
//! workflow::DocumentFlow (one document's pages)
//!     ↓
//! services (transcribe / extract / resolve / match / validate / repair)
//!     ↓
//! clients + pdf (LlmClient, rasterizer)
//! ```

pub mod batch_processor;
pub mod document_processor;

pub use batch_processor::App;
pub use document_processor::{process_document, DocumentStats};
