//! Document processing context.
//!
//! Carries "which document am I working on" for log lines across stages.

use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// Position in the batch, 1-based. Log display only.
    pub doc_index: usize,
    /// File name of the source document.
    pub doc_name: String,
    /// Rasterized page count.
    pub page_count: u32,
}

impl DocumentCtx {
    pub fn new(doc_index: usize, doc_name: impl Into<String>, page_count: u32) -> Self {
        Self {
            doc_index,
            doc_name: doc_name.into(),
            page_count,
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[doc {} {}]", self.doc_index, self.doc_name)
    }
}
