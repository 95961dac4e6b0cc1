/// Pipeline configuration.
///
/// Every tunable mentioned in the design as "a configuration surface, not a
/// hidden constant" lives here: the confidence gate, the answer-key window,
/// the context-search radius, call pacing and the retry policy.
#[derive(Clone, Debug)]
pub struct Config {
    /// Folder scanned for input PDF documents.
    pub pdf_folder: String,
    /// Folder the per-document JSON reports are written to.
    pub report_folder: String,
    /// File flagged / rejected questions are appended to for manual review.
    pub review_file: String,
    /// Run-header log file.
    pub output_log_file: String,
    /// Documents processed concurrently.
    pub max_concurrent_documents: usize,
    /// Page-level transcription / extraction calls in flight per document.
    pub max_concurrent_pages: usize,
    /// Optional cap on pages rasterized per document (0 = no cap).
    pub page_cap: u32,
    /// Rendered page width in pixels.
    pub render_width: u32,
    /// Trailing pages scanned for the answer key.
    pub answer_key_window: usize,
    /// Pages consulted around the original page during context-search repair.
    pub context_window_radius: u32,
    /// Minimum confidence for accepting a semantically validated answer.
    pub min_confidence: f64,
    // --- LLM configuration ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// Model used for extraction / validation calls.
    pub llm_model_name: String,
    /// Vision-capable model used for page transcription.
    pub transcription_model_name: String,
    /// Minimum delay between consecutive calls to the service, in ms.
    pub call_pacing_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Total attempts per call (1 = no retry).
    pub max_attempts: u32,
    /// Fixed backoff between attempts, in ms.
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pdf_folder: "input_pdfs".to_string(),
            report_folder: "reports".to_string(),
            review_file: "review.txt".to_string(),
            output_log_file: "output.txt".to_string(),
            max_concurrent_documents: 4,
            max_concurrent_pages: 4,
            page_cap: 0,
            render_width: 1536,
            answer_key_window: 3,
            context_window_radius: 1,
            min_confidence: 0.7,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            transcription_model_name: "gpt-4o".to_string(),
            call_pacing_ms: 250,
            request_timeout_secs: 120,
            max_attempts: 2,
            retry_backoff_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            pdf_folder: std::env::var("PDF_FOLDER").unwrap_or(default.pdf_folder),
            report_folder: std::env::var("REPORT_FOLDER").unwrap_or(default.report_folder),
            review_file: std::env::var("REVIEW_FILE").unwrap_or(default.review_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_documents),
            max_concurrent_pages: std::env::var("MAX_CONCURRENT_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_pages),
            page_cap: std::env::var("PAGE_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(default.page_cap),
            render_width: std::env::var("RENDER_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.render_width),
            answer_key_window: std::env::var("ANSWER_KEY_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(default.answer_key_window),
            context_window_radius: std::env::var("CONTEXT_WINDOW_RADIUS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.context_window_radius),
            min_confidence: std::env::var("MIN_CONFIDENCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_confidence),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            transcription_model_name: std::env::var("TRANSCRIPTION_MODEL_NAME").unwrap_or(default.transcription_model_name),
            call_pacing_ms: std::env::var("CALL_PACING_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.call_pacing_ms),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_attempts: std::env::var("MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_attempts),
            retry_backoff_ms: std::env::var("RETRY_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_backoff_ms),
        }
    }

    /// Page cap as an Option (0 means unlimited).
    pub fn page_cap_opt(&self) -> Option<u32> {
        if self.page_cap == 0 {
            None
        } else {
            Some(self.page_cap)
        }
    }
}
