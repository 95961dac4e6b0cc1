pub mod answer_key;
pub mod context_search;
pub mod contract;
pub mod extractor;
pub mod llm_extraction;
pub mod matcher;
pub mod review_writer;
pub mod transcriber;
pub mod validator;

pub use answer_key::{AnswerKeyResolver, ResolvedKey};
pub use context_search::ContextSearchRepair;
pub use contract::{ExtractionService, TranscriptionService};
pub use extractor::{ExtractionOutcome, QuestionExtractor};
pub use llm_extraction::LlmExtractionService;
pub use matcher::{match_questions, MatchOutcome};
pub use review_writer::ReviewWriter;
pub use transcriber::{PageTranscriber, TRANSCRIPTION_ERROR_MARKER};
pub use validator::SemanticValidator;
