//! External-service clients.

pub mod llm_client;
pub mod retry;

pub use llm_client::LlmClient;
pub use retry::RetryPolicy;
