//! LLM API client
//!
//! The only module that talks to the network. Wraps `async-openai` chat
//! completions (OpenAI-compatible endpoints) and carries the three call
//! disciplines every external call needs:
//!
//! - a per-request timeout,
//! - a bounded retry with fixed backoff ([`RetryPolicy`]),
//! - cooperative pacing: a minimum delay between consecutive calls to the
//!   same endpoint, to avoid throttling.

use std::time::Duration;

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clients::retry::RetryPolicy;
use crate::config::Config;

pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    retry: RetryPolicy,
    request_timeout: Duration,
    pacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self::with_model(config, config.llm_model_name.clone())
    }

    /// Client bound to a specific model (transcription uses a vision model,
    /// extraction may use a cheaper text model).
    pub fn with_model(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
            retry: RetryPolicy::from_config(config),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            pacing: Duration::from_millis(config.call_pacing_ms),
            last_call: Mutex::new(None),
        }
    }

    /// Send one chat request, with optional system message and image
    /// attachments (base64 `data:` URLs).
    ///
    /// Returns the trimmed response content. Retries transient failures per
    /// the configured policy before giving up.
    pub async fn chat(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        image_urls: Option<&[String]>,
    ) -> Result<String> {
        let mut last_err = anyhow::anyhow!("no attempt made");

        for attempt in 1..=self.retry.attempts() {
            self.pace().await;

            match tokio::time::timeout(
                self.request_timeout,
                self.send(user_message, system_message, image_urls),
            )
            .await
            {
                Ok(Ok(content)) => return Ok(content),
                Ok(Err(e)) => {
                    warn!(
                        "LLM call failed (attempt {}/{}): {}",
                        attempt,
                        self.retry.attempts(),
                        e
                    );
                    last_err = e;
                }
                Err(_) => {
                    warn!(
                        "LLM call timed out after {}s (attempt {}/{})",
                        self.request_timeout.as_secs(),
                        attempt,
                        self.retry.attempts()
                    );
                    last_err = anyhow::anyhow!(
                        "LLM call timed out after {}s",
                        self.request_timeout.as_secs()
                    );
                }
            }

            if attempt < self.retry.attempts() {
                tokio::time::sleep(self.retry.backoff()).await;
            }
        }

        Err(last_err)
    }

    async fn send(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        image_urls: Option<&[String]>,
    ) -> Result<String> {
        debug!("calling LLM API, model: {}", self.model_name);
        debug!("user message length: {} chars", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match image_urls {
            Some(urls) if !urls.is_empty() => {
                debug!("attaching {} image(s)", urls.len());
                let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                    Vec::new();

                content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                ));

                for url in urls.iter() {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ));
                }

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(4096u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API call failed: {}", e);
            anyhow::anyhow!("LLM API call failed: {}", e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM returned empty content"))?;

        Ok(content.trim().to_string())
    }

    /// Hold off until the pacing delay since the previous call has elapsed.
    /// The lock is held across the sleep so concurrent callers queue up.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.pacing {
                tokio::time::sleep(self.pacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(pacing_ms: u64) -> LlmClient {
        let config = Config {
            call_pacing_ms: pacing_ms,
            ..Config::default()
        };
        LlmClient::new(&config)
    }

    #[test]
    fn pacing_enforces_minimum_gap() {
        tokio_test::block_on(async {
            tokio::time::pause();
            let client = test_client(200);

            client.pace().await;
            let before = Instant::now();
            client.pace().await;
            assert!(before.elapsed() >= Duration::from_millis(200));
        });
    }

    #[test]
    fn pacing_is_free_after_long_idle() {
        tokio_test::block_on(async {
            tokio::time::pause();
            let client = test_client(100);

            client.pace().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let before = Instant::now();
            client.pace().await;
            assert!(before.elapsed() < Duration::from_millis(100));
        });
    }
}
