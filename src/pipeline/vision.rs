//! Vision-model recogniser: transcribe a page image with a multimodal LLM.
//!
//! An alternative to tesseract for degraded scans and handwriting. The page
//! PNG is sent as a base64 attachment after the transcription prompt in
//! [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient under concurrent load.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids a thundering
//! herd: with 500 ms base and 2 retries the waits are 500 ms → 1 s.

use crate::config::ConversionConfig;
use crate::pipeline::encode;
use crate::pipeline::recognize::Recognizer;
use crate::prompts::TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Recogniser that asks a vision LLM to transcribe each page.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, max_retries: u32, retry_backoff_ms: u64) -> Self {
        Self {
            provider,
            max_retries,
            retry_backoff_ms,
        }
    }

    /// Build from config, resolving the provider the same way the CLI does.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, String> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(
            provider,
            config.max_retries,
            config.retry_backoff_ms,
        ))
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, String> {
        let image_data = encode::encode_page_file(image)
            .await
            .map_err(|e| format!("reading {}: {}", image.display(), e))?;

        // The empty user text is intentional: the image carries the content.
        let messages = vec![
            ChatMessage::system(TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(4096),
            ..Default::default()
        };

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    image.display(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens",
                        image.display(),
                        response.prompt_tokens,
                        response.completion_tokens
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!(
                        "{}: attempt {} failed: {}",
                        image.display(),
                        attempt + 1,
                        err_msg
                    );
                    last_err = Some(err_msg);
                }
            }
        }

        Err(format!(
            "vision model failed after {} retries: {}",
            self.max_retries,
            last_err.unwrap_or_else(|| "Unknown error".to_string())
        ))
    }
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. **Named provider + model** (`config.provider_name`): reads the
///    matching API key from the environment.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 3. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, String> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return ProviderFactory::create_llm_provider(name, model)
            .map_err(|e| format!("vision provider '{name}' is not configured: {e}"));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return ProviderFactory::create_llm_provider(&prov, &model)
                .map_err(|e| format!("vision provider '{prov}' is not configured: {e}"));
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        format!(
            "No vision provider could be auto-detected from environment. \
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider. Error: {e}"
        )
    })?;
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{LLMResponse, LlmError, MockProvider};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider that fails every call and counts attempts.
    #[derive(Default)]
    struct Unavailable {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMProvider for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        fn model(&self) -> &str {
            "none"
        }

        fn max_context_length(&self) -> usize {
            4096
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::ApiError("503 Service Unavailable".into()))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete("").await
        }
    }

    fn page(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("page-0001.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();
        path
    }

    #[tokio::test]
    async fn returns_model_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockProvider::new();
        mock.add_response("Dear Sir,\nthank you").await;
        let recognizer = VisionRecognizer::new(Arc::new(mock), 2, 0);

        let text = recognizer.recognize(&page(&dir)).await.unwrap();
        assert_eq!(text, "Dear Sir,\nthank you");
    }

    #[tokio::test]
    async fn gives_up_after_all_retries() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(Unavailable::default());
        let recognizer = VisionRecognizer::new(provider.clone(), 2, 0);

        let err = recognizer.recognize(&page(&dir)).await.unwrap_err();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(err.contains("after 2 retries"), "got {err}");
        assert!(err.contains("503"), "got {err}");
    }

    #[tokio::test]
    async fn unreadable_page_fails_without_calling_the_model() {
        let provider = Arc::new(Unavailable::default());
        let recognizer = VisionRecognizer::new(provider.clone(), 2, 0);

        let err = recognizer
            .recognize(Path::new("/no/such/page.png"))
            .await
            .unwrap_err();
        assert!(err.starts_with("reading "), "got {err}");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn named_provider_is_resolved() {
        let config = ConversionConfig::builder()
            .provider_name("mock")
            .build()
            .unwrap();
        assert!(VisionRecognizer::from_config(&config).is_ok());
    }

    #[test]
    fn unknown_provider_is_reported_by_name() {
        let config = ConversionConfig::builder()
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        let err = VisionRecognizer::from_config(&config).err().unwrap();
        assert!(err.contains("'no-such-provider'"), "got {err}");
    }
}
