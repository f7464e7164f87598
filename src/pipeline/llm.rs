//! Shared LLM access: lazy provider resolution plus retrying chat calls.
//!
//! Three collaborators talk to an LLM: the zero-shot visual classifier, the
//! notes synthesizer and the flashcard generator. They share one
//! [`LlmClient`], which resolves the provider on first use and then hands
//! the same `Arc<dyn LLMProvider>` to every caller.
//!
//! ## Single-flight initialisation
//!
//! Provider construction reads environment variables and may build HTTP
//! clients. It happens inside [`tokio::sync::OnceCell::get_or_try_init`], so
//! when the selector fans out four classifications at once exactly one of
//! them performs the initialisation and the others await its result. A
//! failed initialisation leaves the cell empty and the next call retries.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient under concurrent load. Each call is
//! retried with exponential backoff (`retry_backoff_ms * 2^attempt`): with
//! the defaults the waits are 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Provider selection inputs, copied out of [`PipelineConfig`].
#[derive(Clone)]
struct ProviderSpec {
    provider: Option<Arc<dyn LLMProvider>>,
    provider_name: Option<String>,
    model: Option<String>,
}

/// A lazily-resolved LLM provider with retry and timeout policy attached.
pub struct LlmClient {
    spec: ProviderSpec,
    cell: OnceCell<Arc<dyn LLMProvider>>,
    max_retries: u32,
    retry_backoff_ms: u64,
    call_timeout: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider_name", &self.spec.provider_name)
            .field("model", &self.spec.model)
            .field("initialised", &self.cell.initialized())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl LlmClient {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            spec: ProviderSpec {
                provider: config.provider.clone(),
                provider_name: config.provider_name.clone(),
                model: config.model.clone(),
            },
            cell: OnceCell::new(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            call_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// The shared provider, constructing it on first use.
    pub async fn provider(&self) -> Result<Arc<dyn LLMProvider>, Video2DeckError> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                let started = Instant::now();
                let provider = resolve_provider(&self.spec)?;
                info!(
                    "LLM provider ready: {} / {} ({:?})",
                    self.spec.provider_name.as_deref().unwrap_or("auto"),
                    self.spec.model.as_deref().unwrap_or(DEFAULT_MODEL),
                    started.elapsed()
                );
                Ok::<_, Video2DeckError>(provider)
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    /// Send `messages` and return the response text, retrying transient failures.
    ///
    /// `stage` names the caller in logs and in the final error.
    pub async fn chat(
        &self,
        stage: &'static str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, Video2DeckError> {
        let provider = self.provider().await?;
        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    stage, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.call_timeout, provider.chat(messages, Some(options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        stage,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", stage, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("timed out after {:?}", self.call_timeout);
                    warn!("{}: attempt {} {}", stage, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(Video2DeckError::collaborator(
            stage,
            last_err.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

/// Build `CompletionOptions` for a call.
pub fn completion_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Video2DeckError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Video2DeckError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific:
///
/// 1. a pre-built provider on the config;
/// 2. `provider_name` + `model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` from the environment;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. [`ProviderFactory::from_env`] auto-detection.
fn resolve_provider(spec: &ProviderSpec) -> Result<Arc<dyn LLMProvider>, Video2DeckError> {
    if let Some(ref provider) = spec.provider {
        return Ok(Arc::clone(provider));
    }

    let model = spec.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = spec.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Video2DeckError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
