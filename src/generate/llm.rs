//! [`ContentGenerator`] backed by an `edgequake-llm` chat provider.
//!
//! One batch is one chat call: a system message carrying the rules, reply
//! schema and mode (extract / synthesize / mixed / topic) and a user message
//! carrying the batch text. The reply is handed to [`super::parse`].
//!
//! Retrying is not done here. The orchestrator wraps every call in
//! [`crate::pipeline::retry::generate_with_retry`], so this adapter makes
//! exactly one provider call per `generate` and only has to say what kind of
//! failure it saw.

use super::parse::parse_reply;
use super::{ContentGenerator, GenerationRequest};
use crate::config::GeneratorConfig;
use crate::error::{GenerationError, PipelineError};
use crate::model::BatchResult;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

static RE_RETRY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry[- ]after[^0-9]{0,12}(\d{1,5})").unwrap());

/// LLM-backed generator.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    config: GeneratorConfig,
}

impl fmt::Debug for LlmGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmGenerator")
            .field("provider", &self.label)
            .field("config", &self.config)
            .finish()
    }
}

impl LlmGenerator {
    /// Resolve the provider described by `config` and build the generator.
    ///
    /// # Errors
    /// [`PipelineError::ProviderNotConfigured`] when no provider can be
    /// constructed (unknown name, missing API key, nothing in the environment).
    pub fn new(config: GeneratorConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(&config)?;
        let label = provider_label(&config);
        debug!("Using LLM provider '{}'", label);
        Ok(Self {
            provider,
            label,
            config,
        })
    }

    /// Wrap an already constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: GeneratorConfig) -> Self {
        Self {
            provider,
            label: "custom".to_string(),
            config,
        }
    }

    fn messages(&self, request: &GenerationRequest) -> Vec<ChatMessage> {
        let is_topic = request.is_topic();
        vec![
            ChatMessage::system(prompts::system_prompt(
                self.config.system_prompt.as_deref(),
                request.document_type,
                is_topic,
            )),
            ChatMessage::user(prompts::user_message(
                &request.scope.to_string(),
                &request.text,
                is_topic,
            )),
        ]
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<BatchResult, GenerationError> {
        let start = Instant::now();
        let messages = self.messages(request);
        let options = self.options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;

        debug!(
            "Batch {}: {} input tokens, {} output tokens, {:?}",
            request.ordinal,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_reply(&response.content, request)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Map a provider error message onto the generation error vocabulary.
///
/// `edgequake-llm` reports failures as display strings carrying the HTTP
/// status or the provider's own wording, so classification is textual.
/// Anything unrecognised is `Transient`.
pub fn classify_provider_error(message: &str) -> GenerationError {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["429", "rate limit", "rate-limit", "ratelimit", "too many requests", "quota"]) {
        let retry_after_secs = RE_RETRY_AFTER
            .captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        GenerationError::RateLimited { retry_after_secs }
    } else if has(&[
        "401",
        "403",
        "unauthorized",
        "unauthorised",
        "forbidden",
        "api key",
        "api_key",
        "authentication",
    ]) {
        GenerationError::Unauthenticated(message.to_string())
    } else if has(&["content filter", "content_filter", "content policy", "safety", "blocked"]) {
        GenerationError::ContentRejected(message.to_string())
    } else {
        GenerationError::Transient(message.to_string())
    }
}

fn provider_label(config: &GeneratorConfig) -> String {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    match (&config.provider, &config.provider_name) {
        (Some(_), _) => "custom".to_string(),
        (None, Some(name)) => format!("{name}/{model}"),
        (None, None) => "auto".to_string(),
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. whatever [`ProviderFactory::from_env`] detects.
fn resolve_provider(config: &GeneratorConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
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

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}
