//! Configuration types for study-material generation.
//!
//! Three structs, one per collaborator:
//!
//! * [`PipelineConfig`]: batching, concurrency, retries, cancellation and
//!   derived-artifact knobs used by the orchestrator.
//! * [`GeneratorConfig`]: which LLM to call and how, used by
//!   [`crate::generate::llm::LlmGenerator`].
//! * [`ExtractConfig`]: input resolution and text extraction.
//!
//! Each is built through a consuming builder whose setters clamp to sane
//! ranges and whose `build()` validates what clamping cannot.

use crate::error::PipelineError;
use crate::pipeline::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the generation pipeline.
///
/// # Example
/// ```rust
/// use edgequake_study::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .concurrency(2)
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 2);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum simultaneously in-flight generator calls. Default: 4.
    ///
    /// This is the only concurrency in the pipeline. Lower it when the
    /// provider returns 429s; every other stage is a synchronous transform.
    pub concurrency: usize,

    /// Retries per batch on `Transient` / `RateLimited` failures. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound for any single backoff, including server hints. Default: 8000.
    pub max_backoff_ms: u64,

    /// Per-generator-call timeout in seconds. A timeout counts as `Transient`. Default: 90.
    pub api_timeout_secs: u64,

    /// Documents with at most this many pages go out as a single batch. Default: 5.
    pub small_document_pages: usize,

    /// Largest batch for longer documents. Default: 3.
    pub max_pages_per_batch: usize,

    /// Characters of document text fed to the classifier. Default: 12 000.
    pub classifier_sample_chars: usize,

    /// Upper bound on questions flagged important in the notes. Default: 10.
    pub important_question_cap: usize,

    /// How long in-flight batches may keep running after cancellation. Default: 2000.
    pub cancel_grace_ms: u64,

    /// Overall session deadline in seconds. `None` = no deadline. Default: None.
    pub session_timeout_secs: Option<u64>,

    /// Progress events receiver. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            api_timeout_secs: 90,
            small_document_pages: 5,
            max_pages_per_batch: 3,
            classifier_sample_chars: 12_000,
            important_question_cap: 10,
            cancel_grace_ms: 2_000,
            session_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("small_document_pages", &self.small_document_pages)
            .field("max_pages_per_batch", &self.max_pages_per_batch)
            .field("classifier_sample_chars", &self.classifier_sample_chars)
            .field("important_question_cap", &self.important_question_cap)
            .field("cancel_grace_ms", &self.cancel_grace_ms)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry policy the orchestrator wraps around every generator call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// Check the constraints the builder enforces. Fields are public, so a
    /// hand-built config goes through here too before a pipeline accepts it.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if self.max_pages_per_batch < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_pages_per_batch must be ≥ 2, got {}",
                self.max_pages_per_batch
            )));
        }
        if self.small_document_pages < 1 {
            return Err(PipelineError::InvalidConfig(
                "small_document_pages must be ≥ 1".into(),
            ));
        }
        if self.max_backoff_ms < self.retry_backoff_ms {
            return Err(PipelineError::InvalidConfig(format!(
                "max_backoff_ms ({}) is smaller than retry_backoff_ms ({})",
                self.max_backoff_ms, self.retry_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Clamped to 0–5; more retries only delay the inevitable.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(5);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn small_document_pages(mut self, n: usize) -> Self {
        self.config.small_document_pages = n;
        self
    }

    pub fn max_pages_per_batch(mut self, n: usize) -> Self {
        self.config.max_pages_per_batch = n;
        self
    }

    pub fn classifier_sample_chars(mut self, n: usize) -> Self {
        self.config.classifier_sample_chars = n.max(256);
        self
    }

    pub fn important_question_cap(mut self, n: usize) -> Self {
        self.config.important_question_cap = n;
        self
    }

    pub fn cancel_grace_ms(mut self, ms: u64) -> Self {
        self.config.cancel_grace_ms = ms;
        self
    }

    pub fn session_timeout_secs(mut self, secs: u64) -> Self {
        self.config.session_timeout_secs = Some(secs.max(1));
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the LLM-backed generator.
#[derive(Clone)]
pub struct GeneratorConfig {
    /// LLM model identifier. If None, `gpt-4.1-mini`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Extraction wants fidelity, synthesis wants some variety; 0.3 serves
    /// both without inventing options that contradict the source.
    pub temperature: f32,

    /// Maximum tokens per reply. Default: 4096.
    ///
    /// A three-page batch typically yields 8–15 questions with explanations,
    /// which lands around 2 500 output tokens.
    pub max_tokens: usize,

    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 4096,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl GeneratorConfig {
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<GeneratorConfig, PipelineError> {
        if self.config.max_tokens < 256 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_tokens must be ≥ 256, got {}",
                self.config.max_tokens
            )));
        }
        Ok(self.config)
    }
}

/// Configuration for input resolution and text extraction.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 120,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.small_document_pages, 5);
        assert_eq!(c.max_pages_per_batch, 3);
        assert!(c.session_timeout_secs.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = PipelineConfig::builder()
            .concurrency(0)
            .max_retries(50)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_retries, 5);
    }

    #[test]
    fn builder_rejects_single_page_batches() {
        let err = PipelineConfig::builder()
            .max_pages_per_batch(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn validate_catches_hand_built_configs() {
        let zero_batch = PipelineConfig {
            max_pages_per_batch: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_batch.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let zero_workers = PipelineConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(zero_workers.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_rejects_inverted_backoff() {
        let err = PipelineConfig::builder()
            .retry_backoff_ms(5_000)
            .max_backoff_ms(100)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn retry_policy_reflects_config() {
        let c = PipelineConfig::builder()
            .max_retries(3)
            .retry_backoff_ms(100)
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_backoff, Duration::from_millis(100));
    }

    #[test]
    fn generator_config_debug_hides_prompt() {
        let c = GeneratorConfig::builder()
            .system_prompt("secret prompt")
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret prompt"));
    }
}
