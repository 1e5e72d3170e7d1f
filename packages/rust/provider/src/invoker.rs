//! The model-call capability and per-call provider dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use campaignsmith_shared::{
    GenerationConfig, ModelTarget, PipelineState, ProviderError, ProviderErrorKind,
};

/// Everything one model call needs. Provider and model travel with the call.
#[derive(Debug, Clone, Copy)]
pub struct InvokeRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub target: &'a ModelTarget,
    /// The pipeline state issuing the call.
    pub stage: PipelineState,
    /// 1-based attempt number within the stage.
    pub attempt: u32,
}

/// Execute one model call and return the raw generated text.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest<'_>) -> Result<String, ProviderError>;
}

#[async_trait]
impl<T: ModelInvoker + ?Sized> ModelInvoker for Arc<T> {
    async fn invoke(&self, request: &InvokeRequest<'_>) -> Result<String, ProviderError> {
        (**self).invoke(request).await
    }
}

/// Sampling parameters sent with every HTTP request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl From<&GenerationConfig> for SamplingParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Named invokers, dispatched per call by `target.provider`.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    invokers: BTreeMap<String, Arc<dyn ModelInvoker>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the invoker serving `name`.
    pub fn register(&mut self, name: impl Into<String>, invoker: Arc<dyn ModelInvoker>) {
        self.invokers.insert(name.into(), invoker);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.register(name, invoker);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ModelInvoker>> {
        self.invokers.get(name)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.invokers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.invokers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ModelInvoker for ProviderRegistry {
    async fn invoke(&self, request: &InvokeRequest<'_>) -> Result<String, ProviderError> {
        let provider = request.target.provider.as_str();
        let invoker = self.invokers.get(provider).ok_or_else(|| {
            ProviderError::new(
                ProviderErrorKind::UnknownProvider,
                format!("no provider registered as `{provider}`"),
            )
        })?;

        debug!(
            provider,
            model = %request.target.model,
            stage = %request.stage,
            attempt = request.attempt,
            "dispatching model call"
        );
        invoker.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedInvoker;

    fn request<'a>(target: &'a ModelTarget) -> InvokeRequest<'a> {
        InvokeRequest {
            system_prompt: "sys",
            user_prompt: "user",
            target,
            stage: PipelineState::DraftingBlog,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn dispatches_by_provider_name() {
        let openai = Arc::new(ScriptedInvoker::new().reply(PipelineState::DraftingBlog, "from openai"));
        let anthropic =
            Arc::new(ScriptedInvoker::new().reply(PipelineState::DraftingBlog, "from anthropic"));
        let registry = ProviderRegistry::new()
            .with("openai", openai.clone())
            .with("anthropic", anthropic.clone());

        let target = ModelTarget::new("anthropic", "claude-3-5-haiku-latest");
        let text = registry.invoke(&request(&target)).await.unwrap();
        assert_eq!(text, "from anthropic");
        assert_eq!(openai.total_calls(), 0);
        assert_eq!(anthropic.total_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_provider_is_fatal() {
        let registry = ProviderRegistry::new();
        let target = ModelTarget::new("mistral", "large");
        let err = registry.invoke(&request(&target)).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::UnknownProvider);
        assert!(!err.is_retryable());
        assert!(err.message.contains("mistral"));
    }

    #[test]
    fn names_are_sorted() {
        let fake: Arc<dyn ModelInvoker> = Arc::new(ScriptedInvoker::new());
        let registry = ProviderRegistry::new()
            .with("openai", fake.clone())
            .with("anthropic", fake);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["anthropic", "openai"]);
        assert!(registry.get("openai").is_some());
    }
}
