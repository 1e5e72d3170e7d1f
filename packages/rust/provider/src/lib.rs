//! Model providers for campaignsmith.
//!
//! This crate provides:
//! - [`ModelInvoker`]: the "call the model, get text back" capability
//! - [`ProviderRegistry`]: dispatches each call to the provider named in its [`ModelTarget`](campaignsmith_shared::ModelTarget)
//! - [`OpenAiInvoker`] / [`AnthropicInvoker`]: HTTP backends
//! - [`fakes`]: an in-memory scripted invoker for tests

pub mod anthropic;
pub mod fakes;
mod http;
pub mod invoker;
pub mod openai;

use std::sync::Arc;

use campaignsmith_shared::{AppConfig, Result, resolve_api_key};
use tracing::info;

pub use anthropic::AnthropicInvoker;
pub use invoker::{InvokeRequest, ModelInvoker, ProviderRegistry, SamplingParams};
pub use openai::OpenAiInvoker;

/// Build a registry holding an HTTP invoker for every provider in `providers`.
///
/// `anthropic` speaks the messages API; every other name is treated as an
/// OpenAI-compatible chat completions endpoint. Keys come from each
/// provider's `api_key_env`.
pub fn registry_from_config<'a>(
    config: &AppConfig,
    providers: impl IntoIterator<Item = &'a str>,
) -> Result<ProviderRegistry> {
    let sampling = SamplingParams::from(&config.generation);
    let timeout = config.generation.request_timeout();
    let mut registry = ProviderRegistry::new();

    for name in providers {
        if registry.get(name).is_some() {
            continue;
        }
        let provider = config.providers.get(name).ok_or_else(|| {
            campaignsmith_shared::CampaignError::config(format!(
                "provider `{name}` is not configured under [providers]"
            ))
        })?;
        let api_key = resolve_api_key(config, name)?;

        let invoker: Arc<dyn ModelInvoker> = if name == "anthropic" {
            Arc::new(AnthropicInvoker::new(&provider.base_url, api_key, sampling, timeout)?)
        } else {
            Arc::new(OpenAiInvoker::new(&provider.base_url, api_key, sampling, timeout)?)
        };
        info!(provider = name, base_url = %provider.base_url, "registered provider");
        registry.register(name, invoker);
    }

    Ok(registry)
}
