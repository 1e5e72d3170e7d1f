//! Anthropic messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

use campaignsmith_shared::{ProviderError, Result};

use crate::http;
use crate::invoker::{InvokeRequest, ModelInvoker, SamplingParams};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `POST {base_url}/v1/messages` with `x-api-key` auth.
pub struct AnthropicInvoker {
    client: Client,
    endpoint: String,
    api_key: String,
    sampling: SamplingParams,
}

impl AnthropicInvoker {
    pub fn new(
        base_url: &url::Url,
        api_key: impl Into<String>,
        sampling: SamplingParams,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint: http::endpoint(base_url, "v1/messages"),
            api_key: api_key.into(),
            sampling,
        })
    }

    fn body(&self, request: &InvokeRequest<'_>) -> Value {
        json!({
            "model": request.target.model,
            "system": request.system_prompt,
            "messages": [{ "role": "user", "content": request.user_prompt }],
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "top_p": self.sampling.top_p,
        })
    }
}

#[async_trait]
impl ModelInvoker for AnthropicInvoker {
    #[instrument(skip_all, fields(model = %request.target.model, stage = %request.stage, attempt = request.attempt))]
    async fn invoke(&self, request: &InvokeRequest<'_>) -> std::result::Result<String, ProviderError> {
        let builder = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(request));

        let envelope = http::send_json("anthropic", builder).await?;
        message_text(&envelope)
    }
}

/// Concatenate every `text` block of the response content. A reply with no
/// text blocks yields an empty string for the contract to reject.
fn message_text(envelope: &Value) -> std::result::Result<String, ProviderError> {
    let blocks = envelope
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::malformed("anthropic response has no content array"))?;

    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaignsmith_shared::{ModelTarget, PipelineState, ProviderErrorKind};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(server: &MockServer) -> std::result::Result<String, ProviderError> {
        let base = url::Url::parse(&server.uri()).unwrap();
        let sampling = SamplingParams {
            temperature: 0.0,
            max_tokens: 1024,
            top_p: 1.0,
        };
        let invoker =
            AnthropicInvoker::new(&base, "ak-test", sampling, Duration::from_secs(5)).unwrap();
        let target = ModelTarget::new("anthropic", "claude-3-5-haiku-latest");
        invoker
            .invoke(&InvokeRequest {
                system_prompt: "You are a critic.",
                user_prompt: "Score this.",
                target: &target,
                stage: PipelineState::EvaluatingBlog,
                attempt: 2,
            })
            .await
    }

    #[tokio::test]
    async fn joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "system": "You are a critic.",
                "max_tokens": 1024,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    { "type": "text", "text": "{\"a\": " },
                    { "type": "tool_use", "id": "x" },
                    { "type": "text", "text": "1}" },
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(call(&server).await.unwrap(), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn overloaded_is_retryable_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Server);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn bad_request_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("max_tokens too large"))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
        assert!(err.message.contains("max_tokens"));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn no_text_blocks_yield_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "type": "tool_use", "id": "x" }]
            })))
            .mount(&server)
            .await;

        assert_eq!(call(&server).await.unwrap(), "");
    }
}
