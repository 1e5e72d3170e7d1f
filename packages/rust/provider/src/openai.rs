//! OpenAI-compatible chat completions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

use campaignsmith_shared::{ProviderError, Result};

use crate::http;
use crate::invoker::{InvokeRequest, ModelInvoker, SamplingParams};

/// `POST {base_url}/chat/completions` with bearer auth.
pub struct OpenAiInvoker {
    client: Client,
    endpoint: String,
    api_key: String,
    sampling: SamplingParams,
}

impl OpenAiInvoker {
    pub fn new(
        base_url: &url::Url,
        api_key: impl Into<String>,
        sampling: SamplingParams,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint: http::endpoint(base_url, "chat/completions"),
            api_key: api_key.into(),
            sampling,
        })
    }

    fn body(&self, request: &InvokeRequest<'_>) -> Value {
        json!({
            "model": request.target.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
            "top_p": self.sampling.top_p,
        })
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    #[instrument(skip_all, fields(model = %request.target.model, stage = %request.stage, attempt = request.attempt))]
    async fn invoke(&self, request: &InvokeRequest<'_>) -> std::result::Result<String, ProviderError> {
        let builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request));

        let envelope = http::send_json("openai", builder).await?;
        completion_text(&envelope)
    }
}

fn completion_text(envelope: &Value) -> std::result::Result<String, ProviderError> {
    let content = envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::malformed("openai response has no choices[0].message.content"))?;
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaignsmith_shared::{ModelTarget, PipelineState, ProviderErrorKind};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sampling() -> SamplingParams {
        SamplingParams {
            temperature: 0.0,
            max_tokens: 4096,
            top_p: 1.0,
        }
    }

    async fn invoker_for(server: &MockServer) -> OpenAiInvoker {
        let base = url::Url::parse(&format!("{}/v1", server.uri())).unwrap();
        OpenAiInvoker::new(&base, "sk-test", sampling(), Duration::from_secs(5)).unwrap()
    }

    async fn call(invoker: &OpenAiInvoker) -> std::result::Result<String, ProviderError> {
        let target = ModelTarget::new("openai", "gpt-4o-mini");
        invoker
            .invoke(&InvokeRequest {
                system_prompt: "You are a marketer.",
                user_prompt: "Write a tagline.",
                target: &target,
                stage: PipelineState::GeneratingIdeas,
                attempt: 1,
            })
            .await
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 4096,
                "messages": [{ "role": "system", "content": "You are a marketer." }, { "role": "user", "content": "Write a tagline." }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Brunch, but better." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = invoker_for(&server).await;
        assert_eq!(call(&invoker).await.unwrap(), "Brunch, but better.");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let err = call(&invoker_for(&server).await).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = call(&invoker_for(&server).await).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn blank_completion_is_returned_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  \n" } }]
            })))
            .mount(&server)
            .await;

        assert_eq!(call(&invoker_for(&server).await).await.unwrap(), "  \n");
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = call(&invoker_for(&server).await).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let base = url::Url::parse(&server.uri()).unwrap();
        let invoker =
            OpenAiInvoker::new(&base, "sk-test", sampling(), Duration::from_millis(50)).unwrap();
        let err = call(&invoker).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
    }
}
