//! In-memory invoker for tests.
//!
//! [`ScriptedInvoker`] answers each call from a per-stage script: queued
//! replies are consumed first, then the stage's responder (if any) answers
//! every remaining call. Calls are counted per stage.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use campaignsmith_shared::{PipelineState, ProviderError};

use crate::invoker::{InvokeRequest, ModelInvoker};

/// What a scripted call answers with.
pub type Reply = Result<String, ProviderError>;
type Responder = Arc<dyn Fn(&InvokeRequest<'_>) -> Reply + Send + Sync>;

#[derive(Default)]
struct Script {
    queued: VecDeque<Reply>,
    responder: Option<Responder>,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub stage: PipelineState,
    pub attempt: u32,
    pub provider: String,
    pub model: String,
    pub user_prompt: String,
}

#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<PipelineState, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `stage`.
    pub fn reply(self, stage: PipelineState, text: impl Into<String>) -> Self {
        self.push(stage, Ok(text.into()));
        self
    }

    /// Queue a failed call for `stage`.
    pub fn fail(self, stage: PipelineState, err: ProviderError) -> Self {
        self.push(stage, Err(err));
        self
    }

    /// Answer every unqueued call for `stage` with `f`.
    pub fn respond_with<F>(self, stage: PipelineState, f: F) -> Self
    where
        F: Fn(&InvokeRequest<'_>) -> Reply + Send + Sync + 'static,
    {
        self.script(stage, |s| s.responder = Some(Arc::new(f)));
        self
    }

    /// Answer every unqueued call for `stage` with the same text.
    pub fn always(self, stage: PipelineState, text: impl Into<String>) -> Self {
        let text = text.into();
        self.respond_with(stage, move |_| Ok(text.clone()))
    }

    /// Number of calls issued for `stage`.
    pub fn calls(&self, stage: PipelineState) -> usize {
        self.recorded().iter().filter(|c| c.stage == stage).count()
    }

    pub fn total_calls(&self) -> usize {
        self.recorded().len()
    }

    /// Every call so far, in arrival order.
    pub fn recorded(&self) -> Vec<RecordedCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, stage: PipelineState, reply: Reply) {
        self.script(stage, |s| s.queued.push_back(reply));
    }

    fn script(&self, stage: PipelineState, f: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|p| p.into_inner());
        f(scripts.entry(stage).or_default());
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &InvokeRequest<'_>) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RecordedCall {
                stage: request.stage,
                attempt: request.attempt,
                provider: request.target.provider.clone(),
                model: request.target.model.clone(),
                user_prompt: request.user_prompt.to_string(),
            });

        let responder = {
            let mut scripts = self.scripts.lock().unwrap_or_else(|p| p.into_inner());
            let script = scripts.entry(request.stage).or_default();
            if let Some(reply) = script.queued.pop_front() {
                return reply;
            }
            script.responder.clone()
        };

        match responder {
            Some(f) => f(request),
            None => Err(ProviderError::invalid_request(format!(
                "no scripted reply for {}",
                request.stage
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaignsmith_shared::ModelTarget;

    async fn call(fake: &ScriptedInvoker, stage: PipelineState) -> Reply {
        let target = ModelTarget::new("fake", "scripted");
        fake.invoke(&InvokeRequest {
            system_prompt: "",
            user_prompt: "hello",
            target: &target,
            stage,
            attempt: 1,
        })
        .await
    }

    #[tokio::test]
    async fn queue_then_responder() {
        let stage = PipelineState::DraftingEmail;
        let fake = ScriptedInvoker::new()
            .reply(stage, "first")
            .fail(stage, ProviderError::server("boom"))
            .always(stage, "later");

        assert_eq!(call(&fake, stage).await.unwrap(), "first");
        assert!(call(&fake, stage).await.is_err());
        assert_eq!(call(&fake, stage).await.unwrap(), "later");
        assert_eq!(call(&fake, stage).await.unwrap(), "later");
        assert_eq!(fake.calls(stage), 4);
        assert_eq!(fake.calls(PipelineState::DraftingBlog), 0);
    }

    #[tokio::test]
    async fn unscripted_stage_fails_fatally() {
        let fake = ScriptedInvoker::new();
        let err = call(&fake, PipelineState::DraftingSocial).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(fake.recorded()[0].user_prompt, "hello");
    }
}
