//! Generate and evaluate stages: render a prompt once, call the model, and
//! parse the reply against a contract, retrying within a fixed budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use campaignsmith_contract::{EvaluationContract, ResponseContract};
use campaignsmith_provider::{InvokeRequest, ModelInvoker};
use campaignsmith_shared::{
    Evaluation, GenerationConfig, ModelTarget, PipelineState, ProviderError, RetryConfig, Rubric,
    ScoredArtifact, StageFailure, StageFailureCause, StageFailureKind,
};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry budgets and timing shared by every stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-asks after a contract violation. A stage makes at most
    /// `parse_retries + 1` calls that return unparseable text.
    pub parse_retries: u32,
    /// Total calls allowed to fail with a retryable provider error.
    pub provider_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Limit on a single model call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            parse_retries: 2,
            provider_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, generation: &GenerationConfig) -> Self {
        Self {
            parse_retries: retry.parse_retries,
            provider_attempts: retry.provider_attempts.max(1),
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            call_timeout: generation.request_timeout(),
        }
    }

    /// Delay before the retry that follows the `failures`-th provider error.
    ///
    /// `base * 2^(failures - 1)`, raised to the provider's hint when that is
    /// longer, and never above `max_delay`.
    pub fn backoff(&self, failures: u32, hint: Option<Duration>) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.max(hint.unwrap_or_default()).min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// A rendered prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Builds the prompt for one input, given the contract's format instructions.
pub type Renderer<I> = Arc<dyn Fn(&I, &str) -> Prompt + Send + Sync>;

// ---------------------------------------------------------------------------
// GenerationStage
// ---------------------------------------------------------------------------

/// Produces exactly one validated value per successful run.
pub struct GenerationStage<I, C> {
    state: PipelineState,
    failure_kind: StageFailureKind,
    target: ModelTarget,
    policy: RetryPolicy,
    contract: C,
    render: Renderer<I>,
}

impl<I, C> GenerationStage<I, C>
where
    I: Sync,
    C: ResponseContract,
{
    pub fn new<F>(
        state: PipelineState,
        target: ModelTarget,
        policy: RetryPolicy,
        contract: C,
        render: F,
    ) -> Self
    where
        F: Fn(&I, &str) -> Prompt + Send + Sync + 'static,
    {
        Self {
            state,
            failure_kind: StageFailureKind::GenerationFailed,
            target,
            policy,
            contract,
            render: Arc::new(render),
        }
    }

    /// Report exhausted budgets as `EvaluationFailed`.
    pub fn scoring(mut self) -> Self {
        self.failure_kind = StageFailureKind::EvaluationFailed;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn target(&self) -> &ModelTarget {
        &self.target
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Render the prompt for `input` exactly as `run` would send it.
    pub fn prompt_for(&self, input: &I) -> Prompt {
        (self.render)(input, &self.contract.render_instructions())
    }

    /// Render, invoke, and parse, retrying per the stage's [`RetryPolicy`].
    #[instrument(skip_all, fields(stage = %self.state, contract = self.contract.name(), target = %self.target))]
    pub async fn run(
        &self,
        invoker: &dyn ModelInvoker,
        input: &I,
    ) -> Result<C::Output, StageFailure> {
        let prompt = self.prompt_for(input);
        let started = Instant::now();
        let mut parse_failures: u32 = 0;
        let mut provider_failures: u32 = 0;
        let mut attempt: u32 = 0;

        debug!(
            system_bytes = prompt.system.len(),
            user_bytes = prompt.user.len(),
            "rendered prompt"
        );

        loop {
            attempt += 1;
            let request = InvokeRequest {
                system_prompt: &prompt.system,
                user_prompt: &prompt.user,
                target: &self.target,
                stage: self.state,
                attempt,
            };

            let call = invoker.invoke(&request);
            let reply = match tokio::time::timeout(self.policy.call_timeout, call).await {
                Ok(reply) => reply,
                Err(_) => Err(ProviderError::timeout(format!(
                    "no reply within {}ms",
                    self.policy.call_timeout.as_millis()
                ))),
            };

            let err = match reply {
                Ok(raw) => {
                    debug!(attempt, bytes = raw.len(), "model replied");
                    match self.contract.parse(&raw) {
                        Ok(value) => {
                            info!(
                                attempt,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "stage produced a valid response"
                            );
                            return Ok(value);
                        }
                        Err(failure) => {
                            parse_failures += 1;
                            if parse_failures > self.policy.parse_retries {
                                error!(attempt, reason = %failure.reason, "contract violated, parse budget exhausted");
                                return Err(self.fail(StageFailureCause::ParseBudgetExhausted {
                                    attempts: parse_failures,
                                    last: failure,
                                }));
                            }
                            warn!(attempt, reason = %failure.reason, "contract violated, retrying");
                            continue;
                        }
                    }
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(attempt, kind = %err.kind, error = %err.message, "fatal provider error");
                return Err(self.fail(StageFailureCause::Provider(err)));
            }

            provider_failures += 1;
            if provider_failures >= self.policy.provider_attempts {
                error!(attempt, kind = %err.kind, error = %err.message, "provider retry budget exhausted");
                return Err(self.fail(StageFailureCause::Provider(err)));
            }

            let delay = self.policy.backoff(provider_failures, err.retry_after);
            warn!(
                attempt,
                kind = %err.kind,
                delay_ms = delay.as_millis() as u64,
                "retryable provider error, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn fail(&self, cause: StageFailureCause) -> StageFailure {
        StageFailure::new(self.state, self.failure_kind, cause)
    }
}

// ---------------------------------------------------------------------------
// EvaluationStage
// ---------------------------------------------------------------------------

/// Scores one artifact against a rubric.
pub struct EvaluationStage<A> {
    inner: GenerationStage<A, EvaluationContract>,
}

impl<A: Sync> EvaluationStage<A> {
    pub fn new<F>(
        state: PipelineState,
        rubric: Rubric,
        target: ModelTarget,
        policy: RetryPolicy,
        render: F,
    ) -> Self
    where
        F: Fn(&A, &str) -> Prompt + Send + Sync + 'static,
    {
        let contract = EvaluationContract::new(rubric);
        Self {
            inner: GenerationStage::new(state, target, policy, contract, render).scoring(),
        }
    }

    pub fn rubric(&self) -> Rubric {
        self.inner.contract().rubric
    }

    pub fn state(&self) -> PipelineState {
        self.inner.state()
    }

    pub async fn run(
        &self,
        invoker: &dyn ModelInvoker,
        artifact: &A,
    ) -> Result<Evaluation, StageFailure> {
        self.inner.run(invoker, artifact).await
    }

    /// Evaluate `artifact` and pair it with the result.
    pub async fn score(
        &self,
        invoker: &dyn ModelInvoker,
        artifact: A,
    ) -> Result<ScoredArtifact<A>, StageFailure> {
        let evaluation = self.run(invoker, &artifact).await?;
        Ok(ScoredArtifact::new(artifact, evaluation))
    }
}
