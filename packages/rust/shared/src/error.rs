//! Error types for campaignsmith.
//!
//! The taxonomy follows the way failures travel through a run:
//! [`ProviderError`] and [`ParseFailure`] are handled inside a stage by
//! retrying, [`StageFailure`] is what a stage surfaces once its budget is
//! spent, and [`PipelineError`] is the terminal error handed to callers.
//!
//! Library crates use [`CampaignError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::PipelineState;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Classification of a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call did not complete within its timeout.
    Timeout,
    /// The provider asked us to slow down (HTTP 429).
    RateLimited,
    /// Provider-side failure (HTTP 5xx).
    Server,
    /// Connection could not be established or was dropped.
    Network,
    /// Credentials were rejected (HTTP 401/403).
    Auth,
    /// The provider rejected the request itself (other HTTP 4xx).
    InvalidRequest,
    /// The provider answered with an envelope we could not read, typically a
    /// proxy or gateway page in place of the API response.
    MalformedResponse,
    /// No backend is registered under the requested provider name.
    UnknownProvider,
}

impl ProviderErrorKind {
    /// Whether a call failing with this kind may succeed if repeated.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::RateLimited
                | Self::Server
                | Self::Network
                | Self::MalformedResponse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Server => "server",
            Self::Network => "network",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::MalformedResponse => "malformed_response",
            Self::UnknownProvider => "unknown_provider",
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single model call failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("provider error ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Provider-supplied hint for how long to wait before retrying.
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a retry-after hint (only meaningful for rate limits).
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Server, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }
}

// ---------------------------------------------------------------------------
// ParseFailure
// ---------------------------------------------------------------------------

/// A model response did not satisfy its contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("contract violation: {reason}")]
pub struct ParseFailure {
    pub reason: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(format!("missing required field `{field}`"))
    }

    pub fn type_mismatch(field: &str, expected: &str) -> Self {
        Self::new(format!("field `{field}` must be {expected}"))
    }

    pub fn empty_field(field: &str) -> Self {
        Self::new(format!("field `{field}` must not be empty"))
    }

    pub fn out_of_range(field: &str, value: i64, min: u8, max: u8) -> Self {
        Self::new(format!(
            "field `{field}` is {value}, outside the allowed range {min}..={max}"
        ))
    }

    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::new(format!("malformed structured block: {detail}"))
    }

    pub fn item_count(field: &str, expected: &str, actual: usize) -> Self {
        Self::new(format!(
            "`{field}` holds {actual} item(s), expected {expected}"
        ))
    }
}

// ---------------------------------------------------------------------------
// StageFailure
// ---------------------------------------------------------------------------

/// Which kind of stage gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageFailureKind {
    GenerationFailed,
    EvaluationFailed,
}

impl std::fmt::Display for StageFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerationFailed => f.write_str("generation failed"),
            Self::EvaluationFailed => f.write_str("evaluation failed"),
        }
    }
}

/// Why a stage gave up.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageFailureCause {
    /// Every attempt produced a response that broke the contract.
    #[error("contract violated on all {attempts} attempts (last: {last})")]
    ParseBudgetExhausted { attempts: u32, last: ParseFailure },

    /// A fatal provider error, or retryable ones past the attempt budget.
    #[error(transparent)]
    Provider(ProviderError),
}

/// A stage exhausted its retry budget or hit a fatal provider error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage}: {kind}: {cause}")]
pub struct StageFailure {
    pub stage: PipelineState,
    pub kind: StageFailureKind,
    #[source]
    pub cause: StageFailureCause,
}

impl StageFailure {
    pub fn new(stage: PipelineState, kind: StageFailureKind, cause: StageFailureCause) -> Self {
        Self { stage, kind, cause }
    }

    /// The provider error that ended the stage, if that is what happened.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.cause {
            StageFailureCause::Provider(e) => Some(e),
            StageFailureCause::ParseBudgetExhausted { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Why a campaign run ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineErrorCause {
    #[error(transparent)]
    Stage(StageFailure),

    #[error("run was cancelled")]
    Cancelled,

    #[error("every evaluation in the batch failed ({failed} item(s))")]
    NoEvaluations { failed: usize },

    #[error("selection produced no candidate")]
    EmptySelection,
}

/// Terminal error of a campaign run. No partial report accompanies it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("pipeline failed in {stage}: {cause}")]
pub struct PipelineError {
    /// The state that was executing when the run failed.
    pub stage: PipelineState,
    #[source]
    pub cause: PipelineErrorCause,
}

impl PipelineError {
    pub fn new(stage: PipelineState, cause: PipelineErrorCause) -> Self {
        Self { stage, cause }
    }

    pub fn cancelled(stage: PipelineState) -> Self {
        Self::new(stage, PipelineErrorCause::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, PipelineErrorCause::Cancelled)
    }

    pub fn stage_failure(&self) -> Option<&StageFailure> {
        match &self.cause {
            PipelineErrorCause::Stage(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<StageFailure> for PipelineError {
    fn from(failure: StageFailure) -> Self {
        Self::new(failure.stage, PipelineErrorCause::Stage(failure))
    }
}

// ---------------------------------------------------------------------------
// CampaignError
// ---------------------------------------------------------------------------

/// Top-level error type for campaignsmith operations outside a run.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid layout, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A campaign run failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CampaignError>;

impl CampaignError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CampaignError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CampaignError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));
    }

    #[test]
    fn retryable_kinds() {
        assert!(ProviderError::timeout("slow").is_retryable());
        assert!(ProviderError::rate_limited("429").is_retryable());
        assert!(ProviderError::server("502").is_retryable());
        assert!(ProviderError::network("reset").is_retryable());
        assert!(!ProviderError::auth("401").is_retryable());
        assert!(!ProviderError::invalid_request("400").is_retryable());
        assert!(ProviderError::malformed("<html>gateway</html>").is_retryable());
        assert!(!ProviderError::new(ProviderErrorKind::UnknownProvider, "x").is_retryable());
    }

    #[test]
    fn stage_failure_converts_to_pipeline_error() {
        let failure = StageFailure::new(
            PipelineState::DraftingBlog,
            StageFailureKind::GenerationFailed,
            StageFailureCause::Provider(ProviderError::auth("bad key")),
        );
        let err = PipelineError::from(failure.clone());
        assert_eq!(err.stage, PipelineState::DraftingBlog);
        assert_eq!(err.stage_failure(), Some(&failure));
        assert!(err.to_string().contains("DraftingBlog"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn parse_failure_reasons() {
        let f = ParseFailure::out_of_range("clarity", 7, 0, 5);
        assert!(f.reason.contains("clarity"));
        assert!(f.reason.contains("0..=5"));
        assert!(ParseFailure::missing_field("title").to_string().contains("`title`"));
    }
}
