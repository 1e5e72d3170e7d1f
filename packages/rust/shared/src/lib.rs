//! Shared types, error model, and configuration for campaignsmith.
//!
//! This crate is the foundation depended on by all other campaignsmith crates.
//! It provides:
//! - The error taxonomy ([`ProviderError`], [`ParseFailure`], [`StageFailure`],
//!   [`PipelineError`]) and the umbrella [`CampaignError`]
//! - Domain types ([`Idea`], [`BlogPost`], [`EmailDraft`], [`SocialPost`],
//!   [`Evaluation`], [`ScoredArtifact`], [`CampaignReport`])
//! - Configuration ([`AppConfig`], config loading, credential resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GenerationConfig, ProviderConfig, RetryConfig, StageOverride,
    config_dir, config_file_path, init_config, load_brief_from, load_config, load_config_from,
    resolve_api_key,
};
pub use error::{
    CampaignError, ParseFailure, PipelineError, PipelineErrorCause, ProviderError,
    ProviderErrorKind, Result, StageFailure, StageFailureCause, StageFailureKind,
};
pub use types::{
    BlogPost, CampaignBrief, CampaignReport, EmailDraft, Evaluation, Idea, MAX_SCORE,
    ModelTarget, PipelineState, Rubric, ScoredArtifact, SocialOutcome, SocialPost,
};
