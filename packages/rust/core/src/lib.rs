//! Campaign pipeline orchestration for campaignsmith.
//!
//! Stages turn prompts into validated artifacts through a [`ModelInvoker`],
//! retrying within a bounded budget. [`CampaignPipeline`] wires them into a
//! fixed state sequence that ends in a [`CampaignReport`].
//!
//! [`ModelInvoker`]: campaignsmith_provider::ModelInvoker
//! [`CampaignReport`]: campaignsmith_shared::CampaignReport

pub mod batch;
pub mod cancel;
pub mod pipeline;
pub mod prompts;
pub mod selection;
pub mod stage;

pub use batch::{ItemOutcome, fan_out};
pub use cancel::CancelSignal;
pub use pipeline::{CampaignPipeline, PipelineProgress, PipelineSettings, SilentProgress};
pub use prompts::{BrunchPromptBook, PromptBook};
pub use selection::select;
pub use stage::{EvaluationStage, GenerationStage, Prompt, RetryPolicy};
