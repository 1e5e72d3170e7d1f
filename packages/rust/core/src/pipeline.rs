//! End-to-end campaign run: ideas → select → blog → email → social.
//!
//! Each state issues one stage (or one batch of stages for social
//! evaluation) and feeds its output forward. Any stage failure ends the run
//! with a [`PipelineError`]; there is no partial report.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use campaignsmith_contract::{
    BlogPostContract, EmailDraftContract, IdeaEvaluationsContract, IdeaPoolContract,
    SocialPostsContract,
};
use campaignsmith_provider::ModelInvoker;
use campaignsmith_shared::{
    AppConfig, BlogPost, CampaignReport, EmailDraft, Idea, ModelTarget, PipelineError,
    PipelineErrorCause, PipelineState, Rubric, ScoredArtifact, SocialOutcome, SocialPost,
};

use crate::batch::{self, ItemOutcome};
use crate::cancel::CancelSignal;
use crate::prompts::PromptBook;
use crate::selection;
use crate::stage::{EvaluationStage, GenerationStage, RetryPolicy};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Already-resolved knobs for one run. Built from [`AppConfig`] by the caller.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub idea_count_min: usize,
    pub idea_count_max: usize,
    pub social_post_count: usize,
    /// Social evaluations allowed in flight at once.
    pub evaluation_concurrency: usize,
    pub retry: RetryPolicy,
    /// Target used by every stage without an entry in `targets`.
    pub default_target: ModelTarget,
    pub targets: BTreeMap<PipelineState, ModelTarget>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let default_target =
            ModelTarget::new(&config.defaults.provider, &config.defaults.model);
        let targets = PipelineState::SEQUENCE
            .iter()
            .filter(|s| s.config_key().is_some())
            .map(|s| (*s, config.target_for(*s)))
            .filter(|(_, target)| *target != default_target)
            .collect();

        Self {
            idea_count_min: config.defaults.idea_count_min,
            idea_count_max: config.defaults.idea_count_max,
            social_post_count: config.defaults.social_post_count,
            evaluation_concurrency: config.defaults.evaluation_concurrency,
            retry: RetryPolicy::from_config(&config.retry, &config.generation),
            default_target,
            targets,
        }
    }

    pub fn target(&self, state: PipelineState) -> ModelTarget {
        self.targets
            .get(&state)
            .cloned()
            .unwrap_or_else(|| self.default_target.clone())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait PipelineProgress: Send + Sync {
    /// Called when entering a state (including `Done` and `Failed`).
    fn state(&self, state: PipelineState);
    /// Called as each social evaluation is joined.
    fn item_done(&self, done: usize, total: usize);
    /// Called once a report is assembled.
    fn done(&self, report: &CampaignReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn state(&self, _state: PipelineState) {}
    fn item_done(&self, _done: usize, _total: usize) {}
    fn done(&self, _report: &CampaignReport) {}
}

// ---------------------------------------------------------------------------
// CampaignPipeline
// ---------------------------------------------------------------------------

pub struct CampaignPipeline {
    invoker: Arc<dyn ModelInvoker>,
    prompts: Arc<dyn PromptBook>,
    settings: PipelineSettings,
    cancel: CancelSignal,
}

/// Walks the state sequence and records the trace.
struct Cursor<'a> {
    states: Vec<PipelineState>,
    progress: &'a dyn PipelineProgress,
    cancel: &'a CancelSignal,
}

impl Cursor<'_> {
    /// Move into `state`, unless the run has been cancelled. Terminal states
    /// are always entered.
    fn enter(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        if !state.is_terminal() && self.cancel.is_cancelled() {
            warn!(%state, "run cancelled before entering state");
            return Err(PipelineError::cancelled(state));
        }
        info!(%state, "entering state");
        self.states.push(state);
        self.progress.state(state);
        Ok(())
    }
}

impl CampaignPipeline {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        prompts: Arc<dyn PromptBook>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            invoker,
            prompts,
            settings,
            cancel: CancelSignal::new(),
        }
    }

    /// Share an externally owned cancel signal (e.g. wired to Ctrl-C).
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every state to `Done`, or stop at the first unrecoverable failure.
    #[instrument(skip_all, fields(posts = self.settings.social_post_count))]
    pub async fn run(
        &self,
        progress: &dyn PipelineProgress,
    ) -> Result<CampaignReport, PipelineError> {
        let run_id = Uuid::now_v7();
        let started = Instant::now();
        info!(%run_id, "starting campaign run");

        let mut cursor = Cursor {
            states: Vec::with_capacity(PipelineState::SEQUENCE.len() + 1),
            progress,
            cancel: &self.cancel,
        };

        match self.drive(&mut cursor, run_id).await {
            Ok(report) => {
                info!(
                    %run_id,
                    idea = %report.idea.artifact().name,
                    gaps = report.gaps().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "campaign run complete"
                );
                progress.done(&report);
                Ok(report)
            }
            Err(err) => {
                error!(%run_id, stage = %err.stage, error = %err, "campaign run failed");
                progress.state(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        cursor: &mut Cursor<'_>,
        run_id: Uuid,
    ) -> Result<CampaignReport, PipelineError> {
        let invoker = self.invoker.as_ref();

        cursor.enter(PipelineState::GeneratingIdeas)?;
        let ideas = self.ideas_stage().run(invoker, &()).await?;

        cursor.enter(PipelineState::EvaluatingIdeas)?;
        let evaluations = self.idea_evaluation_stage(ideas.len()).run(invoker, &ideas).await?;
        let pool: Vec<ScoredArtifact<Idea>> = ideas
            .into_iter()
            .zip(evaluations)
            .map(|(idea, evaluation)| ScoredArtifact::new(idea, evaluation))
            .collect();

        cursor.enter(PipelineState::SelectingIdea)?;
        let winner = selection::select(&pool, 1)
            .first()
            .map(|best| (*best).clone())
            .ok_or_else(|| {
                PipelineError::new(PipelineState::SelectingIdea, PipelineErrorCause::EmptySelection)
            })?;
        let idea_pool: Vec<ScoredArtifact<Idea>> = selection::select(&pool, pool.len())
            .into_iter()
            .cloned()
            .collect();
        info!(
            idea = %winner.artifact().name,
            score = winner.total_score(),
            max = Rubric::Idea.max_total(),
            "selected idea"
        );
        let idea = winner.artifact().clone();

        cursor.enter(PipelineState::DraftingBlog)?;
        let blog_post = self.blog_stage().run(invoker, &idea).await?;

        cursor.enter(PipelineState::EvaluatingBlog)?;
        let blog = self.blog_evaluation_stage().score(invoker, blog_post).await?;

        cursor.enter(PipelineState::DraftingEmail)?;
        let email_input = (idea.clone(), blog.artifact().clone());
        let email_draft = self.email_stage().run(invoker, &email_input).await?;

        cursor.enter(PipelineState::EvaluatingEmail)?;
        let email = self.email_evaluation_stage().score(invoker, email_draft).await?;

        cursor.enter(PipelineState::DraftingSocial)?;
        let social_input = (idea, blog.artifact().clone(), email.artifact().clone());
        let posts = self.social_stage().run(invoker, &social_input).await?;

        cursor.enter(PipelineState::EvaluatingSocial)?;
        let social = self.evaluate_social(posts, cursor.progress).await?;

        cursor.enter(PipelineState::Done)?;
        Ok(CampaignReport {
            run_id,
            generated_at: Utc::now(),
            idea: winner,
            idea_pool,
            blog,
            email,
            social,
            states: std::mem::take(&mut cursor.states),
        })
    }

    /// Evaluate every post concurrently. Failures become gaps unless every
    /// post failed.
    async fn evaluate_social(
        &self,
        posts: Vec<SocialPost>,
        progress: &dyn PipelineProgress,
    ) -> Result<Vec<SocialOutcome>, PipelineError> {
        let state = PipelineState::EvaluatingSocial;
        let stage = Arc::new(self.social_evaluation_stage());
        let invoker = self.invoker.clone();
        let total = posts.len();

        let outcomes = batch::fan_out(
            posts.clone(),
            self.settings.evaluation_concurrency,
            &self.cancel,
            move |_index, post| {
                let stage = stage.clone();
                let invoker = invoker.clone();
                async move { stage.run(invoker.as_ref(), &post).await }
            },
            |done, total| progress.item_done(done, total),
        )
        .await;

        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Cancelled))
            .count();
        if skipped > 0 {
            warn!(%state, skipped, "run cancelled during social evaluation");
            return Err(PipelineError::cancelled(state));
        }

        let social: Vec<SocialOutcome> = posts
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (post, outcome))| match outcome {
                ItemOutcome::Finished(Ok(evaluation)) => SocialOutcome::Evaluated {
                    index,
                    scored: ScoredArtifact::new(post, evaluation),
                },
                ItemOutcome::Finished(Err(failure)) => {
                    warn!(index, error = %failure, "social post evaluation failed, recording gap");
                    SocialOutcome::Gap {
                        index,
                        post,
                        reason: failure.to_string(),
                    }
                }
                ItemOutcome::Cancelled => SocialOutcome::Gap {
                    index,
                    post,
                    reason: "cancelled before evaluation started".into(),
                },
                ItemOutcome::Crashed(reason) => SocialOutcome::Gap {
                    index,
                    post,
                    reason: format!("evaluation task crashed: {reason}"),
                },
            })
            .collect();

        let failed = social.iter().filter(|o| o.is_gap()).count();
        if failed == total {
            return Err(PipelineError::new(
                state,
                PipelineErrorCause::NoEvaluations { failed },
            ));
        }
        info!(evaluated = total - failed, failed, "social evaluation batch joined");
        Ok(social)
    }

    // -----------------------------------------------------------------------
    // Stage construction
    // -----------------------------------------------------------------------

    fn ideas_stage(&self) -> GenerationStage<(), IdeaPoolContract> {
        let book = self.prompts.clone();
        let (min, max) = (self.settings.idea_count_min, self.settings.idea_count_max);
        GenerationStage::new(
            PipelineState::GeneratingIdeas,
            self.settings.target(PipelineState::GeneratingIdeas),
            self.settings.retry,
            IdeaPoolContract { min, max },
            move |_: &(), instructions: &str| book.ideas(min, max, instructions),
        )
    }

    fn idea_evaluation_stage(
        &self,
        expected: usize,
    ) -> GenerationStage<Vec<Idea>, IdeaEvaluationsContract> {
        let book = self.prompts.clone();
        GenerationStage::new(
            PipelineState::EvaluatingIdeas,
            self.settings.target(PipelineState::EvaluatingIdeas),
            self.settings.retry,
            IdeaEvaluationsContract { expected },
            move |ideas: &Vec<Idea>, instructions: &str| book.idea_evaluation(ideas, instructions),
        )
        .scoring()
    }

    fn blog_stage(&self) -> GenerationStage<Idea, BlogPostContract> {
        let book = self.prompts.clone();
        GenerationStage::new(
            PipelineState::DraftingBlog,
            self.settings.target(PipelineState::DraftingBlog),
            self.settings.retry,
            BlogPostContract,
            move |idea: &Idea, instructions: &str| book.blog(idea, instructions),
        )
    }

    fn blog_evaluation_stage(&self) -> EvaluationStage<BlogPost> {
        let book = self.prompts.clone();
        EvaluationStage::new(
            PipelineState::EvaluatingBlog,
            Rubric::Blog,
            self.settings.target(PipelineState::EvaluatingBlog),
            self.settings.retry,
            move |post: &BlogPost, instructions: &str| book.blog_evaluation(post, instructions),
        )
    }

    fn email_stage(&self) -> GenerationStage<(Idea, BlogPost), EmailDraftContract> {
        let book = self.prompts.clone();
        GenerationStage::new(
            PipelineState::DraftingEmail,
            self.settings.target(PipelineState::DraftingEmail),
            self.settings.retry,
            EmailDraftContract,
            move |(idea, blog): &(Idea, BlogPost), instructions: &str| {
                book.email(idea, blog, instructions)
            },
        )
    }

    fn email_evaluation_stage(&self) -> EvaluationStage<EmailDraft> {
        let book = self.prompts.clone();
        EvaluationStage::new(
            PipelineState::EvaluatingEmail,
            Rubric::Email,
            self.settings.target(PipelineState::EvaluatingEmail),
            self.settings.retry,
            move |email: &EmailDraft, instructions: &str| book.email_evaluation(email, instructions),
        )
    }

    fn social_stage(&self) -> GenerationStage<(Idea, BlogPost, EmailDraft), SocialPostsContract> {
        let book = self.prompts.clone();
        let count = self.settings.social_post_count;
        GenerationStage::new(
            PipelineState::DraftingSocial,
            self.settings.target(PipelineState::DraftingSocial),
            self.settings.retry,
            SocialPostsContract,
            move |(idea, blog, email): &(Idea, BlogPost, EmailDraft), instructions: &str| {
                book.social(idea, blog, email, count, instructions)
            },
        )
    }

    fn social_evaluation_stage(&self) -> EvaluationStage<SocialPost> {
        let book = self.prompts.clone();
        EvaluationStage::new(
            PipelineState::EvaluatingSocial,
            Rubric::Social,
            self.settings.target(PipelineState::EvaluatingSocial),
            self.settings.retry,
            move |post: &SocialPost, instructions: &str| book.social_evaluation(post, instructions),
        )
    }
}
