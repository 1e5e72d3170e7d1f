//! Core domain types for campaign generation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseFailure;

/// Highest value any rubric dimension may take. The lowest is 0.
pub const MAX_SCORE: u8 = 5;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of a campaign run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineState {
    GeneratingIdeas,
    EvaluatingIdeas,
    SelectingIdea,
    DraftingBlog,
    EvaluatingBlog,
    DraftingEmail,
    EvaluatingEmail,
    DraftingSocial,
    EvaluatingSocial,
    Done,
    Failed,
}

impl PipelineState {
    /// The working states a successful run passes through before `Done`.
    pub const SEQUENCE: [PipelineState; 9] = [
        Self::GeneratingIdeas,
        Self::EvaluatingIdeas,
        Self::SelectingIdea,
        Self::DraftingBlog,
        Self::EvaluatingBlog,
        Self::DraftingEmail,
        Self::EvaluatingEmail,
        Self::DraftingSocial,
        Self::EvaluatingSocial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneratingIdeas => "GeneratingIdeas",
            Self::EvaluatingIdeas => "EvaluatingIdeas",
            Self::SelectingIdea => "SelectingIdea",
            Self::DraftingBlog => "DraftingBlog",
            Self::EvaluatingBlog => "EvaluatingBlog",
            Self::DraftingEmail => "DraftingEmail",
            Self::EvaluatingEmail => "EvaluatingEmail",
            Self::DraftingSocial => "DraftingSocial",
            Self::EvaluatingSocial => "EvaluatingSocial",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// The state entered after this one succeeds. `None` for terminal states.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::EvaluatingSocial => Some(Self::Done),
            Self::Done | Self::Failed => None,
            other => Self::SEQUENCE
                .iter()
                .position(|s| *s == other)
                .map(|i| Self::SEQUENCE[i + 1]),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Key under `[stages]` in the config file for per-stage model overrides.
    /// States that never call a model have no key.
    pub fn config_key(self) -> Option<&'static str> {
        match self {
            Self::GeneratingIdeas => Some("ideas"),
            Self::EvaluatingIdeas => Some("idea_evaluation"),
            Self::DraftingBlog => Some("blog"),
            Self::EvaluatingBlog => Some("blog_evaluation"),
            Self::DraftingEmail => Some("email"),
            Self::EvaluatingEmail => Some("email_evaluation"),
            Self::DraftingSocial => Some("social"),
            Self::EvaluatingSocial => Some("social_evaluation"),
            Self::SelectingIdea | Self::Done | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ModelTarget
// ---------------------------------------------------------------------------

/// Which backend and model a call goes to. Chosen per call, never baked in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTarget {
    /// Registered provider name (e.g., `openai`, `anthropic`).
    pub provider: String,
    /// Provider-specific model identifier.
    pub model: String,
}

impl ModelTarget {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ModelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// A proposed campaign idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    /// Short campaign name.
    pub name: String,
    /// Audience segment the idea targets.
    pub audience: String,
    /// The campaign's core message.
    pub message: String,
    /// How the campaign plays out.
    pub concept: String,
}

/// An SEO-oriented blog post drafted for the selected idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Teaser shown in listings.
    pub excerpt: String,
    /// Full body, Markdown.
    pub content: String,
    pub keywords: Vec<String>,
}

/// Launch email for the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    /// Inbox preview text.
    pub preview: String,
    pub body: String,
    pub call_to_action: String,
    /// Why this call to action suits the audience and what response it expects.
    pub rationale: String,
}

/// A single platform-specific social media post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub platform: String,
    pub content: String,
    pub hashtags: Vec<String>,
    /// Ad targeting audience.
    pub intended_audience: String,
}

// ---------------------------------------------------------------------------
// Rubric / Evaluation
// ---------------------------------------------------------------------------

/// The scoring axes an evaluation uses. Each artifact type has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rubric {
    Idea,
    Blog,
    Email,
    Social,
}

impl Rubric {
    pub const ALL: [Rubric; 4] = [Self::Idea, Self::Blog, Self::Email, Self::Social];

    /// Dimension names, in the order they are presented to the model.
    pub fn dimensions(self) -> &'static [&'static str] {
        match self {
            Self::Idea => &["audience_fit", "clarity", "creativity", "channel_suitability"],
            Self::Blog => &[
                "seo_optimization",
                "clickability",
                "readability",
                "audience_fit",
                "content_quality",
            ],
            Self::Email => &[
                "subject_effectiveness",
                "preview_quality",
                "message_clarity",
                "cta_strength",
                "tone_fit",
            ],
            Self::Social => &[
                "platform_fit",
                "audience_alignment",
                "engagement_potential",
                "hashtag_relevance",
                "clarity_and_appeal",
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Blog => "blog",
            Self::Email => "email",
            Self::Social => "social",
        }
    }

    /// Highest total an evaluation under this rubric can reach.
    pub fn max_total(self) -> u32 {
        self.dimensions().len() as u32 * u32::from(MAX_SCORE)
    }
}

/// Rubric scores plus free-text commentary for one artifact.
///
/// Only constructible through [`Evaluation::new`], which rejects any score
/// outside `0..=MAX_SCORE` and any dimension set that does not match the
/// rubric exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    rubric: Rubric,
    scores: BTreeMap<&'static str, u8>,
    comments: String,
}

impl Evaluation {
    pub fn new(
        rubric: Rubric,
        scores: BTreeMap<&'static str, u8>,
        comments: impl Into<String>,
    ) -> std::result::Result<Self, ParseFailure> {
        let dims = rubric.dimensions();

        for dim in dims {
            match scores.get(dim) {
                None => return Err(ParseFailure::missing_field(dim)),
                Some(&v) if v > MAX_SCORE => {
                    return Err(ParseFailure::out_of_range(dim, i64::from(v), 0, MAX_SCORE));
                }
                Some(_) => {}
            }
        }

        if let Some(extra) = scores.keys().find(|k| !dims.contains(*k)) {
            return Err(ParseFailure::new(format!(
                "dimension `{extra}` is not part of the {} rubric",
                rubric.as_str()
            )));
        }

        Ok(Self {
            rubric,
            scores,
            comments: comments.into(),
        })
    }

    pub fn rubric(&self) -> Rubric {
        self.rubric
    }

    pub fn score(&self, dimension: &str) -> Option<u8> {
        self.scores.get(dimension).copied()
    }

    /// Scores in rubric order.
    pub fn scores(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        self.rubric
            .dimensions()
            .iter()
            .map(|d| (*d, self.scores.get(d).copied().unwrap_or(0)))
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    /// Sum of all dimension scores.
    pub fn total(&self) -> u32 {
        self.scores.values().map(|v| u32::from(*v)).sum()
    }
}

/// An artifact paired with its evaluation. The total is derived, never set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredArtifact<A> {
    artifact: A,
    evaluation: Evaluation,
    total_score: u32,
}

impl<A> ScoredArtifact<A> {
    pub fn new(artifact: A, evaluation: Evaluation) -> Self {
        let total_score = evaluation.total();
        Self {
            artifact,
            evaluation,
            total_score,
        }
    }

    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn into_parts(self) -> (A, Evaluation) {
        (self.artifact, self.evaluation)
    }
}

// ---------------------------------------------------------------------------
// CampaignReport
// ---------------------------------------------------------------------------

/// Outcome of evaluating one drafted social post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SocialOutcome {
    /// The post was evaluated.
    Evaluated {
        index: usize,
        scored: ScoredArtifact<SocialPost>,
    },
    /// Evaluation failed for this post; the post is kept with the reason.
    Gap {
        index: usize,
        post: SocialPost,
        reason: String,
    },
}

impl SocialOutcome {
    /// Position of the post in the drafted sequence.
    pub fn index(&self) -> usize {
        match self {
            Self::Evaluated { index, .. } | Self::Gap { index, .. } => *index,
        }
    }

    pub fn post(&self) -> &SocialPost {
        match self {
            Self::Evaluated { scored, .. } => scored.artifact(),
            Self::Gap { post, .. } => post,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }
}

/// The complete result of a successful campaign run.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    /// Time-sortable run identifier.
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// The winning idea.
    pub idea: ScoredArtifact<Idea>,
    /// Every evaluated idea, best first.
    pub idea_pool: Vec<ScoredArtifact<Idea>>,
    pub blog: ScoredArtifact<BlogPost>,
    pub email: ScoredArtifact<EmailDraft>,
    /// One entry per drafted post, in drafting order.
    pub social: Vec<SocialOutcome>,
    /// States the run passed through, ending in `Done`.
    pub states: Vec<PipelineState>,
}

impl CampaignReport {
    /// Social posts that were evaluated, in drafting order.
    pub fn evaluated_social(&self) -> impl Iterator<Item = &ScoredArtifact<SocialPost>> {
        self.social.iter().filter_map(|o| match o {
            SocialOutcome::Evaluated { scored, .. } => Some(scored),
            SocialOutcome::Gap { .. } => None,
        })
    }

    /// Positions of social posts whose evaluation failed.
    pub fn gaps(&self) -> Vec<usize> {
        self.social
            .iter()
            .filter(|o| o.is_gap())
            .map(SocialOutcome::index)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CampaignBrief
// ---------------------------------------------------------------------------

/// What the campaign is for. Feeds the idea-generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignBrief {
    /// One-line description of the client.
    pub client: String,
    /// Products or offers to highlight.
    #[serde(default)]
    pub offerings: Vec<String>,
    /// Audience segments to target.
    #[serde(default)]
    pub audiences: Vec<String>,
}

impl Default for CampaignBrief {
    fn default() -> Self {
        Self {
            client: "Independent American-style brunch restaurant known for quality and community."
                .into(),
            offerings: vec![
                "Budget-friendly $9.99 full breakfast combo: 2 eggs, choice of meat (bacon, \
                 sausage, or veggie patty), breakfast potatoes, fresh fruit, and coffee."
                    .into(),
                "Hearty and nutritious Mediterranean wrap, packed with veggies and lean protein, \
                 great for health-conscious diners."
                    .into(),
                "Popular $20.99 all-you-can-eat Sunday brunch buffet with breakfast classics \
                 (eggs, pancakes, waffles, bacon, sausage, hash browns, omelets) and lunch \
                 options (salad bar, seasonal meats, and sides)."
                    .into(),
            ],
            audiences: vec![
                "Families looking for weekend outings".into(),
                "Health-conscious individuals seeking nutritious, flavorful options".into(),
                "Social brunch groups celebrating milestones or gathering casually".into(),
            ],
        }
    }
}
