//! The response contracts used by each pipeline stage.
//!
//! Every contract pairs a [`Schema`] (rendered into the prompt) with an
//! explicit validator. Parsing is all-or-nothing: the first violation ends
//! the attempt and nothing partially built escapes.

use serde_json::{Map, Value};
use tracing::debug;

use campaignsmith_shared::{BlogPost, EmailDraft, Evaluation, Idea, ParseFailure, Rubric, SocialPost};

use crate::extract::parse_object;
use crate::fields;
use crate::schema::{FieldSpec, Schema};

/// Declared shape plus validator for one kind of model response.
pub trait ResponseContract: Send + Sync {
    /// The validated value a successful parse yields.
    type Output: Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Format instructions embedded into the prompt.
    fn render_instructions(&self) -> String {
        self.schema().render_instructions()
    }

    /// Extract and validate every required field of `raw`.
    fn parse(&self, raw: &str) -> Result<Self::Output, ParseFailure>;
}

// ---------------------------------------------------------------------------
// Field layouts
// ---------------------------------------------------------------------------

fn idea_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text("name", "short, memorable campaign name"),
        FieldSpec::text("audience", "audience segment the campaign targets"),
        FieldSpec::text("message", "the core message of the campaign"),
        FieldSpec::text("concept", "how the campaign plays out across channels"),
    ]
}

fn rubric_fields(rubric: Rubric) -> Vec<FieldSpec> {
    let mut specs: Vec<FieldSpec> = rubric
        .dimensions()
        .iter()
        .copied()
        .map(FieldSpec::score)
        .collect();
    specs.push(FieldSpec::text(
        "comments",
        "concise justification of the scores with concrete suggestions",
    ));
    specs
}

fn items_within<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    min: usize,
    max: Option<usize>,
) -> Result<Vec<&'a Map<String, Value>>, ParseFailure> {
    let items = fields::object_list(obj, key)?;
    let expected = match max {
        Some(max) if min == max => format!("exactly {min}"),
        Some(max) => format!("between {min} and {max}"),
        None => format!("at least {min}"),
    };
    if items.len() < min || max.is_some_and(|max| items.len() > max) {
        return Err(ParseFailure::item_count(key, &expected, items.len()));
    }
    Ok(items)
}

fn idea_from(obj: &Map<String, Value>) -> Result<Idea, ParseFailure> {
    Ok(Idea {
        name: fields::text(obj, "name")?,
        audience: fields::text(obj, "audience")?,
        message: fields::text(obj, "message")?,
        concept: fields::text(obj, "concept")?,
    })
}

fn social_post_from(obj: &Map<String, Value>) -> Result<SocialPost, ParseFailure> {
    Ok(SocialPost {
        platform: fields::text(obj, "platform")?,
        content: fields::text(obj, "content")?,
        hashtags: fields::text_list(obj, "hashtags")?,
        intended_audience: fields::text(obj, "intended_audience")?,
    })
}

// ---------------------------------------------------------------------------
// Ideas
// ---------------------------------------------------------------------------

/// A pool of campaign ideas under the `ideas` key.
#[derive(Debug, Clone, Copy)]
pub struct IdeaPoolContract {
    pub min: usize,
    pub max: usize,
}

impl ResponseContract for IdeaPoolContract {
    type Output = Vec<Idea>;

    fn name(&self) -> &'static str {
        "idea_pool"
    }

    fn schema(&self) -> Schema {
        Schema::List {
            title: "IdeaPool",
            key: "ideas",
            item: idea_fields(),
            min_items: self.min,
            max_items: Some(self.max),
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<Idea>, ParseFailure> {
        let obj = parse_object(raw)?;
        let ideas = items_within(&obj, "ideas", self.min, Some(self.max))?
            .into_iter()
            .map(idea_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = ideas.len(), "parsed idea pool");
        Ok(ideas)
    }
}

/// One idea-rubric evaluation per idea, matched to the pool by position.
#[derive(Debug, Clone, Copy)]
pub struct IdeaEvaluationsContract {
    pub expected: usize,
}

impl ResponseContract for IdeaEvaluationsContract {
    type Output = Vec<Evaluation>;

    fn name(&self) -> &'static str {
        "idea_evaluations"
    }

    fn schema(&self) -> Schema {
        Schema::List {
            title: "IdeaEvaluations",
            key: "evaluations",
            item: rubric_fields(Rubric::Idea),
            min_items: self.expected,
            max_items: Some(self.expected),
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<Evaluation>, ParseFailure> {
        let obj = parse_object(raw)?;
        items_within(&obj, "evaluations", self.expected, Some(self.expected))?
            .into_iter()
            .map(|item| fields::evaluation(item, Rubric::Idea))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct BlogPostContract;

impl ResponseContract for BlogPostContract {
    type Output = BlogPost;

    fn name(&self) -> &'static str {
        "blog_post"
    }

    fn schema(&self) -> Schema {
        Schema::Object {
            title: "BlogPost",
            fields: vec![
                FieldSpec::text("title", "SEO-friendly headline"),
                FieldSpec::text("slug", "lowercase, hyphenated URL slug"),
                FieldSpec::text("excerpt", "one or two sentence teaser"),
                FieldSpec::text("content", "full post body in Markdown"),
                FieldSpec::text_list("keywords", "target search keywords"),
            ],
        }
    }

    fn parse(&self, raw: &str) -> Result<BlogPost, ParseFailure> {
        let obj = parse_object(raw)?;
        Ok(BlogPost {
            title: fields::text(&obj, "title")?,
            slug: fields::text(&obj, "slug")?,
            excerpt: fields::text(&obj, "excerpt")?,
            content: fields::text(&obj, "content")?,
            keywords: fields::text_list(&obj, "keywords")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailDraftContract;

impl ResponseContract for EmailDraftContract {
    type Output = EmailDraft;

    fn name(&self) -> &'static str {
        "email_draft"
    }

    fn schema(&self) -> Schema {
        Schema::Object {
            title: "EmailDraft",
            fields: vec![
                FieldSpec::text("subject", "subject line"),
                FieldSpec::text("preview", "inbox preview text"),
                FieldSpec::text("body", "email body"),
                FieldSpec::text("call_to_action", "the single action the reader should take"),
                FieldSpec::text(
                    "rationale",
                    "why this call to action suits the audience and the response it should drive",
                ),
            ],
        }
    }

    fn parse(&self, raw: &str) -> Result<EmailDraft, ParseFailure> {
        let obj = parse_object(raw)?;
        Ok(EmailDraft {
            subject: fields::text(&obj, "subject")?,
            preview: fields::text(&obj, "preview")?,
            body: fields::text(&obj, "body")?,
            call_to_action: fields::text(&obj, "call_to_action")?,
            rationale: fields::text(&obj, "rationale")?,
        })
    }
}

/// A list of social posts under the `posts` key. At least one is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocialPostsContract;

impl ResponseContract for SocialPostsContract {
    type Output = Vec<SocialPost>;

    fn name(&self) -> &'static str {
        "social_posts"
    }

    fn schema(&self) -> Schema {
        Schema::List {
            title: "SocialPosts",
            key: "posts",
            item: vec![
                FieldSpec::text("platform", "target platform, e.g. Instagram or Facebook"),
                FieldSpec::text("content", "post copy"),
                FieldSpec::text_list("hashtags", "hashtags including the leading #"),
                FieldSpec::text("intended_audience", "ad targeting audience"),
            ],
            min_items: 1,
            max_items: None,
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<SocialPost>, ParseFailure> {
        let obj = parse_object(raw)?;
        items_within(&obj, "posts", 1, None)?
            .into_iter()
            .map(social_post_from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// A single evaluation under the given rubric.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContract {
    pub rubric: Rubric,
}

impl EvaluationContract {
    pub fn new(rubric: Rubric) -> Self {
        Self { rubric }
    }
}

impl ResponseContract for EvaluationContract {
    type Output = Evaluation;

    fn name(&self) -> &'static str {
        match self.rubric {
            Rubric::Idea => "idea_evaluation",
            Rubric::Blog => "blog_evaluation",
            Rubric::Email => "email_evaluation",
            Rubric::Social => "social_evaluation",
        }
    }

    fn schema(&self) -> Schema {
        let title = match self.rubric {
            Rubric::Idea => "IdeaEvaluation",
            Rubric::Blog => "BlogEvaluation",
            Rubric::Email => "EmailEvaluation",
            Rubric::Social => "SocialEvaluation",
        };
        Schema::Object {
            title,
            fields: rubric_fields(self.rubric),
        }
    }

    fn parse(&self, raw: &str) -> Result<Evaluation, ParseFailure> {
        let obj = parse_object(raw)?;
        fields::evaluation(&obj, self.rubric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fenced(value: &Value) -> String {
        format!("```json\n{}\n```", serde_json::to_string_pretty(value).unwrap())
    }

    fn idea(n: usize) -> Idea {
        Idea {
            name: format!("Idea {n}"),
            audience: "Families".into(),
            message: "Weekend together".into(),
            concept: "Kids eat free on Sundays".into(),
        }
    }

    fn evaluation_json(rubric: Rubric, score: u8) -> Value {
        let mut obj = Map::new();
        for dim in rubric.dimensions() {
            obj.insert((*dim).to_string(), json!(score));
        }
        obj.insert("comments".into(), json!("fine"));
        Value::Object(obj)
    }

    #[test]
    fn blog_post_round_trips() {
        let post = BlogPost {
            title: "Sunday Brunch, Sorted".into(),
            slug: "sunday-brunch-sorted".into(),
            excerpt: "All you can eat, all morning.".into(),
            content: "# Brunch\n\nCome hungry.".into(),
            keywords: vec!["brunch buffet".into(), "family brunch".into()],
        };
        let raw = fenced(&serde_json::to_value(&post).unwrap());
        assert_eq!(BlogPostContract.parse(&raw).unwrap(), post);
    }

    #[test]
    fn markdown_whitespace_survives_parsing() {
        let post = BlogPost {
            title: "Brunch at Home".into(),
            slug: "brunch-at-home".into(),
            excerpt: "Our pancake recipe, shared.".into(),
            content: "## Brunch\n\nPancakes.\n\n```text\n2 eggs\n1 cup flour\n```\n".into(),
            keywords: vec!["pancake recipe".into()],
        };
        let value = serde_json::to_value(&post).unwrap();

        assert_eq!(BlogPostContract.parse(&value.to_string()).unwrap(), post);
        assert_eq!(BlogPostContract.parse(&fenced(&value)).unwrap(), post);

        let email = EmailDraft {
            subject: "Brunch is on".into(),
            preview: "Your table is waiting".into(),
            body: "Hi there,\n\nJoin us this Sunday.\n".into(),
            call_to_action: "Reserve now".into(),
            rationale: "Direct and time-bound".into(),
        };
        let raw = serde_json::to_string(&email).unwrap();
        assert_eq!(EmailDraftContract.parse(&raw).unwrap(), email);
    }

    #[test]
    fn email_round_trips_and_ignores_extra_fields() {
        let email = EmailDraft {
            subject: "Brunch is on".into(),
            preview: "Your table is waiting".into(),
            body: "Join us this Sunday.".into(),
            call_to_action: "Reserve now".into(),
            rationale: "Direct and time-bound".into(),
        };
        let mut value = serde_json::to_value(&email).unwrap();
        value["tone"] = json!("warm");
        assert_eq!(EmailDraftContract.parse(&value.to_string()).unwrap(), email);
    }

    #[test]
    fn missing_field_never_yields_partial_artifact() {
        let raw = json!({"title": "t", "slug": "s", "excerpt": "e", "keywords": []}).to_string();
        let err = BlogPostContract.parse(&raw).unwrap_err();
        assert!(err.reason.contains("`content`"));
    }

    #[test]
    fn keywords_must_be_a_list() {
        let raw = json!({
            "title": "t", "slug": "s", "excerpt": "e", "content": "c", "keywords": "brunch"
        })
        .to_string();
        let err = BlogPostContract.parse(&raw).unwrap_err();
        assert!(err.reason.contains("keywords"));
    }

    #[test]
    fn idea_pool_enforces_bounds() {
        let contract = IdeaPoolContract { min: 2, max: 3 };
        let pool: Vec<Idea> = (0..3).map(idea).collect();
        let raw = fenced(&json!({ "ideas": pool }));
        assert_eq!(contract.parse(&raw).unwrap(), pool);

        let too_many = fenced(&json!({ "ideas": (0..4).map(idea).collect::<Vec<_>>() }));
        let err = contract.parse(&too_many).unwrap_err();
        assert!(err.reason.contains("between 2 and 3"));
    }

    #[test]
    fn idea_evaluations_must_match_expected_count() {
        let contract = IdeaEvaluationsContract { expected: 3 };
        let two = json!({
            "evaluations": [evaluation_json(Rubric::Idea, 3), evaluation_json(Rubric::Idea, 4)]
        });
        let err = contract.parse(&fenced(&two)).unwrap_err();
        assert!(err.reason.contains("exactly 3"));

        let three = json!({
            "evaluations": [
                evaluation_json(Rubric::Idea, 1),
                evaluation_json(Rubric::Idea, 2),
                evaluation_json(Rubric::Idea, 3),
            ]
        });
        let evals = contract.parse(&fenced(&three)).unwrap();
        let totals: Vec<u32> = evals.iter().map(Evaluation::total).collect();
        assert_eq!(totals, vec![4, 8, 12]);
    }

    #[test]
    fn social_posts_require_at_least_one() {
        let err = SocialPostsContract
            .parse(&json!({ "posts": [] }).to_string())
            .unwrap_err();
        assert!(err.reason.contains("at least 1"));

        let post = SocialPost {
            platform: "Instagram".into(),
            content: "Pancake stacks!".into(),
            hashtags: vec!["#brunch".into()],
            intended_audience: "Local families".into(),
        };
        let raw = format!("<json>{}</json>", json!({ "posts": [post.clone()] }));
        assert_eq!(SocialPostsContract.parse(&raw).unwrap(), vec![post]);
    }

    #[test]
    fn evaluation_rejects_out_of_range_score() {
        let mut value = evaluation_json(Rubric::Blog, 4);
        value["readability"] = json!(6);
        let err = EvaluationContract::new(Rubric::Blog)
            .parse(&value.to_string())
            .unwrap_err();
        assert!(err.reason.contains("readability"));
    }

    #[test]
    fn evaluation_round_trips_through_scores() {
        let contract = EvaluationContract::new(Rubric::Email);
        let eval = contract
            .parse(&evaluation_json(Rubric::Email, 3).to_string())
            .unwrap();

        let mut obj: Map<String, Value> = eval
            .scores()
            .map(|(dim, score)| (dim.to_string(), json!(score)))
            .collect();
        obj.insert("comments".into(), json!(eval.comments()));
        let again = contract.parse(&Value::Object(obj).to_string()).unwrap();
        assert_eq!(again, eval);
        assert_eq!(again.total(), 15);
    }

    #[test]
    fn instructions_name_every_rubric_dimension() {
        for rubric in Rubric::ALL {
            let text = EvaluationContract::new(rubric).render_instructions();
            for dim in rubric.dimensions() {
                assert!(text.contains(dim), "{dim} missing from {rubric:?} instructions");
            }
            assert!(text.contains("comments"));
        }
    }
}
