//! Report fixture shared by this crate's tests.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use campaignsmith_shared::{
    BlogPost, CampaignReport, EmailDraft, Evaluation, Idea, PipelineState, Rubric,
    ScoredArtifact, SocialOutcome, SocialPost,
};

fn evaluation(rubric: Rubric, total: u8) -> Evaluation {
    let mut remaining = total;
    let scores: BTreeMap<&'static str, u8> = rubric
        .dimensions()
        .iter()
        .map(|dim| {
            let v = remaining.min(5);
            remaining -= v;
            (*dim, v)
        })
        .collect();
    Evaluation::new(rubric, scores, "solid work").unwrap()
}

fn idea(name: &str) -> Idea {
    Idea {
        name: name.into(),
        audience: "Families".into(),
        message: "Brunch together".into(),
        concept: "Weekend buffet push".into(),
    }
}

fn post(platform: &str, content: &str) -> SocialPost {
    SocialPost {
        platform: platform.into(),
        content: content.into(),
        hashtags: vec!["#brunch".into(), "#sundayfunday".into()],
        intended_audience: "Local families".into(),
    }
}

pub(crate) fn sample_report() -> CampaignReport {
    let winner = ScoredArtifact::new(idea("Sunday Funday"), evaluation(Rubric::Idea, 14));
    let runner_up = ScoredArtifact::new(idea("Wrap It Up"), evaluation(Rubric::Idea, 9));

    let mut states = PipelineState::SEQUENCE.to_vec();
    states.push(PipelineState::Done);

    CampaignReport {
        run_id: Uuid::now_v7(),
        generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap(),
        idea: winner.clone(),
        idea_pool: vec![winner, runner_up],
        blog: ScoredArtifact::new(
            BlogPost {
                title: "Sunday Funday Brunch".into(),
                slug: "sunday-funday-brunch".into(),
                excerpt: "All you can eat for $20.99.".into(),
                content: "## Bring everyone\n\nPancakes and more.".into(),
                keywords: vec!["sunday brunch".into()],
            },
            evaluation(Rubric::Blog, 20),
        ),
        email: ScoredArtifact::new(
            EmailDraft {
                subject: "Your Sunday just got better".into(),
                preview: "Pancakes, waffles, omelets".into(),
                body: "Join us for the buffet.".into(),
                call_to_action: "Reserve a table".into(),
                rationale: "Families plan weekends ahead".into(),
            },
            evaluation(Rubric::Email, 18),
        ),
        social: vec![
            SocialOutcome::Evaluated {
                index: 0,
                scored: ScoredArtifact::new(
                    post("Instagram", "Stacks on stacks."),
                    evaluation(Rubric::Social, 21),
                ),
            },
            SocialOutcome::Gap {
                index: 1,
                post: post("Facebook", "Bring the whole crew."),
                reason: "contract violated on all 3 attempts".into(),
            },
        ],
        states,
    }
}
