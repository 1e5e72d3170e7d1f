//! Readable Markdown rendering of a [`CampaignReport`].

use std::fmt::Write;

use campaignsmith_shared::{CampaignReport, Evaluation, ScoredArtifact, SocialOutcome};

/// Render the whole campaign as one Markdown document.
pub fn render_markdown(report: &CampaignReport) -> String {
    let mut out = String::new();
    let idea = report.idea.artifact();

    let _ = writeln!(out, "# Campaign: {}\n", idea.name);
    let _ = writeln!(
        out,
        "Run `{}`, generated {}.\n",
        report.run_id,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    // Idea
    let _ = writeln!(out, "## Selected idea {}\n", score_badge(&report.idea));
    let _ = writeln!(out, "- **Audience:** {}", idea.audience);
    let _ = writeln!(out, "- **Message:** {}", idea.message);
    let _ = writeln!(out, "- **Concept:** {}\n", idea.concept);
    write_scores(&mut out, report.idea.evaluation());

    let _ = writeln!(out, "### Idea pool\n");
    let _ = writeln!(out, "| Rank | Idea | Score |");
    let _ = writeln!(out, "|---|---|---|");
    for (rank, candidate) in report.idea_pool.iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            rank + 1,
            candidate.artifact().name,
            candidate.total_score()
        );
    }
    out.push('\n');

    // Blog
    let blog = report.blog.artifact();
    let _ = writeln!(out, "## Blog post {}\n", score_badge(&report.blog));
    let _ = writeln!(out, "**{}** (`/{}`)\n", blog.title, blog.slug);
    let _ = writeln!(out, "> {}\n", blog.excerpt);
    let _ = writeln!(out, "{}\n", blog.content.trim_end());
    if !blog.keywords.is_empty() {
        let _ = writeln!(out, "Keywords: {}\n", blog.keywords.join(", "));
    }
    write_scores(&mut out, report.blog.evaluation());

    // Email
    let email = report.email.artifact();
    let _ = writeln!(out, "## Launch email {}\n", score_badge(&report.email));
    let _ = writeln!(out, "- **Subject:** {}", email.subject);
    let _ = writeln!(out, "- **Preview:** {}", email.preview);
    let _ = writeln!(out, "- **Call to action:** {}\n", email.call_to_action);
    let _ = writeln!(out, "{}\n", email.body.trim_end());
    let _ = writeln!(out, "_Why this call to action:_ {}\n", email.rationale);
    write_scores(&mut out, report.email.evaluation());

    // Social
    let gaps = report.gaps().len();
    let _ = writeln!(
        out,
        "## Social posts ({} drafted, {} evaluated)\n",
        report.social.len(),
        report.social.len() - gaps
    );
    for outcome in &report.social {
        let post = outcome.post();
        match outcome {
            SocialOutcome::Evaluated { index, scored } => {
                let badge = score_badge(scored);
                let _ = writeln!(out, "### {}. {} {badge}\n", index + 1, post.platform);
            }
            SocialOutcome::Gap { index, .. } => {
                let _ = writeln!(out, "### {}. {} (not evaluated)\n", index + 1, post.platform);
            }
        }
        let _ = writeln!(out, "{}\n", post.content.trim_end());
        if !post.hashtags.is_empty() {
            let _ = writeln!(out, "{}\n", post.hashtags.join(" "));
        }
        let _ = writeln!(out, "Audience: {}\n", post.intended_audience);
        match outcome {
            SocialOutcome::Evaluated { scored, .. } => write_scores(&mut out, scored.evaluation()),
            SocialOutcome::Gap { reason, .. } => {
                let _ = writeln!(out, "> **Evaluation gap:** {reason}\n");
            }
        }
    }

    out
}

fn score_badge<A>(scored: &ScoredArtifact<A>) -> String {
    format!(
        "({}/{})",
        scored.total_score(),
        scored.evaluation().rubric().max_total()
    )
}

fn write_scores(out: &mut String, evaluation: &Evaluation) {
    let _ = writeln!(out, "| Dimension | Score |");
    let _ = writeln!(out, "|---|---|");
    for (dimension, score) in evaluation.scores() {
        let _ = writeln!(out, "| {} | {score} |", dimension.replace('_', " "));
    }
    out.push('\n');
    if !evaluation.comments().trim().is_empty() {
        let _ = writeln!(out, "_{}_\n", evaluation.comments().trim());
    }
}
