//! Prompt content for each stage.
//!
//! A [`PromptBook`] is pure data: every method maps stage inputs plus the
//! contract's format instructions to a [`Prompt`]. The pipeline never looks
//! inside the text.

use campaignsmith_shared::{BlogPost, CampaignBrief, EmailDraft, Idea, SocialPost};

use crate::stage::Prompt;

pub trait PromptBook: Send + Sync {
    fn ideas(&self, min: usize, max: usize, instructions: &str) -> Prompt;
    fn idea_evaluation(&self, ideas: &[Idea], instructions: &str) -> Prompt;
    fn blog(&self, idea: &Idea, instructions: &str) -> Prompt;
    fn blog_evaluation(&self, post: &BlogPost, instructions: &str) -> Prompt;
    fn email(&self, idea: &Idea, blog: &BlogPost, instructions: &str) -> Prompt;
    fn email_evaluation(&self, email: &EmailDraft, instructions: &str) -> Prompt;
    fn social(
        &self,
        idea: &Idea,
        blog: &BlogPost,
        email: &EmailDraft,
        count: usize,
        instructions: &str,
    ) -> Prompt;
    fn social_evaluation(&self, post: &SocialPost, instructions: &str) -> Prompt;
}

// ---------------------------------------------------------------------------
// BrunchPromptBook
// ---------------------------------------------------------------------------

/// Default copy, written for a neighbourhood brunch restaurant but driven by
/// whatever [`CampaignBrief`] it is given.
#[derive(Debug, Clone, Default)]
pub struct BrunchPromptBook {
    brief: CampaignBrief,
}

impl BrunchPromptBook {
    pub fn new(brief: CampaignBrief) -> Self {
        Self { brief }
    }

    pub fn brief(&self) -> &CampaignBrief {
        &self.brief
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bulleted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn idea_block(idea: &Idea) -> String {
    format!(
        "<idea>\nName: {}\nAudience: {}\nCampaign Message: {}\nConcept: {}\n</idea>",
        idea.name, idea.audience, idea.message, idea.concept
    )
}

fn blog_block(blog: &BlogPost) -> String {
    format!(
        "<blog_post>\nTitle: {}\nExcerpt: {}\nContent: {}\nKeywords: {}\n</blog_post>",
        blog.title,
        blog.excerpt,
        blog.content,
        blog.keywords.join(", ")
    )
}

impl PromptBook for BrunchPromptBook {
    fn ideas(&self, min: usize, max: usize, instructions: &str) -> Prompt {
        let user = format!(
            "You are an expert marketing agent helping a client design a creative and targeted \
             marketing campaign. Generate {min}-{max} campaign ideas that highlight the value of \
             the offerings and appeal to the specific interests of the audience segments.\n\n\
             Client: {client}\n\n\
             Product offerings to highlight:\n{offerings}\n\n\
             Target audience:\n{audiences}\n\n\
             Output:\n\
             - Between {min} and {max} specific campaign ideas\n\
             - Each idea has a name, the audience it targets, a campaign message, and a 2-3 sentence concept\n\
             - Tailor each idea to one or more of the audience segments\n\
             - Highlight value, experience, or emotional appeal\n\n\
             {instructions}",
            client = self.brief.client,
            offerings = numbered(&self.brief.offerings),
            audiences = bulleted(&self.brief.audiences),
        );
        Prompt::new("You are a helpful social media marketing agent.", user)
    }

    fn idea_evaluation(&self, ideas: &[Idea], instructions: &str) -> Prompt {
        let listed = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| {
                format!(
                    "Idea {}:\nName: {}\nAudience: {}\nMessage: {}\nConcept: {}",
                    i + 1,
                    idea.name,
                    idea.audience,
                    idea.message,
                    idea.concept
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "You are a senior marketing strategist evaluating proposed campaign ideas for this \
             client: {client}\n\n\
             Evaluate each idea on the following criteria (score from 0-5):\n\
             - audience_fit: Does it match the needs or preferences of the specified audience?\n\
             - clarity: Is the idea easy to understand and well-articulated?\n\
             - creativity: How original or compelling is the campaign concept?\n\
             - channel_suitability: Does the concept fit real-world marketing channels (e.g., Instagram, flyers, email)?\n\n\
             Also include brief comments on the strengths or weaknesses of each idea.\n\
             Return exactly {count} evaluations, one per idea, in the same order as the ideas.\n\n\
             Here are the proposed ideas to review:\n\n{listed}\n\n{instructions}",
            client = self.brief.client,
            count = ideas.len(),
        );
        Prompt::new("You are a helpful social media marketing agent.", user)
    }

    fn blog(&self, idea: &Idea, instructions: &str) -> Prompt {
        let user = format!(
            "You are a content marketer creating a blog post for this client: {client}\n\
             Write an SEO-optimized blog post based on the following campaign idea:\n\n\
             {idea}\n\n\
             Optimize the post for:\n\
             - Search engine visibility: use high-intent keywords naturally throughout.\n\
             - Click-through rate: title and excerpt should be emotionally compelling, clear, and benefit-driven.\n\
             - Engagement: structure the content with subheadings, short paragraphs, and a clear flow.\n\
             - Audience fit: match the tone to the specified audience.\n\n\
             Output format:\n{instructions}\n\n\
             Success means the title is both SEO-relevant and emotionally appealing, the excerpt \
             makes a reader want to click through, and the keywords are well targeted to local diners.",
            client = self.brief.client,
            idea = idea_block(idea),
        );
        Prompt::new("You are a helpful assistant.", user)
    }

    fn blog_evaluation(&self, post: &BlogPost, instructions: &str) -> Prompt {
        let user = format!(
            "You are a senior SEO content editor evaluating a blog post for this client: {client}\n\n\
             Evaluate the post on these criteria (0-5 scale):\n\
             - seo_optimization: Are relevant keywords used naturally? Are the title and excerpt search-friendly?\n\
             - clickability: Do the title and excerpt compel users to click?\n\
             - readability: Is the post well-structured with headings and short paragraphs?\n\
             - audience_fit: Is the tone tailored to the intended audience?\n\
             - content_quality: Is it engaging, informative, and clear?\n\n\
             Also provide 2-3 sentences of comments on strengths and areas for improvement.\n\n\
             Blog post to evaluate:\n\
             Title: {title}\nSlug: {slug}\nExcerpt: {excerpt}\nContent: {content}\nKeywords: {keywords}\n\n\
             {instructions}",
            client = self.brief.client,
            title = post.title,
            slug = post.slug,
            excerpt = post.excerpt,
            content = post.content,
            keywords = post.keywords.join(", "),
        );
        Prompt::new("You are a helpful evaluator of marketing content.", user)
    }

    fn email(&self, idea: &Idea, blog: &BlogPost, instructions: &str) -> Prompt {
        let user = format!(
            "You are an email marketing expert creating a launch email for a new campaign.\n\n\
             You are provided with:\n{idea}\n\n{blog}\n\n\
             Write a short, emotionally engaging email blast targeted at the given audience. It should:\n\
             - Grab attention in the subject line and preview text\n\
             - Use a warm, persuasive tone that matches the audience\n\
             - Summarize the blog post clearly and concisely\n\
             - Lead to a strong call to action\n\
             - Read well on both desktop and mobile\n\n\
             In the rationale, explain why this call to action was chosen for this audience and \
             what behavioural response is expected.\n\n{instructions}",
            idea = idea_block(idea),
            blog = blog_block(blog),
        );
        Prompt::new("You are a skilled marketing copywriter and strategist.", user)
    }

    fn email_evaluation(&self, email: &EmailDraft, instructions: &str) -> Prompt {
        let user = format!(
            "You are a senior email marketing strategist evaluating a marketing email blast.\n\n\
             Evaluate the email on these criteria (0-5 scale):\n\
             - subject_effectiveness: Is the subject line likely to drive opens?\n\
             - preview_quality: Does the preview text complement the subject and generate curiosity?\n\
             - message_clarity: Is the message clear, persuasive, and well-structured?\n\
             - cta_strength: Is the call to action obvious, relevant, and likely to convert?\n\
             - tone_fit: Does the tone match the target audience and campaign intent?\n\n\
             Also provide 2-3 sentences of overall comments.\n\n\
             Here is the email to evaluate:\n\
             Subject: {subject}\nPreview: {preview}\nBody: {body}\nCall to Action: {cta}\nRationale: {rationale}\n\n\
             {instructions}",
            subject = email.subject,
            preview = email.preview,
            body = email.body,
            cta = email.call_to_action,
            rationale = email.rationale,
        );
        Prompt::new("You are a helpful evaluator of email marketing content.", user)
    }

    fn social(
        &self,
        idea: &Idea,
        blog: &BlogPost,
        email: &EmailDraft,
        count: usize,
        instructions: &str,
    ) -> Prompt {
        let user = format!(
            "You are a social media strategist creating platform-specific posts for this client: {client}\n\n\
             You are given:\n{idea}\n\n{blog}\n\n\
             <email_blast>\nSubject: {subject}\nPreview: {preview}\nBody: {body}\nCall to Action: {cta}\n</email_blast>\n\n\
             Create {count} social media posts that are:\n\
             - Optimized for either Facebook or Instagram\n\
             - Tailored to the campaign audience\n\
             - Emotionally compelling, easy to skim, and visually suggestive\n\
             - Short enough for quick consumption\n\
             - Tagged with relevant, popular hashtags\n\
             - Labelled with the intended ad targeting audience (e.g., families with kids, health-conscious millennials)\n\n\
             Output format:\n{instructions}",
            client = self.brief.client,
            idea = idea_block(idea),
            blog = blog_block(blog),
            subject = email.subject,
            preview = email.preview,
            body = email.body,
            cta = email.call_to_action,
        );
        Prompt::new("You are a creative social media strategist.", user)
    }

    fn social_evaluation(&self, post: &SocialPost, instructions: &str) -> Prompt {
        let user = format!(
            "You are a social media marketing expert evaluating a post for a campaign.\n\n\
             Rate the post on a 0-5 scale for each criterion:\n\
             - platform_fit: Does it suit the norms of the target platform?\n\
             - audience_alignment: Do the tone, message, and offer resonate with the specified audience?\n\
             - engagement_potential: Is it likely to attract likes, comments, shares, or clicks?\n\
             - hashtag_relevance: Are the hashtags appropriate, effective, and not overused?\n\
             - clarity_and_appeal: Is the message understandable and emotionally appealing?\n\n\
             Also provide a few sentences of feedback on what works and what could improve.\n\n\
             Here is the post:\n\
             Platform: {platform}\nContent: {content}\nHashtags: {hashtags}\nTargeting Audience: {audience}\n\n\
             {instructions}",
            platform = post.platform,
            content = post.content,
            hashtags = post.hashtags.join(", "),
            audience = post.intended_audience,
        );
        Prompt::new("You are a helpful evaluator of social media content.", user)
    }
}
