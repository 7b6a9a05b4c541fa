//! Prompt building, response parsing, and the deterministic fallbacks.
//!
//! The analyzer never blocks the pipeline on AI availability: a missing
//! client, a short body, a failed call or an unparseable response all resolve
//! to the truncation summary or the engagement ranking.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ai::CompletionClient;
use crate::model::{Recommendation, Topic, TopicAnalysis, UserProfile};
use crate::pipeline::quality::parse_engagement;

/// Bodies shorter than this go straight to the truncation fallback; there is
/// nothing for a model to summarize.
const MIN_BODY_CHARS: usize = 100;

/// How much body text is embedded into the summary prompt.
const PROMPT_BODY_CHARS: usize = 2000;

/// How many topics are embedded into the recommendation prompt.
const PROMPT_TOPIC_LIMIT: usize = 20;

/// Length of the truncation-fallback summary.
const FALLBACK_SUMMARY_CHARS: usize = 150;

/// Recommendations at or below this relevance are dropped.
const MIN_RELEVANCE: f64 = 60.0;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a precise content analyst. You distill forum posts into structured \
     summaries and identify their key information.";

const RECOMMEND_SYSTEM_PROMPT: &str =
    "You are a content recommendation expert. You analyze a user's interests and \
     rank forum topics by how relevant and valuable they are to that user.";

/// First `{...}` block in a completion, tolerant of surrounding prose.
static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));

/// First `[...]` block in a completion.
static JSON_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));

pub struct Analyzer {
    client: Option<Arc<dyn CompletionClient>>,
    temperature: f32,
    max_tokens: u32,
}

impl Analyzer {
    #[must_use]
    pub fn new(client: Option<Arc<dyn CompletionClient>>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            temperature,
            max_tokens,
        }
    }

    /// Analyzer with no completion capability; every call takes the fallback.
    #[must_use]
    pub fn without_ai() -> Self {
        Self::new(None, 0.7, 800)
    }

    #[must_use]
    pub fn ai_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Summarize one topic body. Infallible: any AI problem resolves to the
    /// truncation summary.
    pub async fn summarize(&self, topic: &Topic, body: &str) -> TopicAnalysis {
        let Some(ref client) = self.client else {
            return fallback_summary(body);
        };
        if body.chars().count() < MIN_BODY_CHARS {
            debug!(link = %topic.link, "body too short for AI summary, using fallback");
            return fallback_summary(body);
        }

        let prompt = summary_prompt(topic, body);
        match client
            .complete(SUMMARY_SYSTEM_PROMPT, &prompt, self.temperature, self.max_tokens)
            .await
        {
            Ok(text) => parse_analysis(&text).unwrap_or_else(|| {
                warn!(link = %topic.link, "AI summary response unparseable, using fallback");
                fallback_summary(body)
            }),
            Err(e) => {
                warn!(link = %topic.link, "AI summary failed: {e}");
                fallback_summary(body)
            }
        }
    }

    /// Rank topics by predicted interest, most relevant first. Infallible:
    /// any AI problem resolves to the engagement ranking.
    pub async fn recommend(&self, topics: &[Topic], profile: Option<&UserProfile>) -> Vec<Topic> {
        if topics.is_empty() {
            return Vec::new();
        }
        let Some(ref client) = self.client else {
            return fallback_ranking(topics);
        };

        let prompt = recommend_prompt(topics, profile);
        match client
            .complete(RECOMMEND_SYSTEM_PROMPT, &prompt, 0.5, self.max_tokens)
            .await
        {
            Ok(text) => parse_recommendations(&text, topics).unwrap_or_else(|| {
                warn!("AI recommendation response unparseable, using engagement ranking");
                fallback_ranking(topics)
            }),
            Err(e) => {
                warn!("AI recommendation failed: {e}");
                fallback_ranking(topics)
            }
        }
    }
}

fn summary_prompt(topic: &Topic, body: &str) -> String {
    let excerpt: String = body.chars().take(PROMPT_BODY_CHARS).collect();
    format!(
        "Analyze this forum topic and provide a structured summary.\n\n\
         Title: {title}\n\
         Author: {author}\n\
         Category: {category}\n\
         Replies: {replies}\n\
         Views: {views}\n\n\
         Content:\n{excerpt}\n\n\
         Respond with a JSON object containing exactly these fields:\n\
         {{\n\
           \"summary\": \"one-sentence summary (under 50 words)\",\n\
           \"key_points\": [\"point 1\", \"point 2\", \"point 3\"],\n\
           \"tags\": [\"tag1\", \"tag2\", \"tag3\"],\n\
           \"sentiment\": \"positive/neutral/negative\"\n\
         }}",
        title = topic.title,
        author = topic.author,
        category = topic.category,
        replies = topic.replies,
        views = topic.views,
    )
}

fn recommend_prompt(topics: &[Topic], profile: Option<&UserProfile>) -> String {
    let listing = topics
        .iter()
        .take(PROMPT_TOPIC_LIMIT)
        .enumerate()
        .map(|(i, t)| {
            let excerpt: String = t
                .content
                .as_ref()
                .map(|c| c.first_post.chars().take(200).collect())
                .unwrap_or_default();
            format!(
                "{n}. [{category}] {title}\n   Author: {author} | Replies: {replies} | Views: {views}\n   Excerpt: {excerpt}",
                n = i + 1,
                category = t.category,
                title = t.title,
                author = t.author,
                replies = t.replies,
                views = t.views,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let profile_text = profile
        .and_then(|p| serde_json::to_string(p).ok())
        .map(|json| format!("\nUser interest profile: {json}\n"))
        .unwrap_or_default();

    format!(
        "Rank the following forum topics by relevance and value for the user.\n\
         {profile_text}\n\
         Topics:\n{listing}\n\n\
         Respond with a JSON array where each entry is:\n\
         {{\n\
           \"index\": topic number starting at 1,\n\
           \"relevance_score\": 0-100,\n\
           \"reason\": \"why this is relevant (under 30 words)\",\n\
           \"tags\": [\"keyword1\", \"keyword2\"]\n\
         }}\n\n\
         Only include topics with relevance_score above 60, ordered by score descending."
    )
}

/// Pull the first JSON object out of a completion. The parsed value is
/// untrusted: missing fields default rather than erroring.
fn parse_analysis(text: &str) -> Option<TopicAnalysis> {
    let block = JSON_OBJECT.find(text)?.as_str();
    serde_json::from_str::<TopicAnalysis>(block).ok()
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    #[serde(default)]
    index: i64,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Pull the recommendation array out of a completion and resolve entries
/// against the input list. Indices are untrusted and bounds-checked; entries
/// at or below the relevance floor are dropped. The surviving entries are
/// re-sorted by score (stable) rather than trusting the model's ordering.
fn parse_recommendations(text: &str, topics: &[Topic]) -> Option<Vec<Topic>> {
    let block = JSON_ARRAY.find(text)?.as_str();
    let raw: Vec<RawRecommendation> = serde_json::from_str(block).ok()?;

    let mut ranked: Vec<Topic> = raw
        .into_iter()
        .filter(|rec| rec.relevance_score > MIN_RELEVANCE)
        .filter_map(|rec| {
            let index = usize::try_from(rec.index).ok()?.checked_sub(1)?;
            let topic = topics.get(index)?;
            let mut topic = topic.clone();
            topic.recommendation = Some(Recommendation {
                relevance_score: rec.relevance_score,
                reason: rec.reason,
                tags: rec.tags,
            });
            Some(topic)
        })
        .collect();

    ranked.sort_by(|a, b| {
        let score_a = a.recommendation.as_ref().map_or(0.0, |r| r.relevance_score);
        let score_b = b.recommendation.as_ref().map_or(0.0, |r| r.relevance_score);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Some(ranked)
}

/// Truncation-based summary used whenever AI is unavailable.
fn fallback_summary(body: &str) -> TopicAnalysis {
    let chars = body.chars().count();
    let summary = if chars > FALLBACK_SUMMARY_CHARS {
        let mut s: String = body.chars().take(FALLBACK_SUMMARY_CHARS).collect();
        s.push_str("...");
        s
    } else {
        body.to_string()
    };
    TopicAnalysis {
        summary,
        ..TopicAnalysis::default()
    }
}

/// Engagement ranking used whenever AI is unavailable: replies weighted
/// double, synthetic scores descending from 100 with a floor of 50.
fn fallback_ranking(topics: &[Topic]) -> Vec<Topic> {
    let mut ranked: Vec<Topic> = topics.to_vec();
    ranked.sort_by_key(|t| {
        let replies = parse_engagement(&t.replies);
        let views = parse_engagement(&t.views);
        std::cmp::Reverse(replies.saturating_mul(2).saturating_add(views))
    });

    for (i, topic) in ranked.iter_mut().enumerate() {
        let score = 100_i64 - i64::try_from(i).unwrap_or(i64::MAX) * 5;
        topic.recommendation = Some(Recommendation {
            relevance_score: score.max(50) as f64,
            reason: format!("Engagement rank #{}", i + 1),
            tags: vec![topic.category.clone()],
        });
    }
    ranked
}
