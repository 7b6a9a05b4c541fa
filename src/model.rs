//! Core value types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derive the stable identity key for a canonical topic link.
///
/// Used both as `Topic::id` and as the key for the content cache and read
/// history files. 16 hex chars of SHA-256 is plenty for one forum's topic
/// space.
#[must_use]
pub fn link_key(link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// One forum thread as extracted from a topic-list page.
///
/// `link` (the canonical relative path) uniquely identifies a topic within a
/// run; two values with equal `link` are the same logical topic and must be
/// merged, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub author: String,
    pub category: String,
    /// Canonical relative path, e.g. `/t/some-topic/12345`.
    pub link: String,
    /// Raw engagement counts as rendered by the site ("1.2k", "3万", "17").
    pub replies: String,
    pub views: String,
    pub last_activity: String,
    pub quality_score: f64,
    pub is_priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<TopicContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<TopicAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// Topic row as produced by the list-page extraction script.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTopic {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "zero_string")]
    pub replies: String,
    #[serde(default = "zero_string")]
    pub views: String,
    #[serde(default, rename = "lastActivity")]
    pub last_activity: String,
    #[serde(default)]
    pub category: String,
}

fn zero_string() -> String {
    "0".to_string()
}

impl Topic {
    /// Build a `Topic` from an extracted row. Returns `None` for rows missing
    /// either a title or a link.
    #[must_use]
    pub fn from_raw(raw: RawTopic) -> Option<Self> {
        if raw.title.is_empty() || raw.link.is_empty() {
            return None;
        }
        Some(Self {
            id: link_key(&raw.link),
            title: raw.title,
            author: raw.author,
            category: raw.category,
            link: raw.link,
            replies: raw.replies,
            views: raw.views,
            last_activity: raw.last_activity,
            quality_score: 0.0,
            is_priority: false,
            content: None,
            ai_summary: None,
            recommendation: None,
        })
    }
}

/// First-post excerpt attached after the detail fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContent {
    pub first_post: String,
    pub key_points: Vec<String>,
}

impl TopicContent {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_post.is_empty() && self.key_points.is_empty()
    }
}

/// Sentiment label attached to an AI summary. Unknown labels from the model
/// collapse to `Neutral`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    #[serde(other)]
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// Structured AI summary of one topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
}

/// Recommendation metadata attached by the interest ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub relevance_score: f64,
    pub reason: String,
    pub tags: Vec<String>,
}

/// Interest profile handed to the recommendation prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub interests: Vec<String>,
}

/// One forum account. Loaded once per run from the accounts file, never
/// mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Everything one account's run produced, for the reporting collaborator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDetails {
    pub latest_topics: Vec<Topic>,
    pub hot_topics: Vec<Topic>,
    pub category_topics: Vec<Topic>,
    pub topics_with_content: Vec<Topic>,
    pub ai_summaries: Vec<Topic>,
    pub recommended_topics: Vec<Topic>,
    pub summary: String,
}

/// Outcome of one account's run. Exactly one of these is produced per
/// account, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub username: String,
    pub message: String,
    pub details: RunDetails,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    #[must_use]
    pub fn failure(username: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            username: username.to_string(),
            message: message.into(),
            details: RunDetails::default(),
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn success(username: &str, message: impl Into<String>, details: RunDetails) -> Self {
        Self {
            success: true,
            username: username.to_string(),
            message: message.into(),
            details,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_key_stable_and_short() {
        let a = link_key("/t/hello/1");
        let b = link_key("/t/hello/1");
        let c = link_key("/t/hello/2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_from_raw_drops_incomplete_rows() {
        let no_link = RawTopic {
            title: "has title".to_string(),
            link: String::new(),
            author: String::new(),
            replies: "0".to_string(),
            views: "0".to_string(),
            last_activity: String::new(),
            category: String::new(),
        };
        assert!(Topic::from_raw(no_link).is_none());

        let ok = RawTopic {
            title: "t".to_string(),
            link: "/t/t/9".to_string(),
            author: "a".to_string(),
            replies: "3".to_string(),
            views: "40".to_string(),
            last_activity: String::new(),
            category: "Linux".to_string(),
        };
        let topic = Topic::from_raw(ok).expect("complete row");
        assert_eq!(topic.id, link_key("/t/t/9"));
        assert!(!topic.is_priority);
    }

    #[test]
    fn test_sentiment_tolerates_unknown_labels() {
        let s: Sentiment = serde_json::from_str("\"positive\"").unwrap();
        assert_eq!(s, Sentiment::Positive);
        let s: Sentiment = serde_json::from_str("\"enthusiastic\"").unwrap();
        assert_eq!(s, Sentiment::Neutral);
    }
}
