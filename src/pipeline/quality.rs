//! Rule-based exclusion and composite quality scoring.

use tracing::{debug, info};

use crate::model::Topic;

/// Exclusion rules and scoring inputs.
#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub exclude_categories: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub priority_categories: Vec<String>,
    pub user_interests: Vec<String>,
    pub min_replies: u64,
    pub min_views: u64,
    pub min_views_for_zero_replies: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            exclude_categories: Vec::new(),
            exclude_keywords: Vec::new(),
            priority_categories: Vec::new(),
            user_interests: Vec::new(),
            min_replies: 1,
            min_views: 30,
            min_views_for_zero_replies: 50,
        }
    }
}

/// Parse a unit-suffixed engagement count.
///
/// `"1.2k"` parses to 1200, `"3万"` to 30000, plain integers as-is; anything
/// unparseable is 0.
#[must_use]
pub fn parse_engagement(raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    // CJK ten-thousand suffix used by some Discourse locales.
    if let Some(prefix) = raw.strip_suffix('万') {
        return scaled(prefix, 10_000.0);
    }
    if let Some(prefix) = raw.strip_suffix('k').or_else(|| raw.strip_suffix('K')) {
        return scaled(prefix, 1_000.0);
    }
    raw.replace(',', "").parse::<u64>().unwrap_or(0)
}

fn scaled(prefix: &str, factor: f64) -> u64 {
    prefix
        .trim()
        .parse::<f64>()
        .map(|v| (v * factor).round())
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map_or(0, |v| v as u64)
}

/// Composite 0–100ish score plus the priority flag.
///
/// heat caps at 40, interaction at 20, category affinity adds 20/10/0 and
/// interest matches add up to 20. The interaction term's double percentage
/// scaling is intentional; downstream thresholds are tuned to it.
#[must_use]
pub fn score_topic(topic: &Topic, config: &QualityConfig) -> (f64, bool) {
    let replies = parse_engagement(&topic.replies);
    let views = parse_engagement(&topic.views);

    let heat = 40.0_f64
        .min(10.0 * ((replies + 1) as f64).log10() + 3.0 * ((views + 1) as f64).log10());

    let interaction = 20.0_f64.min((replies as f64 / views.max(1) as f64) * 100.0 * 100.0);

    let title_lower = topic.title.to_lowercase();
    let category_lower = topic.category.to_lowercase();
    let category_bonus = if config
        .priority_categories
        .iter()
        .any(|c| c == &topic.category)
    {
        20.0
    } else if config.priority_categories.iter().any(|c| {
        let c = c.to_lowercase();
        category_lower.contains(&c) || title_lower.contains(&c)
    }) {
        10.0
    } else {
        0.0
    };

    let haystack = format!("{title_lower} {category_lower}");
    let interest_hits = config
        .user_interests
        .iter()
        .filter(|interest| haystack.contains(&interest.to_lowercase()))
        .count();
    let interest_bonus = 20.0_f64.min(10.0 * interest_hits as f64);

    let score = heat + interaction + category_bonus + interest_bonus;
    (score, category_bonus > 0.0)
}

/// Apply the exclusion rules, score the survivors, and sort them best-first.
///
/// Exclusion order: category blocklist, title keyword blocklist, the
/// zero-replies/low-views rule, then the joint low-engagement rule (both
/// counts must be below their thresholds; an OR would exclude far too
/// aggressively). The sort is stable, so ties keep their input order.
#[must_use]
pub fn filter_topics(topics: Vec<Topic>, config: &QualityConfig) -> Vec<Topic> {
    let total = topics.len();
    let mut kept: Vec<Topic> = topics
        .into_iter()
        .filter(|topic| {
            if config.exclude_categories.contains(&topic.category) {
                debug!(title = %topic.title, category = %topic.category, "excluded category");
                return false;
            }
            if config
                .exclude_keywords
                .iter()
                .any(|kw| topic.title.contains(kw))
            {
                debug!(title = %topic.title, "excluded keyword");
                return false;
            }

            let replies = parse_engagement(&topic.replies);
            let views = parse_engagement(&topic.views);
            if replies == 0 && views < config.min_views_for_zero_replies {
                debug!(title = %topic.title, views, "excluded low-quality (no replies)");
                return false;
            }
            if replies < config.min_replies && views < config.min_views {
                debug!(title = %topic.title, replies, views, "excluded low engagement");
                return false;
            }
            true
        })
        .map(|mut topic| {
            let (score, is_priority) = score_topic(&topic, config);
            topic.quality_score = score;
            topic.is_priority = is_priority;
            topic
        })
        .collect();

    kept.sort_by(|a, b| {
        b.quality_score
            .partial_cmp(&a.quality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    info!(total, kept = kept.len(), "quality filter applied");
    kept
}
