//! Human-readable digest assembly for one account's run.

use crate::model::{RunDetails, Topic};

const RULE: &str = "============================================================";

/// Render the run's findings as the digest text stored in
/// `RunDetails::summary`, consumed by the reporting collaborator.
#[must_use]
pub fn generate_digest(base_url: &str, details: &RunDetails) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(RULE.to_string());
    lines.push("Forum digest".to_string());
    lines.push(RULE.to_string());

    if !details.recommended_topics.is_empty() {
        lines.push(String::new());
        lines.push("== Recommended for you ==".to_string());
        for (i, topic) in details.recommended_topics.iter().take(5).enumerate() {
            let (score, reason, tags) = topic.recommendation.as_ref().map_or(
                (0.0, "popular topic".to_string(), Vec::new()),
                |rec| (rec.relevance_score, rec.reason.clone(), rec.tags.clone()),
            );
            lines.push(String::new());
            lines.push(format!("{}. {}", i + 1, topic.title));
            lines.push(format!(
                "   relevance {score:.0}% | replies {} | views {}",
                topic.replies, topic.views
            ));
            lines.push(format!("   why: {reason}"));
            if !tags.is_empty() {
                lines.push(format!("   tags: {}", tags.join(", ")));
            }
            lines.push(format!("   {}", topic_url(base_url, topic)));
        }
    }

    if !details.ai_summaries.is_empty() {
        lines.push(String::new());
        lines.push("== AI analysis ==".to_string());
        for (i, topic) in details.ai_summaries.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("{}. {}", i + 1, topic.title));
            lines.push(format!(
                "   by {} in {}",
                topic.author, topic.category
            ));
            if let Some(ref analysis) = topic.ai_summary {
                if !analysis.summary.is_empty() {
                    lines.push(format!("   summary: {}", analysis.summary));
                }
                for point in analysis.key_points.iter().take(3) {
                    lines.push(format!("   - {point}"));
                }
                if !analysis.tags.is_empty() {
                    lines.push(format!("   tags: {}", analysis.tags.join(", ")));
                }
                lines.push(format!("   sentiment: {}", analysis.sentiment));
            }
            lines.push(format!("   {}", topic_url(base_url, topic)));
        }
    }

    push_list_section(&mut lines, base_url, "== Latest topics ==", &details.latest_topics);
    push_list_section(&mut lines, base_url, "== Hot topics ==", &details.hot_topics);

    lines.push(String::new());
    lines.push(RULE.to_string());
    lines.push(format!(
        "{} topics analyzed, {} recommended, {} AI summaries",
        details.latest_topics.len() + details.hot_topics.len() + details.category_topics.len(),
        details.recommended_topics.len().min(5),
        details.ai_summaries.len()
    ));
    lines.push(RULE.to_string());

    lines.join("\n")
}

fn push_list_section(lines: &mut Vec<String>, base_url: &str, heading: &str, topics: &[Topic]) {
    if topics.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(heading.to_string());
    for (i, topic) in topics.iter().take(10).enumerate() {
        lines.push(format!(
            "{}. {} ({} | replies {} | views {})",
            i + 1,
            topic.title,
            topic.category,
            topic.replies,
            topic.views
        ));
        lines.push(format!("   {}", topic_url(base_url, topic)));
    }
}

fn topic_url(base_url: &str, topic: &Topic) -> String {
    format!("{base_url}{}", topic.link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawTopic, Recommendation};

    fn topic(title: &str, link: &str) -> Topic {
        Topic::from_raw(RawTopic {
            title: title.to_string(),
            link: link.to_string(),
            author: "ada".to_string(),
            replies: "5".to_string(),
            views: "200".to_string(),
            last_activity: String::new(),
            category: "Linux".to_string(),
        })
        .expect("complete row")
    }

    #[test]
    fn test_digest_contains_sections_and_absolute_links() {
        let mut recommended = topic("great topic", "/t/great/1");
        recommended.recommendation = Some(Recommendation {
            relevance_score: 88.0,
            reason: "matches your interests".to_string(),
            tags: vec!["linux".to_string()],
        });
        let details = RunDetails {
            latest_topics: vec![topic("latest one", "/t/latest/2")],
            hot_topics: vec![topic("hot one", "/t/hot/3")],
            recommended_topics: vec![recommended],
            ..RunDetails::default()
        };

        let digest = generate_digest("https://forum.example.com", &details);
        assert!(digest.contains("== Recommended for you =="));
        assert!(digest.contains("== Latest topics =="));
        assert!(digest.contains("== Hot topics =="));
        assert!(digest.contains("https://forum.example.com/t/great/1"));
        assert!(digest.contains("matches your interests"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let digest = generate_digest("https://forum.example.com", &RunDetails::default());
        assert!(!digest.contains("== Latest topics =="));
        assert!(!digest.contains("== Recommended for you =="));
    }
}
