//! Merging topic lists from multiple sources into one ranked, unique set.

use std::collections::HashMap;

use crate::model::Topic;

/// Concatenate lists, keep the first occurrence of each distinct link, and
/// re-sort by quality score descending (stable).
///
/// The first-seen instance keeps its metadata; later duplicates only
/// contribute fields that were attached after the first sighting (content,
/// AI summary, recommendation), so a topic fetched via one list never loses
/// work done on its twin from another list.
#[must_use]
pub fn merge_ranked(lists: Vec<Vec<Topic>>) -> Vec<Topic> {
    let mut merged: Vec<Topic> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for topic in lists.into_iter().flatten() {
        match seen.get(&topic.link) {
            Some(&index) => {
                let existing = &mut merged[index];
                if existing.content.is_none() {
                    existing.content = topic.content;
                }
                if existing.ai_summary.is_none() {
                    existing.ai_summary = topic.ai_summary;
                }
                if existing.recommendation.is_none() {
                    existing.recommendation = topic.recommendation;
                }
            }
            None => {
                seen.insert(topic.link.clone(), merged.len());
                merged.push(topic);
            }
        }
    }

    merged.sort_by(|a, b| {
        b.quality_score
            .partial_cmp(&a.quality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged
}
