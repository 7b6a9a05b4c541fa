//! First-post extraction for one topic.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::browser::PageDriver;
use crate::error::Result;
use crate::model::TopicContent;

use super::{DiscourseSite, RENDER_DELAY};

/// Delay between extraction attempts. Empty extraction usually means the page
/// had not finished rendering, so a fixed short wait is enough.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Maximum excerpt length in characters.
const EXCERPT_LIMIT: usize = 800;

const MAX_KEY_POINTS: usize = 3;

/// The first post's cooked HTML, or an empty string.
const FIRST_POST_HTML: &str = r"() => {
    const post = document.querySelector(
        '.topic-post:first-of-type .cooked, article.post:first-of-type .cooked, .cooked'
    );
    return post ? post.innerHTML : '';
}";

/// Fetch one topic's first-post excerpt.
///
/// Empty extraction is treated as transient and retried with a fixed delay;
/// once attempts are exhausted an empty [`TopicContent`] is returned rather
/// than an error, since a missing excerpt must not fail the run.
pub(super) async fn fetch_detail(
    site: &DiscourseSite,
    page: &dyn PageDriver,
    link: &str,
) -> Result<TopicContent> {
    let url = format!("{}{link}", site.base_url);
    let attempts = site.detail_max_retries.max(1);

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(RETRY_DELAY).await;
        }

        if let Err(e) = page.navigate(&url, site.page_timeout).await {
            debug!(url = %url, attempt, "detail navigation failed: {e}");
            continue;
        }
        tokio::time::sleep(RENDER_DELAY).await;

        // Same-content redirects (topic slug changes) are fine; just note them.
        let current = page.current_url().await;
        if !current.is_empty() && !current.contains(link) {
            debug!(requested = %url, landed = %current, "topic redirected");
        }

        let html = match page
            .evaluate(FIRST_POST_HTML, serde_json::Value::Null)
            .await
        {
            Ok(value) => value.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                debug!(url = %url, attempt, "first-post evaluate failed: {e}");
                continue;
            }
        };

        let content = sanitize_first_post(&html);
        if !content.first_post.is_empty() {
            debug!(link, chars = content.first_post.chars().count(), "detail fetched");
            return Ok(content);
        }
        debug!(link, attempt, "extracted first post was empty");
    }

    warn!(link, attempts, "no content extracted, returning empty");
    Ok(TopicContent::default())
}

/// Reduce a cooked first post to a plain-text excerpt plus key points.
///
/// Code blocks, quotes and images are stripped before the text is collected;
/// the excerpt is capped at 800 characters. Key points come from the first
/// three list items (10–100 chars), falling back to the first three
/// bold/strong runs (5–100 chars).
#[must_use]
pub fn sanitize_first_post(html: &str) -> TopicContent {
    if html.trim().is_empty() {
        return TopicContent::default();
    }

    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();

    let mut text = String::new();
    collect_text(root, &mut text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let first_post = truncate_chars(&text, EXCERPT_LIMIT);

    let mut key_points = points_from(&fragment, "li", 10, 100);
    if key_points.is_empty() {
        key_points = points_from(&fragment, "strong, b", 5, 100);
    }

    TopicContent {
        first_post,
        key_points,
    }
}

const STRIPPED_ELEMENTS: &[&str] = &["pre", "code", "blockquote", "img", "script", "style"];

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(t) => out.push_str(t),
            scraper::Node::Element(el) => {
                if STRIPPED_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    out.push(' ');
                    collect_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Texts of the first [`MAX_KEY_POINTS`] elements matching `css` whose
/// character count is strictly inside `(min, max)`.
fn points_from(fragment: &Html, css: &str, min: usize, max: usize) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    fragment
        .select(&selector)
        .take(MAX_KEY_POINTS)
        .filter_map(|el| {
            let text = el
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let len = text.chars().count();
            (len > min && len < max).then_some(text)
        })
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_code_quotes_and_images() {
        let html = r#"
            <p>Real content here.</p>
            <pre>fn main() {}</pre>
            <code>inline</code>
            <blockquote>quoted reply text</blockquote>
            <img src="x.png">
            <p>More real content.</p>
        "#;
        let content = sanitize_first_post(html);
        assert!(content.first_post.contains("Real content here."));
        assert!(content.first_post.contains("More real content."));
        assert!(!content.first_post.contains("fn main"));
        assert!(!content.first_post.contains("quoted reply"));
        assert!(!content.first_post.contains("inline"));
    }

    #[test]
    fn test_truncates_long_posts_with_ellipsis() {
        let body = "word ".repeat(400);
        let html = format!("<p>{body}</p>");
        let content = sanitize_first_post(&html);
        assert_eq!(content.first_post.chars().count(), EXCERPT_LIMIT + 3);
        assert!(content.first_post.ends_with("..."));
    }

    #[test]
    fn test_key_points_prefer_list_items() {
        let html = r"
            <ul>
                <li>First important point of the topic</li>
                <li>Second important point of the topic</li>
                <li>no</li>
                <li>Fourth point that is never considered at all</li>
            </ul>
            <strong>Bold fallback text</strong>
        ";
        let content = sanitize_first_post(html);
        // Only the first three list items are considered; too-short ones drop.
        assert_eq!(
            content.key_points,
            vec![
                "First important point of the topic".to_string(),
                "Second important point of the topic".to_string(),
            ]
        );
    }

    #[test]
    fn test_key_points_fall_back_to_bold() {
        let html = r"
            <p>Intro paragraph without lists.</p>
            <p><strong>Key takeaway</strong> and <b>another highlight</b></p>
        ";
        let content = sanitize_first_post(html);
        assert_eq!(
            content.key_points,
            vec!["Key takeaway".to_string(), "another highlight".to_string()]
        );
    }

    #[test]
    fn test_empty_html_gives_empty_content() {
        assert!(sanitize_first_post("").is_empty());
        assert!(sanitize_first_post("   ").is_empty());
    }
}
