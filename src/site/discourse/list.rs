//! Topic-list scraping.

use tracing::{debug, info};

use crate::browser::PageDriver;
use crate::error::Result;
use crate::model::{RawTopic, Topic};
use crate::site::ListKind;

use super::{DiscourseSite, RENDER_DELAY, TOPIC_ROWS};

/// Walks all topic rows and pulls the structured fields out of each, up to
/// the given limit. Rows without both a title and a link are dropped by the
/// caller. Kept as one script so the extraction happens against a consistent
/// DOM snapshot.
const EXTRACT_TOPICS: &str = r"(limit) => {
    const topics = [];
    const rows = document.querySelectorAll('.topic-list-item, [data-topic-id]');

    rows.forEach((el, idx) => {
        if (idx >= limit) return;

        const titleEl = el.querySelector('.title a, .topic-title a, a.title');
        const title = titleEl ? titleEl.textContent.trim() : '';
        const link = titleEl ? titleEl.getAttribute('href') : '';

        const authorEl = el.querySelector('.topic-poster a, .author a');
        const author = authorEl
            ? authorEl.getAttribute('data-user-card') || authorEl.textContent.trim()
            : '';

        const repliesEl = el.querySelector('.posts, .num.posts');
        const replies = repliesEl ? repliesEl.textContent.trim() : '0';

        const viewsEl = el.querySelector('.views, .num.views');
        const views = viewsEl ? viewsEl.textContent.trim() : '0';

        const activityEl = el.querySelector('.age.activity a, time');
        const lastActivity = activityEl
            ? activityEl.getAttribute('title') || activityEl.textContent.trim()
            : '';

        const categoryEl = el.querySelector('.category, .badge-category');
        const category = categoryEl ? categoryEl.textContent.trim() : '';

        if (title && link) {
            topics.push({ title, link, author, replies, views, lastActivity, category });
        }
    });

    return topics;
}";

const SCROLL_TO_BOTTOM: &str = r"() => { window.scrollTo(0, document.body.scrollHeight); }";

/// Fetch one list page and extract its rows in DOM order.
///
/// # Errors
///
/// Returns an error when the navigation or the extraction evaluate fails;
/// an empty list is a valid success.
pub(super) async fn fetch_list(
    site: &DiscourseSite,
    page: &dyn PageDriver,
    kind: &ListKind,
    limit: usize,
) -> Result<Vec<Topic>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let url = format!("{}{}", site.base_url, kind.path());
    debug!(url = %url, list = %kind.label(), "fetching topic list");
    page.navigate(&url, site.page_timeout).await?;
    tokio::time::sleep(RENDER_DELAY).await;

    if site.scroll.enabled {
        scroll_to_load(site, page, limit).await?;
    }

    let value = page
        .evaluate(EXTRACT_TOPICS, serde_json::json!(limit))
        .await?;
    let rows: Vec<RawTopic> = serde_json::from_value(value).unwrap_or_default();
    let topics: Vec<Topic> = rows.into_iter().filter_map(Topic::from_raw).collect();

    info!(list = %kind.label(), count = topics.len(), "topic list fetched");
    Ok(topics)
}

/// Scroll-to-bottom loop for infinite-scroll list pages. Stops early once
/// enough rows are loaded.
async fn scroll_to_load(site: &DiscourseSite, page: &dyn PageDriver, limit: usize) -> Result<()> {
    for iteration in 0..site.scroll.times {
        page.evaluate(SCROLL_TO_BOTTOM, serde_json::Value::Null)
            .await?;
        tokio::time::sleep(site.scroll.interval).await;

        let loaded = page.query_count(&TOPIC_ROWS).await?;
        debug!(iteration, loaded, "scrolled list page");
        if loaded >= limit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::model::{RawTopic, Topic};

    #[test]
    fn test_rows_deserialize_from_script_output() {
        let payload = serde_json::json!([
            {
                "title": "Tuning zram on small VPSes",
                "link": "/t/tuning-zram/101",
                "author": "mira",
                "replies": "1.2k",
                "views": "30.1k",
                "lastActivity": "2026-08-01",
                "category": "Linux"
            },
            {
                "title": "",
                "link": "/t/untitled/102"
            }
        ]);
        let rows: Vec<RawTopic> = serde_json::from_value(payload).unwrap();
        assert_eq!(rows.len(), 2);

        let topics: Vec<Topic> = rows.into_iter().filter_map(Topic::from_raw).collect();
        // The untitled row is dropped.
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].replies, "1.2k");
        assert_eq!(topics[0].category, "Linux");
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let payload = serde_json::json!([
            { "title": "t", "link": "/t/t/1", "author": "a" }
        ]);
        let rows: Vec<RawTopic> = serde_json::from_value(payload).unwrap();
        assert_eq!(rows[0].replies, "0");
        assert_eq!(rows[0].views, "0");
    }
}
