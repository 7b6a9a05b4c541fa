//! Per-account run orchestration.
//!
//! List scraping is deliberately serial (one request at a time with small
//! pauses); detail fetching and AI analysis run bounded-parallel. Each
//! account owns an exclusive page per in-flight operation, borrowed from the
//! shared browser session and closed on every exit path.

pub mod dedup;
pub mod orchestrator;
pub mod quality;
pub mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tracing::{error, info, warn};

use crate::ai::{Analyzer, CompletionClient};
use crate::browser::BrowserSession;
use crate::browser::PageDriver;
use crate::cache::{ContentCache, ReadHistory};
use crate::config::Config;
use crate::model::{link_key, Account, RunDetails, RunResult, Topic, UserProfile};
use crate::retry::retry_with_backoff;
use crate::site::discourse::{DiscourseSite, Humanizer, PageScreenshots, ScrollOptions};
use crate::site::{ForumSite, ListKind};

/// Attempts for the retry-wrapped login and harvest operations.
const MAX_ATTEMPTS: u32 = 3;

/// Pause between serial list-page requests.
const LIST_PAUSE: Duration = Duration::from_secs(1);

/// Bodies shorter than this are not worth an AI call; mirrors the analyzer's
/// own fallback threshold.
const AI_BODY_MIN_CHARS: usize = 100;

/// Size of the recommendation list handed to the reporter.
const RECOMMENDED_LIMIT: usize = 10;

#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    session: Arc<dyn BrowserSession>,
    completion: Option<Arc<dyn CompletionClient>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: Config,
        session: Arc<dyn BrowserSession>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        Self {
            config,
            session,
            completion,
        }
    }

    /// Run every account under the cross-account concurrency cap, each with a
    /// randomized staggered start. Every account yields exactly one
    /// [`RunResult`]; one account's failure never aborts the others.
    pub async fn run_all(&self, accounts: Vec<Account>) -> Vec<RunResult> {
        let pipeline = self.clone();
        orchestrator::run_bounded(
            accounts,
            self.config.account_concurrency,
            Duration::ZERO,
            "accounts",
            move |account| {
                let pipeline = pipeline.clone();
                async move {
                    let stagger = pipeline.sample_stagger();
                    if !stagger.is_zero() {
                        info!(user = %account.username, delay_secs = stagger.as_secs(), "staggering account start");
                        tokio::time::sleep(stagger).await;
                    }
                    Ok(pipeline.run_account(account).await)
                }
            },
        )
        .await
    }

    fn sample_stagger(&self) -> Duration {
        let max = self.config.account_stagger.as_secs();
        if max == 0 {
            return Duration::ZERO;
        }
        // ThreadRng must not be held across an await point.
        let secs = rand::thread_rng().gen_range(0..=max);
        Duration::from_secs(secs)
    }

    /// Run one account start to finish. Never panics the caller; every
    /// failure mode is folded into the returned [`RunResult`].
    pub async fn run_account(&self, account: Account) -> RunResult {
        info!(user = %account.username, "account run starting");

        let site = Arc::new(self.build_site(&account));
        let content_cache = Arc::new(ContentCache::load(
            &self.config.storage_dir,
            &account.username,
            self.config.cache_days,
        ));
        let read_history = Arc::new(ReadHistory::load(
            &self.config.storage_dir,
            &account.username,
            self.config.cache_days,
        ));
        let analyzer = Arc::new(Analyzer::new(
            self.completion.clone(),
            self.config.ai_temperature,
            self.config.ai_max_tokens,
        ));

        let page = match self.session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                error!(user = %account.username, "could not open a page: {e}");
                return RunResult::failure(&account.username, format!("could not open a page: {e}"));
            }
        };

        let outcome = self
            .drive(&site, &*page, &content_cache, &read_history, &analyzer)
            .await;

        // The page is borrowed from the session; release it on every path.
        if let Err(e) = page.close().await {
            warn!(user = %account.username, "failed to close page: {e}");
        }

        match outcome {
            Ok(details) => {
                let message = format!(
                    "harvested {} topics, {} with content, {} AI summaries, {} recommendations",
                    details.latest_topics.len()
                        + details.hot_topics.len()
                        + details.category_topics.len(),
                    details.topics_with_content.len(),
                    details.ai_summaries.len(),
                    details.recommended_topics.len(),
                );
                info!(user = %account.username, %message, "account run finished");
                RunResult::success(&account.username, message, details)
            }
            Err(e) => {
                error!(user = %account.username, "account run failed: {e:#}");
                RunResult::failure(&account.username, format!("{e:#}"))
            }
        }
    }

    fn build_site(&self, account: &Account) -> DiscourseSite {
        let humanizer = if self.config.humanize {
            Humanizer::new(self.config.humanize_delay_ms, self.config.char_jitter_ms)
        } else {
            Humanizer::disabled()
        };
        DiscourseSite::new(
            &self.config.site_url,
            &account.username,
            &account.password,
            humanizer,
            self.config.page_timeout,
            self.config.challenge_timeout,
            ScrollOptions {
                enabled: self.config.scroll_enabled,
                times: self.config.scroll_times,
                interval: self.config.scroll_interval,
            },
            self.config.detail_max_retries,
            Some(self.config.storage_dir.join("screenshots")),
        )
    }

    /// Authenticate, then run the retry-wrapped harvest.
    async fn drive(
        &self,
        site: &Arc<DiscourseSite>,
        page: &dyn PageDriver,
        content_cache: &Arc<ContentCache>,
        read_history: &Arc<ReadHistory>,
        analyzer: &Arc<Analyzer>,
    ) -> anyhow::Result<RunDetails> {
        let diagnostics = PageScreenshots::new(site, page);

        let logged_in = site.is_logged_in(page).await.unwrap_or(false);
        if logged_in {
            info!(user = %site.username(), "session already authenticated");
        } else {
            info!(user = %site.username(), "not authenticated, logging in");
            retry_with_backoff(MAX_ATTEMPTS, &diagnostics, "login", || site.login(page))
                .await
                .context("login failed")?;
        }

        retry_with_backoff(MAX_ATTEMPTS, &diagnostics, "harvest", || {
            self.harvest(site, page, content_cache, read_history, analyzer)
        })
        .await
        .context("harvest failed")
    }

    /// One full harvest: lists → filter → dedup → details → AI → digest.
    async fn harvest(
        &self,
        site: &Arc<DiscourseSite>,
        page: &dyn PageDriver,
        content_cache: &Arc<ContentCache>,
        read_history: &Arc<ReadHistory>,
        analyzer: &Arc<Analyzer>,
    ) -> anyhow::Result<RunDetails> {
        let quality_cfg = self.quality_config();

        // List scraping stays serial: origin tolerance for list-page bursts
        // is low, and these pages are cheap.
        let latest_raw = if self.config.latest_limit > 0 {
            site.fetch_list(page, &ListKind::Latest, self.config.latest_limit)
                .await?
        } else {
            Vec::new()
        };
        tokio::time::sleep(LIST_PAUSE).await;

        let hot_raw = if self.config.hot_limit > 0 {
            site.fetch_list(page, &ListKind::Hot, self.config.hot_limit)
                .await?
        } else {
            Vec::new()
        };

        let mut category_raw = Vec::new();
        for name in &self.config.categories {
            tokio::time::sleep(LIST_PAUSE).await;
            let kind = ListKind::Category(name.clone());
            match site.fetch_list(page, &kind, self.config.hot_limit).await {
                Ok(mut topics) => category_raw.append(&mut topics),
                Err(e) => warn!(category = %name, "category list failed: {e}"),
            }
        }

        let latest_topics = quality::filter_topics(latest_raw, &quality_cfg);
        let hot_topics = quality::filter_topics(hot_raw, &quality_cfg);
        let category_topics = quality::filter_topics(category_raw, &quality_cfg);

        let merged = dedup::merge_ranked(vec![
            latest_topics.clone(),
            hot_topics.clone(),
            category_topics.clone(),
        ]);
        info!(unique = merged.len(), "working set assembled");

        let topics_with_content = self
            .fetch_details(site, read_history, &merged)
            .await;

        // Re-merge so content attaches onto the ranked working set.
        let merged = dedup::merge_ranked(vec![merged, topics_with_content.clone()]);

        let ai_summaries = self
            .analyze_topics(analyzer, content_cache, &topics_with_content)
            .await;
        let merged = dedup::merge_ranked(vec![merged, ai_summaries.clone()]);

        let profile = (!self.config.user_interests.is_empty()).then(|| UserProfile {
            interests: self.config.user_interests.clone(),
        });
        let mut recommended_topics = analyzer.recommend(&merged, profile.as_ref()).await;
        recommended_topics.truncate(RECOMMENDED_LIMIT);

        let mut details = RunDetails {
            latest_topics,
            hot_topics,
            category_topics,
            topics_with_content,
            ai_summaries,
            recommended_topics,
            summary: String::new(),
        };
        details.summary = report::generate_digest(&self.config.site_url, &details);
        Ok(details)
    }

    /// Pick the detail-fetch targets (unread first) and run them
    /// bounded-parallel, each on its own page.
    async fn fetch_details(
        &self,
        site: &Arc<DiscourseSite>,
        read_history: &Arc<ReadHistory>,
        merged: &[Topic],
    ) -> Vec<Topic> {
        let mut targets: Vec<Topic> = merged
            .iter()
            .filter(|t| !read_history.is_read(&t.link))
            .cloned()
            .collect();
        if targets.len() < self.config.read_limit {
            for topic in merged {
                if targets.len() >= self.config.read_limit {
                    break;
                }
                if !targets.iter().any(|t| t.link == topic.link) {
                    targets.push(topic.clone());
                }
            }
        }
        targets.truncate(self.config.read_limit);
        info!(count = targets.len(), "fetching topic bodies");

        let session = Arc::clone(&self.session);
        let site = Arc::clone(site);
        let read_history = Arc::clone(read_history);

        let fetched: Vec<Option<Topic>> = orchestrator::run_bounded(
            targets,
            self.config.fetch_concurrency,
            self.config.courtesy_delay,
            "detail-fetch",
            move |mut topic| {
                let session = Arc::clone(&session);
                let site = Arc::clone(&site);
                let read_history = Arc::clone(&read_history);
                async move {
                    let page = session.new_page().await?;
                    let result = site.fetch_detail(&*page, &topic.link).await;
                    if let Err(e) = page.close().await {
                        warn!(link = %topic.link, "failed to close detail page: {e}");
                    }
                    let content = result?;
                    if content.is_empty() {
                        return Ok(None);
                    }
                    read_history.mark_read(&topic.link);
                    topic.content = Some(content);
                    Ok(Some(topic))
                }
            },
        )
        .await;

        fetched.into_iter().flatten().collect()
    }

    /// Summarize the top-K content-bearing topics, consulting the cache
    /// before spending an AI call. Results are written through immediately.
    async fn analyze_topics(
        &self,
        analyzer: &Arc<Analyzer>,
        content_cache: &Arc<ContentCache>,
        topics_with_content: &[Topic],
    ) -> Vec<Topic> {
        let targets: Vec<Topic> = topics_with_content
            .iter()
            .filter(|t| {
                t.content
                    .as_ref()
                    .is_some_and(|c| c.first_post.chars().count() > AI_BODY_MIN_CHARS)
            })
            .take(self.config.ai_limit)
            .cloned()
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        info!(count = targets.len(), "analyzing topic bodies");

        let analyzer = Arc::clone(analyzer);
        let content_cache = Arc::clone(content_cache);

        orchestrator::run_bounded(
            targets,
            self.config.fetch_concurrency,
            self.config.courtesy_delay,
            "ai-analysis",
            move |mut topic| {
                let analyzer = Arc::clone(&analyzer);
                let content_cache = Arc::clone(&content_cache);
                async move {
                    let key = link_key(&topic.link);
                    if let Some(cached) = content_cache.get(&key) {
                        info!(link = %topic.link, "analysis cache hit");
                        topic.ai_summary = Some(cached);
                        return Ok(topic);
                    }

                    let body = topic
                        .content
                        .as_ref()
                        .map(|c| c.first_post.clone())
                        .unwrap_or_default();
                    let analysis = analyzer.summarize(&topic, &body).await;
                    let snapshot = serde_json::json!({
                        "title": topic.title,
                        "link": topic.link,
                        "category": topic.category,
                    });
                    content_cache.set(&key, snapshot, analysis.clone());
                    topic.ai_summary = Some(analysis);
                    Ok(topic)
                }
            },
        )
        .await
    }

    fn quality_config(&self) -> quality::QualityConfig {
        quality::QualityConfig {
            exclude_categories: self.config.exclude_categories.clone(),
            exclude_keywords: self.config.exclude_keywords.clone(),
            priority_categories: self.config.priority_categories.clone(),
            user_interests: self.config.user_interests.clone(),
            min_replies: self.config.min_replies,
            min_views: self.config.min_views,
            min_views_for_zero_replies: self.config.min_views_for_zero_replies,
        }
    }
}
