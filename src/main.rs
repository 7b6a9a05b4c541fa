use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discourse_digest::ai::{CompletionClient, OpenAiCompatClient};
use discourse_digest::browser::chromium::{ChromiumOptions, ChromiumSession};
use discourse_digest::browser::BrowserSession;
use discourse_digest::config::Config;
use discourse_digest::pipeline::Pipeline;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(all_succeeded) => {
            if !all_succeeded {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<bool> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting discourse-digest");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(site_url = %config.site_url, "Configuration loaded");

    let accounts = config.load_accounts().context("Failed to load accounts")?;
    if accounts.is_empty() {
        warn!(path = %config.accounts_file.display(), "No enabled accounts configured");
        return Ok(true);
    }
    info!(count = accounts.len(), "Accounts loaded");

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create storage directory: {}",
                config.storage_dir.display()
            )
        })?;

    let completion = build_completion_client(&config);
    if completion.is_some() {
        info!(model = %config.ai_model, "AI analysis enabled");
    } else {
        info!("AI analysis disabled, using deterministic fallbacks");
    }

    let session: Arc<dyn BrowserSession> = Arc::new(ChromiumSession::new(ChromiumOptions {
        headless: config.headless,
        chrome_path: config.chrome_path.clone(),
        request_timeout: config.page_timeout,
        ..ChromiumOptions::default()
    }));

    let pipeline = Pipeline::new(config.clone(), Arc::clone(&session), completion);
    let results = pipeline.run_all(accounts).await;

    session.shutdown().await;

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;
    for result in &results {
        if result.success {
            info!(user = %result.username, "{}", result.message);
            // The digest is the run's primary artifact; emit it for the
            // reporting collaborator and for anyone tailing the logs.
            println!("{}", result.details.summary);
        } else {
            error!(user = %result.username, "{}", result.message);
        }
    }
    info!(succeeded, failed, "Run complete");

    Ok(failed == 0)
}

fn build_completion_client(config: &Config) -> Option<Arc<dyn CompletionClient>> {
    if !config.ai_enabled {
        return None;
    }
    let api_key = config.ai_api_key.as_deref()?;
    let api_base = config.ai_api_base.as_deref()?;
    Some(Arc::new(OpenAiCompatClient::new(
        api_base,
        api_key,
        &config.ai_model,
    )))
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,discourse_digest=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
