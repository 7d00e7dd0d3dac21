use analysis_pipeline::{AnalysisOrchestrator, PipelineLimits};
use anyhow::Context;
use api_server::AppState;
use llm_interface::{GeminiGenerator, IntentClassifier};
use radar_core::{AnalyticsSink, AppConfig, LogAnalytics};
use reddit_client::{
    BudgetConfig, CommunitySearch, ContentFetcher, FixedDelayPacing, MemorySuggestionCache,
    RedditApiClient, RedditCredentials, RequestBudget,
};
use status_store::{MemoryStatusStore, SqliteStatusStore, StatusStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting DemandRadar - buying-intent analysis pipeline");

    let config = AppConfig::load().context("loading configuration")?;

    let budget = Arc::new(RequestBudget::in_memory(BudgetConfig::reddit_hourly()));

    let credentials = RedditCredentials {
        client_id: config.reddit_client_id.clone(),
        client_secret: config.reddit_client_secret.clone(),
        user_agent: config.reddit_user_agent.clone(),
    };
    let content_api =
        Arc::new(RedditApiClient::new(&credentials).context("building Reddit API client")?);
    let fetcher = Arc::new(ContentFetcher::new(
        content_api,
        budget.clone(),
        Arc::new(FixedDelayPacing::reddit_default()),
    ));

    let analytics: Arc<dyn AnalyticsSink> = Arc::new(LogAnalytics);
    let generator = Arc::new(
        GeminiGenerator::new(config.gemini_api_key.clone(), config.gemini_model.clone())
            .context("building Gemini client")?,
    );
    let classifier = Arc::new(IntentClassifier::new(generator, analytics.clone()));

    let status: Arc<dyn StatusStore> = match &config.status_db_url {
        Some(url) => Arc::new(
            SqliteStatusStore::connect(url)
                .await
                .context("connecting status store")?,
        ),
        None => {
            tracing::warn!("DEMANDRADAR_STATUS_DB unset, using in-memory status store");
            Arc::new(MemoryStatusStore::new())
        }
    };

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        fetcher,
        classifier,
        budget,
        status.clone(),
        analytics,
        PipelineLimits::default(),
    ));

    let suggester = Arc::new(
        CommunitySearch::new(
            &config.reddit_user_agent,
            Arc::new(MemorySuggestionCache::new()),
        )
        .context("building community search")?,
    );

    let app = api_server::router(AppState {
        orchestrator,
        status,
        suggester,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("DemandRadar listening on {}", config.bind_addr);
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}
