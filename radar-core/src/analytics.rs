use crate::error::CoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Best-effort usage/event collector. Callers never block on it and never
/// observe its failures; use the `spawn_*` helpers for fire-and-forget
/// delivery.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record_classifier_usage(
        &self,
        prompt_units: u64,
        completion_units: u64,
        model: &str,
    ) -> Result<(), CoreError>;

    async fn record_content_request(
        &self,
        source: &str,
        targets: &[String],
        keywords: &[String],
        post_matches: usize,
        comment_matches: usize,
    ) -> Result<(), CoreError>;
}

/// Sink that emits analytics as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct LogAnalytics;

#[async_trait]
impl AnalyticsSink for LogAnalytics {
    async fn record_classifier_usage(
        &self,
        prompt_units: u64,
        completion_units: u64,
        model: &str,
    ) -> Result<(), CoreError> {
        info!(
            "classifier usage: {} prompt + {} completion units = {} total ({})",
            prompt_units,
            completion_units,
            prompt_units + completion_units,
            model
        );
        Ok(())
    }

    async fn record_content_request(
        &self,
        source: &str,
        targets: &[String],
        keywords: &[String],
        post_matches: usize,
        comment_matches: usize,
    ) -> Result<(), CoreError> {
        info!(
            "content request against {}: {} targets, {} keywords, {} post matches, {} comment matches",
            source,
            targets.len(),
            keywords.len(),
            post_matches,
            comment_matches
        );
        Ok(())
    }
}

/// Sink that drops everything. Used in tests.
#[derive(Debug, Clone, Default)]
pub struct NoopAnalytics;

#[async_trait]
impl AnalyticsSink for NoopAnalytics {
    async fn record_classifier_usage(
        &self,
        _prompt_units: u64,
        _completion_units: u64,
        _model: &str,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    async fn record_content_request(
        &self,
        _source: &str,
        _targets: &[String],
        _keywords: &[String],
        _post_matches: usize,
        _comment_matches: usize,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Record classifier token usage on a detached task.
pub fn spawn_classifier_usage(
    sink: Arc<dyn AnalyticsSink>,
    prompt_units: u64,
    completion_units: u64,
    model: String,
) {
    tokio::spawn(async move {
        if let Err(error) = sink
            .record_classifier_usage(prompt_units, completion_units, &model)
            .await
        {
            warn!("failed to record classifier usage: {}", error);
        }
    });
}

/// Record a completed content request on a detached task.
pub fn spawn_content_request(
    sink: Arc<dyn AnalyticsSink>,
    source: &'static str,
    targets: Vec<String>,
    keywords: Vec<String>,
    post_matches: usize,
    comment_matches: usize,
) {
    tokio::spawn(async move {
        if let Err(error) = sink
            .record_content_request(source, &targets, &keywords, post_matches, comment_matches)
            .await
        {
            warn!("failed to record content request: {}", error);
        }
    });
}
