use crate::filter::RelevanceFilter;
use chrono::Utc;
use llm_interface::IntentClassifier;
use radar_core::{
    spawn_content_request, AnalysisReport, AnalysisRequest, AnalyticsSink, ClassificationInput,
    CommentsClassificationInput, ContentItem, CoreError, ErrorExt, PostAnalysis, RequestState,
    RequestStatus, MAX_KEYWORDS, MAX_KEYWORD_CHARS, MAX_TARGETS,
};
use reddit_client::{ContentFetcher, RequestBudget};
use status_store::StatusStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineLimits {
    pub posts_per_target: u32,
    pub comments_per_post: u32,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            posts_per_target: 100,
            comments_per_post: 100,
        }
    }
}

/// Drives a request through the pipeline and owns its status lifecycle:
/// `pending -> in_progress -> {completed | failed}`.
///
/// `submit` returns as soon as the request is validated and recorded; the
/// pipeline itself runs on a detached task. There is no way to cancel a
/// running pipeline and no whole-request retry.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    fetcher: Arc<ContentFetcher>,
    classifier: Arc<IntentClassifier>,
    budget: Arc<RequestBudget>,
    status: Arc<dyn StatusStore>,
    analytics: Arc<dyn AnalyticsSink>,
    limits: PipelineLimits,
}

impl AnalysisOrchestrator {
    pub fn new(
        fetcher: Arc<ContentFetcher>,
        classifier: Arc<IntentClassifier>,
        budget: Arc<RequestBudget>,
        status: Arc<dyn StatusStore>,
        analytics: Arc<dyn AnalyticsSink>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            budget,
            status,
            analytics,
            limits,
        }
    }

    /// Bounds checking on the raw request. A failure here is a client
    /// error; no status record exists yet.
    pub fn validate(&self, request: &AnalysisRequest) -> Result<(), CoreError> {
        if request.targets.is_empty() || request.targets.len() > MAX_TARGETS {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "targets must contain between 1 and {} communities",
                    MAX_TARGETS
                ),
            });
        }
        if request.targets.iter().any(|t| t.trim().is_empty()) {
            return Err(CoreError::InvalidInput {
                message: "targets must be non-empty strings".to_string(),
            });
        }
        if request.keywords.is_empty() || request.keywords.len() > MAX_KEYWORDS {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "keywords must contain between 1 and {} entries",
                    MAX_KEYWORDS
                ),
            });
        }
        if request.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(CoreError::InvalidInput {
                message: "keywords must be non-empty strings".to_string(),
            });
        }
        if request
            .keywords
            .iter()
            .any(|k| k.chars().count() > MAX_KEYWORD_CHARS)
        {
            return Err(CoreError::InvalidInput {
                message: format!("keywords must be at most {} characters", MAX_KEYWORD_CHARS),
            });
        }
        Ok(())
    }

    /// Validate, precheck the budget, record the request, and kick off the
    /// background pipeline. Returns the created status record immediately.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<RequestStatus, CoreError> {
        self.validate(&request)?;
        // Fail fast before accepting work the fetcher could never perform.
        // The precheck does not consume the counter.
        self.budget.check().await?;

        let record = self
            .status
            .create_request(&request.targets, &request.keywords)
            .await?;
        info!(
            "accepted analysis request {} for [{}] with keywords [{}]",
            record.id,
            request.targets.join(", "),
            request.keywords.join(", ")
        );

        let orchestrator = self.clone();
        let request_id = record.id.clone();
        tokio::spawn(async move {
            if let Err(pipeline_error) = orchestrator.run_pipeline(&request_id, &request).await {
                error!("analysis request {} failed: {}", request_id, pipeline_error);
                let message = pipeline_error.user_friendly_message();
                if let Err(store_error) = orchestrator.status.mark_failed(&request_id, &message).await
                {
                    error!(
                        "failed to record failure for request {}: {}",
                        request_id, store_error
                    );
                }
            }
        });

        Ok(record)
    }

    async fn run_pipeline(
        &self,
        request_id: &str,
        request: &AnalysisRequest,
    ) -> Result<(), CoreError> {
        self.status
            .update_status(request_id, RequestState::InProgress, "Starting analysis", 5)
            .await?;

        self.status
            .update_status(request_id, RequestState::InProgress, "Fetching posts", 10)
            .await?;
        let posts = self.fetch_all_posts(request).await;
        let total_posts = posts.len();

        self.status
            .update_status(request_id, RequestState::InProgress, "Filtering posts", 40)
            .await?;
        let filter = RelevanceFilter::new(&request.keywords);
        let filtered = filter.apply(posts);
        let filtered_count = filtered.len();
        info!(
            "request {}: {}/{} posts survived filtering",
            request_id, filtered_count, total_posts
        );

        self.status
            .update_status(request_id, RequestState::InProgress, "Analyzing posts", 50)
            .await?;
        let post_results = self.classify_posts(request, &filtered).await;
        let post_match_count = post_results
            .iter()
            .filter(|analysis| analysis.result.mentioned)
            .count();

        self.status
            .update_status(request_id, RequestState::InProgress, "Analyzing comments", 70)
            .await?;
        let comment_results = self.classify_comments(request, &filtered).await;
        let comment_match_count = comment_results
            .iter()
            .filter(|result| result.mentioned)
            .count();

        self.status
            .update_status(request_id, RequestState::InProgress, "Assembling report", 95)
            .await?;
        let report = AnalysisReport {
            targets: request.targets.clone(),
            keywords: request.keywords.clone(),
            total_posts,
            filtered_posts: filtered_count,
            post_results,
            comment_results,
            post_match_count,
            comment_match_count,
            completed_at: Utc::now(),
        };
        self.status.mark_completed(request_id, report).await?;

        spawn_content_request(
            self.analytics.clone(),
            "reddit",
            request.targets.clone(),
            request.keywords.clone(),
            post_match_count,
            comment_match_count,
        );
        info!(
            "request {} completed: {} post matches, {} comment matches",
            request_id, post_match_count, comment_match_count
        );
        Ok(())
    }

    /// One page of new posts per target. A target that fails is skipped,
    /// not fatal to the request.
    async fn fetch_all_posts(&self, request: &AnalysisRequest) -> Vec<ContentItem> {
        let mut posts = Vec::new();
        for target in &request.targets {
            match self
                .fetcher
                .fetch_posts(target, self.limits.posts_per_target)
                .await
            {
                Ok(batch) => posts.extend(batch),
                Err(fetch_error) => {
                    warn!("skipping target r/{}: {}", target, fetch_error);
                }
            }
        }
        posts
    }

    async fn classify_posts(
        &self,
        request: &AnalysisRequest,
        filtered: &[ContentItem],
    ) -> Vec<PostAnalysis> {
        let inputs: Vec<ClassificationInput> = filtered
            .iter()
            .map(|post| ClassificationInput {
                text: post.combined_text(),
                keywords: request.keywords.clone(),
            })
            .collect();

        let results = self.classifier.classify_batch(&inputs).await;
        filtered
            .iter()
            .zip(results)
            .map(|(post, result)| PostAnalysis {
                post_id: post.id.clone(),
                title: post.title.clone(),
                community: post.community.clone(),
                permalink: post.permalink.clone(),
                score: post.score,
                comment_count: post.comment_count,
                result,
            })
            .collect()
    }

    /// Comments are fetched for every filtered post, not only high-intent
    /// ones; a post whose comment fetch fails is skipped.
    async fn classify_comments(
        &self,
        request: &AnalysisRequest,
        filtered: &[ContentItem],
    ) -> Vec<radar_core::CommentsClassificationResult> {
        let mut inputs = Vec::new();
        for post in filtered {
            match self
                .fetcher
                .fetch_comments(&post.id, self.limits.comments_per_post)
                .await
            {
                Ok(comments) if comments.is_empty() => {
                    debug!("no comments for post {}", post.id);
                }
                Ok(comments) => inputs.push(CommentsClassificationInput {
                    post_id: post.id.clone(),
                    comments: comments.into_iter().map(|comment| comment.body).collect(),
                    keywords: request.keywords.clone(),
                }),
                Err(fetch_error) => {
                    warn!("skipping comments for post {}: {}", post.id, fetch_error);
                }
            }
        }

        self.classifier.classify_comments_batch(&inputs).await
    }
}
