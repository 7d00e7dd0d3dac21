use crate::api::{CommentData, ContentApi, PostData};
use crate::pacing::PacingPolicy;
use crate::rate_limiter::RequestBudget;
use radar_core::{CommentItem, ContentItem, CoreError};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const PERMALINK_BASE: &str = "https://www.reddit.com";

/// Retrieves posts and comments from the content source, spending one
/// budget unit per upstream call and enriching items with provenance.
pub struct ContentFetcher {
    api: Arc<dyn ContentApi>,
    budget: Arc<RequestBudget>,
    pacing: Arc<dyn PacingPolicy>,
}

impl ContentFetcher {
    pub fn new(
        api: Arc<dyn ContentApi>,
        budget: Arc<RequestBudget>,
        pacing: Arc<dyn PacingPolicy>,
    ) -> Self {
        Self { api, budget, pacing }
    }

    pub async fn fetch_posts(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        self.budget.check().await?;
        self.pacing.pace().await;

        let outcome = self.api.list_new_posts(community, limit).await;
        // The upstream call happened either way; the counter must advance.
        if let Err(error) = self.budget.consume().await {
            warn!("failed to advance request budget: {}", error);
        }

        let posts = outcome?;
        let items: Vec<ContentItem> = posts
            .into_iter()
            .map(|post| enrich_post(community, post))
            .collect();
        info!("fetched {} posts from r/{}", items.len(), community);
        Ok(items)
    }

    pub async fn fetch_comments(
        &self,
        post_id: &str,
        limit: u32,
    ) -> Result<Vec<CommentItem>, CoreError> {
        self.budget.check().await?;
        self.pacing.pace().await;

        let outcome = self.api.list_comments(post_id, limit).await;
        if let Err(error) = self.budget.consume().await {
            warn!("failed to advance request budget: {}", error);
        }

        let comments = outcome?;
        let items: Vec<CommentItem> = comments
            .into_iter()
            .map(|comment| enrich_comment(post_id, comment))
            .collect();
        info!("fetched {} comments for post {}", items.len(), post_id);
        Ok(items)
    }
}

fn enrich_post(community: &str, post: PostData) -> ContentItem {
    let permalink = permalink_for(community, &post);
    ContentItem {
        id: post.id,
        title: post.title,
        body: post.selftext,
        author: post.author,
        distinguished: post.distinguished,
        community: community.to_string(),
        permalink,
        score: post.score,
        comment_count: post.num_comments,
    }
}

fn enrich_comment(post_id: &str, comment: CommentData) -> CommentItem {
    CommentItem {
        id: comment.id,
        post_id: post_id.to_string(),
        body: comment.body,
        author: comment.author,
        score: comment.score,
    }
}

/// The upstream URL when it is a usable absolute link, else the canonical
/// permalink constructed from community and post id.
fn permalink_for(community: &str, post: &PostData) -> String {
    if let Some(explicit) = post.url.as_deref() {
        if !explicit.is_empty() {
            if Url::parse(explicit).is_ok() {
                return explicit.to_string();
            }
            // Reddit sometimes reports site-relative links.
            if let Ok(base) = Url::parse(PERMALINK_BASE) {
                if let Ok(joined) = base.join(explicit) {
                    return joined.to_string();
                }
            }
        }
    }
    format!("{PERMALINK_BASE}/r/{}/comments/{}", community, post.id)
}
