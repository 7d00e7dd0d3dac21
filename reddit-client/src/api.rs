use crate::auth::{RedditCredentials, TokenProvider};
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use radar_core::{ContentApiError, CoreError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Comment listings mix real comments with "load more" placeholders.
const COMMENT_KIND: &str = "t1";

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<ListingChild<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// A post as the upstream reports it, parsed at the collaborator boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub distinguished: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u32,
}

/// A comment as the upstream reports it. All fields defaulted because the
/// same listing shape carries non-comment placeholder nodes.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub score: i64,
}

/// The content-source collaborator: raw listings, typed at the edge.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn list_new_posts(&self, community: &str, limit: u32)
        -> Result<Vec<PostData>, CoreError>;
    async fn list_comments(&self, post_id: &str, limit: u32)
        -> Result<Vec<CommentData>, CoreError>;
}

pub struct RedditApiClient {
    http_client: reqwest::Client,
    tokens: Arc<TokenProvider>,
    retry: RetryConfig,
}

impl RedditApiClient {
    pub fn new(credentials: &RedditCredentials) -> Result<Self, CoreError> {
        let tokens = Arc::new(TokenProvider::new(credentials)?);
        let http_client = reqwest::Client::builder()
            .user_agent(&credentials.user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http_client,
            tokens,
            retry: RetryConfig::content_api(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = format!("{REDDIT_API_BASE}{endpoint}");
        let access_token = self.tokens.access_token().await?;

        debug!("GET {}", endpoint);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("network error for {}: {}", endpoint, e);
                if e.is_timeout() {
                    CoreError::ContentApi(ContentApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("request failed with status {} for {}", status, endpoint);
            return Err(match status.as_u16() {
                401 => {
                    self.tokens.invalidate().await;
                    CoreError::ContentApi(ContentApiError::AuthenticationFailed {
                        reason: "access token rejected".to_string(),
                    })
                }
                403 => CoreError::ContentApi(ContentApiError::Forbidden {
                    resource: endpoint.to_string(),
                }),
                404 => CoreError::ContentApi(ContentApiError::NotFound {
                    resource: endpoint.to_string(),
                }),
                429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);
                    CoreError::ContentApi(ContentApiError::RateLimited { retry_after })
                }
                code => CoreError::ContentApi(ContentApiError::ServerError { status: code }),
            });
        }

        response.json::<T>().await.map_err(|e| {
            error!("failed to parse response for {}: {}", endpoint, e);
            CoreError::ContentApi(ContentApiError::InvalidResponse {
                details: format!("failed to parse response for {endpoint}"),
            })
        })
    }

    async fn fetch_new_posts(&self, community: &str, limit: u32) -> Result<Vec<PostData>, CoreError> {
        let endpoint = format!("/r/{community}/new.json");
        let query = [("limit", limit.to_string())];
        let listing: Listing<PostData> = self.get_json(&endpoint, &query).await?;

        let posts: Vec<PostData> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .collect();
        info!("retrieved {} posts from r/{}", posts.len(), community);
        Ok(posts)
    }

    async fn fetch_comments(&self, post_id: &str, limit: u32) -> Result<Vec<CommentData>, CoreError> {
        let endpoint = format!("/comments/{post_id}.json");
        let query = [("limit", limit.to_string())];
        // The endpoint returns two listings: the post itself, then comments.
        let pages: Vec<Listing<CommentData>> = self.get_json(&endpoint, &query).await?;

        let comments: Vec<CommentData> = pages
            .into_iter()
            .nth(1)
            .map(|listing| {
                listing
                    .data
                    .children
                    .into_iter()
                    .filter(|child| child.kind == COMMENT_KIND && !child.data.id.is_empty())
                    .map(|child| child.data)
                    .collect()
            })
            .unwrap_or_default();
        info!("retrieved {} comments for post {}", comments.len(), post_id);
        Ok(comments)
    }
}

#[async_trait]
impl ContentApi for RedditApiClient {
    async fn list_new_posts(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<PostData>, CoreError> {
        with_retry(&self.retry, "list_new_posts", || {
            self.fetch_new_posts(community, limit)
        })
        .await
    }

    async fn list_comments(
        &self,
        post_id: &str,
        limit: u32,
    ) -> Result<Vec<CommentData>, CoreError> {
        with_retry(&self.retry, "list_comments", || {
            self.fetch_comments(post_id, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_listing_parses_with_missing_optionals() {
        let raw = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"id": "abc", "title": "Need a CRM", "author": "buyer", "score": 12, "num_comments": 3}},
                    {"kind": "t3", "data": {"id": "def", "title": "Weekly thread", "selftext": "rules inside", "author": "AutoModerator", "distinguished": "moderator"}}
                ]
            }
        }"#;

        let listing: Listing<PostData> = serde_json::from_str(raw).expect("listing parses");
        assert_eq!(listing.data.children.len(), 2);
        let first = &listing.data.children[0].data;
        assert_eq!(first.id, "abc");
        assert_eq!(first.selftext, "");
        assert!(first.distinguished.is_none());
        let second = &listing.data.children[1].data;
        assert_eq!(second.distinguished.as_deref(), Some("moderator"));
    }

    #[test]
    fn comment_pages_parse_and_placeholder_nodes_survive_decoding() {
        let raw = r#"[
            {"kind": "Listing", "data": {"children": [
                {"kind": "t3", "data": {"id": "abc", "title": "post"}}
            ]}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {"id": "c1", "body": "I would buy this", "author": "buyer", "score": 4}},
                {"kind": "more", "data": {"count": 57, "children": ["c2", "c3"]}}
            ]}}
        ]"#;

        let pages: Vec<Listing<serde_json::Value>> = serde_json::from_str(raw).expect("pages parse");
        assert_eq!(pages.len(), 2);

        let comment_pages: Vec<Listing<CommentData>> = serde_json::from_str(raw).expect("typed parse");
        let comments: Vec<&ListingChild<CommentData>> = comment_pages[1]
            .data
            .children
            .iter()
            .filter(|child| child.kind == COMMENT_KIND && !child.data.id.is_empty())
            .collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].data.body, "I would buy this");
    }
}
