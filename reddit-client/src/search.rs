use async_trait::async_trait;
use radar_core::{ContentApiError, CoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://www.reddit.com/api/search_reddit_names.json";

/// Community names change rarely; cached lookups stay valid for a week.
const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySuggestion {
    pub name: String,
    pub display_name: String,
}

/// Duplicate-suppression cache for community name lookups.
#[async_trait]
pub trait SuggestionCache: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Option<Vec<CommunitySuggestion>>;
    async fn set(&self, key: &str, value: Vec<CommunitySuggestion>, ttl: Duration);
}

/// In-process suggestion cache for single-instance deployments.
#[derive(Debug, Default)]
pub struct MemorySuggestionCache {
    entries: Mutex<HashMap<String, (Vec<CommunitySuggestion>, Instant)>>,
}

impl MemorySuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuggestionCache for MemorySuggestionCache {
    async fn get(&self, key: &str) -> Option<Vec<CommunitySuggestion>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<CommunitySuggestion>, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }
}

/// Best-effort community lookup used for target suggestions.
#[async_trait]
pub trait CommunitySuggester: Send + Sync {
    async fn search(&self, query: &str) -> Vec<CommunitySuggestion>;
}

/// Community name search against the public name-search endpoint, with a
/// long-lived cache in front. Lookup failures degrade to an empty list.
pub struct CommunitySearch {
    http_client: reqwest::Client,
    cache: Arc<dyn SuggestionCache>,
}

impl CommunitySearch {
    pub fn new(user_agent: &str, cache: Arc<dyn SuggestionCache>) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http_client, cache })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<CommunitySuggestion>, CoreError> {
        let response = self
            .http_client
            .get(SEARCH_URL)
            .query(&[("query", query), ("include_over_18", "false")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::ContentApi(ContentApiError::ServerError {
                status: status.as_u16(),
            }));
        }

        let body: SearchNamesResponse = response.json().await.map_err(|_| {
            CoreError::ContentApi(ContentApiError::InvalidResponse {
                details: "failed to parse community name search response".to_string(),
            })
        })?;

        Ok(body
            .names
            .into_iter()
            .map(|name| CommunitySuggestion {
                name: name.to_lowercase(),
                display_name: name,
            })
            .collect())
    }
}

#[async_trait]
impl CommunitySuggester for CommunitySearch {
    async fn search(&self, query: &str) -> Vec<CommunitySuggestion> {
        let clean = query.trim().to_lowercase();
        let clean = clean.strip_prefix("r/").unwrap_or(&clean).to_string();
        if clean.len() < 2 {
            return Vec::new();
        }

        if let Some(cached) = self.cache.get(&clean).await {
            debug!("cache hit for community query: {}", clean);
            return cached;
        }

        match self.fetch(&clean).await {
            Ok(suggestions) => {
                info!(
                    "community search for '{}' returned {} suggestions",
                    clean,
                    suggestions.len()
                );
                if !suggestions.is_empty() {
                    self.cache.set(&clean, suggestions.clone(), CACHE_TTL).await;
                }
                suggestions
            }
            Err(search_error) => {
                warn!("community search failed for '{}': {}", clean, search_error);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchNamesResponse {
    #[serde(default)]
    names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(name: &str) -> CommunitySuggestion {
        CommunitySuggestion {
            name: name.to_lowercase(),
            display_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn short_queries_return_nothing_without_a_lookup() {
        let cache = Arc::new(MemorySuggestionCache::new());
        let search = CommunitySearch::new("demandradar/0.1 test", cache).unwrap();
        assert!(search.search("").await.is_empty());
        assert!(search.search(" a ").await.is_empty());
        assert!(search.search("r/").await.is_empty());
    }

    #[tokio::test]
    async fn cached_entries_are_served_without_a_lookup() {
        let cache = Arc::new(MemorySuggestionCache::new());
        cache
            .set(
                "startups",
                vec![suggestion("startups"), suggestion("Startup_Ideas")],
                Duration::from_secs(60),
            )
            .await;
        let search = CommunitySearch::new("demandradar/0.1 test", cache).unwrap();

        let results = search.search("  R/Startups ").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "startups");
    }

    #[tokio::test]
    async fn expired_cache_entries_are_ignored() {
        let cache = MemorySuggestionCache::new();
        cache
            .set("startups", vec![suggestion("startups")], Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("startups").await.is_none());
    }

    #[test]
    fn name_search_response_tolerates_missing_names() {
        let body: SearchNamesResponse = serde_json::from_str("{}").unwrap();
        assert!(body.names.is_empty());
    }
}
