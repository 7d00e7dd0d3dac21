use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on target communities per analysis request.
pub const MAX_TARGETS: usize = 3;
/// Upper bound on keywords per analysis request.
pub const MAX_KEYWORDS: usize = 5;
/// Upper bound on a single keyword's length, in characters.
pub const MAX_KEYWORD_CHARS: usize = 100;
/// Classification input text is truncated to this many characters.
pub const MAX_INPUT_CHARS: usize = 6000;
/// At most this many comments of a post go into one classification call.
pub const MAX_ANALYZED_COMMENTS: usize = 50;

/// A validated analysis request. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub targets: Vec<String>,
    pub keywords: Vec<String>,
}

/// A post fetched from the content source, enriched with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    /// Moderation distinguish flag as reported upstream ("moderator", "admin").
    pub distinguished: Option<String>,
    pub community: String,
    pub permalink: String,
    pub score: i64,
    pub comment_count: u32,
}

impl ContentItem {
    /// Title and body joined the way the filter and classifier see them.
    pub fn combined_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.body)
        }
    }
}

/// A comment belonging to a post. Fetched lazily for filtered posts only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentItem {
    pub id: String,
    pub post_id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
}

/// One unit of text handed to the classifier.
#[derive(Debug, Clone)]
pub struct ClassificationInput {
    pub text: String,
    pub keywords: Vec<String>,
}

/// A post's comment set handed to the classifier as one unit.
#[derive(Debug, Clone)]
pub struct CommentsClassificationInput {
    pub post_id: String,
    pub comments: Vec<String>,
    pub keywords: Vec<String>,
}

/// Sanitized classifier verdict for one classification input.
///
/// Invariants: `confidence` is in `[0, 1]` and `mentioned_keywords` is a
/// subset of the input keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub mentioned: bool,
    pub mentioned_keywords: Vec<String>,
    pub snippet: String,
    pub confidence: f64,
    pub analysis: String,
}

impl ClassificationResult {
    /// The safe default substituted when a single item of a batch fails.
    pub fn failed(analysis: impl Into<String>) -> Self {
        Self {
            mentioned: false,
            mentioned_keywords: Vec::new(),
            snippet: String::new(),
            confidence: 0.0,
            analysis: analysis.into(),
        }
    }
}

/// Classifier verdict over a post's aggregated comment set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsClassificationResult {
    pub post_id: String,
    pub mentioned: bool,
    pub mentioned_keywords: Vec<String>,
    pub snippet: String,
    pub confidence: f64,
    pub analysis: String,
    pub comment_count: usize,
    pub analyzed_comment_count: usize,
}

impl CommentsClassificationResult {
    pub fn failed(post_id: impl Into<String>, comment_count: usize, analysis: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            mentioned: false,
            mentioned_keywords: Vec::new(),
            snippet: String::new(),
            confidence: 0.0,
            analysis: analysis.into(),
            comment_count,
            analyzed_comment_count: 0,
        }
    }
}

/// Report entry pairing a post's provenance with its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAnalysis {
    pub post_id: String,
    pub title: String,
    pub community: String,
    pub permalink: String,
    pub score: i64,
    pub comment_count: u32,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

/// The assembled outcome of one completed analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub targets: Vec<String>,
    pub keywords: Vec<String>,
    pub total_posts: usize,
    pub filtered_posts: usize,
    pub post_results: Vec<PostAnalysis>,
    pub comment_results: Vec<CommentsClassificationResult>,
    pub post_match_count: usize,
    pub comment_match_count: usize,
    pub completed_at: DateTime<Utc>,
}

/// Lifecycle state of an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::InProgress => "in_progress",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestState::Pending),
            "in_progress" => Ok(RequestState::InProgress),
            "completed" => Ok(RequestState::Completed),
            "failed" => Ok(RequestState::Failed),
            other => Err(format!("unknown request state: {other}")),
        }
    }
}

/// Durable lifecycle record of an analysis request.
///
/// Created at acceptance and mutated only by the orchestrator. The core
/// never deletes records; retention is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatus {
    pub id: String,
    pub state: RequestState,
    pub message: String,
    pub progress: u8,
    pub targets: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_state_round_trips_through_str() {
        for state in [
            RequestState::Pending,
            RequestState::InProgress,
            RequestState::Completed,
            RequestState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<RequestState>().unwrap(), state);
        }
        assert!("bogus".parse::<RequestState>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!RequestState::Pending.is_terminal());
        assert!(!RequestState::InProgress.is_terminal());
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Failed.is_terminal());
    }

    #[test]
    fn combined_text_skips_empty_body() {
        let item = ContentItem {
            id: "abc".to_string(),
            title: "Need a new laptop".to_string(),
            body: String::new(),
            author: "buyer".to_string(),
            distinguished: None,
            community: "startups".to_string(),
            permalink: "https://www.reddit.com/r/startups/comments/abc".to_string(),
            score: 10,
            comment_count: 2,
        };
        assert_eq!(item.combined_text(), "Need a new laptop");
    }
}
