use radar_core::ContentItem;
use std::collections::HashSet;
use tracing::info;

/// Account whose posts are always automated moderation output.
pub const AUTOMATED_MODERATION_ACCOUNT: &str = "AutoModerator";

/// Boilerplate that marks removed content or rule-violation notices.
/// Matched case-insensitively against the combined title+body text.
const REMOVAL_PHRASES: &[&str] = &[
    "your post has been removed",
    "this post has been removed",
    "your submission has been removed",
    "removed by the moderators",
    "violates rule",
    "against the rules",
    "please read the rules",
    "i am a bot, and this action was performed automatically",
    "please contact the moderators of this subreddit",
];

/// Static synonym groups: an anchor concept and its related terms.
/// Matching is symmetric: a token hitting any term of a group counts when
/// the anchor or any sibling equals a request keyword.
const SYNONYM_GROUPS: &[(&str, &[&str])] = &[
    ("laptop", &["macbook", "workstation", "pc", "computer", "notebook"]),
    ("phone", &["smartphone", "iphone", "android", "mobile", "handset"]),
    ("software", &["saas", "app", "application", "platform", "subscription"]),
    ("crm", &["salesforce", "hubspot", "pipedrive"]),
    ("hosting", &["vps", "server", "cloud", "aws", "heroku"]),
    ("camera", &["dslr", "mirrorless", "gopro", "webcam"]),
    ("headphones", &["earbuds", "airpods", "headset"]),
];

/// Two-stage content filter: structural rejection, then keyword/synonym
/// relevance matching. Stateless given its inputs; applying it twice to the
/// same input yields the same output.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    synonym_terms: HashSet<String>,
}

impl RelevanceFilter {
    pub fn new(keywords: &[String]) -> Self {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

        // A group contributes its terms only when the request asked for one
        // of them.
        let mut synonym_terms = HashSet::new();
        for (anchor, siblings) in SYNONYM_GROUPS {
            let group_matches_request = keywords.iter().any(|keyword| {
                keyword == anchor || siblings.iter().any(|sibling| keyword == sibling)
            });
            if group_matches_request {
                synonym_terms.insert(anchor.to_string());
                for sibling in *siblings {
                    synonym_terms.insert(sibling.to_string());
                }
            }
        }

        Self {
            keywords,
            synonym_terms,
        }
    }

    /// Run both stages in order, preserving input order, and log the
    /// pass-through ratio of each stage.
    pub fn apply(&self, items: Vec<ContentItem>) -> Vec<ContentItem> {
        let total = items.len();
        let structural: Vec<ContentItem> = items
            .into_iter()
            .filter(|item| self.passes_structural(item))
            .collect();
        info!(
            "structural stage kept {}/{} items",
            structural.len(),
            total
        );

        let structural_count = structural.len();
        let relevant: Vec<ContentItem> = structural
            .into_iter()
            .filter(|item| self.passes_relevance(item))
            .collect();
        info!(
            "relevance stage kept {}/{} items",
            relevant.len(),
            structural_count
        );

        relevant
    }

    /// Stage A: drop moderation output and removal boilerplate.
    pub fn passes_structural(&self, item: &ContentItem) -> bool {
        if item
            .author
            .eq_ignore_ascii_case(AUTOMATED_MODERATION_ACCOUNT)
        {
            return false;
        }
        if let Some(distinguished) = item.distinguished.as_deref() {
            if distinguished == "moderator" || distinguished == "admin" {
                return false;
            }
        }

        let text = item.combined_text().to_lowercase();
        !REMOVAL_PHRASES.iter().any(|phrase| text.contains(phrase))
    }

    /// Stage B: keyword substring match, else synonym-group token match.
    pub fn passes_relevance(&self, item: &ContentItem) -> bool {
        let text = item.combined_text().to_lowercase();
        if self.keywords.iter().any(|keyword| text.contains(keyword)) {
            return true;
        }

        let matched = tokenize(&text).any(|token| self.synonym_terms.contains(token));
        matched
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
}
