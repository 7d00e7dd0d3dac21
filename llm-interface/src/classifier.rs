use crate::provider::{Generation, TextGenerator};
use radar_core::{
    spawn_classifier_usage, AnalyticsSink, ClassificationInput, ClassificationResult,
    CommentsClassificationInput, CommentsClassificationResult, CoreError, LlmError,
    MAX_ANALYZED_COMMENTS, MAX_INPUT_CHARS,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const COMMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Judges buying intent in filtered content through the text-classifier
/// collaborator. Classifier output is parsed leniently and batch calls
/// tolerate per-item failures.
pub struct IntentClassifier {
    generator: Arc<dyn TextGenerator>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl IntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            generator,
            analytics,
        }
    }

    pub async fn classify_text(
        &self,
        input: &ClassificationInput,
    ) -> Result<ClassificationResult, CoreError> {
        let prompt = build_post_prompt(&input.text, &input.keywords);
        let generation = self.generator.generate(&prompt).await?;
        self.report_usage(&generation);
        parse_classification(&generation.text, &input.keywords)
    }

    /// Order-preserving, one result per input. A failed item yields the
    /// default "not mentioned" result instead of aborting the batch.
    pub async fn classify_batch(
        &self,
        inputs: &[ClassificationInput],
    ) -> Vec<ClassificationResult> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            match self.classify_text(input).await {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!("post classification failed, substituting default: {}", error);
                    results.push(ClassificationResult::failed("Analysis failed"));
                }
            }
        }
        results
    }

    pub async fn classify_comments(
        &self,
        input: &CommentsClassificationInput,
    ) -> Result<CommentsClassificationResult, CoreError> {
        let prompt = build_comments_prompt(&input.comments, &input.keywords);
        let generation = self.generator.generate(&prompt).await?;
        self.report_usage(&generation);

        let result = parse_classification(&generation.text, &input.keywords)?;
        Ok(CommentsClassificationResult {
            post_id: input.post_id.clone(),
            mentioned: result.mentioned,
            mentioned_keywords: result.mentioned_keywords,
            snippet: result.snippet,
            confidence: result.confidence,
            analysis: result.analysis,
            comment_count: input.comments.len(),
            analyzed_comment_count: input.comments.len().min(MAX_ANALYZED_COMMENTS),
        })
    }

    pub async fn classify_comments_batch(
        &self,
        inputs: &[CommentsClassificationInput],
    ) -> Vec<CommentsClassificationResult> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            match self.classify_comments(input).await {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!(
                        "comments classification failed for post {}, substituting default: {}",
                        input.post_id, error
                    );
                    results.push(CommentsClassificationResult::failed(
                        &input.post_id,
                        input.comments.len(),
                        "Comments analysis failed",
                    ));
                }
            }
        }
        results
    }

    fn report_usage(&self, generation: &Generation) {
        if let Some(usage) = generation.usage {
            spawn_classifier_usage(
                self.analytics.clone(),
                usage.prompt_units,
                usage.completion_units,
                self.generator.model_name().to_string(),
            );
        }
    }
}

fn build_post_prompt(text: &str, keywords: &[String]) -> String {
    format!(
        r#"Analyze the following text and determine if there are any offers on buying or describing interest in the specified keywords.

TEXT: "{}"

KEYWORDS: [{}]

Please provide your analysis in the following JSON format:
{{
  "mentioned": boolean,
  "mentionedKeywords": string[],
  "snippet": string,
  "confidence": number,
  "analysis": string
}}

Where:
- "mentioned": true if any of the keywords are mentioned in a buying/interest context, false otherwise
- "mentionedKeywords": array of keywords that were actually mentioned in the text
- "snippet": a short excerpt (1-2 sentences) from the text that contains the relevant mention
- "confidence": a number between 0 and 1 indicating confidence in the analysis
- "analysis": a brief explanation of your reasoning

Focus on identifying:
1. Direct requests to buy products/services
2. Expressions of interest in purchasing
3. Descriptions of needs that could lead to purchases
4. Mentions of specific keywords in relevant contexts

Return ONLY the JSON response, no additional text or explanations."#,
        truncated(text),
        keywords.join(", ")
    )
}

fn build_comments_prompt(comments: &[String], keywords: &[String]) -> String {
    let included = comments.len().min(MAX_ANALYZED_COMMENTS);
    debug!("including {}/{} comments in prompt", included, comments.len());
    let comments_text = comments[..included].join(COMMENT_SEPARATOR);

    format!(
        r#"Analyze the following comments and determine if there are any offers on buying or describing interest in the specified keywords.

COMMENTS:
"{}"

KEYWORDS: [{}]

Please provide your analysis in the following JSON format:
{{
  "mentioned": boolean,
  "mentionedKeywords": string[],
  "snippet": string,
  "confidence": number,
  "analysis": string
}}

Where:
- "mentioned": true if any of the keywords are mentioned in a buying/interest context, false otherwise
- "mentionedKeywords": array of keywords that were actually mentioned in the comments
- "snippet": a short excerpt (1-2 sentences) from the comments that contains the relevant mention
- "confidence": a number between 0 and 1 indicating confidence in the analysis
- "analysis": a brief explanation of your reasoning

Focus on identifying:
1. Direct requests to buy products/services in comments
2. Expressions of interest in purchasing in comments
3. Descriptions of needs that could lead to purchases in comments
4. Mentions of specific keywords in relevant contexts in comments

Return ONLY the JSON response, no additional text or explanations."#,
        truncated(&comments_text),
        keywords.join(", ")
    )
}

fn truncated(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// First balanced `{...}` substring of `raw`, aware of string literals.
/// Classifier output is often wrapped in prose despite instructions.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse and sanitize classifier output against the original keyword set.
fn parse_classification(
    raw: &str,
    keywords: &[String],
) -> Result<ClassificationResult, CoreError> {
    let blob = extract_json_object(raw).ok_or_else(|| {
        CoreError::Llm(LlmError::ParseFailure {
            details: "no JSON object in classifier output".to_string(),
        })
    })?;
    let value: Value = serde_json::from_str(blob).map_err(|e| {
        CoreError::Llm(LlmError::ParseFailure {
            details: e.to_string(),
        })
    })?;
    Ok(sanitize(&value, keywords))
}

/// Field-by-field coercion with typed fallbacks. Keywords the classifier
/// invented (not in the request set) are discarded.
fn sanitize(value: &Value, keywords: &[String]) -> ClassificationResult {
    let mentioned_keywords = value
        .get("mentionedKeywords")
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(Value::as_str)
                .filter(|candidate| keywords.iter().any(|keyword| keyword == candidate))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ClassificationResult {
        mentioned: value
            .get("mentioned")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        mentioned_keywords,
        snippet: value
            .get("snippet")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        confidence: value
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|confidence| confidence.clamp(0.0, 1.0))
            .unwrap_or(0.0),
        analysis: value
            .get("analysis")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenUsage;
    use async_trait::async_trait;
    use radar_core::NoopAnalytics;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String, CoreError>>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, CoreError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Generation, CoreError> {
            let mut responses = self.responses.lock().await;
            let next = responses
                .pop_front()
                .unwrap_or_else(|| Ok("{\"mentioned\": false}".to_string()));
            next.map(|text| Generation {
                text,
                usage: Some(TokenUsage {
                    prompt_units: 10,
                    completion_units: 5,
                }),
            })
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }
    }

    fn classifier(responses: Vec<Result<String, CoreError>>) -> IntentClassifier {
        IntentClassifier::new(
            Arc::new(ScriptedGenerator::new(responses)),
            Arc::new(NoopAnalytics),
        )
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let raw = "Sure! Here you go: {\"mentioned\": true} Hope that helps.";
        assert_eq!(extract_json_object(raw), Some("{\"mentioned\": true}"));
    }

    #[test]
    fn extraction_handles_braces_inside_strings() {
        let raw = "{\"snippet\": \"use {braces} freely\", \"mentioned\": true}";
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn extraction_fails_without_an_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"unterminated\": true"), None);
    }

    #[tokio::test]
    async fn prose_wrapped_response_is_sanitized_and_clamped() {
        let classifier = classifier(vec![Ok(
            "Sure! {\"mentioned\": true, \"mentionedKeywords\": [\"SaaS\"], \"snippet\": \"x\", \"confidence\": 1.4, \"analysis\": \"y\"}"
                .to_string(),
        )]);
        let input = ClassificationInput {
            text: "We are shopping for a SaaS billing tool".to_string(),
            keywords: keywords(&["SaaS"]),
        };

        let result = classifier.classify_text(&input).await.unwrap();
        assert!(result.mentioned);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.mentioned_keywords, vec!["SaaS".to_string()]);
        assert_eq!(result.snippet, "x");
        assert_eq!(result.analysis, "y");
    }

    #[tokio::test]
    async fn invented_keywords_are_discarded() {
        let classifier = classifier(vec![Ok(
            "{\"mentioned\": true, \"mentionedKeywords\": [\"SaaS\", \"blockchain\"], \"confidence\": 0.9}"
                .to_string(),
        )]);
        let input = ClassificationInput {
            text: "SaaS pricing question".to_string(),
            keywords: keywords(&["SaaS"]),
        };

        let result = classifier.classify_text(&input).await.unwrap();
        assert_eq!(result.mentioned_keywords, vec!["SaaS".to_string()]);
    }

    #[tokio::test]
    async fn mistyped_fields_fall_back_to_safe_values() {
        let classifier = classifier(vec![Ok(
            "{\"mentioned\": \"yes\", \"mentionedKeywords\": \"SaaS\", \"snippet\": 4, \"confidence\": \"high\", \"analysis\": null}"
                .to_string(),
        )]);
        let input = ClassificationInput {
            text: "text".to_string(),
            keywords: keywords(&["SaaS"]),
        };

        let result = classifier.classify_text(&input).await.unwrap();
        assert!(!result.mentioned);
        assert!(result.mentioned_keywords.is_empty());
        assert_eq!(result.snippet, "");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.analysis, "");
    }

    #[tokio::test]
    async fn single_item_call_fails_on_unparseable_output() {
        let classifier = classifier(vec![Ok("I cannot answer that.".to_string())]);
        let input = ClassificationInput {
            text: "text".to_string(),
            keywords: keywords(&["SaaS"]),
        };

        let err = classifier.classify_text(&input).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Llm(LlmError::ParseFailure { .. })
        ));
    }

    #[tokio::test]
    async fn batch_substitutes_default_for_failed_items() {
        let classifier = classifier(vec![
            Ok("{\"mentioned\": true, \"mentionedKeywords\": [\"SaaS\"], \"confidence\": 0.8}"
                .to_string()),
            Ok("no JSON at all".to_string()),
            Err(CoreError::Llm(LlmError::ServiceUnavailable {
                provider: "gemini".to_string(),
            })),
        ]);
        let inputs = vec![
            ClassificationInput {
                text: "first".to_string(),
                keywords: keywords(&["SaaS"]),
            },
            ClassificationInput {
                text: "second".to_string(),
                keywords: keywords(&["SaaS"]),
            },
            ClassificationInput {
                text: "third".to_string(),
                keywords: keywords(&["SaaS"]),
            },
        ];

        let results = classifier.classify_batch(&inputs).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].mentioned);
        assert!(!results[1].mentioned);
        assert_eq!(results[1].confidence, 0.0);
        assert_eq!(results[1].analysis, "Analysis failed");
        assert_eq!(results[2].analysis, "Analysis failed");
    }

    #[tokio::test]
    async fn batch_results_respect_invariants() {
        let classifier = classifier(vec![
            Ok("{\"mentioned\": true, \"mentionedKeywords\": [\"CRM\", \"made-up\"], \"confidence\": 7.5}".to_string()),
            Ok("{\"mentioned\": false, \"confidence\": -3}".to_string()),
        ]);
        let request_keywords = keywords(&["CRM"]);
        let inputs = vec![
            ClassificationInput {
                text: "first".to_string(),
                keywords: request_keywords.clone(),
            },
            ClassificationInput {
                text: "second".to_string(),
                keywords: request_keywords.clone(),
            },
        ];

        for result in classifier.classify_batch(&inputs).await {
            assert!((0.0..=1.0).contains(&result.confidence));
            for keyword in &result.mentioned_keywords {
                assert!(request_keywords.contains(keyword));
            }
        }
    }

    #[tokio::test]
    async fn comment_analysis_caps_analyzed_count() {
        let classifier = classifier(vec![Ok(
            "{\"mentioned\": true, \"mentionedKeywords\": [\"SaaS\"], \"confidence\": 0.6}"
                .to_string(),
        )]);
        let input = CommentsClassificationInput {
            post_id: "abc".to_string(),
            comments: (0..120).map(|i| format!("comment {i}")).collect(),
            keywords: keywords(&["SaaS"]),
        };

        let result = classifier.classify_comments(&input).await.unwrap();
        assert_eq!(result.comment_count, 120);
        assert_eq!(result.analyzed_comment_count, 50);
        assert_eq!(result.post_id, "abc");
    }

    #[tokio::test]
    async fn comments_batch_substitutes_default_with_post_id() {
        let classifier = classifier(vec![Err(CoreError::Llm(LlmError::ServiceUnavailable {
            provider: "gemini".to_string(),
        }))]);
        let inputs = vec![CommentsClassificationInput {
            post_id: "xyz".to_string(),
            comments: vec!["only comment".to_string()],
            keywords: keywords(&["SaaS"]),
        }];

        let results = classifier.classify_comments_batch(&inputs).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].post_id, "xyz");
        assert!(!results[0].mentioned);
        assert_eq!(results[0].comment_count, 1);
        assert_eq!(results[0].analyzed_comment_count, 0);
        assert_eq!(results[0].analysis, "Comments analysis failed");
    }

    #[test]
    fn comments_filter_keywords_like_posts_do() {
        let value: Value = serde_json::from_str(
            "{\"mentioned\": true, \"mentionedKeywords\": [\"SaaS\", \"invented\"]}",
        )
        .unwrap();
        let sanitized = sanitize(&value, &keywords(&["SaaS"]));
        assert_eq!(sanitized.mentioned_keywords, vec!["SaaS".to_string()]);
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let long: String = "ä".repeat(MAX_INPUT_CHARS + 100);
        let cut = truncated(&long);
        assert_eq!(cut.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn prompt_includes_keywords_and_text() {
        let prompt = build_post_prompt("need a laptop", &keywords(&["laptop", "notebook"]));
        assert!(prompt.contains("need a laptop"));
        assert!(prompt.contains("laptop, notebook"));
        assert!(prompt.contains("Return ONLY the JSON response"));
    }
}
